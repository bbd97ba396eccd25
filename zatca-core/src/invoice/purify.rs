use crate::xml::{
    Condition, XmlDocument,
    constants::{ADDITIONAL_DOCUMENT_REFERENCE, QR_ID, REFERENCE_ID, SIGNATURE, UBL_EXTENSIONS},
};

/// Returns a copy of `doc` without the parts excluded from the invoice hash:
/// the signing extension block, the signature envelope and the QR document
/// reference. The input is left untouched.
pub fn purify(doc: &XmlDocument) -> XmlDocument {
    let mut pure = doc.clone();
    pure.delete(UBL_EXTENSIONS, None);
    pure.delete(SIGNATURE, None);
    pure.delete(
        ADDITIONAL_DOCUMENT_REFERENCE,
        Some(&Condition::field(REFERENCE_ID, QR_ID)),
    );
    pure
}
