//! Markup skeletons populated by string substitution.
use quick_xml::escape::partial_escape;

pub(crate) const SIMPLIFIED_TAX_INVOICE: &str =
    include_str!("../../assets/templates/simplified_tax_invoice.xml");
pub(crate) const BILLING_REFERENCE: &str =
    include_str!("../../assets/templates/billing_reference.xml");
pub(crate) const UBL_SIGNATURE_EXTENSION: &str =
    include_str!("../../assets/templates/ubl_signature_extension.xml");
pub(crate) const SIGNED_PROPERTIES: &str =
    include_str!("../../assets/templates/signed_properties.xml");

const NAMESPACE_DECLARATIONS: [&str; 2] = [
    " xmlns:xades=\"http://uri.etsi.org/01903/v1.3.2#\"",
    " xmlns:ds=\"http://www.w3.org/2000/09/xmldsig#\"",
];

/// Replaces each placeholder in order, first occurrence only. Placeholders
/// that prefix others (`SET_CITY` / `SET_CITY_SUBDIVISION`) must come after
/// the longer one.
pub(crate) fn fill(template: &str, values: &[(&str, &str)]) -> String {
    values
        .iter()
        .fold(template.trim().to_string(), |filled, (placeholder, value)| {
            filled.replacen(placeholder, value, 1)
        })
}

/// Signed properties exactly as the verifier canonicalizes them: namespace
/// declarations repeated on every `ds` element, children indented for their
/// final position in the signed document.
pub(crate) fn signed_properties(
    signing_time: &str,
    certificate_hash: &str,
    issuer: &str,
    serial_number: &str,
) -> String {
    let issuer = partial_escape(issuer);
    fill(
        SIGNED_PROPERTIES,
        &[
            ("SET_SIGN_TIMESTAMP", signing_time),
            ("SET_CERTIFICATE_HASH", certificate_hash),
            ("SET_CERTIFICATE_ISSUER", issuer.as_ref()),
            ("SET_CERTIFICATE_SERIAL_NUMBER", serial_number),
        ],
    )
}

/// The same block without namespace declarations, which the enclosing
/// signature already provides.
pub(crate) fn embeddable(signed_properties: &str) -> String {
    NAMESPACE_DECLARATIONS
        .iter()
        .fold(signed_properties.to_string(), |block, declaration| {
            block.replace(declaration, "")
        })
}

pub(crate) fn signature_extension(
    invoice_hash: &str,
    signed_properties_hash: &str,
    signature: &str,
    certificate_body: &str,
    signed_properties: &str,
) -> String {
    fill(
        UBL_SIGNATURE_EXTENSION,
        &[
            ("SET_INVOICE_HASH", invoice_hash),
            ("SET_SIGNED_PROPERTIES_HASH", signed_properties_hash),
            ("SET_DIGITAL_SIGNATURE", signature),
            ("SET_CERTIFICATE", certificate_body),
            ("SET_SIGNED_PROPERTIES_XML", signed_properties),
        ],
    )
}
