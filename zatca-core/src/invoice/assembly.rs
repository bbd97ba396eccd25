//! Builds the signed invoice from an unsigned document.
use super::c14n::{C14nMode, LibxmlCanonicalizer};
use super::hash::{HashError, invoice_hash_with, signed_properties_hash};
use super::qr::{QrCodeError, QrPayload};
use super::sign::{SigningError, certificate_info, parse_private_key, sign_hash_with_key};
use super::templates;
use crate::xml::{
    SerializeOptions, XmlDocument, XmlError,
    constants::{QR_CODE_PLACEHOLDER, UBL_EXTENSIONS_PLACEHOLDER, X509_SERIAL_NUMBER},
};
use chrono::{DateTime, Utc};
use thiserror::Error;

const SIGNING_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
const OBJECT_OPEN: &str = "<ds:Object>";
const OBJECT_CLOSE: &str = "</ds:Object>";

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("placeholder {0} not found in the serialized invoice")]
    MissingPlaceholder(&'static str),
    #[error("{0} not found in the signed invoice")]
    MissingElement(&'static str),
    #[error("signed invoice is not well-formed: {0}")]
    Reparse(#[from] XmlError),
    #[error(transparent)]
    Hash(#[from] HashError),
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error(transparent)]
    Qr(#[from] QrCodeError),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SigningOptions {
    /// Defaults to the current time.
    pub signing_time: Option<DateTime<Utc>>,
    pub c14n_mode: C14nMode,
}

/// Output of [`sign_document`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedInvoice {
    xml: String,
    invoice_hash: String,
    qr: String,
}

impl SignedInvoice {
    pub fn xml(&self) -> &str {
        &self.xml
    }

    pub fn invoice_hash(&self) -> &str {
        &self.invoice_hash
    }

    /// Base64 TLV payload embedded in the QR document reference.
    pub fn qr(&self) -> &str {
        &self.qr
    }

    pub fn into_xml(self) -> String {
        self.xml
    }
}

/// Hashes and signs `doc`, then splices the signature extension and QR
/// payload into its `SET_UBL_EXTENSIONS_STRING` and `SET_QR_CODE_DATA`
/// placeholders.
///
/// The returned markup re-hashes to the returned invoice hash.
pub fn sign_document(
    doc: &XmlDocument,
    certificate: &str,
    private_key: &str,
    options: SigningOptions,
) -> Result<SignedInvoice, AssemblyError> {
    let key = parse_private_key(private_key)?;
    let cert = certificate_info(certificate)?;

    let invoice_hash = invoice_hash_with(doc, &LibxmlCanonicalizer::new(options.c14n_mode))?;
    let signature = sign_hash_with_key(&invoice_hash, &key)?;
    let qr = QrPayload::from_document(doc)?.encode_phase_two(
        &invoice_hash,
        &signature,
        &cert.public_key,
        &cert.signature,
    )?;

    let signing_time = options
        .signing_time
        .unwrap_or_else(Utc::now)
        .format(SIGNING_TIME_FORMAT)
        .to_string();
    let signed_properties = templates::signed_properties(
        &signing_time,
        &cert.hash,
        &cert.issuer,
        &cert.serial_number,
    );
    let signed_properties_hash = signed_properties_hash(&signed_properties);
    let extension = templates::signature_extension(
        &invoice_hash,
        &signed_properties_hash,
        &signature,
        &cert.body,
        &templates::embeddable(&signed_properties),
    );
    tracing::debug!(%signing_time, %signed_properties_hash, "built signature extension");

    let serialized = doc.serialize(SerializeOptions::default());
    let spliced = replace_placeholder(&serialized, UBL_EXTENSIONS_PLACEHOLDER, &extension)?;
    let spliced = replace_placeholder(&spliced, QR_CODE_PLACEHOLDER, &qr)?;

    let mut signed = XmlDocument::parse(&spliced)?;
    if !signed.set(X509_SERIAL_NUMBER, false, cert.serial_number.as_str(), None) {
        return Err(AssemblyError::MissingElement("ds:X509SerialNumber"));
    }
    let xml = fix_signed_properties_indentation(&signed.serialize(SerializeOptions::default()));

    Ok(SignedInvoice {
        xml,
        invoice_hash,
        qr,
    })
}

fn replace_placeholder(
    xml: &str,
    placeholder: &'static str,
    value: &str,
) -> Result<String, AssemblyError> {
    if !xml.contains(placeholder) {
        return Err(AssemblyError::MissingPlaceholder(placeholder));
    }
    Ok(xml.replacen(placeholder, value, 1))
}

/// Pulls the lines inside `ds:Object` four columns to the left, leaving the
/// line that closes the object as it is. This puts the embedded signed
/// properties at the indentation their digest was computed with.
fn fix_signed_properties_indentation(xml: &str) -> String {
    let Some(start) = xml.find(OBJECT_OPEN).map(|index| index + OBJECT_OPEN.len()) else {
        return xml.to_string();
    };
    let Some(end) = xml[start..].find(OBJECT_CLOSE).map(|index| start + index) else {
        return xml.to_string();
    };

    let mut lines: Vec<&str> = xml[start..end].split('\n').collect();
    let Some(last) = lines.pop() else {
        return xml.to_string();
    };
    if lines.is_empty() {
        return xml.to_string();
    }
    let shifted: Vec<&str> = lines
        .iter()
        .map(|line| line.char_indices().nth(4).map_or("", |(index, _)| &line[index..]))
        .collect();

    format!(
        "{}{}\n{}{}",
        &xml[..start],
        shifted.join("\n"),
        last,
        &xml[end..]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indentation_fix_shifts_object_content_only() {
        let xml = [
            "<a>",
            "    <ds:Object>",
            "        <b>",
            "            <c>1</c>",
            "        </b>",
            "    </ds:Object>",
            "    <d>2</d>",
            "</a>",
        ]
        .join("\n");
        let expected = [
            "<a>",
            "    <ds:Object>",
            "    <b>",
            "        <c>1</c>",
            "    </b>",
            "    </ds:Object>",
            "    <d>2</d>",
            "</a>",
        ]
        .join("\n");
        assert_eq!(fix_signed_properties_indentation(&xml), expected);
    }

    #[test]
    fn indentation_fix_ignores_documents_without_object() {
        let xml = "<a>\n    <b>1</b>\n</a>";
        assert_eq!(fix_signed_properties_indentation(xml), xml);
    }

    #[test]
    fn missing_placeholder_is_reported() {
        match replace_placeholder("<a>1</a>", QR_CODE_PLACEHOLDER, "qr") {
            Err(AssemblyError::MissingPlaceholder(name)) => assert_eq!(name, QR_CODE_PLACEHOLDER),
            other => panic!("expected MissingPlaceholder, got {other:?}"),
        }
        assert_eq!(
            replace_placeholder("<a>SET_QR_CODE_DATA</a>", QR_CODE_PLACEHOLDER, "qr").expect("replace"),
            "<a>qr</a>"
        );
    }
}
