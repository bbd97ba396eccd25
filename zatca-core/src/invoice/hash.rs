//! Invoice, certificate and signed-properties digests.
use super::c14n::{CanonicalizationError, Canonicalizer, LibxmlCanonicalizer};
use super::purify::purify;
use crate::xml::{SerializeOptions, XmlDocument};
use base64ct::{Base64, Encoding};
use sha2::{Digest, Sha256};
use std::fmt::Write;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HashError {
    #[error("cannot hash an empty document")]
    EmptyDocument,
    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),
}

/// Base64 SHA-256 of the canonical, purified invoice, using the default
/// libxml2 canonicalizer.
pub fn invoice_hash(doc: &XmlDocument) -> Result<String, HashError> {
    invoice_hash_with(doc, &LibxmlCanonicalizer::default())
}

pub fn invoice_hash_with(
    doc: &XmlDocument,
    canonicalizer: &dyn Canonicalizer,
) -> Result<String, HashError> {
    let canonical = canonical_invoice(doc, canonicalizer)?;
    let hash = Sha256::digest(canonical.as_bytes());
    let invoice_hash = Base64::encode_string(&hash);
    tracing::debug!(%invoice_hash, "computed invoice hash");
    Ok(invoice_hash)
}

/// The exact text that [`invoice_hash_with`] digests.
pub fn canonical_invoice(
    doc: &XmlDocument,
    canonicalizer: &dyn Canonicalizer,
) -> Result<String, HashError> {
    if doc.is_empty() {
        return Err(HashError::EmptyDocument);
    }
    let pure = purify(doc);
    let serialized = pure.serialize(SerializeOptions::default());
    let canonical = canonicalizer.canonicalize(&serialized)?;
    tracing::debug!(len = canonical.len(), "canonicalized purified invoice");
    Ok(apply_verifier_whitespace(&canonical))
}

// The reporting service hashes the signed document with the removed blocks
// leaving their surrounding whitespace behind; reproduce that here.
fn apply_verifier_whitespace(canonical: &str) -> String {
    canonical
        .replacen("<cbc:ProfileID>", "\n    <cbc:ProfileID>", 1)
        .replacen(
            "<cac:AccountingSupplierParty>",
            "\n    \n    <cac:AccountingSupplierParty>",
            1,
        )
}

/// Digest embedded as `xades:CertDigest`: SHA-256 over the base64 body text
/// of the certificate, rendered as lowercase hex, then base64 encoded.
pub fn certificate_hash(certificate_body: &str) -> String {
    hex_hash_to_base64(&Sha256::digest(certificate_body.as_bytes()))
}

/// Digest of the exact-whitespace signed properties block, same scheme as
/// [`certificate_hash`].
pub fn signed_properties_hash(signed_properties: &str) -> String {
    hex_hash_to_base64(&Sha256::digest(signed_properties.as_bytes()))
}

fn hex_hash_to_base64(hash: &[u8]) -> String {
    let mut hex_hash = String::with_capacity(hash.len() * 2);
    for byte in hash {
        let _ = write!(&mut hex_hash, "{:02x}", byte);
    }
    Base64::encode_string(hex_hash.as_bytes())
}
