//! ECDSA signing over the invoice hash and certificate metadata extraction.
use super::hash::certificate_hash;
use base64ct::{Base64, Encoding};
use k256::{
    SecretKey,
    ecdsa::{Signature, SigningKey, signature::Signer},
    pkcs8::DecodePrivateKey,
};
use thiserror::Error;
use x509_cert::{
    Certificate,
    der::{DecodePem, Encode, asn1::ObjectIdentifier},
    name::Name,
};

#[derive(Debug, Error)]
pub enum SigningError {
    #[error("missing {0}")]
    MissingPrecondition(&'static str),
    #[error("Private key parse error: {0}")]
    PrivateKey(String),
    #[error("Certificate parse error: {0}")]
    Certificate(String),
    #[error("Signing error: {0}")]
    SigningError(String),
}

/// Values read from the signing certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateInfo {
    /// Hex-then-base64 SHA-256 of [`CertificateInfo::body`].
    pub hash: String,
    /// Issuer RDNs, last to first, joined with `", "`.
    pub issuer: String,
    /// Serial number in decimal.
    pub serial_number: String,
    /// DER encoded subjectPublicKeyInfo.
    pub public_key: Vec<u8>,
    /// Raw bytes of the certificate's outer signature.
    pub signature: Vec<u8>,
    /// Base64 body without armor or whitespace.
    pub body: String,
}

const RDN_LABELS: &[(&str, &str)] = &[
    ("2.5.4.3", "CN"),
    ("2.5.4.5", "SERIALNUMBER"),
    ("2.5.4.6", "C"),
    ("2.5.4.7", "L"),
    ("2.5.4.8", "ST"),
    ("2.5.4.9", "STREET"),
    ("2.5.4.10", "O"),
    ("2.5.4.11", "OU"),
    ("0.9.2342.19200300.100.1.1", "UID"),
    ("0.9.2342.19200300.100.1.25", "DC"),
    ("1.2.840.113549.1.9.1", "E"),
];

/// Signs the digest carried by `invoice_hash` (base64) with `private_key`
/// and returns the DER signature in base64.
pub fn sign_invoice_hash(invoice_hash: &str, private_key: &str) -> Result<String, SigningError> {
    let key = parse_private_key(private_key)?;
    sign_hash_with_key(invoice_hash, &key)
}

pub fn sign_hash_with_key(invoice_hash: &str, key: &SigningKey) -> Result<String, SigningError> {
    let hash_bytes = Base64::decode_vec(invoice_hash)
        .map_err(|e| SigningError::SigningError(format!("Failed to decode base64 hash: {e:?}")))?;
    let signature: Signature = key
        .try_sign(&hash_bytes)
        .map_err(|e| SigningError::SigningError(format!("Failed to sign invoice hash: {e:?}")))?;
    Ok(Base64::encode_string(signature.to_der().as_bytes()))
}

/// Reads a secp256k1 key given as SEC1 or PKCS#8 PEM, or as a bare base64
/// body which is wrapped back into PEM armor before decoding.
pub fn parse_private_key(private_key: &str) -> Result<SigningKey, SigningError> {
    if private_key.trim().is_empty() {
        return Err(SigningError::MissingPrecondition("private key"));
    }
    if let Some(body) = pem_body(private_key, "EC PRIVATE KEY") {
        return sec1_key(&body);
    }
    if let Some(body) = pem_body(private_key, "PRIVATE KEY") {
        return pkcs8_key(&body);
    }
    if private_key.contains("-----BEGIN") {
        return Err(SigningError::PrivateKey(
            "expected an EC PRIVATE KEY or PRIVATE KEY block".into(),
        ));
    }
    let body = strip_whitespace(private_key);
    sec1_key(&body).or_else(|_| pkcs8_key(&body))
}

fn sec1_key(body: &str) -> Result<SigningKey, SigningError> {
    SecretKey::from_sec1_pem(&wrap_pem("EC PRIVATE KEY", body))
        .map(SigningKey::from)
        .map_err(|e| SigningError::PrivateKey(format!("{e:?}")))
}

fn pkcs8_key(body: &str) -> Result<SigningKey, SigningError> {
    SigningKey::from_pkcs8_pem(&wrap_pem("PRIVATE KEY", body))
        .map_err(|e| SigningError::PrivateKey(format!("{e:?}")))
}

/// Decodes `certificate` (PEM or bare base64 body) and collects the values
/// the signed properties and the QR code need.
pub fn certificate_info(certificate: &str) -> Result<CertificateInfo, SigningError> {
    let body = clean_certificate_body(certificate);
    if body.is_empty() {
        return Err(SigningError::MissingPrecondition("certificate"));
    }
    let cert = Certificate::from_pem(wrap_pem("CERTIFICATE", &body).as_bytes())
        .map_err(|e| SigningError::Certificate(format!("{e:?}")))?;
    let tbs = &cert.tbs_certificate;
    let public_key = tbs
        .subject_public_key_info
        .to_der()
        .map_err(|e| SigningError::Certificate(format!("public key encoding error: {e:?}")))?;

    Ok(CertificateInfo {
        hash: certificate_hash(&body),
        issuer: issuer_name(&tbs.issuer),
        serial_number: serial_bytes_to_decimal_string(tbs.serial_number.as_bytes()),
        public_key,
        signature: cert.signature.raw_bytes().to_vec(),
        body,
    })
}

/// Base64 body of a certificate: the `CERTIFICATE` block when armored,
/// otherwise the whole input, with all whitespace removed.
pub fn clean_certificate_body(certificate: &str) -> String {
    pem_body(certificate, "CERTIFICATE").unwrap_or_else(|| strip_whitespace(certificate))
}

/// Wraps a base64 body into PEM armor with 64 character lines.
pub fn wrap_pem(label: &str, body: &str) -> String {
    let mut pem = format!("-----BEGIN {label}-----\n");
    for line in body.as_bytes().chunks(64) {
        pem.push_str(&String::from_utf8_lossy(line));
        pem.push('\n');
    }
    pem.push_str(&format!("-----END {label}-----\n"));
    pem
}

fn pem_body(text: &str, label: &str) -> Option<String> {
    let begin = format!("-----BEGIN {label}-----");
    let end = format!("-----END {label}-----");
    let start = text.find(&begin)? + begin.len();
    let stop = start + text[start..].find(&end)?;
    Some(strip_whitespace(&text[start..stop]))
}

fn strip_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

fn issuer_name(name: &Name) -> String {
    name.0
        .iter()
        .rev()
        .map(|rdn| {
            rdn.0
                .iter()
                .map(|atv| {
                    format!(
                        "{}={}",
                        attribute_label(&atv.oid),
                        String::from_utf8_lossy(atv.value.value())
                    )
                })
                .collect::<Vec<_>>()
                .join("+")
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn attribute_label(oid: &ObjectIdentifier) -> String {
    let dotted = oid.to_string();
    RDN_LABELS
        .iter()
        .find(|(known, _)| *known == dotted)
        .map(|(_, label)| label.to_string())
        .unwrap_or(dotted)
}

fn serial_bytes_to_decimal_string(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "0".to_string();
    }

    let mut digits: Vec<u8> = vec![0];
    for &byte in bytes {
        let mut carry = byte as u32;
        for digit in digits.iter_mut() {
            let value = (*digit as u32) * 256 + carry;
            *digit = (value % 10) as u8;
            carry = value / 10;
        }
        while carry > 0 {
            digits.push((carry % 10) as u8);
            carry /= 10;
        }
    }

    while digits.len() > 1 && matches!(digits.last(), Some(0)) {
        digits.pop();
    }

    digits.iter().rev().map(|d| (b'0' + *d) as char).collect()
}
