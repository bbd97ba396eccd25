//! Rust toolkit for ZATCA Phase 2 simplified tax invoices: tree document,
//! canonical hashing, ECDSA signing, QR payloads, EGS onboarding and API.
//!
//! # Examples
//! ```rust
//! use zatca_core::invoice::{encode_tlv, decode_tlv};
//!
//! let payload = encode_tlv(&[b"Acme LTD".as_slice(), b"311111111101113".as_slice()])?;
//! assert_eq!(decode_tlv(&payload)?.len(), 2);
//! # Ok::<(), zatca_core::Error>(())
//! ```
pub mod api;
pub mod config;
pub mod egs;
pub mod invoice;
pub mod xml;

use thiserror::Error;

/// Top-level error wrapper for core operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Xml(#[from] xml::XmlError),
    #[error(transparent)]
    Canonicalization(#[from] invoice::CanonicalizationError),
    #[error(transparent)]
    Hash(#[from] invoice::HashError),
    #[error(transparent)]
    Signing(#[from] invoice::SigningError),
    #[error(transparent)]
    Qr(#[from] invoice::QrCodeError),
    #[error(transparent)]
    Assembly(#[from] invoice::AssemblyError),
    #[error(transparent)]
    Invoice(#[from] invoice::InvoiceError),
    #[error(transparent)]
    Csr(#[from] egs::csr::CsrError),
    #[error(transparent)]
    Egs(#[from] egs::EgsError),
    #[error(transparent)]
    Api(#[from] api::ZatcaError),
    #[error(transparent)]
    Environment(#[from] config::EnvironmentParseError),
}

#[cfg(test)]
mod tests {
    use super::Error;
    use crate::{
        api::ZatcaError,
        config::EnvironmentParseError,
        egs::{EgsError, csr::CsrError},
        invoice::{
            AssemblyError, CanonicalizationError, HashError, InvoiceError, QrCodeError,
            SigningError,
        },
    };

    #[test]
    fn error_conversions_cover_variants() {
        let err: Error = HashError::EmptyDocument.into();
        assert!(matches!(err, Error::Hash(_)));

        let err: Error = CanonicalizationError::Canonicalize.into();
        assert!(matches!(err, Error::Canonicalization(_)));

        let err: Error = SigningError::MissingPrecondition("certificate").into();
        assert!(matches!(err, Error::Signing(_)));
        assert_eq!(
            err.to_string(),
            SigningError::MissingPrecondition("certificate").to_string()
        );

        let err: Error = QrCodeError::MissingField("seller name").into();
        assert!(matches!(err, Error::Qr(_)));

        let err: Error = AssemblyError::MissingPlaceholder("SET_QR_CODE_DATA").into();
        assert!(matches!(err, Error::Assembly(_)));

        let err: Error = InvoiceError::NoLineItems.into();
        assert!(matches!(err, Error::Invoice(_)));

        let err: Error = CsrError::MissingField("custom_id").into();
        assert!(matches!(err, Error::Csr(_)));

        let err: Error = EgsError::MissingCsr.into();
        assert!(matches!(err, Error::Egs(_)));

        let err: Error = ZatcaError::ClientState("state".into()).into();
        assert!(matches!(err, Error::Api(_)));

        let err: Error = EnvironmentParseError::Invalid {
            input: "staging".into(),
        }
        .into();
        assert!(matches!(err, Error::Environment(_)));
    }

    #[test]
    fn xml_errors_convert() {
        let err = crate::xml::XmlDocument::parse("<a><b></a>").expect_err("mismatched tags");
        let err: Error = err.into();
        assert!(matches!(err, Error::Xml(_)));
    }
}
