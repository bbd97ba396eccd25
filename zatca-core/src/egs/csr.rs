//! PKCS#10 requests for EGS onboarding.
use super::EgsUnitInfo;
use crate::config::EnvironmentType;
use base64ct::{Base64, Encoding};
use const_oid::{AssociatedOid, ObjectIdentifier, db::rfc4519};
use k256::ecdsa::{DerSignature, SigningKey};
use thiserror::Error;
use x509_cert::{
    attr::AttributeTypeAndValue,
    builder::{Builder, RequestBuilder},
    der::{
        Any, Encode, EncodePem, Error as DerError, Length, Result as DerResult, Tag, Writer,
        asn1::{PrintableStringRef, SetOfVec},
        pem::LineEnding,
    },
    ext::{
        AsExtension, Extension,
        pkix::{SubjectAltName, name::GeneralName},
    },
    name::{Name, RdnSequence, RelativeDistinguishedName},
    request::CertReq,
};

/// `title` value announcing a simplified-invoice-only unit.
const INVOICE_TYPE: &str = "0100";

/// Errors that can occur while generating CSRs.
#[derive(Debug, Error)]
pub enum CsrError {
    #[error("EGS field '{0}' must not be empty")]
    MissingField(&'static str),

    #[error("invalid distinguished name: {0}")]
    InvalidName(DerError),

    #[error("failed to construct CSR request: {message}")]
    RequestBuild { message: String },

    #[error("failed adding CSR extension '{which}': {message}")]
    AddExtension {
        which: &'static str,
        message: String,
    },

    #[error("failed to build CSR: {message}")]
    CsrBuild { message: String },

    #[error("failed DER encoding for {context}: {source}")]
    DerEncode {
        context: &'static str,
        #[source]
        source: DerError,
    },
}

/// Microsoft certificate template name extension.
struct TemplateNameExtension(PrintableStringRef<'static>);

impl AssociatedOid for TemplateNameExtension {
    const OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.20.2");
}

impl Encode for TemplateNameExtension {
    fn encoded_len(&self) -> DerResult<Length> {
        self.0.encoded_len()
    }

    fn encode(&self, encoder: &mut impl Writer) -> DerResult<()> {
        self.0.encode(encoder)
    }
}

impl AsExtension for TemplateNameExtension {
    fn critical(&self, _subject: &Name, _extensions: &[Extension]) -> bool {
        false
    }
}

impl EnvironmentType {
    pub const fn certificate_template_name(&self) -> &'static str {
        match self {
            EnvironmentType::NonProduction => "TSTZATCA-Code-Signing",
            EnvironmentType::Simulation => "PREZATCA-Code-Signing",
            EnvironmentType::Production => "ZATCA-Code-Signing",
        }
    }

    fn to_extension(self) -> Result<TemplateNameExtension, CsrError> {
        PrintableStringRef::new(self.certificate_template_name())
            .map(TemplateNameExtension)
            .map_err(|e| CsrError::RequestBuild {
                message: format!("invalid template name for extension: {e}"),
            })
    }
}

/// Builds a name with one single-valued RDN per entry, most significant
/// first.
pub(crate) fn distinguished_name(
    attributes: &[(ObjectIdentifier, Tag, &str)],
) -> Result<Name, DerError> {
    let mut rdns = Vec::with_capacity(attributes.len());
    for (oid, tag, value) in attributes {
        let atv = AttributeTypeAndValue {
            oid: *oid,
            value: Any::new(*tag, value.as_bytes())?,
        };
        rdns.push(RelativeDistinguishedName(SetOfVec::try_from(vec![atv])?));
    }
    Ok(RdnSequence(rdns))
}

fn required<'a>(value: &'a str, field: &'static str) -> Result<&'a str, CsrError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CsrError::MissingField(field));
    }
    Ok(value)
}

fn subject(info: &EgsUnitInfo) -> Result<Name, CsrError> {
    distinguished_name(&[
        (rfc4519::C, Tag::PrintableString, "SA"),
        (
            rfc4519::OU,
            Tag::Utf8String,
            required(&info.branch_name, "branch_name")?,
        ),
        (
            rfc4519::O,
            Tag::Utf8String,
            required(&info.vat_name, "vat_name")?,
        ),
        (
            rfc4519::CN,
            Tag::Utf8String,
            required(&info.custom_id, "custom_id")?,
        ),
    ])
    .map_err(CsrError::InvalidName)
}

fn subject_alt_name(info: &EgsUnitInfo, solution_name: &str) -> Result<SubjectAltName, CsrError> {
    let serial = format!(
        "1-{}|2-{}|3-{}",
        required(solution_name, "solution_name")?,
        required(&info.model, "model")?,
        required(&info.uuid, "uuid")?
    );
    let address = format!(
        "{} {}, {}",
        info.location.building.trim(),
        info.location.street.trim(),
        info.location.city.trim()
    );
    let name = distinguished_name(&[
        (rfc4519::SN, Tag::Utf8String, serial.as_str()),
        (
            rfc4519::UID,
            Tag::Utf8String,
            required(&info.vat_number, "vat_number")?,
        ),
        (rfc4519::TITLE, Tag::Utf8String, INVOICE_TYPE),
        (rfc4519::REGISTERED_ADDRESS, Tag::Utf8String, address.as_str()),
        (
            rfc4519::BUSINESS_CATEGORY,
            Tag::Utf8String,
            required(&info.branch_industry, "branch_industry")?,
        ),
    ])
    .map_err(CsrError::InvalidName)?;
    Ok(SubjectAltName(vec![GeneralName::DirectoryName(name)]))
}

/// Builds and signs the onboarding request for `info` with `signer`.
pub fn build_csr(
    info: &EgsUnitInfo,
    env: EnvironmentType,
    solution_name: &str,
    signer: &SigningKey,
) -> Result<CertReq, CsrError> {
    let subject = subject(info)?;
    let template_extension = env.to_extension()?;
    let san_extension = subject_alt_name(info, solution_name)?;

    let mut csr_builder =
        RequestBuilder::new(subject, signer).map_err(|e| CsrError::RequestBuild {
            message: e.to_string(),
        })?;
    csr_builder
        .add_extension(&template_extension)
        .map_err(|e| CsrError::AddExtension {
            which: "TemplateName",
            message: e.to_string(),
        })?;
    csr_builder
        .add_extension(&san_extension)
        .map_err(|e| CsrError::AddExtension {
            which: "SubjectAltName",
            message: e.to_string(),
        })?;
    let csr = csr_builder
        .build::<DerSignature>()
        .map_err(|e| CsrError::CsrBuild {
            message: e.to_string(),
        })?;
    tracing::debug!(env = env.as_str(), custom_id = %info.custom_id, "built CSR");
    Ok(csr)
}

/// Encode to base64 string.
pub trait ToBase64String {
    fn to_pem_string(&self) -> Result<String, CsrError>;
    /// Base64 of the PEM text, the form the compliance endpoint expects.
    fn to_pem_base64_string(&self) -> Result<String, CsrError> {
        Ok(Base64::encode_string(self.to_pem_string()?.as_bytes()))
    }
}

impl ToBase64String for CertReq {
    fn to_pem_string(&self) -> Result<String, CsrError> {
        self.to_pem(LineEnding::LF)
            .map_err(|e| CsrError::DerEncode {
                context: "certificate request (PEM)",
                source: e,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::egs::EgsUnitLocation;
    use x509_cert::der::{Decode, DecodePem};

    fn info() -> EgsUnitInfo {
        EgsUnitInfo {
            uuid: "6f4d20e0-6bfe-4a80-9389-7dabe6620f12".into(),
            custom_id: "EGS1-886431145".into(),
            model: "IOS".into(),
            crn_number: "454634645645654".into(),
            vat_name: "Wesam Alzahir".into(),
            vat_number: "301121971500003".into(),
            branch_name: "My Branch Name".into(),
            branch_industry: "Food".into(),
            location: EgsUnitLocation {
                city: "Khobar".into(),
                city_subdivision: "West".into(),
                street: "King Fahahd st".into(),
                plot_identification: "0000".into(),
                building: "0000".into(),
                postal_zone: "31952".into(),
            },
        }
    }

    fn attribute_values(name: &Name) -> Vec<String> {
        name.0
            .iter()
            .flat_map(|rdn| rdn.0.iter())
            .map(|atv| String::from_utf8_lossy(atv.value.value()).into_owned())
            .collect()
    }

    #[test]
    fn request_carries_subject_and_extensions() {
        let key = SigningKey::random(&mut rand_core::OsRng);
        let csr = build_csr(&info(), EnvironmentType::NonProduction, "solution", &key)
            .expect("csr");

        assert_eq!(
            attribute_values(&csr.info.subject),
            ["SA", "My Branch Name", "Wesam Alzahir", "EGS1-886431145"]
        );

        let pem = csr.to_pem_string().expect("pem");
        assert!(pem.starts_with("-----BEGIN CERTIFICATE REQUEST-----"));
        let reparsed = CertReq::from_pem(pem.as_bytes()).expect("reparse");
        assert_eq!(reparsed, csr);

        let der = csr.info.to_der().expect("der");
        let text = String::from_utf8_lossy(&der);
        assert!(text.contains("TSTZATCA-Code-Signing"));
        assert!(text.contains("1-solution|2-IOS|3-6f4d20e0-6bfe-4a80-9389-7dabe6620f12"));
        assert!(text.contains("0000 King Fahahd st, Khobar"));
        assert!(text.contains("301121971500003"));
    }

    #[test]
    fn template_name_follows_environment() {
        assert_eq!(
            EnvironmentType::Simulation.certificate_template_name(),
            "PREZATCA-Code-Signing"
        );
        assert_eq!(
            EnvironmentType::Production.certificate_template_name(),
            "ZATCA-Code-Signing"
        );
        let ext = EnvironmentType::Production.to_extension().expect("extension");
        let der = ext.to_der().expect("der");
        assert_eq!(der[0], 0x13);
        assert_eq!(&der[2..], b"ZATCA-Code-Signing");
    }

    #[test]
    fn empty_fields_are_rejected() {
        let key = SigningKey::random(&mut rand_core::OsRng);
        let mut info = info();
        info.custom_id = "  ".into();
        assert!(matches!(
            build_csr(&info, EnvironmentType::NonProduction, "solution", &key),
            Err(CsrError::MissingField("custom_id"))
        ));
        assert!(matches!(
            build_csr(&self::info(), EnvironmentType::NonProduction, "", &key),
            Err(CsrError::MissingField("solution_name"))
        ));
    }

    #[test]
    fn base64_of_pem_decodes_back() {
        let key = SigningKey::random(&mut rand_core::OsRng);
        let csr = build_csr(&info(), EnvironmentType::Simulation, "solution", &key).expect("csr");
        let encoded = csr.to_pem_base64_string().expect("base64");
        let decoded = Base64::decode_vec(&encoded).expect("decode");
        assert_eq!(decoded, csr.to_pem_string().expect("pem").into_bytes());
        let der = csr.to_der().expect("der");
        assert_eq!(CertReq::from_der(&der).expect("from der"), csr);
    }
}
