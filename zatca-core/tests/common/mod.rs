#![allow(dead_code)]

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime};
use k256::ecdsa::{DerSignature, SigningKey};
use k256::pkcs8::{EncodePublicKey, LineEnding};
use x509_cert::builder::{Builder, CertificateBuilder, Profile};
use x509_cert::der::EncodePem;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::Validity;
use zatca_core::egs::{EgsUnitInfo, EgsUnitLocation};
use zatca_core::invoice::{LineItem, SimplifiedTaxInvoice};

pub const PREVIOUS_INVOICE_HASH: &str =
    "NWZlY2ViNjZmZmM4NmYzOGQ5NTI3ODZjNmQ2OTZjNzljMmRiYzIzOWRkNGU5MWI0NjcyOWQ3M2EyN2ZiNTdlOQ==";

pub const SIGNATURE_INFO: &str = "Invoice/ext:UBLExtensions/ext:UBLExtension/ext:ExtensionContent/sig:UBLDocumentSignatures/sac:SignatureInformation/ds:Signature";

/// Key and self-signed certificate for signing tests.
pub struct SigningMaterial {
    pub key: SigningKey,
    pub key_pem: String,
    pub certificate_pem: String,
}

pub fn signing_material() -> SigningMaterial {
    let key = SigningKey::random(&mut rand_core::OsRng);
    let key_pem = k256::SecretKey::from(&key)
        .to_sec1_pem(LineEnding::LF)
        .expect("sec1 pem")
        .as_str()
        .to_owned();

    let subject = Name::from_str("CN=Test EGS CA,O=Acme Widgets,C=SA").expect("subject");
    let spki_der = key
        .verifying_key()
        .to_public_key_der()
        .expect("public key der");
    let spki = SubjectPublicKeyInfoOwned::try_from(spki_der.as_bytes()).expect("spki");
    let serial = SerialNumber::new(&[0x01, 0x02, 0x03]).expect("serial");
    let validity = Validity::from_now(Duration::from_secs(3600)).expect("validity");
    let certificate = CertificateBuilder::new(Profile::Root, serial, validity, subject, spki, &key)
        .expect("certificate builder")
        .build::<DerSignature>()
        .expect("certificate");

    SigningMaterial {
        key,
        key_pem,
        certificate_pem: certificate.to_pem(LineEnding::LF).expect("certificate pem"),
    }
}

pub fn egs_info() -> EgsUnitInfo {
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

pub fn sample_invoice() -> SimplifiedTaxInvoice {
    SimplifiedTaxInvoice::builder(
        egs_info(),
        1,
        "EGS1-886431145-1",
        NaiveDate::from_ymd_opt(2022, 3, 13).expect("date"),
        NaiveTime::from_hms_opt(14, 40, 40).expect("time"),
        PREVIOUS_INVOICE_HASH,
    )
    .line_item(
        LineItem::new("1", "TEST NAME", 44.0, 22.0, 0.15)
            .with_other_tax(0.1)
            .with_discount(1.0, "A discount")
            .with_discount(1.0, "A discount"),
    )
    .line_item(LineItem::new("2", "TEST NAME 1", 10.0, 5.0, 0.15))
    .build()
    .expect("invoice")
}

pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("invoices")
        .join(name)
}

pub fn read_fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name)).expect("read fixture")
}
