mod common;

use common::read_fixture;
use zatca_core::invoice::{
    C14nMode, LibxmlCanonicalizer, QrPayload, decode_tlv, embedded_payload,
    hash::{canonical_invoice, invoice_hash_with},
    invoice_hash, purify,
};
use zatca_core::xml::{SerializeOptions, XmlDocument};

const GOLDEN_HASH: &str = "1MrKht4fEdPXNc93z6ucIFrW4jsKMyYQ2vCdVih+N2k=";

#[test]
fn recorded_invoice_hashes_to_golden_value() {
    let doc = XmlDocument::parse(&read_fixture("simplified-invoice.xml")).expect("parse fixture");
    assert_eq!(invoice_hash(&doc).expect("hash"), GOLDEN_HASH);
}

#[test]
fn hash_survives_a_serialize_parse_cycle() {
    let doc = XmlDocument::parse(&read_fixture("simplified-invoice.xml")).expect("parse fixture");
    let serialized = doc.serialize(SerializeOptions::default());
    let reparsed = XmlDocument::parse(&serialized).expect("reparse");

    assert_eq!(reparsed.serialize(SerializeOptions::default()), serialized);
    assert_eq!(invoice_hash(&reparsed).expect("hash"), GOLDEN_HASH);
}

#[test]
fn canonical_form_excludes_signature_parts() {
    let doc = XmlDocument::parse(&read_fixture("simplified-invoice.xml")).expect("parse fixture");
    let canonical =
        canonical_invoice(&doc, &LibxmlCanonicalizer::default()).expect("canonical form");

    assert!(!canonical.starts_with("<?xml"));
    assert!(!canonical.contains("cac:Signature>"));
    assert!(!canonical.contains("<cbc:ID>QR</cbc:ID>"));
    assert!(canonical.contains("<cbc:ID>PIH</cbc:ID>"));
    assert!(canonical.contains("<cbc:ID>ICV</cbc:ID>"));

    let purified = purify(&doc);
    assert!(doc.get("Invoice/cac:Signature", None).is_some());
    assert!(purified.get("Invoice/cac:Signature", None).is_none());
}

#[test]
fn canonicalization_mode_is_selectable() {
    let doc = XmlDocument::parse(&read_fixture("simplified-invoice.xml")).expect("parse fixture");
    let inclusive = invoice_hash_with(&doc, &LibxmlCanonicalizer::new(C14nMode::Inclusive))
        .expect("inclusive hash");
    let inclusive11 = invoice_hash_with(&doc, &LibxmlCanonicalizer::new(C14nMode::Inclusive11))
        .expect("c14n 1.1 hash");
    assert_eq!(inclusive, GOLDEN_HASH);
    // Both inclusive variants agree on a document without xml:* attributes.
    assert_eq!(inclusive11, GOLDEN_HASH);
}

#[test]
fn recorded_qr_carries_the_invoice_values() {
    let doc = XmlDocument::parse(&read_fixture("simplified-invoice.xml")).expect("parse fixture");
    let fields = decode_tlv(embedded_payload(&doc).expect("embedded QR")).expect("decode");
    assert_eq!(fields.len(), 9);

    let payload = QrPayload::from_document(&doc).expect("payload");
    assert_eq!(fields[0], payload.seller_name().as_bytes());
    assert_eq!(fields[1], payload.seller_vat().as_bytes());
    assert_eq!(fields[2], payload.timestamp().as_bytes());
    assert_eq!(payload.timestamp(), "2022-03-13T14:40:40Z");
    assert_eq!(fields[3], payload.total_with_vat().as_bytes());
    assert_eq!(fields[4], payload.total_vat().as_bytes());
}
