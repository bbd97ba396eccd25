use crate::xml::{
    Condition, XmlDocument,
    constants::{
        ADDITIONAL_DOCUMENT_REFERENCE, ISSUE_DATE, ISSUE_TIME, QR_CODE_PLACEHOLDER, QR_ID,
        REFERENCE_ID, SELLER_NAME, SELLER_VAT_NUMBER, TAX_INCLUSIVE_AMOUNT, TAX_TOTAL,
    },
};
use base64ct::{Base64, Encoding};
use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QrCodeError {
    #[error("{0} is missing from the invoice")]
    MissingField(&'static str),
    #[error("invalid issue date/time '{0}'")]
    InvalidTimestamp(String),
    #[error("TLV field {tag} exceeds 255 bytes (len={len})")]
    ValueTooLong { tag: usize, len: usize },
    #[error("TLV payload cannot hold more than 255 fields (got {count})")]
    TooManyFields { count: usize },
    #[error("QR payload is not valid base64: {0}")]
    Base64(String),
    #[error("malformed TLV payload: {0}")]
    Malformed(String),
}

pub type QrResult<T> = std::result::Result<T, QrCodeError>;

/// Encodes `fields` as `[tag, length, value..]` triples, tags numbered from 1
/// in order, and returns the byte stream in base64.
pub fn encode_tlv(fields: &[&[u8]]) -> QrResult<String> {
    if fields.len() > u8::MAX as usize {
        return Err(QrCodeError::TooManyFields {
            count: fields.len(),
        });
    }
    let mut tlv = TlvBuilder::new();
    for (index, value) in fields.iter().enumerate() {
        tlv.push_bytes(index + 1, value)?;
    }
    Ok(tlv.finish())
}

/// Inverse of [`encode_tlv`]: field values in tag order.
pub fn decode_tlv(payload: &str) -> QrResult<Vec<Vec<u8>>> {
    let bytes = Base64::decode_vec(payload.trim())
        .map_err(|e| QrCodeError::Base64(e.to_string()))?;
    let mut fields = Vec::new();
    let mut rest = bytes.as_slice();
    while let [tag, len, tail @ ..] = rest {
        let expected = fields.len() + 1;
        if *tag as usize != expected {
            return Err(QrCodeError::Malformed(format!(
                "expected tag {expected}, found {tag}"
            )));
        }
        let len = *len as usize;
        if tail.len() < len {
            return Err(QrCodeError::Malformed(format!(
                "tag {tag} declares {len} bytes but only {} remain",
                tail.len()
            )));
        }
        let (value, next) = tail.split_at(len);
        fields.push(value.to_vec());
        rest = next;
    }
    if !rest.is_empty() {
        return Err(QrCodeError::Malformed("truncated tag header".into()));
    }
    Ok(fields)
}

/// Payload already embedded in the document's `QR` reference. A reference
/// still holding the placeholder counts as absent.
pub fn embedded_payload(doc: &XmlDocument) -> Option<&str> {
    doc.get(
        ADDITIONAL_DOCUMENT_REFERENCE,
        Some(&Condition::field(REFERENCE_ID, QR_ID)),
    )?
    .into_iter()
    .next()?
    .child("cac:Attachment")?
    .first()?
    .child("cbc:EmbeddedDocumentBinaryObject")?
    .first()?
    .as_text()
    .map(str::trim)
    .filter(|text| !text.is_empty() && *text != QR_CODE_PLACEHOLDER)
}

/// Invoice values shared by every QR variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrPayload {
    seller_name: String,
    seller_vat: String,
    timestamp: String,
    total_with_vat: String,
    total_vat: String,
}

impl QrPayload {
    pub fn from_document(doc: &XmlDocument) -> QrResult<Self> {
        let seller_name = required_text(doc, SELLER_NAME, "seller name")?;
        let seller_vat = required_text(doc, SELLER_VAT_NUMBER, "seller VAT number")?;
        let issue_date = required_text(doc, ISSUE_DATE, "issue date")?;
        let issue_time = required_text(doc, ISSUE_TIME, "issue time")?;
        let total_with_vat = required_text(doc, TAX_INCLUSIVE_AMOUNT, "total with VAT")?;

        // TaxTotal repeats; the first one carries the document level amount.
        let total_vat = doc
            .get(TAX_TOTAL, None)
            .and_then(|totals| totals.into_iter().next())
            .and_then(|total| total.child("cbc:TaxAmount"))
            .and_then(|amount| amount.first())
            .and_then(|amount| amount.as_text())
            .ok_or(QrCodeError::MissingField("total VAT"))?
            .to_string();

        Ok(Self {
            seller_name,
            seller_vat,
            timestamp: format_timestamp(&issue_date, &issue_time)?,
            total_with_vat,
            total_vat,
        })
    }

    pub fn seller_name(&self) -> &str {
        &self.seller_name
    }

    pub fn seller_vat(&self) -> &str {
        &self.seller_vat
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    pub fn total_with_vat(&self) -> &str {
        &self.total_with_vat
    }

    pub fn total_vat(&self) -> &str {
        &self.total_vat
    }

    /// Legacy five-field payload.
    pub fn encode_phase_one(&self) -> QrResult<String> {
        encode_tlv(&self.base_fields())
    }

    /// Full nine-field payload. The hash and signature are embedded as their
    /// base64 text; the key and certificate signature as raw bytes.
    pub fn encode_phase_two(
        &self,
        invoice_hash: &str,
        signature: &str,
        public_key: &[u8],
        certificate_signature: &[u8],
    ) -> QrResult<String> {
        let mut fields = self.base_fields();
        fields.extend([
            invoice_hash.as_bytes(),
            signature.as_bytes(),
            public_key,
            certificate_signature,
        ]);
        encode_tlv(&fields)
    }

    fn base_fields(&self) -> Vec<&[u8]> {
        vec![
            self.seller_name.as_bytes(),
            self.seller_vat.as_bytes(),
            self.timestamp.as_bytes(),
            self.total_with_vat.as_bytes(),
            self.total_vat.as_bytes(),
        ]
    }
}

fn required_text(doc: &XmlDocument, path: &str, label: &'static str) -> QrResult<String> {
    doc.get(path, None)
        .and_then(|nodes| nodes.into_iter().next())
        .and_then(|node| node.as_text())
        .filter(|text| !text.trim().is_empty())
        .map(|text| text.trim().to_string())
        .ok_or(QrCodeError::MissingField(label))
}

fn format_timestamp(issue_date: &str, issue_time: &str) -> QrResult<String> {
    let invalid = || QrCodeError::InvalidTimestamp(format!("{issue_date} {issue_time}"));
    let date = NaiveDate::parse_from_str(issue_date, "%Y-%m-%d").map_err(|_| invalid())?;
    let time = NaiveTime::parse_from_str(issue_time.trim_end_matches('Z'), "%H:%M:%S")
        .map_err(|_| invalid())?;
    Ok(date.and_time(time).format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

struct TlvBuilder {
    bytes: Vec<u8>,
}

impl TlvBuilder {
    fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    fn push_bytes(&mut self, tag: usize, value: &[u8]) -> QrResult<()> {
        let (Ok(tag_byte), Ok(len)) = (u8::try_from(tag), u8::try_from(value.len())) else {
            return Err(QrCodeError::ValueTooLong {
                tag,
                len: value.len(),
            });
        };
        self.bytes.push(tag_byte);
        self.bytes.push(len);
        self.bytes.extend_from_slice(value);
        Ok(())
    }

    fn finish(self) -> String {
        Base64::encode_string(&self.bytes)
    }
}
