//! Simplified tax invoices: building, hashing, signing and QR encoding.
//!
//! The pipeline runs on [`XmlDocument`](crate::xml::XmlDocument) trees:
//! [`purify`] drops the signature parts, [`c14n`] produces the canonical
//! text, [`hash`] digests it, [`sign`] signs the digest and
//! [`assembly`] splices everything back into the markup.
mod amount;
pub mod assembly;
mod builder;
pub mod c14n;
pub mod hash;
pub mod purify;
pub mod qr;
pub mod sign;
mod templates;

pub use amount::format_fixed_no_rounding;
pub use assembly::{AssemblyError, SignedInvoice, SigningOptions, sign_document};
pub use builder::{SimplifiedTaxInvoice, SimplifiedTaxInvoiceBuilder};
pub use c14n::{C14nMode, CanonicalizationError, Canonicalizer, LibxmlCanonicalizer};
pub use hash::{HashError, invoice_hash};
pub use purify::purify;
pub use qr::{QrCodeError, QrPayload, QrResult, decode_tlv, embedded_payload, encode_tlv};
pub use sign::{CertificateInfo, SigningError};

use crate::xml::XmlError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Invoice-related errors.
#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("invoice has no line items")]
    NoLineItems,
    #[error("line item {index}: {reason}")]
    InvalidLineItem { index: usize, reason: &'static str },
    #[error("populated invoice template is not well-formed: {0}")]
    Template(#[from] XmlError),
    #[error("could not write {0} into the invoice")]
    MissingElement(&'static str),
}

/// `cbc:InvoiceTypeCode` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceType {
    Invoice,
    DebitNote,
    CreditNote,
}

impl InvoiceType {
    pub fn code(self) -> &'static str {
        match self {
            InvoiceType::Invoice => "388",
            InvoiceType::DebitNote => "383",
            InvoiceType::CreditNote => "381",
        }
    }
}

/// `cbc:PaymentMeansCode` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Credit,
    BankAccount,
    BankCard,
}

impl PaymentMethod {
    pub fn code(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "10",
            PaymentMethod::Credit => "30",
            PaymentMethod::BankAccount => "42",
            PaymentMethod::BankCard => "48",
        }
    }
}

/// Turns the invoice into a debit or credit note against an earlier one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cancellation {
    pub canceled_invoice_number: String,
    pub payment_method: PaymentMethod,
    pub cancellation_type: InvoiceType,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItemDiscount {
    pub amount: f64,
    pub reason: String,
}

/// Additional tax applied on top of VAT, as a fraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LineItemTax {
    pub percent_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: String,
    pub name: String,
    pub quantity: f64,
    pub tax_exclusive_price: f64,
    /// VAT rate as a fraction, `0.15` for 15%.
    pub vat_percent: f64,
    #[serde(default)]
    pub other_taxes: Vec<LineItemTax>,
    #[serde(default)]
    pub discounts: Vec<LineItemDiscount>,
}

impl LineItem {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        quantity: f64,
        tax_exclusive_price: f64,
        vat_percent: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            quantity,
            tax_exclusive_price,
            vat_percent,
            other_taxes: Vec::new(),
            discounts: Vec::new(),
        }
    }

    pub fn with_discount(mut self, amount: f64, reason: impl Into<String>) -> Self {
        self.discounts.push(LineItemDiscount {
            amount,
            reason: reason.into(),
        });
        self
    }

    pub fn with_other_tax(mut self, percent_amount: f64) -> Self {
        self.other_taxes.push(LineItemTax { percent_amount });
        self
    }

    pub fn discounts_total(&self) -> f64 {
        self.discounts.iter().map(|discount| discount.amount).sum()
    }

    /// Price times quantity, less discounts.
    pub fn taxable_amount(&self) -> f64 {
        self.tax_exclusive_price * self.quantity - self.discounts_total()
    }

    fn validate(&self, index: usize) -> Result<(), InvoiceError> {
        let invalid = |reason| Err(InvoiceError::InvalidLineItem { index, reason });
        if self.id.trim().is_empty() {
            return invalid("id is empty");
        }
        if self.name.trim().is_empty() {
            return invalid("name is empty");
        }
        if !self.quantity.is_finite() || self.quantity <= 0.0 {
            return invalid("quantity must be positive");
        }
        if !self.tax_exclusive_price.is_finite() || self.tax_exclusive_price < 0.0 {
            return invalid("price must not be negative");
        }
        if !(0.0..=1.0).contains(&self.vat_percent) {
            return invalid("VAT rate must be a fraction between 0 and 1");
        }
        if self
            .discounts
            .iter()
            .any(|discount| !discount.amount.is_finite() || discount.amount < 0.0)
        {
            return invalid("discounts must not be negative");
        }
        if self.taxable_amount() < 0.0 {
            return invalid("discounts exceed the line amount");
        }
        Ok(())
    }
}
