use super::{
    Cancellation, InvoiceError, InvoiceType, LineItem,
    assembly::{AssemblyError, SignedInvoice, SigningOptions, sign_document},
    format_fixed_no_rounding,
    hash::{HashError, invoice_hash},
    templates::{self, BILLING_REFERENCE, SIMPLIFIED_TAX_INVOICE},
};
use crate::egs::EgsUnitInfo;
use crate::xml::{
    SerializeOptions, XmlDocument, XmlElement, XmlNode,
    constants::{INVOICE_LINE, LEGAL_MONETARY_TOTAL, PAYMENT_MEANS, TAX_TOTAL},
};
use chrono::{NaiveDate, NaiveTime};
use quick_xml::escape::partial_escape;

const CURRENCY: &str = "SAR";
const DEFAULT_INSTRUCTION_NOTE: &str = "No note Specified";

/// An unsigned simplified tax invoice, populated from the skeleton template.
#[derive(Debug, Clone)]
pub struct SimplifiedTaxInvoice {
    doc: XmlDocument,
}

impl SimplifiedTaxInvoice {
    pub fn builder(
        egs: EgsUnitInfo,
        invoice_counter_number: u64,
        invoice_serial_number: impl Into<String>,
        issue_date: NaiveDate,
        issue_time: NaiveTime,
        previous_invoice_hash: impl Into<String>,
    ) -> SimplifiedTaxInvoiceBuilder {
        SimplifiedTaxInvoiceBuilder {
            egs,
            invoice_counter_number,
            invoice_serial_number: invoice_serial_number.into(),
            issue_date,
            issue_time,
            previous_invoice_hash: previous_invoice_hash.into(),
            line_items: Vec::new(),
            cancellation: None,
        }
    }

    pub fn document(&self) -> &XmlDocument {
        &self.doc
    }

    pub fn into_document(self) -> XmlDocument {
        self.doc
    }

    pub fn to_xml(&self) -> String {
        self.doc.serialize(SerializeOptions::default())
    }

    pub fn hash(&self) -> Result<String, HashError> {
        invoice_hash(&self.doc)
    }

    pub fn sign(&self, certificate: &str, private_key: &str) -> Result<SignedInvoice, AssemblyError> {
        self.sign_with(certificate, private_key, SigningOptions::default())
    }

    pub fn sign_with(
        &self,
        certificate: &str,
        private_key: &str,
        options: SigningOptions,
    ) -> Result<SignedInvoice, AssemblyError> {
        sign_document(&self.doc, certificate, private_key, options)
    }
}

#[derive(Debug, Clone)]
pub struct SimplifiedTaxInvoiceBuilder {
    egs: EgsUnitInfo,
    invoice_counter_number: u64,
    invoice_serial_number: String,
    issue_date: NaiveDate,
    issue_time: NaiveTime,
    previous_invoice_hash: String,
    line_items: Vec<LineItem>,
    cancellation: Option<Cancellation>,
}

impl SimplifiedTaxInvoiceBuilder {
    pub fn line_item(mut self, item: LineItem) -> Self {
        self.line_items.push(item);
        self
    }

    pub fn line_items(mut self, items: impl IntoIterator<Item = LineItem>) -> Self {
        self.line_items.extend(items);
        self
    }

    pub fn cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = Some(cancellation);
        self
    }

    pub fn build(self) -> Result<SimplifiedTaxInvoice, InvoiceError> {
        if self.line_items.is_empty() {
            return Err(InvoiceError::NoLineItems);
        }
        for (index, item) in self.line_items.iter().enumerate() {
            item.validate(index)?;
        }

        let mut doc = XmlDocument::parse(&self.populate_template())?;

        if let Some(cancellation) = &self.cancellation {
            let payment_means = XmlElement::new()
                .with_child("cbc:PaymentMeansCode", cancellation.payment_method.code())
                .with_child(
                    "cbc:InstructionNote",
                    cancellation
                        .reason
                        .as_deref()
                        .unwrap_or(DEFAULT_INSTRUCTION_NOTE),
                );
            write(&mut doc, PAYMENT_MEANS, payment_means.into())?;
        }

        let mut subtotal = 0.0;
        let mut taxes = 0.0;
        let mut lines = Vec::with_capacity(self.line_items.len());
        for item in &self.line_items {
            let (node, totals) = line_item(item);
            subtotal += totals.subtotal;
            taxes += totals.taxes;
            lines.push(node);
        }

        write(&mut doc, TAX_TOTAL, tax_totals(&self.line_items).into())?;
        write(&mut doc, LEGAL_MONETARY_TOTAL, legal_monetary_total(subtotal, taxes).into())?;
        write(&mut doc, INVOICE_LINE, lines.into())?;

        tracing::debug!(
            serial = %self.invoice_serial_number,
            lines = self.line_items.len(),
            "built simplified tax invoice"
        );
        Ok(SimplifiedTaxInvoice { doc })
    }

    fn populate_template(&self) -> String {
        let invoice_type = self
            .cancellation
            .as_ref()
            .map_or(InvoiceType::Invoice, |cancellation| cancellation.cancellation_type);
        let billing_reference = self
            .cancellation
            .as_ref()
            .map(|cancellation| {
                templates::fill(
                    BILLING_REFERENCE,
                    &[(
                        "SET_INVOICE_NUMBER",
                        escape(&cancellation.canceled_invoice_number).as_str(),
                    )],
                )
            })
            .unwrap_or_default();

        let egs = &self.egs;
        let location = &egs.location;
        let values = [
            ("SET_INVOICE_TYPE", invoice_type.code().to_string()),
            ("SET_BILLING_REFERENCE", billing_reference),
            ("SET_INVOICE_SERIAL_NUMBER", escape(&self.invoice_serial_number)),
            ("SET_TERMINAL_UUID", escape(&egs.uuid)),
            ("SET_ISSUE_DATE", self.issue_date.format("%Y-%m-%d").to_string()),
            ("SET_ISSUE_TIME", self.issue_time.format("%H:%M:%S").to_string()),
            ("SET_PREVIOUS_INVOICE_HASH", escape(&self.previous_invoice_hash)),
            ("SET_INVOICE_COUNTER_NUMBER", self.invoice_counter_number.to_string()),
            ("SET_COMMERCIAL_REGISTRATION_NUMBER", escape(&egs.crn_number)),
            ("SET_STREET_NAME", escape(&location.street)),
            ("SET_BUILDING_NUMBER", escape(&location.building)),
            ("SET_PLOT_IDENTIFICATION", escape(&location.plot_identification)),
            ("SET_CITY_SUBDIVISION", escape(&location.city_subdivision)),
            ("SET_CITY", escape(&location.city)),
            ("SET_POSTAL_NUMBER", escape(&location.postal_zone)),
            ("SET_VAT_NUMBER", escape(&egs.vat_number)),
            ("SET_VAT_NAME", escape(&egs.vat_name)),
        ];
        let values: Vec<(&str, &str)> = values
            .iter()
            .map(|(placeholder, value)| (*placeholder, value.as_str()))
            .collect();
        templates::fill(SIMPLIFIED_TAX_INVOICE, &values)
    }
}

struct LineTotals {
    subtotal: f64,
    taxes: f64,
}

fn write(
    doc: &mut XmlDocument,
    path: &'static str,
    value: crate::xml::XmlValue,
) -> Result<(), InvoiceError> {
    if doc.set(path, true, value, None) {
        Ok(())
    } else {
        Err(InvoiceError::MissingElement(path))
    }
}

fn escape(value: &str) -> String {
    partial_escape(value).into_owned()
}

fn truncated(value: f64) -> f64 {
    format_fixed_no_rounding(value, 2)
        .parse()
        .unwrap_or(value)
}

fn fixed(value: f64) -> String {
    format_fixed_no_rounding(value, 2)
}

fn amount(value: impl Into<String>) -> XmlNode {
    XmlElement::new()
        .with_attribute("currencyID", CURRENCY)
        .with_text(value)
        .into()
}

fn category_id(vat_percent: f64) -> &'static str {
    if vat_percent > 0.0 { "S" } else { "O" }
}

fn classified_tax_category(id: &str, percent: f64) -> XmlNode {
    XmlElement::new()
        .with_child("cbc:ID", id)
        .with_child("cbc:Percent", fixed(percent * 100.0))
        .with_child("cac:TaxScheme", XmlElement::new().with_child("cbc:ID", "VAT"))
        .into()
}

fn line_item(item: &LineItem) -> (XmlNode, LineTotals) {
    let subtotal = item.taxable_amount();

    let mut taxes = truncated(subtotal * item.vat_percent);
    let mut categories = vec![classified_tax_category(
        category_id(item.vat_percent),
        item.vat_percent,
    )];
    for tax in &item.other_taxes {
        taxes += truncated(tax.percent_amount * subtotal);
        categories.push(classified_tax_category("S", tax.percent_amount));
    }

    let allowances = item
        .discounts
        .iter()
        .map(|discount| {
            XmlElement::new()
                .with_child("cbc:ChargeIndicator", "false")
                .with_child("cbc:AllowanceChargeReason", discount.reason.as_str())
                .with_child("cbc:Amount", amount(fixed(discount.amount)))
                .into()
        })
        .collect();

    let node = XmlElement::new()
        .with_child("cbc:ID", item.id.as_str())
        .with_child(
            "cbc:InvoicedQuantity",
            XmlElement::new()
                .with_attribute("unitCode", "PCE")
                .with_text(item.quantity.to_string()),
        )
        .with_child("cbc:LineExtensionAmount", amount(fixed(subtotal)))
        .with_child(
            "cac:TaxTotal",
            XmlElement::new()
                .with_child("cbc:TaxAmount", amount(fixed(taxes)))
                .with_child("cbc:RoundingAmount", amount(fixed(subtotal + truncated(taxes)))),
        )
        .with_child(
            "cac:Item",
            XmlElement::new()
                .with_child("cbc:Name", item.name.as_str())
                .with_children("cac:ClassifiedTaxCategory", categories),
        )
        .with_child(
            "cac:Price",
            XmlElement::new()
                .with_child("cbc:PriceAmount", amount(item.tax_exclusive_price.to_string()))
                .with_children("cac:AllowanceCharge", allowances),
        )
        .into();

    (node, LineTotals { subtotal, taxes })
}

fn tax_subtotal(taxable: f64, tax: f64, percent: f64) -> XmlNode {
    let scheme_id = |scheme: &str, text: &str| {
        XmlElement::new()
            .with_attribute("schemeAgencyID", "6")
            .with_attribute("schemeID", scheme)
            .with_text(text)
    };
    XmlElement::new()
        .with_child("cbc:TaxableAmount", amount(fixed(taxable)))
        .with_child("cbc:TaxAmount", amount(fixed(tax)))
        .with_child(
            "cac:TaxCategory",
            XmlElement::new()
                .with_child("cbc:ID", scheme_id("UN/ECE 5305", category_id(percent)))
                .with_child("cbc:Percent", fixed(percent * 100.0))
                .with_child(
                    "cac:TaxScheme",
                    XmlElement::new().with_child("cbc:ID", scheme_id("UN/ECE 5153", "VAT")),
                ),
        )
        .into()
}

/// Document level tax totals: one entry with the per-rate breakdown and a
/// second carrying only the amount.
fn tax_totals(items: &[LineItem]) -> Vec<XmlNode> {
    let mut subtotals = Vec::new();
    let mut total = 0.0;
    for item in items {
        let taxable = item.taxable_amount();
        let vat = item.vat_percent * taxable;
        subtotals.push(tax_subtotal(taxable, vat, item.vat_percent));
        total += truncated(vat);
        for tax in &item.other_taxes {
            let other = tax.percent_amount * taxable;
            subtotals.push(tax_subtotal(taxable, other, tax.percent_amount));
            total += truncated(other);
        }
    }
    let total = fixed(truncated(total));

    vec![
        XmlElement::new()
            .with_child("cbc:TaxAmount", amount(total.as_str()))
            .with_children("cac:TaxSubtotal", subtotals)
            .into(),
        XmlElement::new()
            .with_child("cbc:TaxAmount", amount(total.as_str()))
            .into(),
    ]
}

fn legal_monetary_total(subtotal: f64, taxes: f64) -> XmlNode {
    XmlElement::new()
        .with_child("cbc:LineExtensionAmount", amount(fixed(subtotal)))
        .with_child("cbc:TaxExclusiveAmount", amount(fixed(subtotal)))
        .with_child("cbc:TaxInclusiveAmount", amount(fixed(subtotal + taxes)))
        .with_child("cbc:AllowanceTotalAmount", amount("0"))
        .with_child("cbc:PrepaidAmount", amount("0"))
        .with_child("cbc:PayableAmount", amount(fixed(subtotal + taxes)))
        .into()
}
