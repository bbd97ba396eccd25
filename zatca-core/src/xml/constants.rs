//! UBL namespaces, fixed invoice paths and document reference identifiers.

pub const INVOICE_NS: &str = "urn:oasis:names:specification:ubl:schema:xsd:Invoice-2";
pub const CBC_NS: &str = "urn:oasis:names:specification:ubl:schema:xsd:CommonBasicComponents-2";
pub const CAC_NS: &str =
    "urn:oasis:names:specification:ubl:schema:xsd:CommonAggregateComponents-2";
pub const EXT_NS: &str =
    "urn:oasis:names:specification:ubl:schema:xsd:CommonExtensionComponents-2";
pub const SIG_NS: &str =
    "urn:oasis:names:specification:ubl:schema:xsd:CommonSignatureComponents-2";
pub const SAC_NS: &str =
    "urn:oasis:names:specification:ubl:schema:xsd:SignatureAggregateComponents-2";
pub const SBC_NS: &str =
    "urn:oasis:names:specification:ubl:schema:xsd:SignatureBasicComponents-2";
pub const DS_NS: &str = "http://www.w3.org/2000/09/xmldsig#";
pub const XADES_NS: &str = "http://uri.etsi.org/01903/v1.3.2#";

pub const UBL_EXTENSIONS: &str = "Invoice/ext:UBLExtensions";
pub const SIGNATURE: &str = "Invoice/cac:Signature";
pub const ADDITIONAL_DOCUMENT_REFERENCE: &str = "Invoice/cac:AdditionalDocumentReference";
pub const PAYMENT_MEANS: &str = "Invoice/cac:PaymentMeans";
pub const INVOICE_LINE: &str = "Invoice/cac:InvoiceLine";
pub const TAX_TOTAL: &str = "Invoice/cac:TaxTotal";
pub const LEGAL_MONETARY_TOTAL: &str = "Invoice/cac:LegalMonetaryTotal";
pub const TAX_INCLUSIVE_AMOUNT: &str = "Invoice/cac:LegalMonetaryTotal/cbc:TaxInclusiveAmount";
pub const TAX_AMOUNT: &str = "Invoice/cac:TaxTotal/cbc:TaxAmount";
pub const ISSUE_DATE: &str = "Invoice/cbc:IssueDate";
pub const ISSUE_TIME: &str = "Invoice/cbc:IssueTime";
pub const INVOICE_UUID: &str = "Invoice/cbc:UUID";
pub const SELLER_NAME: &str =
    "Invoice/cac:AccountingSupplierParty/cac:Party/cac:PartyLegalEntity/cbc:RegistrationName";
pub const SELLER_VAT_NUMBER: &str =
    "Invoice/cac:AccountingSupplierParty/cac:Party/cac:PartyTaxScheme/cbc:CompanyID";
pub const X509_SERIAL_NUMBER: &str = "Invoice/ext:UBLExtensions/ext:UBLExtension/ext:ExtensionContent/sig:UBLDocumentSignatures/sac:SignatureInformation/ds:Signature/ds:Object/xades:QualifyingProperties/xades:SignedProperties/xades:SignedSignatureProperties/xades:SigningCertificate/xades:Cert/xades:IssuerSerial/ds:X509SerialNumber";

/// `cbc:ID` values distinguishing the additional document references.
pub const ICV_ID: &str = "ICV";
pub const PIH_ID: &str = "PIH";
pub const QR_ID: &str = "QR";
/// Field holding a reference's identifier, used in match conditions.
pub const REFERENCE_ID: &str = "cbc:ID";

/// Placeholders replaced in the serialized document during assembly.
pub const UBL_EXTENSIONS_PLACEHOLDER: &str = "SET_UBL_EXTENSIONS_STRING";
pub const QR_CODE_PLACEHOLDER: &str = "SET_QR_CODE_DATA";
