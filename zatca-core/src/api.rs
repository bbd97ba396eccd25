//! Async client for the ZATCA e-invoicing gateway.
//!
//! Covers the calls an EGS unit makes: compliance CSID issuance, production
//! CSID issuance, the compliance invoice check and simplified invoice
//! reporting.
use base64ct::{Base64, Encoding};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;
use thiserror::Error;

use crate::{
    config::{Config, EnvironmentType},
    invoice::SignedInvoice,
};

const API_VERSION: &str = "V2";

#[derive(Debug, Error)]
pub enum ZatcaError {
    #[error("unexpected gateway response: {0}")]
    InvalidResponse(String),
    #[error("gateway rejected the credentials: {0:?}")]
    Unauthorized(UnauthorizedResponse),
    #[error("gateway failure: {0:?}")]
    ServerError(ServerErrorResponse),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("cannot call the gateway: {0}")]
    ClientState(String),
}

/// Scope a set of CSID credentials was issued for.
pub trait TokenScope {
    const NAME: &'static str;
}

/// Credentials from the compliance step (CCSID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Compliance;

/// Credentials from the production step (PCSID).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Production;

impl TokenScope for Compliance {
    const NAME: &'static str = "compliance";
}

impl TokenScope for Production {
    const NAME: &'static str = "production";
}

/// Result of a compliance check or a reporting call.
///
/// The gateway answers rejected invoices with this same body and a 4xx
/// status, so a `ValidationResponse` is not by itself a success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResponse {
    pub validation_results: ValidationResults,
    #[serde(default)]
    pub reporting_status: Option<String>,
    #[serde(default)]
    pub clearance_status: Option<String>,
    #[serde(rename = "qrSellertStatus", default)]
    pub qr_seller_status: Option<String>,
    #[serde(rename = "qrBuyertStatus", default)]
    pub qr_buyer_status: Option<String>,
}

impl ValidationResponse {
    /// `true` when validation produced no errors. Warnings still pass.
    pub fn passed(&self) -> bool {
        self.validation_results.error_messages.is_empty()
            && self
                .validation_results
                .status
                .as_deref()
                .is_none_or(|status| status != "ERROR")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResults {
    #[serde(default)]
    pub info_messages: MessageList,
    #[serde(default)]
    pub warning_messages: Vec<ValidationMessage>,
    #[serde(default)]
    pub error_messages: Vec<ValidationMessage>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationMessage {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub code: Option<String>,
    pub category: Option<String>,
    pub message: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

/// The gateway sends a lone info message as an object and several as an array.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum MessageList {
    One(ValidationMessage),
    Many(Vec<ValidationMessage>),
    #[default]
    Empty,
}

impl MessageList {
    pub fn as_slice(&self) -> &[ValidationMessage] {
        match self {
            MessageList::One(message) => std::slice::from_ref(message),
            MessageList::Many(messages) => messages,
            MessageList::Empty => &[],
        }
    }
}

/// Body of a 401 answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnauthorizedResponse {
    pub timestamp: Option<i64>,
    pub status: Option<u16>,
    pub error: Option<String>,
    pub message: Option<String>,
}

/// Body of a 5xx answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerErrorResponse {
    pub category: Option<String>,
    pub code: Option<String>,
    pub message: Option<String>,
}

/// CSID credentials issued by the gateway for scope `T`.
///
/// The binary security token is the base64 of the certificate body. Token
/// and secret together authorize later calls.
///
/// ```rust
/// use zatca_core::api::{Compliance, CsidCredentials};
/// use zatca_core::config::EnvironmentType;
///
/// let creds = CsidCredentials::<Compliance>::new(
///     EnvironmentType::Simulation,
///     Some(1234567890123),
///     "TUlJQ1BUQ0NBZU9nQXdJQkFnSUdBWT0=",
///     "Dehvg1fc8GF6Jwt5bOxXwC6en",
/// );
/// assert_eq!(creds.request_id(), Some(1234567890123));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CsidCredentials<T> {
    env: EnvironmentType,
    request_id: Option<u64>,
    binary_security_token: String,
    secret: String,
    #[serde(skip)]
    scope: PhantomData<T>,
}

impl<T: TokenScope> CsidCredentials<T> {
    pub fn new(
        env: EnvironmentType,
        request_id: Option<u64>,
        binary_security_token: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        Self {
            env,
            request_id,
            binary_security_token: binary_security_token.into(),
            secret: secret.into(),
            scope: PhantomData,
        }
    }

    pub fn env(&self) -> EnvironmentType {
        self.env
    }

    pub fn request_id(&self) -> Option<u64> {
        self.request_id
    }

    pub fn binary_security_token(&self) -> &str {
        &self.binary_security_token
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    /// Base64 certificate body carried by the security token.
    pub fn certificate(&self) -> Result<String, ZatcaError> {
        let decoded = Base64::decode_vec(self.binary_security_token.trim()).map_err(|e| {
            ZatcaError::InvalidResponse(format!("{} token is not base64: {e}", T::NAME))
        })?;
        String::from_utf8(decoded).map_err(|e| {
            ZatcaError::InvalidResponse(format!("{} token is not text: {e}", T::NAME))
        })
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.binary_security_token, Some(&self.secret))
    }
}

/// Gateway operations with their path and the non-2xx statuses whose body
/// is still a [`ValidationResponse`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    ComplianceCsid,
    ProductionCsid,
    ComplianceInvoice,
    ReportInvoice,
}

impl Endpoint {
    fn path(self) -> &'static str {
        match self {
            Endpoint::ComplianceCsid => "compliance",
            Endpoint::ProductionCsid => "production/csids",
            Endpoint::ComplianceInvoice => "compliance/invoices",
            Endpoint::ReportInvoice => "invoices/reporting/single",
        }
    }

    fn validation_statuses(self) -> &'static [StatusCode] {
        match self {
            Endpoint::ComplianceInvoice => &[StatusCode::BAD_REQUEST],
            Endpoint::ReportInvoice => &[StatusCode::BAD_REQUEST, StatusCode::CONFLICT],
            Endpoint::ComplianceCsid | Endpoint::ProductionCsid => &[],
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CsidBody {
    #[serde(rename = "requestID")]
    request_id: Option<u64>,
    binary_security_token: String,
    secret: String,
    #[serde(default)]
    disposition_message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InvoiceBody<'a> {
    invoice_hash: &'a str,
    uuid: &'a str,
    invoice: String,
}

impl<'a> InvoiceBody<'a> {
    fn new(signed: &'a SignedInvoice, uuid: &'a str) -> Self {
        Self {
            invoice_hash: signed.invoice_hash(),
            uuid,
            invoice: Base64::encode_string(signed.xml().as_bytes()),
        }
    }
}

/// Gateway client bound to one [`Config`].
///
/// ```rust,no_run
/// use zatca_core::api::{ZatcaClient, ZatcaError};
/// use zatca_core::config::{Config, EnvironmentType};
///
/// let client = ZatcaClient::new(Config::new(EnvironmentType::Simulation))?;
/// assert_eq!(client.config().env(), EnvironmentType::Simulation);
/// # Ok::<(), ZatcaError>(())
/// ```
#[derive(Debug)]
pub struct ZatcaClient {
    config: Config,
    http: Client,
    base_url: String,
}

impl ZatcaClient {
    pub fn new(config: Config) -> Result<Self, ZatcaError> {
        let http = Client::builder().build()?;
        let base_url = config.base_url();
        Ok(Self {
            config,
            http,
            base_url,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Exchanges a PEM CSR and the portal one-time password for compliance
    /// credentials.
    pub async fn issue_compliance_certificate(
        &self,
        csr_pem: &str,
        otp: &str,
    ) -> Result<CsidCredentials<Compliance>, ZatcaError> {
        if csr_pem.trim().is_empty() {
            return Err(ZatcaError::ClientState("no CSR to submit".into()));
        }
        let body = serde_json::json!({ "csr": Base64::encode_string(csr_pem.as_bytes()) });
        let request = self
            .request(Endpoint::ComplianceCsid)
            .header("OTP", otp)
            .json(&body);
        self.fetch_credentials(request).await
    }

    /// Exchanges compliance credentials for production credentials.
    pub async fn issue_production_certificate(
        &self,
        compliance: &CsidCredentials<Compliance>,
    ) -> Result<CsidCredentials<Production>, ZatcaError> {
        self.check_env(compliance)?;
        let request_id = compliance.request_id().ok_or_else(|| {
            ZatcaError::ClientState("compliance credentials carry no request id".into())
        })?;
        let body = serde_json::json!({ "compliance_request_id": request_id.to_string() });
        let request = compliance
            .authorize(self.request(Endpoint::ProductionCsid))
            .json(&body);
        self.fetch_credentials(request).await
    }

    pub async fn check_invoice_compliance(
        &self,
        credentials: &CsidCredentials<Compliance>,
        signed: &SignedInvoice,
        uuid: &str,
    ) -> Result<ValidationResponse, ZatcaError> {
        self.check_env(credentials)?;
        let request = credentials
            .authorize(self.request(Endpoint::ComplianceInvoice))
            .header("Accept-Language", "en")
            .json(&InvoiceBody::new(signed, uuid));
        self.fetch_validation(Endpoint::ComplianceInvoice, request)
            .await
    }

    /// Reports a signed simplified invoice. Simplified invoices are never
    /// cleared, so `Clearance-Status` is always `0`.
    pub async fn report_invoice(
        &self,
        credentials: &CsidCredentials<Production>,
        signed: &SignedInvoice,
        uuid: &str,
    ) -> Result<ValidationResponse, ZatcaError> {
        self.check_env(credentials)?;
        let request = credentials
            .authorize(self.request(Endpoint::ReportInvoice))
            .header("Accept-Language", "en")
            .header("Clearance-Status", "0")
            .json(&InvoiceBody::new(signed, uuid));
        self.fetch_validation(Endpoint::ReportInvoice, request).await
    }

    fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }

    fn request(&self, endpoint: Endpoint) -> RequestBuilder {
        self.http
            .post(self.url(endpoint))
            .header("Accept", "application/json")
            .header("Accept-Version", API_VERSION)
    }

    fn check_env<T: TokenScope>(&self, credentials: &CsidCredentials<T>) -> Result<(), ZatcaError> {
        if credentials.env() == self.config.env() {
            return Ok(());
        }
        Err(ZatcaError::ClientState(format!(
            "{} credentials are for {}, client targets {}",
            T::NAME,
            credentials.env().as_str(),
            self.config.env().as_str()
        )))
    }

    async fn fetch_credentials<T: TokenScope>(
        &self,
        request: RequestBuilder,
    ) -> Result<CsidCredentials<T>, ZatcaError> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        tracing::debug!(scope = T::NAME, %status, "CSID response");
        if !status.is_success() {
            return Err(status_error(status, text));
        }

        let body: CsidBody = serde_json::from_str(&text)
            .map_err(|e| ZatcaError::InvalidResponse(format!("malformed CSID body: {e}")))?;
        if let Some(disposition) = &body.disposition_message {
            tracing::info!(scope = T::NAME, %disposition, "CSID issued");
        }
        Ok(CsidCredentials::new(
            self.config.env(),
            body.request_id,
            body.binary_security_token,
            body.secret,
        ))
    }

    async fn fetch_validation(
        &self,
        endpoint: Endpoint,
        request: RequestBuilder,
    ) -> Result<ValidationResponse, ZatcaError> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;
        tracing::debug!(path = endpoint.path(), %status, "validation response");
        if !status.is_success() && !endpoint.validation_statuses().contains(&status) {
            return Err(status_error(status, text));
        }
        serde_json::from_str(&text)
            .map_err(|e| ZatcaError::InvalidResponse(format!("status {status}, {e}: {text}")))
    }
}

/// 401 and 5xx carry parsed bodies when the gateway sent JSON. Any other
/// failed status is an unexpected response.
fn status_error(status: StatusCode, text: String) -> ZatcaError {
    if status == StatusCode::UNAUTHORIZED {
        let body = serde_json::from_str(&text).unwrap_or(UnauthorizedResponse {
            timestamp: None,
            status: Some(status.as_u16()),
            error: status.canonical_reason().map(str::to_owned),
            message: Some(text),
        });
        return ZatcaError::Unauthorized(body);
    }
    if status.is_server_error() {
        let body = serde_json::from_str(&text).unwrap_or(ServerErrorResponse {
            category: None,
            code: Some(status.as_u16().to_string()),
            message: Some(text),
        });
        return ZatcaError::ServerError(body);
    }
    ZatcaError::InvalidResponse(format!("status {status}: {text}"))
}
