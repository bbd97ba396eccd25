//! E-invoice generation solution (EGS) unit: identity, keys and onboarding.
pub mod csr;

use crate::api::{Compliance, CsidCredentials, Production, ValidationResponse, ZatcaClient, ZatcaError};
use crate::config::EnvironmentType;
use crate::invoice::{AssemblyError, SignedInvoice, SimplifiedTaxInvoice};
use csr::{CsrError, ToBase64String, build_csr};
use k256::{SecretKey, ecdsa::SigningKey, pkcs8::LineEnding};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EgsError {
    #[error("EGS has no CSR, generate keys and CSR first")]
    MissingCsr,
    #[error("EGS is missing its {0}")]
    MissingCredentials(&'static str),
    #[error("failed to encode private key: {0}")]
    KeyEncoding(String),
    #[error(transparent)]
    Csr(#[from] CsrError),
    #[error(transparent)]
    Api(#[from] ZatcaError),
    #[error(transparent)]
    Signing(#[from] AssemblyError),
}

/// Seller address printed on every invoice of the unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgsUnitLocation {
    pub city: String,
    pub city_subdivision: String,
    pub street: String,
    pub plot_identification: String,
    pub building: String,
    pub postal_zone: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgsUnitInfo {
    pub uuid: String,
    pub custom_id: String,
    pub model: String,
    pub crn_number: String,
    pub vat_name: String,
    pub vat_number: String,
    pub branch_name: String,
    pub branch_industry: String,
    pub location: EgsUnitLocation,
}

/// An EGS unit together with whatever onboarding material it holds so far.
///
/// Onboarding runs in order: [`Egs::generate_keys_and_csr`], then
/// [`Egs::issue_compliance_certificate`], optionally
/// [`Egs::check_invoice_compliance`], then
/// [`Egs::issue_production_certificate`]. Each step reports a missing
/// predecessor instead of calling out.
#[derive(Debug, Clone)]
pub struct Egs {
    info: EgsUnitInfo,
    env: EnvironmentType,
    private_key: Option<String>,
    csr: Option<String>,
    compliance: Option<CsidCredentials<Compliance>>,
    production: Option<CsidCredentials<Production>>,
}

impl Egs {
    pub fn new(info: EgsUnitInfo, env: EnvironmentType) -> Self {
        Self {
            info,
            env,
            private_key: None,
            csr: None,
            compliance: None,
            production: None,
        }
    }

    pub fn info(&self) -> &EgsUnitInfo {
        &self.info
    }

    pub fn env(&self) -> EnvironmentType {
        self.env
    }

    /// SEC1 PEM of the unit key, once generated or supplied.
    pub fn private_key(&self) -> Option<&str> {
        self.private_key.as_deref()
    }

    pub fn csr(&self) -> Option<&str> {
        self.csr.as_deref()
    }

    pub fn compliance_credentials(&self) -> Option<&CsidCredentials<Compliance>> {
        self.compliance.as_ref()
    }

    pub fn production_credentials(&self) -> Option<&CsidCredentials<Production>> {
        self.production.as_ref()
    }

    /// Uses an existing key instead of generating one.
    pub fn with_private_key(mut self, pem: impl Into<String>) -> Self {
        self.private_key = Some(pem.into());
        self
    }

    pub fn with_compliance_credentials(mut self, credentials: CsidCredentials<Compliance>) -> Self {
        self.compliance = Some(credentials);
        self
    }

    pub fn with_production_credentials(mut self, credentials: CsidCredentials<Production>) -> Self {
        self.production = Some(credentials);
        self
    }

    /// Generates a fresh secp256k1 key and the onboarding CSR signed with it.
    pub fn generate_keys_and_csr(&mut self, solution_name: &str) -> Result<(), EgsError> {
        let signer = SigningKey::random(&mut rand_core::OsRng);
        let csr = build_csr(&self.info, self.env, solution_name, &signer)?;

        let private_key = SecretKey::from(&signer)
            .to_sec1_pem(LineEnding::LF)
            .map_err(|e| EgsError::KeyEncoding(e.to_string()))?;
        self.private_key = Some(private_key.as_str().to_owned());
        self.csr = Some(csr.to_pem_string()?);
        tracing::info!(custom_id = %self.info.custom_id, "generated EGS key and CSR");
        Ok(())
    }

    /// Exchanges the CSR and a portal OTP for compliance credentials.
    /// Returns the compliance request id.
    pub async fn issue_compliance_certificate(
        &mut self,
        client: &ZatcaClient,
        otp: &str,
    ) -> Result<Option<u64>, EgsError> {
        let csr = self.csr.as_deref().ok_or(EgsError::MissingCsr)?;
        let credentials = client.issue_compliance_certificate(csr, otp).await?;
        let request_id = credentials.request_id();
        self.compliance = Some(credentials);
        Ok(request_id)
    }

    pub async fn issue_production_certificate(
        &mut self,
        client: &ZatcaClient,
    ) -> Result<Option<u64>, EgsError> {
        let compliance = self
            .compliance
            .as_ref()
            .ok_or(EgsError::MissingCredentials("compliance certificate"))?;
        let credentials = client.issue_production_certificate(compliance).await?;
        let request_id = credentials.request_id();
        self.production = Some(credentials);
        Ok(request_id)
    }

    pub async fn check_invoice_compliance(
        &self,
        client: &ZatcaClient,
        invoice: &SignedInvoice,
        uuid: &str,
    ) -> Result<ValidationResponse, EgsError> {
        let compliance = self
            .compliance
            .as_ref()
            .ok_or(EgsError::MissingCredentials("compliance certificate"))?;
        Ok(client.check_invoice_compliance(compliance, invoice, uuid).await?)
    }

    pub async fn report_invoice(
        &self,
        client: &ZatcaClient,
        invoice: &SignedInvoice,
        uuid: &str,
    ) -> Result<ValidationResponse, EgsError> {
        let production = self
            .production
            .as_ref()
            .ok_or(EgsError::MissingCredentials("production certificate"))?;
        Ok(client.report_invoice(production, invoice, uuid).await?)
    }

    /// Signs `invoice` with the unit key and the production certificate, or
    /// the compliance certificate when `production` is false.
    pub fn sign_invoice(
        &self,
        invoice: &SimplifiedTaxInvoice,
        production: bool,
    ) -> Result<SignedInvoice, EgsError> {
        let private_key = self
            .private_key
            .as_deref()
            .ok_or(EgsError::MissingCredentials("private key"))?;
        let certificate = if production {
            self.production
                .as_ref()
                .ok_or(EgsError::MissingCredentials("production certificate"))?
                .certificate()?
        } else {
            self.compliance
                .as_ref()
                .ok_or(EgsError::MissingCredentials("compliance certificate"))?
                .certificate()?
        };
        Ok(invoice.sign(&certificate, private_key)?)
    }
}
