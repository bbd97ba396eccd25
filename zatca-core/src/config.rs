//! Gateway environments and client settings.
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Overrides the gateway base URL for every environment when set.
pub const BASE_URL_ENV: &str = "ZATCA_BASE_URL";

const GATEWAY_ROOT: &str = "https://gw-fatoora.zatca.gov.sa/e-invoicing";

/// Gateway environment an EGS unit talks to. Selects the endpoint root and
/// the certificate template named in the onboarding CSR.
///
/// `NonProduction` is the developer portal ("Integration Sandbox"),
/// `Simulation` needs its own sign up, `Production` is live.
///
/// ```rust
/// use zatca_core::config::EnvironmentType;
///
/// let env: EnvironmentType = "Non-Production".parse()?;
/// assert_eq!(env, EnvironmentType::NonProduction);
/// assert!(env.endpoint_url().ends_with("/developer-portal/"));
/// # Ok::<(), zatca_core::config::EnvironmentParseError>(())
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentType {
    #[default]
    NonProduction,
    Simulation,
    Production,
}

/// Error returned when parsing an [`EnvironmentType`] from a string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvironmentParseError {
    #[error("invalid environment type: {input}")]
    Invalid { input: String },
}

impl FromStr for EnvironmentType {
    type Err = EnvironmentParseError;
    fn from_str(env: &str) -> Result<EnvironmentType, EnvironmentParseError> {
        match env.to_ascii_lowercase().replace('-', "_").as_str() {
            "non_production" | "sandbox" => Ok(EnvironmentType::NonProduction),
            "simulation" => Ok(EnvironmentType::Simulation),
            "production" => Ok(EnvironmentType::Production),
            _ => Err(EnvironmentParseError::Invalid {
                input: env.to_string(),
            }),
        }
    }
}

impl EnvironmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvironmentType::NonProduction => "non_production",
            EnvironmentType::Simulation => "simulation",
            EnvironmentType::Production => "production",
        }
    }

    fn gateway_segment(&self) -> &'static str {
        match self {
            EnvironmentType::NonProduction => "developer-portal",
            EnvironmentType::Simulation => "simulation",
            EnvironmentType::Production => "core",
        }
    }

    /// Gateway root for this environment, with a trailing slash.
    pub fn endpoint_url(&self) -> String {
        format!("{GATEWAY_ROOT}/{}/", self.gateway_segment())
    }
}

/// Settings for the API client.
///
/// # Examples
/// ```rust
/// use zatca_core::config::{Config, EnvironmentType};
///
/// let config = Config::new(EnvironmentType::Simulation).with_base_url("http://localhost:8080");
/// assert_eq!(config.base_url(), "http://localhost:8080/");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    env: EnvironmentType,
    #[serde(default)]
    base_url: Option<String>,
}

impl Config {
    pub fn new(env: EnvironmentType) -> Self {
        Self {
            env,
            base_url: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn env(&self) -> EnvironmentType {
        self.env
    }

    /// Gateway root with a trailing slash: the explicit override, else
    /// `ZATCA_BASE_URL`, else the environment's endpoint.
    pub fn base_url(&self) -> String {
        self.base_url
            .clone()
            .or_else(|| std::env::var(BASE_URL_ENV).ok())
            .filter(|value| !value.trim().is_empty())
            .map(|value| {
                if value.ends_with('/') {
                    value
                } else {
                    format!("{value}/")
                }
            })
            .unwrap_or_else(|| self.env.endpoint_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_environment_names() {
        assert_eq!(
            EnvironmentType::from_str("non-production"),
            Ok(EnvironmentType::NonProduction)
        );
        assert_eq!(
            EnvironmentType::from_str("PRODUCTION"),
            Ok(EnvironmentType::Production)
        );
        assert!(matches!(
            EnvironmentType::from_str("staging"),
            Err(EnvironmentParseError::Invalid { input }) if input == "staging"
        ));
        for env in [
            EnvironmentType::NonProduction,
            EnvironmentType::Simulation,
            EnvironmentType::Production,
        ] {
            assert_eq!(EnvironmentType::from_str(env.as_str()), Ok(env));
        }
    }

    #[test]
    fn explicit_base_url_gets_trailing_slash() {
        let config = Config::new(EnvironmentType::Production).with_base_url("http://127.0.0.1:9000");
        assert_eq!(config.base_url(), "http://127.0.0.1:9000/");
        let config = Config::new(EnvironmentType::Production).with_base_url("http://127.0.0.1:9000/");
        assert_eq!(config.base_url(), "http://127.0.0.1:9000/");
    }

    #[test]
    fn environments_map_to_gateway_roots() {
        assert_eq!(
            EnvironmentType::Simulation.endpoint_url(),
            "https://gw-fatoora.zatca.gov.sa/e-invoicing/simulation/"
        );
        assert_eq!(
            EnvironmentType::Production.endpoint_url(),
            "https://gw-fatoora.zatca.gov.sa/e-invoicing/core/"
        );
    }

    #[test]
    fn config_reads_from_json() {
        let config: Config = serde_json::from_str(r#"{"env":"simulation"}"#).expect("config");
        assert_eq!(config.env(), EnvironmentType::Simulation);
    }
}
