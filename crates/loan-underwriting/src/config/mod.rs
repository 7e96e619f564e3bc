use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::workflows::underwriting::UnderwritingParameters;

const DEFAULT_CODAT_BASE_URL: &str = "https://api.codat.io";
const DEFAULT_CODAT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_RULES_FILE: &str = "ruleIds.json";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub codat: CodatConfig,
    pub webhooks: WebhookConfig,
    pub underwriting: UnderwritingParameters,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            codat: CodatConfig::load()?,
            webhooks: WebhookConfig::load(),
            underwriting: load_underwriting_parameters()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Connection settings for the Codat API.
#[derive(Clone)]
pub struct CodatConfig {
    pub base_url: String,
    authorization: Option<String>,
    pub timeout: Duration,
}

impl CodatConfig {
    fn load() -> Result<Self, ConfigError> {
        let base_url = env::var("CODAT_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_CODAT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let authorization = env::var("CODAT_AUTHORIZATION")
            .ok()
            .filter(|value| !value.trim().is_empty());
        let timeout = match env::var("CODAT_TIMEOUT_SECS") {
            Ok(raw) => match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => return Err(ConfigError::InvalidTimeout { value: raw }),
            },
            Err(_) => Duration::from_secs(DEFAULT_CODAT_TIMEOUT_SECS),
        };

        Ok(Self {
            base_url,
            authorization,
            timeout,
        })
    }

    /// Full `Authorization` header value; the server cannot start without it.
    pub fn authorization(&self) -> Result<&str, ConfigError> {
        self.authorization
            .as_deref()
            .ok_or(ConfigError::Missing {
                variable: "CODAT_AUTHORIZATION",
            })
    }
}

impl fmt::Debug for CodatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodatConfig")
            .field("base_url", &self.base_url)
            .field(
                "authorization",
                &self.authorization.as_ref().map(|_| "<redacted>"),
            )
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Where Codat should deliver alerts, and where registered rule ids are remembered.
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub base_url: Option<String>,
    pub rules_file: String,
}

impl WebhookConfig {
    fn load() -> Self {
        let base_url = env::var("WEBHOOK_BASE_URL")
            .ok()
            .map(|value| value.trim().trim_end_matches('/').to_string())
            .filter(|value| !value.is_empty());
        let rules_file =
            env::var("WEBHOOK_RULES_FILE").unwrap_or_else(|_| DEFAULT_RULES_FILE.to_string());

        Self {
            base_url,
            rules_file,
        }
    }
}

fn load_underwriting_parameters() -> Result<UnderwritingParameters, ConfigError> {
    let defaults = UnderwritingParameters::default();
    Ok(UnderwritingParameters {
        min_gross_profit_margin: decimal_var(
            "UNDERWRITING_MIN_GROSS_PROFIT_MARGIN",
            defaults.min_gross_profit_margin,
        )?,
        loan_commission_percentage: decimal_var(
            "UNDERWRITING_LOAN_COMMISSION_PERCENTAGE",
            defaults.loan_commission_percentage,
        )?,
        revenue_threshold: decimal_var(
            "UNDERWRITING_REVENUE_THRESHOLD",
            defaults.revenue_threshold,
        )?,
        max_gearing_ratio: decimal_var("UNDERWRITING_MAX_GEARING_RATIO", defaults.max_gearing_ratio)?,
    })
}

fn decimal_var(variable: &'static str, default: Decimal) -> Result<Decimal, ConfigError> {
    match env::var(variable) {
        Ok(raw) => Decimal::from_str(raw.trim())
            .map_err(|_| ConfigError::InvalidDecimal { variable, value: raw }),
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidDecimal { variable: &'static str, value: String },
    InvalidTimeout { value: String },
    Missing { variable: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidDecimal { variable, value } => {
                write!(f, "{variable} must be a decimal number, got '{value}'")
            }
            ConfigError::InvalidTimeout { value } => write!(
                f,
                "CODAT_TIMEOUT_SECS must be a positive number of seconds, got '{value}'"
            ),
            ConfigError::Missing { variable } => write!(f, "{variable} must be set"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    const VARIABLES: [&str; 13] = [
        "APP_ENV",
        "APP_HOST",
        "APP_PORT",
        "APP_LOG_LEVEL",
        "CODAT_BASE_URL",
        "CODAT_AUTHORIZATION",
        "CODAT_TIMEOUT_SECS",
        "WEBHOOK_BASE_URL",
        "WEBHOOK_RULES_FILE",
        "UNDERWRITING_MIN_GROSS_PROFIT_MARGIN",
        "UNDERWRITING_LOAN_COMMISSION_PERCENTAGE",
        "UNDERWRITING_REVENUE_THRESHOLD",
        "UNDERWRITING_MAX_GEARING_RATIO",
    ];

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        for variable in VARIABLES {
            env::remove_var(variable);
        }
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().unwrap_or_else(|err| err.into_inner());
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.codat.base_url, "https://api.codat.io");
        assert_eq!(config.codat.timeout, Duration::from_secs(30));
        assert!(config.webhooks.base_url.is_none());
        assert_eq!(config.webhooks.rules_file, "ruleIds.json");
        assert_eq!(config.underwriting, UnderwritingParameters::default());
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().unwrap_or_else(|err| err.into_inner());
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
        reset_env();
    }

    #[test]
    fn authorization_is_required_but_redacted() {
        let _lock = env_guard().lock().unwrap_or_else(|err| err.into_inner());
        reset_env();
        let config = AppConfig::load().expect("config loads");
        assert!(matches!(
            config.codat.authorization(),
            Err(ConfigError::Missing {
                variable: "CODAT_AUTHORIZATION"
            })
        ));

        env::set_var("CODAT_AUTHORIZATION", "Basic c2VjcmV0");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.codat.authorization().ok(), Some("Basic c2VjcmV0"));
        assert!(!format!("{:?}", config.codat).contains("c2VjcmV0"));
        reset_env();
    }

    #[test]
    fn underwriting_thresholds_come_from_env() {
        let _lock = env_guard().lock().unwrap_or_else(|err| err.into_inner());
        reset_env();
        env::set_var("UNDERWRITING_MAX_GEARING_RATIO", "0.35");
        env::set_var("WEBHOOK_BASE_URL", "https://lending.example.com/");
        let config = AppConfig::load().expect("config loads");
        assert_eq!(config.underwriting.max_gearing_ratio, Decimal::new(35, 2));
        assert_eq!(
            config.underwriting.min_gross_profit_margin,
            Decimal::new(4, 1)
        );
        assert_eq!(
            config.webhooks.base_url.as_deref(),
            Some("https://lending.example.com")
        );
        reset_env();
    }

    #[test]
    fn rejects_malformed_numbers() {
        let _lock = env_guard().lock().unwrap_or_else(|err| err.into_inner());
        reset_env();
        env::set_var("UNDERWRITING_REVENUE_THRESHOLD", "half");
        let err = AppConfig::load().expect_err("decimal rejected");
        assert!(err.to_string().contains("UNDERWRITING_REVENUE_THRESHOLD"));

        reset_env();
        env::set_var("CODAT_TIMEOUT_SECS", "0");
        assert!(matches!(
            AppConfig::load(),
            Err(ConfigError::InvalidTimeout { .. })
        ));
        reset_env();
    }
}
