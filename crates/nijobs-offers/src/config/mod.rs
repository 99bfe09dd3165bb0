use std::env;
use std::fmt;

use crate::offers::admission::MAX_LIFETIME_MONTHS;
use crate::offers::OfferPolicy;

const DEFAULT_MAX_CONCURRENT: usize = 5;
const DEFAULT_MAX_LIFETIME_MONTHS: u32 = 6;

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
    pub offers: OffersConfig,
    pub telemetry: TelemetryConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let max_concurrent = match env::var("APP_OFFERS_MAX_CONCURRENT") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|value| *value >= 1)
                .ok_or(ConfigError::InvalidMaxConcurrent { value: raw })?,
            Err(_) => DEFAULT_MAX_CONCURRENT,
        };

        let max_lifetime_months = match env::var("APP_OFFER_MAX_LIFETIME_MONTHS") {
            Ok(raw) => raw
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|value| (1..=MAX_LIFETIME_MONTHS).contains(value))
                .ok_or(ConfigError::InvalidLifetime { value: raw })?,
            Err(_) => DEFAULT_MAX_LIFETIME_MONTHS,
        };

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            offers: OffersConfig {
                max_concurrent,
                max_lifetime_months,
            },
            telemetry: TelemetryConfig { log_level },
        })
    }
}

/// Per-deployment limits applied to company offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffersConfig {
    pub max_concurrent: usize,
    pub max_lifetime_months: u32,
}

impl OffersConfig {
    pub fn policy(&self) -> OfferPolicy {
        OfferPolicy::new(self.max_concurrent, self.max_lifetime_months)
    }
}

impl Default for OffersConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            max_lifetime_months: DEFAULT_MAX_LIFETIME_MONTHS,
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidMaxConcurrent { value: String },
    InvalidLifetime { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidMaxConcurrent { value } => write!(
                f,
                "APP_OFFERS_MAX_CONCURRENT must be a positive integer (got '{value}')"
            ),
            ConfigError::InvalidLifetime { value } => write!(
                f,
                "APP_OFFER_MAX_LIFETIME_MONTHS must be an integer between 1 and \
                 {MAX_LIFETIME_MONTHS} (got '{value}')"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}
