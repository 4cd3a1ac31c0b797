use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::application::side_effects::DEFAULT_DEADLINE;
use crate::domain::payment::ProviderKind;
use crate::domain::reference::DEFAULT_MAX_ATTEMPTS;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

/// Process configuration, read from the environment (and `.env` via dotenvy).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub payment_provider: ProviderKind,
    pub payment_service_url: String,
    pub commerce_services_url: String,
    pub side_effect_timeout: Duration,
    pub reference_max_attempts: u32,
    pub collaborator_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| lookup(name).ok_or(ConfigError::Missing(name));
        let or = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            host: or("HOST", "0.0.0.0"),
            port: parse("PORT", or("PORT", "8080"))?,
            payment_provider: parse("PAYMENT_PROVIDER", or("PAYMENT_PROVIDER", "stripe"))?,
            payment_service_url: or("PAYMENT_SERVICE_URL", "http://localhost:8081"),
            commerce_services_url: or("COMMERCE_SERVICES_URL", "http://localhost:8082"),
            side_effect_timeout: Duration::from_secs(parse(
                "SIDE_EFFECT_TIMEOUT_SECS",
                or(
                    "SIDE_EFFECT_TIMEOUT_SECS",
                    &DEFAULT_DEADLINE.as_secs().to_string(),
                ),
            )?),
            reference_max_attempts: parse(
                "REFERENCE_MAX_ATTEMPTS",
                or("REFERENCE_MAX_ATTEMPTS", &DEFAULT_MAX_ATTEMPTS.to_string()),
            )?,
            collaborator_timeout: Duration::from_secs(parse(
                "COLLABORATOR_TIMEOUT_SECS",
                or("COLLABORATOR_TIMEOUT_SECS", "30"),
            )?),
        })
    }
}

fn parse<T: std::str::FromStr>(name: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value })
}
