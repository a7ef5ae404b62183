//! services/bot/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The
//! `.env` file is used for local development.

use std::net::SocketAddr;
use tracing::Level;

use paraphrase_bot_core::domain::{ApiCredential, QuotaPolicy};

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub telegram_token: String,
    pub database_url: String,
    pub log_level: Level,
    pub health_bind_address: SocketAddr,
    /// Ordered upstream credential list the rotation walks through.
    pub credentials: Vec<ApiCredential>,
    pub paraphrase_model: String,
    /// Overrides the API base URL, e.g. for an OpenAI-compatible proxy.
    pub api_base_url: Option<String>,
    /// External page unverified users are sent to.
    pub verification_link: String,
    /// PHC-encoded argon2 hash of the admin password. Empty disables the
    /// admin flow.
    pub admin_password_hash: String,
    /// The command that starts admin authentication.
    pub admin_command: String,
    pub daily_cap: u32,
    pub free_tier: u32,
    pub referral_credit: u32,
    pub rotation_threshold: usize,
    /// Paraphrases of longer sources target this many words of output.
    pub word_target_cap: u32,
    pub verification_prompt_hours: i64,
    pub sweep_interval_secs: u64,
    pub report_interval_secs: u64,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for
    /// development, but this is skipped in test environments to ensure tests
    /// are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let telegram_token = std::env::var("TELEGRAM_BOT_TOKEN")
            .map_err(|_| ConfigError::MissingVar("TELEGRAM_BOT_TOKEN".to_string()))?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let health_bind_str =
            std::env::var("HEALTH_BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let health_bind_address = health_bind_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("HEALTH_BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let credentials = parse_credentials(
            &std::env::var("PARAPHRASE_API_KEYS").unwrap_or_else(|_| "[]".to_string()),
        )?;

        let paraphrase_model = std::env::var("PARAPHRASE_MODEL")
            .unwrap_or_else(|_| "gemini-2.0-flash-lite".to_string());
        let api_base_url = std::env::var("PARAPHRASE_API_BASE").ok();

        let verification_link = std::env::var("VERIFICATION_LINK")
            .unwrap_or_else(|_| "https://web-telegram-org-verify.onrender.com/".to_string());

        let admin_password_hash = std::env::var("ADMIN_PASSWORD_HASH").unwrap_or_default();
        let admin_command = std::env::var("ADMIN_COMMAND").unwrap_or_else(|_| "/admin".to_string());

        Ok(Self {
            telegram_token,
            database_url,
            log_level,
            health_bind_address,
            credentials,
            paraphrase_model,
            api_base_url,
            verification_link,
            admin_password_hash,
            admin_command,
            daily_cap: parse_var("DAILY_CAP", 20)?,
            free_tier: parse_var("FREE_TIER", 10)?,
            referral_credit: parse_var("REFERRAL_CREDIT", 20)?,
            rotation_threshold: parse_var("ROTATION_THRESHOLD", 1300)?,
            word_target_cap: parse_var("WORD_TARGET_CAP", 150)?,
            verification_prompt_hours: parse_var("VERIFICATION_PROMPT_HOURS", 24)?,
            sweep_interval_secs: parse_var("SWEEP_INTERVAL_SECS", 600)?,
            report_interval_secs: parse_var("REPORT_INTERVAL_SECS", 86_400)?,
        })
    }

    pub fn quota_policy(&self) -> QuotaPolicy {
        QuotaPolicy {
            daily_cap: self.daily_cap,
            free_tier: self.free_tier,
            referral_credit: self.referral_credit,
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|_| ConfigError::InvalidValue(name.to_string(), raw)),
    }
}

/// Parses the credential list. Accepts a JSON array of key strings or an
/// object mapping labels to keys (both shapes are seen in deployments).
fn parse_credentials(raw: &str) -> Result<Vec<ApiCredential>, ConfigError> {
    let value: serde_json::Value = serde_json::from_str(raw.trim().trim_matches('\''))
        .map_err(|e| ConfigError::InvalidValue("PARAPHRASE_API_KEYS".to_string(), e.to_string()))?;

    let credentials = match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .enumerate()
            .filter_map(|(i, item)| {
                item.as_str().map(|key| ApiCredential {
                    label: format!("key-{i}"),
                    key: key.to_string(),
                })
            })
            .collect(),
        serde_json::Value::Object(map) => map
            .into_iter()
            .filter_map(|(label, item)| {
                item.as_str().map(|key| ApiCredential {
                    label,
                    key: key.to_string(),
                })
            })
            .collect(),
        _ => {
            return Err(ConfigError::InvalidValue(
                "PARAPHRASE_API_KEYS".to_string(),
                "expected a JSON array or object".to_string(),
            ))
        }
    };
    Ok(credentials)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_list_accepts_arrays_and_objects() {
        let list = parse_credentials(r#"["a", "b"]"#).unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].key, "a");

        let map = parse_credentials(r#"{"primary": "a"}"#).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map[0].label, "primary");

        // Values wrapped in single quotes (common in .env files) still parse.
        assert_eq!(parse_credentials("'[\"a\"]'").unwrap().len(), 1);

        assert!(parse_credentials("42").is_err());
    }
}
