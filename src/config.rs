use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_url: String,
    pub database_max_connections: u32,
    pub status_signing_secret: Option<String>,
    pub cors_allowed_origins: Option<String>,
    pub gift_card_validity_days: i64,
    pub log_format: LogFormat,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv().ok(); // Load .env file if present

        let gift_card_validity_days: i64 = env::var("GIFT_CARD_VALIDITY_DAYS")
            .unwrap_or_else(|_| "365".to_string())
            .parse()?;
        if gift_card_validity_days <= 0 {
            anyhow::bail!("GIFT_CARD_VALIDITY_DAYS must be greater than 0");
        }

        Ok(Config {
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()?,
            database_url: env::var("DATABASE_URL")?,
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            status_signing_secret: env::var("STATUS_SIGNING_SECRET")
                .ok()
                .filter(|secret| !secret.trim().is_empty()),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS").ok(),
            gift_card_validity_days,
            log_format: parse_log_format(
                &env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
            )?,
        })
    }
}

fn parse_log_format(raw: &str) -> anyhow::Result<LogFormat> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "pretty" | "" => Ok(LogFormat::Pretty),
        "json" => Ok(LogFormat::Json),
        other => anyhow::bail!("LOG_FORMAT must be 'pretty' or 'json', got '{}'", other),
    }
}

/// Splits `CORS_ALLOWED_ORIGINS` into origins. `None` means any origin.
pub fn parse_allowed_origins(raw: &str) -> Option<Vec<String>> {
    let value = raw.trim();
    if value == "*" || value.is_empty() {
        return None;
    }

    Some(
        value
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::to_string)
            .collect(),
    )
}
