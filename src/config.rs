//! Runtime configuration, read from the environment (and `.env`).

use std::{net::SocketAddr, path::PathBuf, str::FromStr, time::Duration};

use crate::relay::RelaySettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub database_path: PathBuf,
    pub cors_origin: String,
    pub secret_key: String,
    pub otp_expiry: Duration,
    pub translate_url: Option<String>,
    pub translate_api_key: Option<String>,
    pub translate_timeout: Duration,
    pub store_attempts: u32,
    pub log_format: LogFormat,
    /// Set when `EMAIL_HOST`, `EMAIL_ADDRESS` and `EMAIL_PASSWORD` all are.
    pub email: Option<EmailSettings>,
}

/// SMTP account one-time passwords are sent from.
#[derive(Clone)]
pub struct EmailSettings {
    pub host: String,
    pub port: u16,
    pub address: String,
    pub password: String,
}

impl std::fmt::Debug for EmailSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid {key}={value:?}: {reason}")]
pub struct ConfigError {
    key: &'static str,
    value: String,
    reason: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let log_format = match var("LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(other) => {
                return Err(ConfigError {
                    key: "LOG_FORMAT",
                    value: other.to_owned(),
                    reason: "expected text or json".to_owned(),
                })
            }
        };

        let email_port: u16 = parse(&var, "EMAIL_PORT", 587)?;
        if email_port != 587 && email_port != 465 {
            return Err(ConfigError {
                key: "EMAIL_PORT",
                value: email_port.to_string(),
                reason: "expected 587 (STARTTLS) or 465 (TLS)".to_owned(),
            });
        }
        let email = match (var("EMAIL_HOST"), var("EMAIL_ADDRESS"), var("EMAIL_PASSWORD")) {
            (Some(host), Some(address), Some(password)) => Some(EmailSettings {
                host,
                port: email_port,
                address,
                password,
            }),
            _ => None,
        };

        Ok(Self {
            bind_addr: parse(&var, "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 5000)))?,
            database_path: var("DATABASE_PATH").map_or_else(|| PathBuf::from("instance/users.db"), PathBuf::from),
            cors_origin: var("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:5173".to_owned()),
            secret_key: var("SECRET_KEY").unwrap_or_else(|| "soultalk-secret-key-2024".to_owned()),
            otp_expiry: Duration::from_secs(parse(&var, "OTP_EXPIRY_SECONDS", 300)?),
            translate_url: var("TRANSLATE_URL"),
            translate_api_key: var("TRANSLATE_API_KEY"),
            translate_timeout: Duration::from_millis(parse(&var, "TRANSLATE_TIMEOUT_MS", 3000)?),
            store_attempts: parse(&var, "STORE_ATTEMPTS", 3)?,
            log_format,
            email,
        })
    }

    pub fn relay_settings(&self) -> RelaySettings {
        RelaySettings {
            translate_timeout: self.translate_timeout,
            store_attempts: self.store_attempts,
            ..RelaySettings::default()
        }
    }
}

fn parse<T>(var: &impl Fn(&str) -> Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        None => Ok(default),
        Some(value) => match value.trim().parse() {
            Ok(parsed) => Ok(parsed),
            Err(e) => Err(ConfigError { key, reason: e.to_string(), value }),
        },
    }
}
