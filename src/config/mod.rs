//! Configuration module for the group service.
//!
//! All configuration is loaded from environment variables (a `.env` file is
//! honoured). The impersonation subject and the directory domain have no
//! defaults and must be set explicitly.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::directory::DEFAULT_DIRECTORY_URL;

pub const CREDENTIALS_PATH_VAR: &str = "GROUPSERVICE_CREDENTIALS_PATH";
pub const GOOGLE_CREDENTIALS_VAR: &str = "GOOGLE_APPLICATION_CREDENTIALS";
pub const ADMIN_SUBJECT_VAR: &str = "GROUPSERVICE_ADMIN_SUBJECT";
pub const DOMAIN_VAR: &str = "GROUPSERVICE_DOMAIN";
pub const BIND_ADDR_VAR: &str = "GROUPSERVICE_BIND_ADDR";
pub const DIRECTORY_URL_VAR: &str = "GROUPSERVICE_DIRECTORY_URL";
pub const UPSTREAM_TIMEOUT_VAR: &str = "GROUPSERVICE_UPSTREAM_TIMEOUT_SECS";
pub const LOG_LEVEL_VAR: &str = "GROUPSERVICE_LOG_LEVEL";
pub const LOG_FORMAT_VAR: &str = "GROUPSERVICE_LOG_FORMAT";

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:50051";
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 30;

/// Configuration errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("Invalid value for {var}: {value:?}")]
    Invalid { var: &'static str, value: String },
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the service-account key file
    pub credentials_path: PathBuf,
    /// Admin address the service account impersonates
    pub admin_subject: String,
    /// Directory domain whose groups are listed
    pub domain: String,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Base URL of the directory API
    pub directory_url: String,
    /// Per-request timeout for directory calls
    pub upstream_timeout: Duration,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

        let credentials_path = get(CREDENTIALS_PATH_VAR)
            .or_else(|| get(GOOGLE_CREDENTIALS_VAR))
            .ok_or(ConfigError::Missing(CREDENTIALS_PATH_VAR))?
            .into();

        let admin_subject = get(ADMIN_SUBJECT_VAR).ok_or(ConfigError::Missing(ADMIN_SUBJECT_VAR))?;

        let domain = get(DOMAIN_VAR).ok_or(ConfigError::Missing(DOMAIN_VAR))?;

        let bind_addr_raw = get(BIND_ADDR_VAR).unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr_raw.parse().map_err(|_| ConfigError::Invalid {
            var: BIND_ADDR_VAR,
            value: bind_addr_raw.clone(),
        })?;

        let directory_url =
            get(DIRECTORY_URL_VAR).unwrap_or_else(|| DEFAULT_DIRECTORY_URL.to_string());

        let upstream_timeout = match get(UPSTREAM_TIMEOUT_VAR) {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::Invalid {
                        var: UPSTREAM_TIMEOUT_VAR,
                        value: raw,
                    })
                }
            },
            None => Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
        };

        let log_level = get(LOG_LEVEL_VAR).unwrap_or_else(|| "info".to_string());

        let log_format = match get(LOG_FORMAT_VAR).as_deref() {
            None | Some("json") => LogFormat::Json,
            Some("text") => LogFormat::Text,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    var: LOG_FORMAT_VAR,
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            credentials_path,
            admin_subject,
            domain,
            bind_addr,
            directory_url,
            upstream_timeout,
            log_level,
            log_format,
        })
    }
}
