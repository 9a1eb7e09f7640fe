//! Runtime configuration, read from the environment (and `.env` if present).
//!
//! | variable | default |
//! |---|---|
//! | `DATABASE_URL` | `sqlite://busyb.db` |
//! | `DATABASE_MAX_CONNECTIONS` | `10` |
//! | `APP_HOST` | `127.0.0.1` |
//! | `APP_PORT` | `3000` |
//! | `HASHID_SALT` | `busyb` |
//! | `CORS_ORIGIN` | `http://localhost:3000` |
//! | `SESSION_COOKIE_NAME` | `sessionid` |
//! | `MAX_BODY_BYTES` | `2097152` |

use std::{env, str::FromStr};

use axum::http::HeaderValue;
use thiserror::Error;

const DEFAULT_HASHID_SALT: &str = "busyb";
const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub host: String,
    pub port: u16,
    pub hashid_salt: String,
    pub cors_origin: HeaderValue,
    pub session_cookie: String,
    pub max_body_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from any key lookup; unset keys take their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let hashid_salt = lookup("HASHID_SALT").unwrap_or_else(|| {
            tracing::warn!("HASHID_SALT is not set, public task ids use the default salt");
            DEFAULT_HASHID_SALT.to_owned()
        });

        let cors_origin = lookup("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_owned());
        let cors_origin = HeaderValue::from_str(&cors_origin).map_err(|err| ConfigError::InvalidValue {
            key: "CORS_ORIGIN".to_owned(),
            message: err.to_string(),
        })?;

        Ok(Self {
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| "sqlite://busyb.db".to_owned()),
            max_connections: parsed(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            host: lookup("APP_HOST").unwrap_or_else(|| "127.0.0.1".to_owned()),
            port: parsed(&lookup, "APP_PORT", 3000)?,
            hashid_salt,
            cors_origin,
            session_cookie: lookup("SESSION_COOKIE_NAME").unwrap_or_else(|| "sessionid".to_owned()),
            max_body_bytes: parsed(&lookup, "MAX_BODY_BYTES", DEFAULT_MAX_BODY_BYTES)?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|err: T::Err| ConfigError::InvalidValue {
            key: key.to_owned(),
            message: err.to_string(),
        }),
    }
}
