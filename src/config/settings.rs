//! Application settings loaded from `config.toml` and the environment.
//!
//! The TOML file is optional; every value has a default except the token
//! signing key, which must come from `[auth] jwt_key` or `JWT_KEY`.
//! Environment variables win over the file so deployments can inject secrets.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::fmt;
use std::path::Path;

const DEFAULT_CONFIG_PATH: &str = "config.toml";
const DEFAULT_DATABASE_URL: &str = "sqlite://data/payday_planner.sqlite?mode=rwc";

/// Top-level settings structure representing the whole config.toml file
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Settings {
    /// Store connection settings
    #[serde(default)]
    pub database: DatabaseSettings,
    /// Credential and session token settings
    #[serde(default)]
    pub auth: AuthSettings,
}

/// Store connection settings
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseSettings {
    /// `SeaORM` connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

/// Credential and session token settings
#[derive(Deserialize, Clone)]
pub struct AuthSettings {
    /// HMAC secret used to sign session tokens
    #[serde(default)]
    pub jwt_key: String,
    /// Session lifetime in hours
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: i64,
    /// bcrypt work factor
    #[serde(default = "default_bcrypt_cost")]
    pub bcrypt_cost: u32,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            jwt_key: String::new(),
            token_ttl_hours: default_token_ttl_hours(),
            bcrypt_cost: default_bcrypt_cost(),
        }
    }
}

impl fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSettings")
            .field("jwt_key", &"<redacted>")
            .field("token_ttl_hours", &self.token_ttl_hours)
            .field("bcrypt_cost", &self.bcrypt_cost)
            .finish()
    }
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

const fn default_token_ttl_hours() -> i64 {
    1
}

const fn default_bcrypt_cost() -> u32 {
    12
}

/// Parses settings from a TOML file.
///
/// # Errors
/// Returns an error if the file cannot be read or the TOML is invalid.
pub fn load_settings<P: AsRef<Path>>(path: P) -> Result<Settings> {
    let path_ref = path.as_ref();
    tracing::debug!("Attempting to load settings from: {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse {}: {e}", path_ref.display()),
    })
}

/// Loads settings for the running process.
///
/// Reads the file named by `APP_CONFIG` (default `./config.toml`) when it
/// exists, then applies `DATABASE_URL` and `JWT_KEY` overrides.
///
/// # Errors
/// Returns an error if the file is invalid or no signing key is configured.
pub fn load_app_settings() -> Result<Settings> {
    let path = std::env::var("APP_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let mut settings = if Path::new(&path).exists() {
        load_settings(&path)?
    } else {
        tracing::info!("No settings file at {path}, using defaults");
        Settings::default()
    };

    if let Ok(url) = std::env::var("DATABASE_URL") {
        settings.database.url = url;
    }
    if let Ok(key) = std::env::var("JWT_KEY") {
        settings.auth.jwt_key = key;
    }

    settings.validate()?;
    Ok(settings)
}

impl Settings {
    /// Checks values that have no usable default.
    ///
    /// # Errors
    /// Returns `Error::Config` when the signing key is empty or the token
    /// lifetime is not positive.
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_key.trim().is_empty() {
            return Err(Error::Config {
                message: "JWT signing key is not configured (set JWT_KEY)".to_string(),
            });
        }
        if self.auth.token_ttl_hours <= 0 {
            return Err(Error::Config {
                message: format!(
                    "token_ttl_hours must be positive, got {}",
                    self.auth.token_ttl_hours
                ),
            });
        }
        Ok(())
    }
}
