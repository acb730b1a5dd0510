// src/config.rs

//! Manages configuration: loading from TOML, validation, and applying the
//! AT-TLS defaults to the inbound registry.

use crate::connection::inbound;
use crate::core::context::DEFAULT_CERTIFICATE_BUFFER_LEN;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::fs;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Upper bound for the certificate receive buffer.
const MAX_CERTIFICATE_BUFFER_LEN: usize = 1024 * 1024;

/// Buffers smaller than this are unlikely to hold a real certificate chain entry.
const SMALL_CERTIFICATE_BUFFER_LEN: usize = 1024;

/// Settings for contexts attached by the inbound registry.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AttlsConfig {
    /// Fetch the partner certificate together with the first metadata query.
    #[serde(default)]
    pub always_load_certificate: bool,
    /// Capacity in bytes of the certificate receive buffer.
    #[serde(default = "default_certificate_buffer_len")]
    pub certificate_buffer_len: usize,
}

fn default_certificate_buffer_len() -> usize {
    DEFAULT_CERTIFICATE_BUFFER_LEN
}

impl Default for AttlsConfig {
    fn default() -> Self {
        Self {
            always_load_certificate: false,
            certificate_buffer_len: default_certificate_buffer_len(),
        }
    }
}

/// The validated configuration.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub attls: AttlsConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            attls: AttlsConfig::default(),
        }
    }
}

impl Config {
    /// Reads, parses and validates a TOML configuration file.
    pub fn from_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at '{path}'"))?;
        Self::from_toml_str(&contents).with_context(|| format!("Invalid config file '{path}'"))
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let len = self.attls.certificate_buffer_len;
        if len == 0 {
            return Err(anyhow!("attls.certificate_buffer_len cannot be 0"));
        }
        if len > MAX_CERTIFICATE_BUFFER_LEN {
            return Err(anyhow!(
                "attls.certificate_buffer_len is {} bytes, the maximum is {} bytes",
                len,
                MAX_CERTIFICATE_BUFFER_LEN
            ));
        }
        if len < SMALL_CERTIFICATE_BUFFER_LEN {
            warn!(
                "low attls.certificate_buffer_len setting: {} bytes. Partner certificates may not fit.",
                len
            );
        }
        if self.log_level.trim().is_empty() {
            return Err(anyhow!("log_level cannot be empty"));
        }
        Ok(())
    }

    /// Makes the `[attls]` settings the defaults of future registry attaches.
    pub fn apply(&self) {
        inbound::set_always_load_certificate(self.attls.always_load_certificate);
        inbound::set_certificate_buffer_len(self.attls.certificate_buffer_len);
    }

    /// A log filter from `RUST_LOG`, falling back to the configured level.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.log_level))
    }
}
