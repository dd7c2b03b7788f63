use std::{net::IpAddr, time::Duration};

use anyhow::{Context, Result};
use tracing::info;

/// Addresses of the lamp dongles shipped with the reference deployment.
pub const DEFAULT_DONGLE_ADDRESSES: &str = "fd00::f6ce:366c:f0fd:f7e5,fd00::f6ce:3636:5325:98f8";

// ---------------------------------------------------------------------------
// DatabaseConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Created on collector startup if it does not exist yet.
    pub name: String,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: optional("DB_HOST", "localhost"),
            port: optional("DB_PORT", "3306")
                .parse()
                .context("DB_PORT must be a valid port number")?,
            user: optional("DB_USER", "root"),
            password: required("DB_PASSWORD")?,
            name: database_name(&optional("DB_NAME", "smart_lamps_db"))?,
        })
    }

    /// Connection string with the password masked, for logs.
    fn masked_url(&self) -> String {
        format!("mysql://{}:****@{}:{}/{}", self.user, self.host, self.port, self.name)
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    /// Dongles registered on every collector start, in registration order.
    pub dongle_addresses: Vec<IpAddr>,
    /// UDP port the dongles serve CoAP on.
    pub coap_port: u16,
    /// Collector polling interval in seconds
    pub poll_interval_secs: u64,
    /// Upper bound for a single CoAP exchange, in seconds
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database: DatabaseConfig::from_env()?,
            dongle_addresses: parse_addresses(&optional(
                "DONGLE_ADDRESSES",
                DEFAULT_DONGLE_ADDRESSES,
            ))?,
            coap_port: coap_port()?,
            poll_interval_secs: parse_secs("POLL_INTERVAL_SECS", "10")?,
            request_timeout_secs: parse_secs("REQUEST_TIMEOUT_SECS", "5")?,
        })
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Dongle addresses in the textual form stored in the registry.
    pub fn dongle_address_strings(&self) -> Vec<String> {
        self.dongle_addresses.iter().map(ToString::to_string).collect()
    }

    /// Log the loaded configuration with the database password masked.
    pub fn log_config(&self) {
        info!(
            db = %self.database.masked_url(),
            dongles = ?self.dongle_address_strings(),
            coap_port = self.coap_port,
            poll_interval_secs = self.poll_interval_secs,
            request_timeout_secs = self.request_timeout_secs,
            "Configuration loaded"
        );
    }
}

// ---------------------------------------------------------------------------
// ConsoleConfig
// ---------------------------------------------------------------------------

/// What the operator console needs: the database and how to reach the
/// dongles it finds there. Collector-only settings are not read.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub database: DatabaseConfig,
    pub coap_port: u16,
    pub request_timeout_secs: u64,
}

impl ConsoleConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database: DatabaseConfig::from_env()?,
            coap_port: coap_port()?,
            request_timeout_secs: parse_secs("REQUEST_TIMEOUT_SECS", "5")?,
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn log_config(&self) {
        info!(
            db = %self.database.masked_url(),
            coap_port = self.coap_port,
            request_timeout_secs = self.request_timeout_secs,
            "Configuration loaded"
        );
    }
}

fn coap_port() -> Result<u16> {
    optional("COAP_PORT", "5683")
        .parse()
        .context("COAP_PORT must be a valid port number")
}

/// Parse `"addr1,addr2"` into IP addresses, keeping order and dropping
/// duplicates (the registry enforces address uniqueness).
fn parse_addresses(raw: &str) -> Result<Vec<IpAddr>> {
    let mut addresses: Vec<IpAddr> = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let addr = entry
            .parse::<IpAddr>()
            .with_context(|| format!("DONGLE_ADDRESSES entry is not an IP address: {entry:?}"))?;
        if !addresses.contains(&addr) {
            addresses.push(addr);
        }
    }
    anyhow::ensure!(
        !addresses.is_empty(),
        "DONGLE_ADDRESSES must list at least one dongle"
    );
    Ok(addresses)
}

/// The name ends up quoted inside `CREATE DATABASE`, so only plain
/// identifiers are accepted.
fn database_name(raw: &str) -> Result<String> {
    anyhow::ensure!(
        !raw.is_empty() && raw.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'),
        "DB_NAME may only contain ASCII letters, digits and '_', got: {raw:?}"
    );
    Ok(raw.to_owned())
}

fn parse_secs(key: &str, default: &str) -> Result<u64> {
    let secs: u64 = optional(key, default)
        .parse()
        .with_context(|| format!("{key} must be a positive integer"))?;
    anyhow::ensure!(secs > 0, "{key} must be a positive integer");
    Ok(secs)
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var: {key}"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}
