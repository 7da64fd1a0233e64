//! Provisioning requests and their validation.
//!
//! Passwords never come from callers: [`Credentials`] are built from process
//! configuration and merged with the caller's hostname/SSID/PSK here.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use thiserror::Error;

static HOSTNAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9]([-_A-Za-z0-9]*[A-Za-z0-9])?$").expect("hostname pattern")
});

pub const MIN_PSK_LEN: usize = 8;

/// Client-facing validation failures. The messages are part of the HTTP API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Hostname must be a string")]
    HostnameNotString,
    #[error("Hostname must be a valid hostname: A-Za-z0-9 and -_")]
    HostnameInvalid,
    #[error("SSID must be a string")]
    SsidNotString,
    #[error("PSK must be at least 8 characters")]
    PskTooShort,
}

/// Router admin password plus older passwords to fall back on.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub password: String,
    pub alternative_passwords: Vec<String>,
}

impl Credentials {
    pub fn new(password: impl Into<String>, alternative_passwords: Vec<String>) -> Self {
        Self {
            password: password.into(),
            alternative_passwords,
        }
    }

    /// Main password first, then the alternatives in configured order.
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.password.as_str())
            .chain(self.alternative_passwords.iter().map(String::as_str))
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("password", &"<redacted>")
            .field("alternative_passwords", &self.alternative_passwords.len())
            .finish()
    }
}

/// A validated request to provision one router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisioningRequest {
    pub credentials: Credentials,
    pub hostname: String,
    pub ssid: String,
    pub psk: String,
}

impl ProvisioningRequest {
    pub fn new(
        credentials: Credentials,
        hostname: &str,
        ssid: &str,
        psk: &str,
    ) -> Result<Self, ValidationError> {
        if !is_valid_hostname(hostname) {
            return Err(ValidationError::HostnameInvalid);
        }
        if psk.chars().count() < MIN_PSK_LEN {
            return Err(ValidationError::PskTooShort);
        }
        Ok(Self {
            credentials,
            hostname: hostname.to_string(),
            ssid: ssid.to_string(),
            psk: psk.to_string(),
        })
    }

    /// Validate an untyped JSON submission `{hostname, ssid, psk}`.
    ///
    /// `hostname_prefix` is prepended before the hostname pattern is checked.
    pub fn from_json(
        body: &Value,
        credentials: Credentials,
        hostname_prefix: &str,
    ) -> Result<Self, ValidationError> {
        let hostname = body
            .get("hostname")
            .and_then(Value::as_str)
            .ok_or(ValidationError::HostnameNotString)?;
        let hostname = format!("{hostname_prefix}{hostname}");
        if !is_valid_hostname(&hostname) {
            return Err(ValidationError::HostnameInvalid);
        }
        let ssid = body
            .get("ssid")
            .and_then(Value::as_str)
            .ok_or(ValidationError::SsidNotString)?;
        let psk = body
            .get("psk")
            .and_then(Value::as_str)
            .ok_or(ValidationError::PskTooShort)?;
        Self::new(credentials, &hostname, ssid, psk)
    }
}

pub fn is_valid_hostname(hostname: &str) -> bool {
    HOSTNAME.is_match(hostname)
}
