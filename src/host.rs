// src/host.rs
// Host values built from provider-supplied arguments, with host-level
// settings applied as fallback defaults for every unset SSH field.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

use crate::errors::SettingsError;
use crate::settings::Settings;

// Caller-supplied construction arguments. Everything is optional; a missing
// hostname is the only hard error.
#[derive(Debug, Clone, Default)]
pub struct HostArgs {
    pub hostname: Option<String>,
    pub name: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub port: Option<u16>,
    pub key_filename: Option<String>,
    pub connection_timeout: Option<u64>,
    pub ipv6: Option<bool>,
    pub ipv4_fallback: Option<bool>,
}

/// A host reachable over SSH, fully resolved against the settings document.
///
/// Serializes to a flat record suitable for inventory-style persistence and
/// deserializes back without loss.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Host {
    pub hostname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_filename: Option<String>,
    pub connection_timeout: u64, // seconds
    pub ipv6: bool,
    pub ipv4_fallback: bool,
}

impl Host {
    /// Construct a host, filling every unset SSH field from the host-level
    /// settings keys. Caller-supplied values always win.
    pub fn from_args(args: HostArgs, settings: &Settings) -> Result<Self, SettingsError> {
        let hostname = args.hostname.ok_or(SettingsError::MissingHostname)?;
        debug!("Constructing host '{}' with settings fallbacks", hostname);
        Ok(Host {
            hostname,
            name: args.name,
            username: args
                .username
                .unwrap_or_else(|| settings.host_username.clone()),
            password: args.password.or_else(|| settings.host_password.clone()),
            port: args.port.unwrap_or(settings.host_ssh_port),
            key_filename: args
                .key_filename
                .or_else(|| settings.host_ssh_key_filename.clone()),
            connection_timeout: args
                .connection_timeout
                .unwrap_or(settings.host_connection_timeout),
            ipv6: args.ipv6.unwrap_or(settings.host_ipv6),
            ipv4_fallback: args.ipv4_fallback.unwrap_or(settings.host_ipv4_fallback),
        })
    }

    /// The SSH key path with `~` expanded, when one is set.
    pub fn key_path(&self) -> Option<PathBuf> {
        self.key_filename
            .as_deref()
            .map(|raw| PathBuf::from(shellexpand::tilde(raw).into_owned()))
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.username, self.hostname, self.port)
    }
}
