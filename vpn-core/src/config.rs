//! Shared configuration structs (ambient stack, SPEC_FULL §Ambient stack).
//!
//! Defaults mirror the original deployment's config loader so an operator
//! migrating an existing config file gets the same behavior out of the box.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8443
}

fn default_max_clients() -> u32 {
    100
}

fn default_interface_name() -> String {
    "iran_vpn0".to_string()
}

fn default_ip_range() -> String {
    "10.8.0.0/24".to_string()
}

fn default_mtu() -> u16 {
    1420
}

fn default_session_timeout_hours() -> u64 {
    24
}

fn default_keepalive_interval_secs() -> u64 {
    15
}

fn default_max_sessions_per_user() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            file_path: None,
        }
    }
}

/// Server-side configuration (spec §4.D-G).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_clients")]
    pub max_clients: u32,
    pub tls: TlsConfig,
    #[serde(default = "default_interface_name")]
    pub interface_name: String,
    #[serde(default = "default_ip_range")]
    pub ip_range: String,
    #[serde(default = "default_mtu")]
    pub mtu: u16,
    #[serde(default = "default_session_timeout_hours")]
    pub session_timeout_hours: u64,
    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,
    #[serde(default = "default_max_sessions_per_user")]
    pub max_sessions_per_user: u32,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServerConfig {
    /// Parses `ip_range` into its base network octets, panicking only on a
    /// config error surfaced at startup rather than at request time.
    pub fn virtual_network_base(&self) -> Option<Ipv4Addr> {
        let (addr, _prefix) = self.ip_range.split_once('/')?;
        addr.parse().ok()
    }
}

/// Client-side configuration (spec §4.H-I).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub server_host: String,
    #[serde(default = "default_port")]
    pub server_port: u16,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub ca_cert_path: Option<PathBuf>,
    /// Disables TLS certificate verification entirely. An explicit opt-in
    /// for development against a self-signed server; the engine logs a
    /// WARN on every connection made with this set (spec §4.I).
    #[serde(default)]
    pub insecure_skip_verify: bool,
    #[serde(default = "default_keepalive_interval_secs")]
    pub keepalive_interval_secs: u64,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_config_parses_virtual_network_base() {
        let cfg = ServerConfig {
            host: default_host(),
            port: default_port(),
            max_clients: default_max_clients(),
            tls: TlsConfig {
                cert_path: "cert.pem".into(),
                key_path: "key.pem".into(),
            },
            interface_name: default_interface_name(),
            ip_range: default_ip_range(),
            mtu: default_mtu(),
            session_timeout_hours: default_session_timeout_hours(),
            keepalive_interval_secs: default_keepalive_interval_secs(),
            max_sessions_per_user: default_max_sessions_per_user(),
            logging: LoggingConfig::default(),
        };
        assert_eq!(cfg.virtual_network_base(), Some(Ipv4Addr::new(10, 8, 0, 0)));
    }

    #[test]
    fn defaults_match_original_deployment() {
        assert_eq!(default_port(), 8443);
        assert_eq!(default_max_clients(), 100);
        assert_eq!(default_mtu(), 1420);
        assert_eq!(default_max_sessions_per_user(), 3);
    }
}
