//! Server config file loading (ambient stack).

use std::path::Path;

use serde::Deserialize;
use vpn_core::config::ServerConfig;

use crate::directory::UserEntry;
use crate::errors::{Result, ServerError};

#[derive(Debug, Deserialize)]
pub struct FileConfig {
    #[serde(flatten)]
    pub server: ServerConfig,
    #[serde(default)]
    pub users: Vec<UserEntry>,
}

pub fn load(path: impl AsRef<Path>) -> Result<FileConfig> {
    let text = std::fs::read_to_string(path)?;
    toml::from_str(&text).map_err(|e| ServerError::config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_minimal_config() {
        let toml = r#"
            host = "0.0.0.0"
            port = 8443
            interface_name = "iran_vpn0"
            ip_range = "10.8.0.0/24"

            [tls]
            cert_path = "cert.pem"
            key_path = "key.pem"

            [[users]]
            username = "alice"
            password_hash = "hash"
        "#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(toml.as_bytes()).unwrap();
        let cfg = load(file.path()).unwrap();
        assert_eq!(cfg.server.port, 8443);
        assert_eq!(cfg.users.len(), 1);
        assert_eq!(cfg.users[0].username, "alice");
    }
}
