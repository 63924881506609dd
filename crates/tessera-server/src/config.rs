//! Server configuration.

use std::net::SocketAddr;

use tessera_config::ServerSection;

use crate::error::{Result, ServerError};

/// Default bind address.
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8080";

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to.
    pub bind_address: SocketAddr,

    /// Log every request with its status and latency.
    pub request_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            request_logging: true,
        }
    }
}

impl ServerConfig {
    /// Build from the `[server]` section of the application config.
    pub fn from_section(section: &ServerSection) -> Result<Self> {
        let bind_address = section.bind.parse().map_err(|e| {
            ServerError::Config(format!("invalid bind address '{}': {}", section.bind, e))
        })?;
        Ok(Self {
            bind_address,
            request_logging: section.request_logging,
        })
    }

    /// Set the bind address.
    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    /// Enable or disable request logging.
    pub fn with_request_logging(mut self, enabled: bool) -> Self {
        self.request_logging = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_section() {
        let section = ServerSection {
            bind: "0.0.0.0:9000".to_string(),
            request_logging: false,
        };
        let config = ServerConfig::from_section(&section).unwrap();
        assert_eq!(config.bind_address.port(), 9000);
        assert!(!config.request_logging);
    }

    #[test]
    fn test_invalid_bind_address() {
        let section = ServerSection {
            bind: "not-an-address".to_string(),
            request_logging: true,
        };
        assert!(matches!(
            ServerConfig::from_section(&section),
            Err(ServerError::Config(_))
        ));
    }

    #[test]
    fn test_default_matches_constant() {
        assert_eq!(
            ServerConfig::default().bind_address,
            DEFAULT_BIND_ADDRESS.parse::<SocketAddr>().unwrap()
        );
    }
}
