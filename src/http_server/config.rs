//! HTTP adapter configuration.

use serde::{Deserialize, Serialize};

/// Socket configuration for the control-surface adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3001
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port() }
    }
}

impl HttpServerConfig {
    pub fn with_port(port: u16) -> Self {
        Self { port, ..Default::default() }
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_port_matches_spec() {
        assert_eq!(HttpServerConfig::default().port, 3001);
    }

    #[test]
    fn with_port_overrides_default() {
        assert_eq!(HttpServerConfig::with_port(8080).socket_addr(), "0.0.0.0:8080");
    }
}
