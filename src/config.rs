use serde::Deserialize;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "rustynet.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {source}")]
    Read {
        #[from]
        source: io::Error,
    },

    #[error("failed to deserialize config: {source}")]
    Parse {
        #[from]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub address: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub parser: ParserConfig,
    pub proxy: ProxyConfig,
}

/// Limits of the request-head read buffer.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// Size of the first read buffer; kept tiny so partial reads are the
    /// common case rather than the exception.
    pub initial_buffer_size: usize,
    /// The buffer doubles when full but never past this size.
    pub max_buffer_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// Request targets starting with this prefix are proxied.
    pub prefix: String,
    /// Base URL the rest of the target is appended to.
    pub upstream: String,
    /// Bytes read from upstream per forwarded chunk.
    pub chunk_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 42069,
            log_level: "info".to_string(),
            parser: ParserConfig::default(),
            proxy: ProxyConfig::default(),
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            initial_buffer_size: 8,
            max_buffer_size: 64 * 1024,
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            prefix: "/httpbin/".to_string(),
            upstream: "https://httpbin.org/".to_string(),
            chunk_size: 1024,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    /// Loads the config, falling back to defaults when the file is missing
    /// or invalid.
    pub fn from_file(path: &str) -> Self {
        Self::try_from_file(path).unwrap_or_else(|err| {
            warn!(path, cause = %err, "falling back to default config");
            ServerConfig::default()
        })
    }

    pub fn try_from_file(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str::<ServerConfig>(content.as_str())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let config: ServerConfig = toml::from_str(
            r#"
            port = 8080

            [proxy]
            upstream = "http://127.0.0.1:9000/"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.address, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(config.proxy.upstream, "http://127.0.0.1:9000/");
        assert_eq!(config.proxy.prefix, "/httpbin/");
        assert_eq!(config.proxy.chunk_size, 1024);
        assert_eq!(config.parser.initial_buffer_size, 8);
    }

    #[test]
    fn invalid_file_is_reported() {
        let path = std::env::temp_dir().join("rustynet-invalid-config.toml");
        std::fs::write(&path, "port = \"not a port\"").unwrap();
        let result = ServerConfig::try_from_file(path.to_str().unwrap());
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = ServerConfig::from_file("/nonexistent/rustynet.toml");
        assert_eq!(config.port, 42069);
        assert_eq!(config.log_level, "info");
    }
}
