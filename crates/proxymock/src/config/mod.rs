//! Configuration types for proxymock.

mod service;
mod upstream;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::extractor::DEFAULT_MAX_INSPECTED_BYTES;

pub use service::ServiceConfig;
pub use upstream::ConnectionPoolConfig;

/// Process-wide configuration.
///
/// Keys are PascalCase so an existing `appsettings`-style file can be reused
/// as is (`Services`, `UseFileCache`, `HandlerRetryLimit`, ...).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Config {
    /// Backend services, one listener each
    pub services: Vec<ServiceConfig>,

    /// Skip re-reading mock files whose modification time did not change
    #[serde(default = "default_use_file_cache")]
    pub use_file_cache: bool,

    /// Bind retries after the first attempt fails with "address in use"
    #[serde(default = "default_handler_retry_limit")]
    pub handler_retry_limit: u32,

    #[serde(default = "default_bind_retry_delay_ms")]
    pub bind_retry_delay_ms: u64,

    /// First port handed out to services that do not declare one
    #[serde(default = "default_base_port")]
    pub base_port: u16,

    #[serde(default = "default_listen_host")]
    pub listen_host: String,

    #[serde(default = "default_mock_directory")]
    pub mock_directory: PathBuf,

    /// Root of the per-service capture directories
    #[serde(default = "default_log_directory")]
    pub log_directory: PathBuf,

    /// Accept any backend certificate (self-signed test environments)
    #[serde(default)]
    pub tls_skip_verify: bool,

    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Larger request bodies are not parsed for mock parameters or capture names
    #[serde(default = "default_max_inspected_body_bytes")]
    pub max_inspected_body_bytes: usize,

    #[serde(default)]
    pub connection_pool: ConnectionPoolConfig,
}

fn default_use_file_cache() -> bool {
    true
}

fn default_handler_retry_limit() -> u32 {
    3
}

fn default_bind_retry_delay_ms() -> u64 {
    1000
}

fn default_base_port() -> u16 {
    57000
}

fn default_listen_host() -> String {
    "0.0.0.0".to_string()
}

fn default_mock_directory() -> PathBuf {
    PathBuf::from("MockedRequests")
}

fn default_log_directory() -> PathBuf {
    PathBuf::from("Logs")
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

fn default_max_inspected_body_bytes() -> usize {
    DEFAULT_MAX_INSPECTED_BYTES
}

impl Config {
    /// Build a configuration for the given services with every other knob at its default.
    pub fn with_services(services: Vec<ServiceConfig>) -> Self {
        Self {
            services,
            use_file_cache: default_use_file_cache(),
            handler_retry_limit: default_handler_retry_limit(),
            bind_retry_delay_ms: default_bind_retry_delay_ms(),
            base_port: default_base_port(),
            listen_host: default_listen_host(),
            mock_directory: default_mock_directory(),
            log_directory: default_log_directory(),
            tls_skip_verify: false,
            shutdown_grace_secs: default_shutdown_grace_secs(),
            max_inspected_body_bytes: default_max_inspected_body_bytes(),
            connection_pool: ConnectionPoolConfig::default(),
        }
    }

    /// Load and validate a YAML (or JSON) configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {}: {e}", path.display()))?;
        Self::from_yaml_str(&contents)
    }

    /// Parse and validate configuration text. JSON is accepted since it is valid YAML.
    pub fn from_yaml_str(contents: &str) -> Result<Self, anyhow::Error> {
        let config: Config = serde_yaml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.services.is_empty() {
            anyhow::bail!("At least one entry is required under 'Services'");
        }

        let mut names = HashSet::new();
        let mut ports = HashSet::new();
        for service in &self.services {
            service
                .validate()
                .map_err(|e| anyhow::anyhow!("Invalid service '{}': {e}", service.name))?;

            if !names.insert(service.name.as_str()) {
                anyhow::bail!("Service name '{}' is declared more than once", service.name);
            }

            // Port 0 asks the OS for an ephemeral port, so it may repeat
            if let Some(port) = service.port.filter(|p| *p != 0) {
                if !ports.insert(port) {
                    anyhow::bail!(
                        "Port {port} is assigned to more than one service (last: '{}')",
                        service.name
                    );
                }
            }
        }

        if self.listen_host.trim().is_empty() {
            anyhow::bail!("'ListenHost' must not be empty");
        }

        Ok(())
    }

    /// Port for the service at `index`: its own `Port`, else `BasePort + index`.
    pub fn port_for(&self, index: usize) -> Option<u16> {
        let service = self.services.get(index)?;
        match service.port {
            Some(port) => Some(port),
            None => u16::try_from(index)
                .ok()
                .and_then(|offset| self.base_port.checked_add(offset)),
        }
    }

    pub fn bind_retry_delay(&self) -> Duration {
        Duration::from_millis(self.bind_retry_delay_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let yaml = r#"
Services:
  - Name: json
    Url: "http://json.testapi.com/"
    Port: 57010
  - Name: xml
    Url: "https://xml.testapi.com"
UseFileCache: false
HandlerRetryLimit: 5
MaxInspectedBodyBytes: 4096
"#;

        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.services.len(), 2);
        assert_eq!(config.services[0].name, "json");
        assert_eq!(config.services[0].url, "http://json.testapi.com/");
        assert_eq!(config.services[0].port, Some(57010));
        assert_eq!(config.services[1].port, None);
        assert!(!config.use_file_cache);
        assert_eq!(config.handler_retry_limit, 5);
        assert_eq!(config.max_inspected_body_bytes, 4096);
    }

    #[test]
    fn test_defaults() {
        let yaml = r#"
Services:
  - Name: json
    Url: "http://localhost:8000"
"#;

        let config = Config::from_yaml_str(yaml).unwrap();
        assert!(config.use_file_cache);
        assert_eq!(config.handler_retry_limit, 3);
        assert_eq!(config.base_port, 57000);
        assert_eq!(config.listen_host, "0.0.0.0");
        assert_eq!(config.mock_directory, PathBuf::from("MockedRequests"));
        assert_eq!(config.log_directory, PathBuf::from("Logs"));
        assert!(!config.tls_skip_verify);
        assert_eq!(config.shutdown_grace(), Duration::from_secs(10));
        assert_eq!(config.connection_pool.request_timeout_secs, 30);
        assert_eq!(config.max_inspected_body_bytes, 64 * 1024);
    }

    #[test]
    fn test_parse_json_config() {
        let json = r#"{
            "Services": [{"Name": "json", "Url": "http://localhost:9000"}],
            "UseFileCache": true,
            "HandlerRetryLimit": 1,
            "TlsSkipVerify": true
        }"#;

        let config = Config::from_yaml_str(json).unwrap();
        assert_eq!(config.services[0].name, "json");
        assert_eq!(config.handler_retry_limit, 1);
        assert!(config.tls_skip_verify);
    }

    #[test]
    fn test_port_assignment() {
        let yaml = r#"
Services:
  - Name: a
    Url: "http://a:1"
  - Name: b
    Url: "http://b:1"
    Port: 9100
  - Name: c
    Url: "http://c:1"
BasePort: 58000
"#;

        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.port_for(0), Some(58000));
        assert_eq!(config.port_for(1), Some(9100));
        assert_eq!(config.port_for(2), Some(58002));
        assert_eq!(config.port_for(3), None);
    }

    #[test]
    fn test_rejects_empty_services() {
        let err = Config::from_yaml_str("Services: []").unwrap_err();
        assert!(err.to_string().contains("Services"));
    }

    #[test]
    fn test_rejects_duplicate_names() {
        let yaml = r#"
Services:
  - Name: json
    Url: "http://a:1"
  - Name: json
    Url: "http://b:1"
"#;
        let err = Config::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn test_rejects_duplicate_ports() {
        let yaml = r#"
Services:
  - Name: a
    Url: "http://a:1"
    Port: 9000
  - Name: b
    Url: "http://b:1"
    Port: 9000
"#;
        let err = Config::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("9000"));
    }

    #[test]
    fn test_ephemeral_ports_may_repeat() {
        let yaml = r#"
Services:
  - Name: a
    Url: "http://a:1"
    Port: 0
  - Name: b
    Url: "http://b:1"
    Port: 0
"#;
        assert!(Config::from_yaml_str(yaml).is_ok());
    }

    #[test]
    fn test_rejects_invalid_service_url() {
        let yaml = r#"
Services:
  - Name: a
    Url: "ftp://a:1"
"#;
        let err = Config::from_yaml_str(yaml).unwrap_err();
        assert!(err.to_string().contains("Invalid service 'a'"));
    }
}
