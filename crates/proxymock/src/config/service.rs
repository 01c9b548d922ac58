//! Backend service declarations.

use serde::{Deserialize, Serialize};

/// One backend service fronted by its own listener.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceConfig {
    /// Identifier used for mock file lookup and capture directories
    pub name: String,
    /// Base URL of the real backend
    pub url: String,
    /// Explicit listen port; `BasePort + index` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl ServiceConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            port: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Scheme of the backend URL, lowercased.
    pub fn scheme(&self) -> Result<String, String> {
        let url_parts: Vec<&str> = self.url.splitn(2, "://").collect();
        if url_parts.len() != 2 {
            return Err(format!("Invalid URL format (missing scheme): {}", self.url));
        }
        Ok(url_parts[0].to_ascii_lowercase())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("'Name' must not be empty".to_string());
        }
        // The name becomes a file name prefix and a directory name
        if self
            .name
            .chars()
            .any(|c| matches!(c, '/' | '\\') || c.is_control())
            || self.name == "."
            || self.name == ".."
        {
            return Err(format!(
                "'Name' must be usable as a file name: {:?}",
                self.name
            ));
        }

        match self.scheme()?.as_str() {
            "http" | "https" => {}
            other => {
                return Err(format!(
                    "Unsupported protocol '{other}'. Currently supported: http, https"
                ))
            }
        }

        let rest = self.url.splitn(2, "://").nth(1).unwrap_or_default();
        if rest.trim_matches('/').is_empty() {
            return Err(format!("URL has no host: {}", self.url));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_service() {
        assert!(ServiceConfig::new("json", "http://json.testapi.com/")
            .validate()
            .is_ok());
        assert!(ServiceConfig::new("xml", "HTTPS://xml.testapi.com")
            .validate()
            .is_ok());
    }

    #[test]
    fn test_scheme() {
        let service = ServiceConfig::new("a", "HTTPS://host");
        assert_eq!(service.scheme().unwrap(), "https");

        let service = ServiceConfig::new("a", "host-only");
        assert!(service.scheme().is_err());
    }

    #[test]
    fn test_rejects_bad_names() {
        assert!(ServiceConfig::new("", "http://a").validate().is_err());
        assert!(ServiceConfig::new("a/b", "http://a").validate().is_err());
        assert!(ServiceConfig::new("a\\b", "http://a").validate().is_err());
        assert!(ServiceConfig::new("..", "http://a").validate().is_err());
    }

    #[test]
    fn test_rejects_bad_urls() {
        let err = ServiceConfig::new("a", "ftp://a").validate().unwrap_err();
        assert!(err.contains("ftp"));
        assert!(ServiceConfig::new("a", "http://").validate().is_err());
        assert!(ServiceConfig::new("a", "localhost:80").validate().is_err());
    }

    #[test]
    fn test_with_port() {
        let service = ServiceConfig::new("a", "http://a").with_port(9000);
        assert_eq!(service.port, Some(9000));
    }
}
