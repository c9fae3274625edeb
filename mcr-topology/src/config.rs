//! Project configuration
//!
//! A mirror project is described by one YAML file, e.g.
//!
//! ```yaml
//! gateway: m.example.com
//! http_port: 8080
//! dashboard_port: 8081
//! extra_env:
//!   https_proxy: socks5://outbound.example.com:8080
//! registries:
//!   - name: docker
//!   - name: ghcr
//!     domains: [ghcr.example.com]
//! ```

use crate::assembler::DEFAULT_USAGE_PAGE_IMAGE;
use crate::compiler::{CacheServiceSettings, RoutingModes, DEFAULT_REGISTRY_IMAGE};
use crate::descriptor::UpstreamDescriptor;
use crate::error::{Result, TopologyError};
use crate::gateway::{GatewaySettings, DEFAULT_GATEWAY_IMAGE};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    #[serde(default = "default_project_name")]
    pub project_name: String,

    /// Public hostname of the gateway
    #[serde(default)]
    pub gateway: String,

    #[serde(default = "default_true")]
    pub prefix_mode: bool,

    #[serde(default = "default_true")]
    pub domain_mode: bool,

    #[serde(default)]
    pub force_https_redirect: bool,

    #[serde(default = "default_http_port")]
    pub http_port: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https_port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard_port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard_domain: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trusted_proxies: Vec<String>,

    #[serde(default = "default_gateway_image")]
    pub gateway_image: String,

    #[serde(default = "default_registry_image")]
    pub registry_image: String,

    #[serde(default = "default_usage_page_image")]
    pub usage_page_image: String,

    /// Sets `REGISTRY_HTTP_ADDR` on every cache service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_listen_address: Option<String>,

    /// Path to a tera template replacing the built-in usage page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_template: Option<String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub extra_env: IndexMap<String, String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub env_overrides: IndexMap<String, String>,

    #[serde(default)]
    pub registries: Vec<RegistrationConfig>,
}

/// One registry to mirror
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationConfig {
    pub name: String,

    /// Catalog entry to use, defaults to `name`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domains: Option<Vec<String>>,

    /// Inline upstream, bypassing the catalog
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptor: Option<UpstreamDescriptor>,
}

impl RegistrationConfig {
    pub fn upstream_name(&self) -> &str {
        self.upstream.as_deref().unwrap_or(&self.name)
    }
}

fn default_true() -> bool {
    true
}

fn default_project_name() -> String {
    "mcr".to_string()
}

fn default_http_port() -> u16 {
    80
}

fn default_gateway_image() -> String {
    DEFAULT_GATEWAY_IMAGE.to_string()
}

fn default_registry_image() -> String {
    DEFAULT_REGISTRY_IMAGE.to_string()
}

fn default_usage_page_image() -> String {
    DEFAULT_USAGE_PAGE_IMAGE.to_string()
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            project_name: default_project_name(),
            gateway: String::new(),
            prefix_mode: true,
            domain_mode: true,
            force_https_redirect: false,
            http_port: default_http_port(),
            https_port: None,
            dashboard_port: None,
            dashboard_domain: None,
            trusted_proxies: Vec::new(),
            gateway_image: default_gateway_image(),
            registry_image: default_registry_image(),
            usage_page_image: default_usage_page_image(),
            cache_listen_address: None,
            usage_template: None,
            extra_env: IndexMap::new(),
            env_overrides: IndexMap::new(),
            registries: Vec::new(),
        }
    }
}

impl MirrorConfig {
    pub fn new(gateway: impl Into<String>) -> Self {
        Self {
            gateway: gateway.into(),
            ..Default::default()
        }
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        Ok(serde_yaml_ng::from_str(yaml)?)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        if self.gateway.trim().is_empty() {
            return Err(TopologyError::Config("gateway hostname is required".to_string()));
        }
        if self.http_port == 0 {
            return Err(TopologyError::Config("http_port must be non-zero".to_string()));
        }
        Ok(())
    }

    pub fn routing_modes(&self) -> RoutingModes {
        RoutingModes {
            prefix_mode: self.prefix_mode,
            domain_mode: self.domain_mode,
            force_https_redirect: self.force_https_redirect,
        }
    }

    pub fn gateway_settings(&self) -> GatewaySettings {
        GatewaySettings {
            image: self.gateway_image.clone(),
            http_port: self.http_port,
            https_port: self.https_port,
            dashboard_port: self.dashboard_port,
            dashboard_domain: self.dashboard_domain.clone(),
            trusted_proxies: self.trusted_proxies.clone(),
        }
    }

    pub fn cache_settings(&self) -> CacheServiceSettings {
        CacheServiceSettings {
            image: self.registry_image.clone(),
            extra_env: self.extra_env.clone(),
            env_overrides: self.env_overrides.clone(),
            listen_address: self.cache_listen_address.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_minimal_yaml() {
        let config = MirrorConfig::from_yaml_str("gateway: m.example.com\n")
            .expect("should parse config");

        assert_eq!(config.project_name, "mcr");
        assert_eq!(config.http_port, 80);
        assert!(config.prefix_mode);
        assert!(config.domain_mode);
        assert!(!config.force_https_redirect);
        assert_eq!(config.registry_image, DEFAULT_REGISTRY_IMAGE);
        assert!(config.registries.is_empty());
        config.validate().expect("should be valid");
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
project_name: mirrors
gateway: m.example.com
domain_mode: false
http_port: 8080
dashboard_port: 8081
trusted_proxies: [10.0.0.0/8]
extra_env:
  https_proxy: socks5://outbound.example.com:8080
  no_proxy: localhost,*.example.com
registries:
  - name: docker
  - name: hub
    upstream: docker
    domains: [hub.example.com]
  - name: private
    descriptor:
      name: private
      label: Private
      endpoint: https://r.internal:5000
"#;
        let config = MirrorConfig::from_yaml_str(yaml).expect("should parse config");

        assert_eq!(config.project_name, "mirrors");
        assert!(!config.routing_modes().domain_mode);
        assert_eq!(config.gateway_settings().dashboard_port, Some(8081));
        let extra: Vec<_> = config.cache_settings().extra_env.keys().cloned().collect();
        assert_eq!(extra, vec!["https_proxy", "no_proxy"]);

        assert_eq!(config.registries.len(), 3);
        assert_eq!(config.registries[0].upstream_name(), "docker");
        assert_eq!(config.registries[1].upstream_name(), "docker");
        assert_eq!(
            config.registries[1].domains.as_deref(),
            Some(&["hub.example.com".to_string()][..])
        );
        assert!(config.registries[2].descriptor.is_some());
    }

    #[test]
    fn test_validate_rejects_missing_gateway() {
        let config = MirrorConfig::default();
        assert!(matches!(config.validate(), Err(TopologyError::Config(_))));

        let config = MirrorConfig {
            http_port: 0,
            ..MirrorConfig::new("m.example.com")
        };
        assert!(matches!(config.validate(), Err(TopologyError::Config(_))));
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            MirrorConfig::from_yaml_str("gateway: [unterminated"),
            Err(TopologyError::Serialization(_))
        ));
    }
}
