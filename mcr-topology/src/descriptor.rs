//! Upstream registry descriptors
//!
//! A descriptor names one mirrorable registry: the path prefixes clients use
//! to address it (`docker.io`, `ghcr.io`, ...) and the origin the cache
//! service pulls from. Descriptors are immutable once built; the optional
//! fields are resolved into canonical values through [`UpstreamDescriptor::resolve_prefixes`]
//! and [`UpstreamDescriptor::resolve_endpoint`].

use crate::error::{Result, TopologyError};
use serde::{Deserialize, Serialize};

/// Image reference used in usage examples when a descriptor does not name one
pub const DEFAULT_EXAMPLE_IMAGE: &str = "foo/bar:latest";

/// Mirroring metadata for one upstream registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamDescriptor {
    name: String,
    label: String,
    /// Legacy single-prefix field, consulted when `prefixes` is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    prefixes: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gallery: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    example_image: Option<String>,
}

impl UpstreamDescriptor {
    pub fn new(name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            label: label.into(),
            prefix: None,
            prefixes: None,
            endpoint: None,
            gallery: None,
            example_image: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefixes = Some(prefixes.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_gallery(mut self, gallery: impl Into<String>) -> Self {
        self.gallery = Some(gallery.into());
        self
    }

    pub fn with_example_image(mut self, image: impl Into<String>) -> Self {
        self.example_image = Some(image.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn gallery(&self) -> Option<&str> {
        self.gallery.as_deref()
    }

    /// Image shown in usage examples, falling back to [`DEFAULT_EXAMPLE_IMAGE`]
    pub fn example_image(&self) -> &str {
        self.example_image.as_deref().unwrap_or(DEFAULT_EXAMPLE_IMAGE)
    }

    /// Resolve the ordered list of path prefixes.
    ///
    /// `prefixes` wins when it is set and non-empty, otherwise the legacy
    /// `prefix` field yields a single-element list. With neither set this
    /// returns [`TopologyError::MissingPrefixes`]; callers decide whether that
    /// is fatal.
    pub fn resolve_prefixes(&self) -> Result<Vec<String>> {
        match (&self.prefixes, &self.prefix) {
            (Some(prefixes), _) if !prefixes.is_empty() => Ok(prefixes.clone()),
            (_, Some(prefix)) => Ok(vec![prefix.clone()]),
            _ => Err(TopologyError::MissingPrefixes {
                name: self.name.clone(),
            }),
        }
    }

    /// Resolve the origin URL the cache service pulls from.
    ///
    /// An explicit `endpoint` wins; otherwise `https://{prefix}` is derived
    /// from the first resolved prefix.
    pub fn resolve_endpoint(&self) -> Result<String> {
        if let Some(endpoint) = &self.endpoint {
            return Ok(endpoint.clone());
        }

        match self.resolve_prefixes() {
            Ok(prefixes) => Ok(format!("https://{}", prefixes[0])),
            Err(_) => Err(TopologyError::MissingEndpoint {
                name: self.name.clone(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes_take_precedence_over_legacy_prefix() {
        let upstream = UpstreamDescriptor::new("k8s", "Kubernetes")
            .with_prefix("k8s.gcr.io")
            .with_prefixes(["registry.k8s.io", "k8s.gcr.io"]);

        let prefixes = upstream.resolve_prefixes().expect("should resolve prefixes");
        assert_eq!(prefixes, vec!["registry.k8s.io", "k8s.gcr.io"]);
    }

    #[test]
    fn test_legacy_prefix_resolves_to_single_element() {
        let upstream = UpstreamDescriptor::new("ghcr", "GitHub").with_prefix("ghcr.io");

        assert_eq!(
            upstream.resolve_prefixes().expect("should resolve prefixes"),
            vec!["ghcr.io"]
        );
    }

    #[test]
    fn test_empty_prefixes_fall_back_to_prefix() {
        let upstream = UpstreamDescriptor::new("quay", "Quay")
            .with_prefixes(Vec::<String>::new())
            .with_prefix("quay.io");

        assert_eq!(
            upstream.resolve_prefixes().expect("should resolve prefixes"),
            vec!["quay.io"]
        );
    }

    #[test]
    fn test_missing_prefixes_is_reported() {
        let upstream =
            UpstreamDescriptor::new("private", "Private").with_endpoint("https://r.example.com");

        assert!(matches!(
            upstream.resolve_prefixes(),
            Err(TopologyError::MissingPrefixes { name }) if name == "private"
        ));
    }

    #[test]
    fn test_endpoint_derivation() {
        let explicit = UpstreamDescriptor::new("docker", "Docker Hub")
            .with_prefixes(["docker.io"])
            .with_endpoint("https://registry-1.docker.io");
        assert_eq!(
            explicit.resolve_endpoint().expect("should resolve endpoint"),
            "https://registry-1.docker.io"
        );

        let derived = UpstreamDescriptor::new("quay", "Quay").with_prefix("quay.io");
        assert_eq!(
            derived.resolve_endpoint().expect("should resolve endpoint"),
            "https://quay.io"
        );
    }

    #[test]
    fn test_missing_endpoint_is_fatal() {
        let upstream = UpstreamDescriptor::new("nowhere", "Nowhere");

        assert!(matches!(
            upstream.resolve_endpoint(),
            Err(TopologyError::MissingEndpoint { name }) if name == "nowhere"
        ));
    }

    #[test]
    fn test_deserialize_catalog_record() {
        let json = r#"{"name": "ghcr", "label": "GitHub", "prefix": "ghcr.io", "gallery": "https://github.com"}"#;
        let upstream: UpstreamDescriptor =
            serde_json::from_str(json).expect("should parse descriptor");

        assert_eq!(upstream.name(), "ghcr");
        assert_eq!(upstream.gallery(), Some("https://github.com"));
        assert_eq!(upstream.example_image(), DEFAULT_EXAMPLE_IMAGE);
    }
}
