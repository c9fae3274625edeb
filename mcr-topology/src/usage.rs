//! Usage documentation for the mirrors
//!
//! Entries are derived from the [`RoutingDecision`] of each compiled registry,
//! never from the raw descriptor, so the page only documents routes that exist.

use crate::compiler::{RouteKind, RoutingDecision};
use crate::descriptor::UpstreamDescriptor;
use crate::error::{Result, TopologyError};
use serde::Serialize;
use tera::{Context as TeraContext, Tera};

/// Upstream that clients reach without writing any registry prefix
pub const DEFAULT_UPSTREAM: &str = "docker";

/// Shorthand references for the default upstream: (as typed, canonical repository path)
pub const DEFAULT_UPSTREAM_SHORTHANDS: [(&str, &str); 2] = [
    ("alpine:latest", "library/alpine:latest"),
    ("foo/bar:latest", "foo/bar:latest"),
];

const USAGE_TEMPLATE_NAME: &str = "usage.html";
const DEFAULT_USAGE_TEMPLATE: &str = include_str!("templates/usage.html.tera");

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsageEntry {
    pub registry: String,
    pub label: String,
    pub kind: RouteKind,
    /// Reference as written against the real upstream
    pub source_example: String,
    /// The same reference written against the mirror
    pub rewritten_example: String,
}

#[derive(Debug, Clone, Serialize)]
struct UsageSection {
    registry: String,
    label: String,
    gallery: Option<String>,
    endpoint: String,
    entries: Vec<UsageEntry>,
}

pub struct UsageIndexBuilder {
    gateway: String,
    template: String,
    sections: Vec<UsageSection>,
}

impl UsageIndexBuilder {
    pub fn new(gateway: impl Into<String>) -> Self {
        Self {
            gateway: gateway.into(),
            template: DEFAULT_USAGE_TEMPLATE.to_string(),
            sections: Vec::new(),
        }
    }

    /// Replace the built-in page template
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Record the entries for one compiled registry
    pub fn record(&mut self, upstream: &UpstreamDescriptor, decision: &RoutingDecision) {
        let image = upstream.example_image();
        let label = upstream.label();
        let is_default = upstream.name() == DEFAULT_UPSTREAM;
        let mut entries = Vec::new();

        let entry = |kind, source: String, rewritten: String| UsageEntry {
            registry: decision.registry.clone(),
            label: label.to_string(),
            kind,
            source_example: source,
            rewritten_example: rewritten,
        };

        for prefix in &decision.prefix_routes {
            entries.push(entry(
                RouteKind::Prefix,
                format!("{}/{}", prefix, image),
                format!("{}/{}/{}", self.gateway, prefix, image),
            ));
        }
        if is_default {
            if let Some(prefix) = decision.prefix_routes.first() {
                for (typed, canonical) in DEFAULT_UPSTREAM_SHORTHANDS {
                    entries.push(entry(
                        RouteKind::Prefix,
                        typed.to_string(),
                        format!("{}/{}/{}", self.gateway, prefix, canonical),
                    ));
                }
            }
        }

        let source_prefix = source_prefix(decision);
        for domain in &decision.domain_routes {
            entries.push(entry(
                RouteKind::Domain,
                format!("{}/{}", source_prefix, image),
                format!("{}/{}", domain, image),
            ));
        }
        if is_default {
            if let Some(domain) = decision.domain_routes.first() {
                for (typed, canonical) in DEFAULT_UPSTREAM_SHORTHANDS {
                    entries.push(entry(
                        RouteKind::Domain,
                        typed.to_string(),
                        format!("{}/{}", domain, canonical),
                    ));
                }
            }
        }

        self.sections.push(UsageSection {
            registry: decision.registry.clone(),
            label: label.to_string(),
            gallery: upstream.gallery().map(str::to_string),
            endpoint: decision.endpoint.clone(),
            entries,
        });
    }

    pub fn entries(&self) -> Vec<UsageEntry> {
        self.sections
            .iter()
            .flat_map(|section| section.entries.iter().cloned())
            .collect()
    }

    pub fn render(&self) -> Result<String> {
        let mut tera = Tera::default();
        tera.add_raw_template(USAGE_TEMPLATE_NAME, &self.template)
            .map_err(|e| TopologyError::DocumentationRender(e.to_string()))?;

        let mut context = TeraContext::new();
        context.insert("gateway", &self.gateway);
        context.insert("sections", &self.sections);

        tera.render(USAGE_TEMPLATE_NAME, &context)
            .map_err(|e| TopologyError::DocumentationRender(e.to_string()))
    }
}

/// Prefix a user would type for the upstream; the endpoint host when no prefix exists
fn source_prefix(decision: &RoutingDecision) -> String {
    if let Some(prefix) = decision.prefixes.first() {
        return prefix.clone();
    }
    url::Url::parse(&decision.endpoint)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| decision.endpoint.clone())
}
