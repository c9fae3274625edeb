//! Compose document model and writer

use crate::assembler::{Topology, USAGE_SERVICE_NAME};
use crate::directive::{render_labels, Directive};
use crate::error::Result;
use crate::gateway::GATEWAY_SERVICE_NAME;
use indexmap::IndexMap;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::info;

pub const COMPOSE_FILE_NAME: &str = "compose.yaml";

const RESTART_POLICY: &str = "unless-stopped";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposeFile {
    pub name: String,
    pub services: IndexMap<String, ComposeService>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposeService {
    pub image: String,
    pub restart: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ports: Vec<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub environment: IndexMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub volumes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub labels: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
}

impl ComposeService {
    fn new(image: &str) -> Self {
        Self {
            image: image.to_string(),
            restart: RESTART_POLICY.to_string(),
            hostname: None,
            ports: Vec::new(),
            environment: IndexMap::new(),
            volumes: Vec::new(),
            labels: Vec::new(),
            command: Vec::new(),
        }
    }
}

impl Topology {
    /// Render the topology into the compose document, directives become labels here
    pub fn to_compose(&self) -> ComposeFile {
        let mut services = IndexMap::new();

        let gateway = &self.gateway;
        services.insert(
            GATEWAY_SERVICE_NAME.to_string(),
            ComposeService {
                ports: gateway.ports.clone(),
                volumes: gateway.volumes.clone(),
                labels: compose_labels(&gateway.directives),
                command: gateway.command.clone(),
                ..ComposeService::new(&gateway.image)
            },
        );

        for (name, service) in &self.services {
            services.insert(
                name.clone(),
                ComposeService {
                    hostname: Some(service.hostname.clone()),
                    environment: service.environment.clone(),
                    volumes: service.volumes.clone(),
                    labels: compose_labels(&service.directives),
                    ..ComposeService::new(&service.image)
                },
            );
        }

        if let Some(site) = &self.usage_service {
            services.insert(
                USAGE_SERVICE_NAME.to_string(),
                ComposeService {
                    volumes: site.volumes.clone(),
                    labels: compose_labels(&site.directives),
                    ..ComposeService::new(&site.image)
                },
            );
        }

        ComposeFile {
            name: self.project_name.clone(),
            services,
        }
    }

    /// Auxiliary files keyed by output-relative path
    pub fn extra_files(&self) -> IndexMap<String, String> {
        self.documentation
            .iter()
            .map(|doc| (doc.path.clone(), doc.content.clone()))
            .collect()
    }
}

/// Labels as compose expects them, `$` doubled so interpolation leaves them alone
fn compose_labels(directives: &[Directive]) -> Vec<String> {
    render_labels(directives)
        .into_iter()
        .map(|label| label.replace('$', "$$"))
        .collect()
}

/// Write `compose.yaml` and every auxiliary file below `root_dir`
pub fn write_topology(topology: &Topology, root_dir: &Path) -> Result<()> {
    fs::create_dir_all(root_dir)?;

    for (path, content) in topology.extra_files() {
        let file_path = root_dir.join(&path);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&file_path, content)?;
    }

    let compose = serde_yaml_ng::to_string(&topology.to_compose())?;
    let compose_path = root_dir.join(COMPOSE_FILE_NAME);
    fs::write(&compose_path, compose)?;

    info!(path = %compose_path.display(), "Wrote compose file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::Middleware;

    #[test]
    fn test_compose_labels_escape_interpolation() {
        let directives = vec![
            Directive::Enable,
            Directive::Middleware {
                name: "home".to_string(),
                middleware: Middleware::RedirectRegex {
                    regex: "^(https?)://a\\.example\\.com(:\\d+)?/?$".to_string(),
                    replacement: "${1}://example.com${2}/".to_string(),
                },
            },
        ];

        let labels = compose_labels(&directives);
        assert_eq!(labels[0], "traefik.enable=true");
        assert!(labels.contains(
            &"traefik.http.middlewares.home.redirectregex.regex=^(https?)://a\\.example\\.com(:\\d+)?/?$$".to_string()
        ));
        assert!(labels.contains(
            &"traefik.http.middlewares.home.redirectregex.replacement=$${1}://example.com$${2}/".to_string()
        ));
    }
}
