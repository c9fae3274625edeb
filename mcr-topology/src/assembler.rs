//! Topology assembly
//!
//! Merges the gateway, the compiled cache services and the usage page into one
//! [`Topology`]. No files are written here; see [`crate::compose::write_topology`].

use crate::compiler::{CacheServiceDefinition, CompiledRegistry, RouteEntry};
use crate::directive::{Directive, Rule};
use crate::error::{Result, TopologyError};
use crate::gateway::{GatewayService, GATEWAY_SERVICE_NAME};
use crate::usage::{UsageEntry, UsageIndexBuilder};
use indexmap::IndexMap;
use tracing::{info, warn};

/// Key of the static site serving the usage page
pub const USAGE_SERVICE_NAME: &str = "usage";

/// Output-relative path of the rendered usage page
pub const USAGE_PAGE_PATH: &str = "usage/index.html";

pub const DEFAULT_USAGE_PAGE_IMAGE: &str = "docker.io/library/nginx:alpine";

const USAGE_PAGE_MOUNT: &str = "/usr/share/nginx/html/index.html";
const USAGE_SERVICE_PORT: u16 = 80;
const USAGE_ROUTER: &str = "usage-page";

/// An auxiliary file produced alongside the compose document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    /// Path relative to the output directory
    pub path: String,
    pub content: String,
}

/// Static file server for the rendered usage page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticSiteService {
    pub image: String,
    pub volumes: Vec<String>,
    pub directives: Vec<Directive>,
}

#[derive(Debug, Clone)]
pub struct Topology {
    pub project_name: String,
    pub gateway: GatewayService,
    /// Cache services keyed by service name, in registration order
    pub services: IndexMap<String, CacheServiceDefinition>,
    /// Every route in allocation order
    pub routes: Vec<RouteEntry>,
    pub usage: Vec<UsageEntry>,
    pub documentation: Option<RenderedDocument>,
    pub usage_service: Option<StaticSiteService>,
}

impl Topology {
    pub fn routes_for(&self, service_name: &str) -> impl Iterator<Item = &RouteEntry> {
        let service_name = service_name.to_string();
        self.routes
            .iter()
            .filter(move |route| route.service_name == service_name)
    }
}

pub struct TopologyAssembler {
    project_name: String,
    gateway_host: String,
    usage_page_image: String,
}

impl TopologyAssembler {
    pub fn new(
        project_name: impl Into<String>,
        gateway_host: impl Into<String>,
        usage_page_image: impl Into<String>,
    ) -> Self {
        Self {
            project_name: project_name.into(),
            gateway_host: gateway_host.into(),
            usage_page_image: usage_page_image.into(),
        }
    }

    pub fn assemble(
        self,
        gateway: GatewayService,
        registries: Vec<CompiledRegistry>,
        usage: &UsageIndexBuilder,
    ) -> Result<Topology> {
        let mut services = IndexMap::new();
        let mut routes = Vec::new();

        for compiled in registries {
            let key = compiled.service.service_name.clone();
            if key == GATEWAY_SERVICE_NAME || key == USAGE_SERVICE_NAME || services.contains_key(&key) {
                return Err(TopologyError::DuplicateRegistry {
                    name: compiled.decision.registry,
                });
            }
            routes.extend(compiled.routes);
            services.insert(key, compiled.service);
        }

        let documentation = match usage.render() {
            Ok(content) => Some(RenderedDocument {
                path: USAGE_PAGE_PATH.to_string(),
                content,
            }),
            Err(err) => {
                warn!("{}; usage page omitted", err);
                None
            }
        };
        let usage_service = documentation.as_ref().map(|doc| self.usage_service(doc));

        info!(
            project = %self.project_name,
            services = services.len(),
            routes = routes.len(),
            documentation = documentation.is_some(),
            "Assembled topology"
        );

        Ok(Topology {
            project_name: self.project_name,
            gateway,
            services,
            routes,
            usage: usage.entries(),
            documentation,
            usage_service,
        })
    }

    fn usage_service(&self, doc: &RenderedDocument) -> StaticSiteService {
        StaticSiteService {
            image: self.usage_page_image.clone(),
            volumes: vec![format!("./{}:{}:ro", doc.path, USAGE_PAGE_MOUNT)],
            directives: vec![
                Directive::Enable,
                Directive::ServicePort {
                    service: USAGE_SERVICE_NAME.to_string(),
                    port: USAGE_SERVICE_PORT,
                },
                Directive::RouterRule {
                    router: USAGE_ROUTER.to_string(),
                    rule: Rule::host(&self.gateway_host).and(Rule::path("/")),
                },
                Directive::RouterService {
                    router: USAGE_ROUTER.to_string(),
                    service: USAGE_SERVICE_NAME.to_string(),
                },
            ],
        }
    }
}
