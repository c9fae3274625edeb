//! Route compilation
//!
//! [`RouteCompiler`] turns one upstream descriptor into a cache service plus the
//! routers that reach it. Prefix mode routes `{gateway}/v2/{prefix}/...` to the
//! cache, domain mode routes a dedicated hostname. Both modes are additive and
//! share the one service definition.
//!
//! Route identifiers come from a counter owned by the compiler instance, so
//! every compiler starts at zero and ids never leak between builds.

use crate::descriptor::UpstreamDescriptor;
use crate::directive::{Directive, Middleware, Rule};
use crate::error::{Result, TopologyError};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Port every cache service listens on inside its container
pub const CACHE_SERVICE_PORT: u16 = 5000;

/// Storage root inside the cache container
pub const STORAGE_ROOT: &str = "/var/lib/registry";

/// Registry protocol API root
pub const REGISTRY_API_ROOT: &str = "/v2";

pub const ENV_STORAGE_ROOT: &str = "REGISTRY_STORAGE_FILESYSTEM_ROOTDIRECTORY";
pub const ENV_REMOTE_URL: &str = "REGISTRY_PROXY_REMOTEURL";
pub const ENV_HTTP_ADDR: &str = "REGISTRY_HTTP_ADDR";

pub const DEFAULT_REGISTRY_IMAGE: &str = "docker.io/library/registry:2.8";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteKind {
    Prefix,
    Domain,
}

/// One router bound to a cache service
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteEntry {
    pub kind: RouteKind,
    /// Path prefix for prefix routes, hostname for domain routes
    pub match_value: String,
    pub service_name: String,
    pub route_id: u32,
}

impl RouteEntry {
    /// Router name used in directives, `{service}-{id}`
    pub fn router_name(&self) -> String {
        format!("{}-{}", self.service_name, self.route_id)
    }
}

/// Which routing schemes are active for a build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingModes {
    /// `docker.io/library/alpine` -> `m.example.com/docker.io/library/alpine`
    pub prefix_mode: bool,
    /// `docker.io/library/alpine` -> `docker.m.example.com/library/alpine`
    pub domain_mode: bool,
    /// Domain-root redirects always target `https://` instead of keeping the scheme
    pub force_https_redirect: bool,
}

impl Default for RoutingModes {
    fn default() -> Self {
        Self {
            prefix_mode: true,
            domain_mode: true,
            force_https_redirect: false,
        }
    }
}

/// Settings shared by every cache service in a build
#[derive(Debug, Clone, Default)]
pub struct CacheServiceSettings {
    pub image: String,
    /// Passthrough variables such as outbound proxy settings
    pub extra_env: IndexMap<String, String>,
    /// Applied last; the only way to replace the storage root or remote URL
    pub env_overrides: IndexMap<String, String>,
    pub listen_address: Option<String>,
}

impl CacheServiceSettings {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Default::default()
        }
    }
}

/// Caching registry fronting one upstream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheServiceDefinition {
    pub service_name: String,
    pub hostname: String,
    pub image: String,
    pub environment: IndexMap<String, String>,
    pub volumes: Vec<String>,
    pub directives: Vec<Directive>,
    pub exposed_port: u16,
}

/// The routing choices made for one registry, consumed by the usage index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    /// Registration name
    pub registry: String,
    pub service_name: String,
    pub endpoint: String,
    /// Resolved prefixes, whether or not prefix mode is active
    pub prefixes: Vec<String>,
    /// Prefixes that received a prefix-mode router
    pub prefix_routes: Vec<String>,
    /// Hostnames that received a domain-mode router
    pub domain_routes: Vec<String>,
}

/// Everything produced for one registration
#[derive(Debug, Clone)]
pub struct CompiledRegistry {
    pub service: CacheServiceDefinition,
    pub routes: Vec<RouteEntry>,
    pub decision: RoutingDecision,
}

pub fn service_name_for(name: &str) -> String {
    format!("registry-{}", name)
}

pub struct RouteCompiler {
    gateway: String,
    modes: RoutingModes,
    settings: CacheServiceSettings,
    next_route_id: u32,
    registered: HashSet<String>,
}

impl RouteCompiler {
    pub fn new(gateway: impl Into<String>, modes: RoutingModes, settings: CacheServiceSettings) -> Self {
        Self {
            gateway: gateway.into(),
            modes,
            settings,
            next_route_id: 0,
            registered: HashSet::new(),
        }
    }

    /// Compile one registration.
    ///
    /// `domains` overrides the default `{name}.{gateway}` host in domain mode.
    /// Nothing is recorded and no route id is consumed when this fails.
    pub fn compile(
        &mut self,
        name: &str,
        upstream: &UpstreamDescriptor,
        domains: Option<&[String]>,
    ) -> Result<CompiledRegistry> {
        if self.registered.contains(name) {
            return Err(TopologyError::DuplicateRegistry {
                name: name.to_string(),
            });
        }

        let endpoint = upstream.resolve_endpoint()?;
        let prefixes = match upstream.resolve_prefixes() {
            Ok(prefixes) => prefixes,
            Err(err @ TopologyError::MissingPrefixes { .. }) => {
                warn!(registry = %name, "{}; prefix routes skipped", err);
                Vec::new()
            }
            Err(err) => return Err(err),
        };

        let mut service = self.cache_service(name, &endpoint);
        let mut routes = Vec::new();
        let mut decision = RoutingDecision {
            registry: name.to_string(),
            service_name: service.service_name.clone(),
            endpoint,
            prefixes: prefixes.clone(),
            prefix_routes: Vec::new(),
            domain_routes: Vec::new(),
        };

        if self.modes.prefix_mode {
            for prefix in &prefixes {
                let route = self.allocate(RouteKind::Prefix, prefix, &service.service_name);
                service.directives.extend(self.prefix_directives(&route));
                decision.prefix_routes.push(prefix.clone());
                routes.push(route);
            }
        }

        if self.modes.domain_mode {
            let domains = match domains {
                Some(domains) => domains.to_vec(),
                None => vec![format!("{}.{}", name, self.gateway)],
            };
            for domain in domains {
                let route = self.allocate(RouteKind::Domain, &domain, &service.service_name);
                service.directives.extend(self.domain_directives(&route));
                decision.domain_routes.push(domain);
                routes.push(route);
            }
        }

        self.registered.insert(name.to_string());
        info!(
            registry = %name,
            service = %service.service_name,
            routes = routes.len(),
            "Compiled registry"
        );

        Ok(CompiledRegistry {
            service,
            routes,
            decision,
        })
    }

    fn allocate(&mut self, kind: RouteKind, match_value: &str, service_name: &str) -> RouteEntry {
        let route_id = self.next_route_id;
        self.next_route_id += 1;
        debug!(route_id, ?kind, match_value, service = service_name, "Allocated route");

        RouteEntry {
            kind,
            match_value: match_value.to_string(),
            service_name: service_name.to_string(),
            route_id,
        }
    }

    fn cache_service(&self, name: &str, endpoint: &str) -> CacheServiceDefinition {
        let service_name = service_name_for(name);

        let mut environment = self.settings.extra_env.clone();
        environment.insert(ENV_STORAGE_ROOT.to_string(), STORAGE_ROOT.to_string());
        environment.insert(ENV_REMOTE_URL.to_string(), endpoint.to_string());
        if let Some(addr) = &self.settings.listen_address {
            environment.insert(ENV_HTTP_ADDR.to_string(), addr.clone());
        }
        for (key, value) in &self.settings.env_overrides {
            environment.insert(key.clone(), value.clone());
        }

        CacheServiceDefinition {
            hostname: format!("{}.registry.internal", name),
            image: self.settings.image.clone(),
            environment,
            volumes: vec![format!("./cache/{}:{}:rw", name, STORAGE_ROOT)],
            directives: vec![
                Directive::Enable,
                Directive::ServicePort {
                    service: service_name.clone(),
                    port: CACHE_SERVICE_PORT,
                },
            ],
            exposed_port: CACHE_SERVICE_PORT,
            service_name,
        }
    }

    /// strip `/v2/{prefix}`, add `/v2` back, route gateway host + prefix to the cache
    fn prefix_directives(&self, route: &RouteEntry) -> Vec<Directive> {
        let router = route.router_name();
        let strip = format!("{}-strip", router);
        let add = format!("{}-add", router);
        let prefix = &route.match_value;

        vec![
            Directive::Middleware {
                name: strip.clone(),
                middleware: Middleware::StripPrefix {
                    prefixes: vec![format!("{}/{}", REGISTRY_API_ROOT, prefix)],
                },
            },
            Directive::Middleware {
                name: add.clone(),
                middleware: Middleware::AddPrefix {
                    prefix: REGISTRY_API_ROOT.to_string(),
                },
            },
            Directive::RouterRule {
                router: router.clone(),
                rule: Rule::host(&self.gateway)
                    .and(Rule::path_prefix(format!("{}/{}/", REGISTRY_API_ROOT, prefix))),
            },
            Directive::RouterService {
                router: router.clone(),
                service: route.service_name.clone(),
            },
            Directive::RouterMiddlewares {
                router,
                middlewares: vec![strip, add],
            },
        ]
    }

    /// bare `{domain}/` redirects to the gateway root, everything else reaches the cache
    fn domain_directives(&self, route: &RouteEntry) -> Vec<Directive> {
        let router = route.router_name();
        let home = format!("{}-home", router);
        let domain = regex::escape(&route.match_value);

        // Optional port is carried through to the gateway
        let (regex, replacement) = if self.modes.force_https_redirect {
            (
                format!("^https?://{}(:\\d+)?/?$", domain),
                format!("https://{}${{1}}/", self.gateway),
            )
        } else {
            (
                format!("^(https?)://{}(:\\d+)?/?$", domain),
                format!("${{1}}://{}${{2}}/", self.gateway),
            )
        };

        vec![
            Directive::Middleware {
                name: home.clone(),
                middleware: Middleware::RedirectRegex { regex, replacement },
            },
            Directive::RouterRule {
                router: router.clone(),
                rule: Rule::host(&route.match_value),
            },
            Directive::RouterService {
                router: router.clone(),
                service: route.service_name.clone(),
            },
            Directive::RouterMiddlewares {
                router,
                middlewares: vec![home],
            },
        ]
    }
}
