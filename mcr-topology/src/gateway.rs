//! Entry-point service configuration

use crate::directive::{Directive, Rule};
use crate::error::{Result, TopologyError};
use tracing::debug;

/// Key of the entry-point service in the topology
pub const GATEWAY_SERVICE_NAME: &str = "gateway";

pub const DEFAULT_GATEWAY_IMAGE: &str = "docker.io/library/traefik:3.0";

/// Entry point that serves dashboard traffic when a dashboard port is set
pub const DASHBOARD_ENTRY_POINT: &str = "traefik-dashboard";

/// Service discovery needs at least one routable service on the gateway container
const DUMMY_SERVICE: &str = "dummyService";
const DUMMY_SERVICE_PORT: u16 = 1337;

const DASHBOARD_SERVICE: &str = "api@internal";
const DOCKER_SOCKET_VOLUME: &str = "/var/run/docker.sock:/var/run/docker.sock";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewaySettings {
    pub image: String,
    pub http_port: u16,
    pub https_port: Option<u16>,
    pub dashboard_port: Option<u16>,
    pub dashboard_domain: Option<String>,
    /// CIDRs or addresses whose forwarded headers are trusted
    pub trusted_proxies: Vec<String>,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            image: DEFAULT_GATEWAY_IMAGE.to_string(),
            http_port: 80,
            https_port: None,
            dashboard_port: None,
            dashboard_domain: None,
            trusted_proxies: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayService {
    pub image: String,
    pub ports: Vec<String>,
    pub volumes: Vec<String>,
    pub command: Vec<String>,
    pub directives: Vec<Directive>,
}

pub struct GatewayConfigurator<'a> {
    settings: &'a GatewaySettings,
}

impl<'a> GatewayConfigurator<'a> {
    pub fn new(settings: &'a GatewaySettings) -> Self {
        Self { settings }
    }

    pub fn configure(&self) -> Result<GatewayService> {
        let settings = self.settings;

        if let Some(port) = settings.https_port {
            return Err(TopologyError::UnsupportedFeature(format!(
                "TLS provisioning for HTTPS entry point on port {} is not implemented",
                port
            )));
        }

        let mut service = GatewayService {
            image: settings.image.clone(),
            ports: vec![format!("{}:{}", settings.http_port, settings.http_port)],
            volumes: vec![DOCKER_SOCKET_VOLUME.to_string()],
            command: vec![
                "--log.level=DEBUG".to_string(),
                "--accessLog=True".to_string(),
                "--providers.docker.exposedByDefault=false".to_string(),
                format!("--entryPoints.http.address=:{}", settings.http_port),
                "--entryPoints.http.asDefault=true".to_string(),
            ],
            directives: Vec::new(),
        };

        if !settings.trusted_proxies.is_empty() {
            service.command.push(format!(
                "--entryPoints.http.forwardedHeaders.trustedIPs={}",
                settings.trusted_proxies.join(",")
            ));
        }

        if let Some(port) = settings.dashboard_port {
            service.ports.push(format!("{}:{}", port, port));
        }

        if settings.dashboard_port.is_some() || settings.dashboard_domain.is_some() {
            service.command.push("--api.dashboard=true".to_string());
            service.directives.push(Directive::Enable);
            service.directives.push(Directive::ServicePort {
                service: DUMMY_SERVICE.to_string(),
                port: DUMMY_SERVICE_PORT,
            });
        }

        if let Some(port) = settings.dashboard_port {
            service.command.push(format!(
                "--entryPoints.{}.address=:{}",
                DASHBOARD_ENTRY_POINT, port
            ));
            service.directives.extend(dashboard_router(
                "traefik-dashboard-port",
                dashboard_paths(),
                DASHBOARD_ENTRY_POINT,
            ));
        }

        if let Some(domain) = &settings.dashboard_domain {
            service.directives.extend(dashboard_router(
                "traefik-dashboard-domain",
                Rule::host(domain).and(dashboard_paths()),
                "http",
            ));
        }

        debug!(
            http_port = settings.http_port,
            dashboard = settings.dashboard_port.is_some() || settings.dashboard_domain.is_some(),
            "Configured gateway"
        );

        Ok(service)
    }
}

fn dashboard_paths() -> Rule {
    Rule::path_prefix("/api").or(Rule::path_prefix("/dashboard"))
}

fn dashboard_router(router: &str, rule: Rule, entry_point: &str) -> Vec<Directive> {
    vec![
        Directive::RouterService {
            router: router.to_string(),
            service: DASHBOARD_SERVICE.to_string(),
        },
        Directive::RouterRule {
            router: router.to_string(),
            rule,
        },
        Directive::RouterEntryPoints {
            router: router.to_string(),
            entry_points: vec![entry_point.to_string()],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directive::render_labels;

    #[test]
    fn test_default_gateway() {
        let settings = GatewaySettings {
            http_port: 8080,
            ..Default::default()
        };
        let gateway = GatewayConfigurator::new(&settings)
            .configure()
            .expect("should configure gateway");

        assert_eq!(gateway.ports, vec!["8080:8080"]);
        assert!(gateway.command.contains(&"--entryPoints.http.address=:8080".to_string()));
        assert!(gateway.command.contains(&"--accessLog=True".to_string()));
        assert!(gateway
            .command
            .contains(&"--providers.docker.exposedByDefault=false".to_string()));
        assert!(gateway.directives.is_empty());
        assert!(!gateway.command.iter().any(|c| c.contains("trustedIPs")));
    }

    // Trusted proxies are comma separated. Plain concatenation would merge
    // `10.0.0.0/8` and `172.16.0.0/12` into one unparseable value.
    #[test]
    fn test_trusted_proxies_are_comma_separated() {
        let settings = GatewaySettings {
            trusted_proxies: vec!["10.0.0.0/8".to_string(), "172.16.0.0/12".to_string()],
            ..Default::default()
        };
        let gateway = GatewayConfigurator::new(&settings)
            .configure()
            .expect("should configure gateway");

        assert!(gateway.command.contains(
            &"--entryPoints.http.forwardedHeaders.trustedIPs=10.0.0.0/8,172.16.0.0/12".to_string()
        ));
    }

    #[test]
    fn test_https_is_unsupported() {
        let settings = GatewaySettings {
            https_port: Some(443),
            ..Default::default()
        };
        let err = GatewayConfigurator::new(&settings)
            .configure()
            .expect_err("https should fail");

        assert!(matches!(err, TopologyError::UnsupportedFeature(_)));
    }

    #[test]
    fn test_dashboard_port() {
        let settings = GatewaySettings {
            http_port: 8080,
            dashboard_port: Some(8081),
            ..Default::default()
        };
        let gateway = GatewayConfigurator::new(&settings)
            .configure()
            .expect("should configure gateway");

        assert_eq!(gateway.ports, vec!["8080:8080", "8081:8081"]);
        assert!(gateway.command.contains(&"--api.dashboard=true".to_string()));
        assert!(gateway
            .command
            .contains(&"--entryPoints.traefik-dashboard.address=:8081".to_string()));

        let labels = render_labels(&gateway.directives);
        assert_eq!(
            labels,
            vec![
                "traefik.enable=true",
                "traefik.http.services.dummyService.loadBalancer.server.port=1337",
                "traefik.http.routers.traefik-dashboard-port.service=api@internal",
                "traefik.http.routers.traefik-dashboard-port.rule=PathPrefix(`/api`) || PathPrefix(`/dashboard`)",
                "traefik.http.routers.traefik-dashboard-port.entrypoints=traefik-dashboard",
            ]
        );
    }

    #[test]
    fn test_dashboard_domain_only() {
        let settings = GatewaySettings {
            dashboard_domain: Some("traefik.example.com".to_string()),
            ..Default::default()
        };
        let gateway = GatewayConfigurator::new(&settings)
            .configure()
            .expect("should configure gateway");

        assert_eq!(gateway.ports, vec!["80:80"]);
        let labels = render_labels(&gateway.directives);
        assert!(labels.contains(
            &"traefik.http.routers.traefik-dashboard-domain.rule=Host(`traefik.example.com`) && (PathPrefix(`/api`) || PathPrefix(`/dashboard`))".to_string()
        ));
        assert!(labels.contains(
            &"traefik.http.routers.traefik-dashboard-domain.entrypoints=http".to_string()
        ));
        assert!(!labels.iter().any(|l| l.contains("traefik-dashboard-port")));
    }
}
