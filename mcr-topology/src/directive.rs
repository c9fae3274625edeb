//! Typed routing directives
//!
//! The gateway is configured through container labels. Directives are kept as
//! structured values while the topology is built and only rendered to label
//! strings when the compose document is produced.

use std::fmt::{self, Display, Formatter};

/// Root of every label the gateway reads
pub const LABEL_NAMESPACE: &str = "traefik";

/// Boolean expression over request predicates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rule {
    Host(String),
    Path(String),
    PathPrefix(String),
    And(Vec<Rule>),
    Or(Vec<Rule>),
}

impl Rule {
    pub fn host(host: impl Into<String>) -> Self {
        Rule::Host(host.into())
    }

    pub fn path(path: impl Into<String>) -> Self {
        Rule::Path(path.into())
    }

    pub fn path_prefix(prefix: impl Into<String>) -> Self {
        Rule::PathPrefix(prefix.into())
    }

    /// Conjunction of `self` and `other`, flattening nested conjunctions
    pub fn and(self, other: Rule) -> Self {
        let mut terms = match self {
            Rule::And(terms) => terms,
            rule => vec![rule],
        };
        terms.push(other);
        Rule::And(terms)
    }

    /// Disjunction of `self` and `other`, flattening nested disjunctions
    pub fn or(self, other: Rule) -> Self {
        let mut terms = match self {
            Rule::Or(terms) => terms,
            rule => vec![rule],
        };
        terms.push(other);
        Rule::Or(terms)
    }

    fn fmt_joined(f: &mut Formatter<'_>, terms: &[Rule], op: &str) -> fmt::Result {
        for (i, term) in terms.iter().enumerate() {
            if i > 0 {
                write!(f, " {} ", op)?;
            }
            match term {
                Rule::And(_) | Rule::Or(_) => write!(f, "({})", term)?,
                _ => write!(f, "{}", term)?,
            }
        }
        Ok(())
    }
}

impl Display for Rule {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Host(host) => write!(f, "Host(`{}`)", host),
            Rule::Path(path) => write!(f, "Path(`{}`)", path),
            Rule::PathPrefix(prefix) => write!(f, "PathPrefix(`{}`)", prefix),
            Rule::And(terms) => Self::fmt_joined(f, terms, "&&"),
            Rule::Or(terms) => Self::fmt_joined(f, terms, "||"),
        }
    }
}

/// Request transformation attached to a router
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Middleware {
    StripPrefix { prefixes: Vec<String> },
    AddPrefix { prefix: String },
    RedirectRegex { regex: String, replacement: String },
}

/// One routing or middleware binding understood by the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Opt the container into gateway discovery
    Enable,
    ServicePort {
        service: String,
        port: u16,
    },
    Middleware {
        name: String,
        middleware: Middleware,
    },
    RouterRule {
        router: String,
        rule: Rule,
    },
    RouterService {
        router: String,
        service: String,
    },
    RouterMiddlewares {
        router: String,
        middlewares: Vec<String>,
    },
    RouterEntryPoints {
        router: String,
        entry_points: Vec<String>,
    },
}

impl Directive {
    /// Render to `key=value` label strings. Redirects expand to two labels.
    pub fn labels(&self) -> Vec<String> {
        let http = format!("{}.http", LABEL_NAMESPACE);
        match self {
            Directive::Enable => vec![format!("{}.enable=true", LABEL_NAMESPACE)],
            Directive::ServicePort { service, port } => vec![format!(
                "{}.services.{}.loadBalancer.server.port={}",
                http, service, port
            )],
            Directive::Middleware { name, middleware } => match middleware {
                Middleware::StripPrefix { prefixes } => vec![format!(
                    "{}.middlewares.{}.stripPrefix.prefixes={}",
                    http,
                    name,
                    prefixes.join(",")
                )],
                Middleware::AddPrefix { prefix } => vec![format!(
                    "{}.middlewares.{}.addPrefix.prefix={}",
                    http, name, prefix
                )],
                Middleware::RedirectRegex { regex, replacement } => vec![
                    format!("{}.middlewares.{}.redirectregex.regex={}", http, name, regex),
                    format!(
                        "{}.middlewares.{}.redirectregex.replacement={}",
                        http, name, replacement
                    ),
                ],
            },
            Directive::RouterRule { router, rule } => {
                vec![format!("{}.routers.{}.rule={}", http, router, rule)]
            }
            Directive::RouterService { router, service } => {
                vec![format!("{}.routers.{}.service={}", http, router, service)]
            }
            Directive::RouterMiddlewares {
                router,
                middlewares,
            } => vec![format!(
                "{}.routers.{}.middlewares={}",
                http,
                router,
                middlewares.join(",")
            )],
            Directive::RouterEntryPoints {
                router,
                entry_points,
            } => vec![format!(
                "{}.routers.{}.entrypoints={}",
                http,
                router,
                entry_points.join(",")
            )],
        }
    }
}

/// Render a directive sequence to labels, preserving order
pub fn render_labels(directives: &[Directive]) -> Vec<String> {
    directives.iter().flat_map(Directive::labels).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_precedence_rendering() {
        let rule = Rule::host("dash.example.com")
            .and(Rule::path_prefix("/api").or(Rule::path_prefix("/dashboard")));

        assert_eq!(
            rule.to_string(),
            "Host(`dash.example.com`) && (PathPrefix(`/api`) || PathPrefix(`/dashboard`))"
        );
    }

    #[test]
    fn test_top_level_disjunction_is_not_wrapped() {
        let rule = Rule::path_prefix("/api").or(Rule::path_prefix("/dashboard"));
        assert_eq!(rule.to_string(), "PathPrefix(`/api`) || PathPrefix(`/dashboard`)");
    }

    #[test]
    fn test_and_flattens() {
        let rule = Rule::host("a").and(Rule::path("/")).and(Rule::path_prefix("/b"));
        assert!(matches!(&rule, Rule::And(terms) if terms.len() == 3));
    }

    #[test]
    fn test_middleware_labels() {
        let strip = Directive::Middleware {
            name: "registry-docker-0-strip".to_string(),
            middleware: Middleware::StripPrefix {
                prefixes: vec!["/v2/docker.io".to_string()],
            },
        };
        assert_eq!(
            strip.labels(),
            vec!["traefik.http.middlewares.registry-docker-0-strip.stripPrefix.prefixes=/v2/docker.io"]
        );

        let redirect = Directive::Middleware {
            name: "home".to_string(),
            middleware: Middleware::RedirectRegex {
                regex: "^a$".to_string(),
                replacement: "b".to_string(),
            },
        };
        let labels = redirect.labels();
        assert_eq!(labels.len(), 2);
        assert!(labels[0].ends_with("redirectregex.regex=^a$"));
        assert!(labels[1].ends_with("redirectregex.replacement=b"));
    }

    #[test]
    fn test_render_labels_keeps_order() {
        let directives = vec![
            Directive::Enable,
            Directive::ServicePort {
                service: "registry-quay".to_string(),
                port: 5000,
            },
            Directive::RouterMiddlewares {
                router: "r".to_string(),
                middlewares: vec!["a".to_string(), "b".to_string()],
            },
        ];

        assert_eq!(
            render_labels(&directives),
            vec![
                "traefik.enable=true",
                "traefik.http.services.registry-quay.loadBalancer.server.port=5000",
                "traefik.http.routers.r.middlewares=a,b",
            ]
        );
    }
}
