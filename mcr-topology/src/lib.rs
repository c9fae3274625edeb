//! # MCR Topology
//!
//! Compiles a list of upstream image registries into a caching reverse-proxy
//! topology: one pull-through cache per registry, gateway routers that reach
//! each cache, and a usage page documenting the mirrored references.
//!
//! ## Architecture
//!
//! ```text
//! client → gateway (traefik) ─┬─ Host(m.example.com) && PathPrefix(/v2/docker.io/) ─┐
//!                             └─ Host(docker.m.example.com) ────────────────────────┴→ registry-docker (registry:2)
//!                                                                                          ↓ (on cache miss)
//!                                                                                   registry-1.docker.io
//! ```
//!
//! ## Usage
//!
//! ```rust,no_run
//! use mcr_topology::{write_topology, Catalog, TopologyBuilder};
//! use std::path::Path;
//!
//! # fn example() -> mcr_topology::Result<()> {
//! let mut builder = TopologyBuilder::new("m.example.com")?.with_catalog(Catalog::builtin()?);
//! builder.add_known_registry_bulk(&["docker", "ghcr", "quay", "k8s"])?;
//! let topology = builder.build()?;
//! write_topology(&topology, Path::new("./generated"))?;
//! # Ok(())
//! # }
//! ```

pub mod assembler;
pub mod builder;
pub mod catalog;
pub mod compiler;
pub mod compose;
pub mod config;
pub mod descriptor;
pub mod directive;
pub mod error;
pub mod gateway;
pub mod usage;

// Re-export main types
pub use assembler::{RenderedDocument, Topology, TopologyAssembler};
pub use builder::TopologyBuilder;
pub use catalog::Catalog;
pub use compiler::{
    CacheServiceDefinition, CacheServiceSettings, RouteCompiler, RouteEntry, RouteKind,
    RoutingDecision, RoutingModes,
};
pub use config::{MirrorConfig, RegistrationConfig};
pub use descriptor::UpstreamDescriptor;
pub use directive::{Directive, Middleware, Rule};
pub use error::{Result, TopologyError};
pub use gateway::{GatewayConfigurator, GatewayService, GatewaySettings};
pub use usage::{UsageEntry, UsageIndexBuilder};

// Re-export the writer
pub use compose::{write_topology, ComposeFile, ComposeService};
