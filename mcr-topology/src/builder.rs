//! One-shot topology builds
//!
//! A [`TopologyBuilder`] owns every piece of accumulating state for a single
//! build: the route compiler with its id counter, the usage index and the
//! compiled registries. `build` consumes it, so state never outlives the build.

use crate::assembler::{Topology, TopologyAssembler};
use crate::catalog::Catalog;
use crate::compiler::{CompiledRegistry, RouteCompiler};
use crate::config::MirrorConfig;
use crate::descriptor::UpstreamDescriptor;
use crate::error::Result;
use crate::gateway::GatewayConfigurator;
use crate::usage::UsageIndexBuilder;
use tracing::info_span;

pub struct TopologyBuilder {
    config: MirrorConfig,
    catalog: Catalog,
    compiler: RouteCompiler,
    usage: UsageIndexBuilder,
    compiled: Vec<CompiledRegistry>,
}

impl TopologyBuilder {
    /// Builder with default settings for `gateway` and an empty catalog
    pub fn new(gateway: impl Into<String>) -> Result<Self> {
        Self::from_config(MirrorConfig::new(gateway))
    }

    /// Builder for a validated config. Registrations listed in the config are
    /// not applied until [`TopologyBuilder::register_configured`] is called.
    pub fn from_config(config: MirrorConfig) -> Result<Self> {
        config.validate()?;

        let compiler = RouteCompiler::new(
            config.gateway.clone(),
            config.routing_modes(),
            config.cache_settings(),
        );
        let usage = UsageIndexBuilder::new(config.gateway.clone());

        Ok(Self {
            config,
            catalog: Catalog::default(),
            compiler,
            usage,
            compiled: Vec::new(),
        })
    }

    pub fn with_catalog(mut self, catalog: Catalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn with_usage_template(mut self, template: impl Into<String>) -> Self {
        self.usage = self.usage.with_template(template);
        self
    }

    pub fn config(&self) -> &MirrorConfig {
        &self.config
    }

    /// Register `upstream` under `name`
    pub fn add_custom_registry(
        &mut self,
        name: &str,
        upstream: &UpstreamDescriptor,
        domains: Option<&[String]>,
    ) -> Result<()> {
        let span = info_span!("registry", name = %name, upstream = %upstream.name());
        let _enter = span.enter();

        let compiled = self.compiler.compile(name, upstream, domains)?;
        self.usage.record(upstream, &compiled.decision);
        self.compiled.push(compiled);
        Ok(())
    }

    /// Register the catalog entry `upstream_name` under `name`
    pub fn add_known_registry(
        &mut self,
        name: &str,
        upstream_name: &str,
        domains: Option<&[String]>,
    ) -> Result<()> {
        let upstream = self.catalog.get(upstream_name)?.clone();
        self.add_custom_registry(name, &upstream, domains)
    }

    /// Register catalog entries under their own names
    pub fn add_known_registry_bulk<S: AsRef<str>>(&mut self, names: &[S]) -> Result<()> {
        for name in names {
            let name = name.as_ref();
            self.add_known_registry(name, name, None)?;
        }
        Ok(())
    }

    /// Apply the registrations listed in the config, in order
    pub fn register_configured(&mut self) -> Result<()> {
        let registrations = self.config.registries.clone();
        for registration in &registrations {
            let domains = registration.domains.as_deref();
            match &registration.descriptor {
                Some(upstream) => self.add_custom_registry(&registration.name, upstream, domains)?,
                None => self.add_known_registry(
                    &registration.name,
                    registration.upstream_name(),
                    domains,
                )?,
            }
        }
        Ok(())
    }

    pub fn build(self) -> Result<Topology> {
        let gateway = GatewayConfigurator::new(&self.config.gateway_settings()).configure()?;

        TopologyAssembler::new(
            self.config.project_name.clone(),
            self.config.gateway.clone(),
            self.config.usage_page_image.clone(),
        )
        .assemble(gateway, self.compiled, &self.usage)
    }
}
