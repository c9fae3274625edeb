use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mcr_topology::{write_topology, Catalog, MirrorConfig, TopologyBuilder};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Parser)]
#[command(name = "mcr-generator")]
#[command(about = "Generates a caching registry mirror deployment")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate compose.yaml and the usage page from a project config
    Generate {
        /// Project config (YAML)
        #[arg(long, default_value = "mcr.yaml")]
        config: PathBuf,

        /// Registry catalog (JSON), defaults to the built-in catalog
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Override the gateway hostname from the config
        #[arg(long)]
        gateway: Option<String>,

        /// Output directory
        #[arg(long, default_value = "./generated")]
        output: PathBuf,
    },
    /// List the upstreams known to the catalog
    Catalog {
        /// Registry catalog (JSON), defaults to the built-in catalog
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let _guard = mcr_logging::init_subscriber();
    let args = Args::parse();

    match args.command {
        Command::Generate {
            config,
            catalog,
            gateway,
            output,
        } => handle_generate_command(&config, catalog.as_deref(), gateway, &output),
        Command::Catalog { catalog } => handle_catalog_command(catalog.as_deref()),
    }
}

fn load_catalog(path: Option<&Path>) -> Result<Catalog> {
    match path {
        Some(path) => Catalog::from_json_file(path)
            .with_context(|| format!("Failed to load catalog: {}", path.display())),
        None => Catalog::builtin().context("Failed to load built-in catalog"),
    }
}

fn handle_generate_command(
    config_path: &Path,
    catalog: Option<&Path>,
    gateway: Option<String>,
    output: &Path,
) -> Result<()> {
    println!("⚙️ Generating mirror topology...");

    let mut config = MirrorConfig::from_file(config_path)
        .with_context(|| format!("Failed to load config: {}", config_path.display()))?;
    if let Some(gateway) = gateway {
        config.gateway = gateway;
    }

    let usage_template = match &config.usage_template {
        Some(path) => {
            // Relative template paths resolve against the config file
            let path = config_path
                .parent()
                .map(|dir| dir.join(path))
                .unwrap_or_else(|| PathBuf::from(path));
            debug!(path = %path.display(), "Loading usage template");
            Some(
                fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read usage template: {}", path.display()))?,
            )
        }
        None => None,
    };

    let mut builder = TopologyBuilder::from_config(config)
        .context("Invalid config")?
        .with_catalog(load_catalog(catalog)?);
    if let Some(template) = usage_template {
        builder = builder.with_usage_template(template);
    }

    builder
        .register_configured()
        .context("Failed to register registries")?;
    let gateway = builder.config().gateway.clone();
    let topology = builder.build().context("Failed to build topology")?;

    write_topology(&topology, output)
        .with_context(|| format!("Failed to write output to {}", output.display()))?;

    println!("✅ Generated {}", output.display());
    println!("   Gateway: {}", gateway);
    println!(
        "   Registries: {}",
        topology.services.keys().cloned().collect::<Vec<_>>().join(", ")
    );
    println!("   Routes: {}", topology.routes.len());
    if topology.documentation.is_none() {
        println!("⚠️ Usage page was not rendered, see the log for details");
    }

    Ok(())
}

fn handle_catalog_command(catalog: Option<&Path>) -> Result<()> {
    let catalog = load_catalog(catalog)?;

    for upstream in catalog.iter() {
        let prefixes = upstream
            .resolve_prefixes()
            .map(|p| p.join(", "))
            .unwrap_or_else(|_| "-".to_string());
        let endpoint = upstream
            .resolve_endpoint()
            .unwrap_or_else(|_| "-".to_string());
        println!(
            "{:<10} {:<32} {:<36} {}",
            upstream.name(),
            upstream.label(),
            prefixes,
            endpoint
        );
    }

    Ok(())
}
