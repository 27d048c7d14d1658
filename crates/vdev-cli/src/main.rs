//! vdev - Main entry point
//!
//! Command-line front end for creating and inspecting virtual devices.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;
use vdev_client::{config, http_provisioner, Config, DeviceApi, HttpApi};
use vdev_core::{CreationRequest, Instance, PatchProfile};

#[derive(Parser, Debug)]
#[command(name = "vdev")]
#[command(about = "Virtual device provisioning client")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "vdev.toml")]
    config: PathBuf,

    /// Provisioning API endpoint
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Download and register missing firmware assets automatically
    #[arg(long)]
    auto_fwassets: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a virtual device
    Create {
        #[arg(long)]
        project: String,
        #[arg(long)]
        name: String,
        /// Platform flavor (e.g. ranchu)
        #[arg(long)]
        flavor: String,
        /// OS version (e.g. 14.0.0)
        #[arg(long)]
        os: String,
        #[arg(long)]
        os_build: Option<String>,
        /// Firmware package URL
        #[arg(long)]
        fwpackage: Option<String>,
        /// Patch profile: jailbroken, nonjailbroken or corelliumd
        #[arg(long, default_value = "jailbroken")]
        patch: PatchProfile,
    },
    /// List virtual devices
    List,
    /// Find virtual devices by name
    Search { name: String },
    /// Write an example configuration file
    InitConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    match &args.command {
        Command::Create {
            project,
            name,
            flavor,
            os,
            os_build,
            fwpackage,
            patch,
        } => {
            let mut request = CreationRequest::new(project, name, flavor, os).with_patch(*patch);
            if let Some(os_build) = os_build {
                request = request.with_os_build(os_build);
            }
            if let Some(fwpackage) = fwpackage {
                request = request.with_fwpackage(fwpackage);
            }

            let (_api, provisioner) = http_provisioner(&load_config(&args)?)?;
            let outcome = provisioner.provision(&request).await?;
            println!("Created {} after {} attempt(s)", outcome.instance.id, outcome.attempts);
            for asset in &outcome.registered {
                println!("  registered {} as {}", asset.source_url(), asset.record.id);
            }
            for url in &outcome.skipped {
                println!("  skipped {}", url);
            }
        }
        Command::List => {
            let api = HttpApi::new(&load_config(&args)?.service)?;
            print_instances(&api.list_instances().await?);
        }
        Command::Search { name } => {
            let api = HttpApi::new(&load_config(&args)?.service)?;
            print_instances(&api.search_instances(name).await?);
        }
        Command::InitConfig => {
            config::save_default_config(&args.config)?;
            println!("Wrote {}", args.config.display());
        }
    }

    Ok(())
}

/// Load the config file, then apply environment and command-line overrides
fn load_config(args: &Args) -> Result<Config> {
    let mut config = config::load_config(&args.config)?;
    config.apply_env();

    if let Some(endpoint) = &args.endpoint {
        config.service.endpoint = endpoint.clone();
    }
    if args.auto_fwassets {
        config.remediation.enabled = true;
    }

    info!(
        endpoint = %config.service.endpoint,
        auto_fwassets = config.remediation.enabled,
        "Configuration loaded"
    );
    Ok(config)
}

fn print_instances(instances: &[Instance]) {
    println!("{} device(s):", instances.len());
    for instance in instances {
        println!(
            "  - {} ({}) {} {}",
            instance.name.as_deref().unwrap_or("-"),
            instance.id,
            instance.flavor.as_deref().unwrap_or("-"),
            instance.state.as_deref().unwrap_or("-"),
        );
    }
}
