// Copyright (c) 2025 - Cowboy AI, Inc.
//! GitOps Platform Provisioner
//!
//! Resolves configuration from the environment, builds every stack, writes
//! the cloud assembly, and runs the provisioning engine if one is configured.
//!
//! Run with: cargo run --bin gitops-platform -- [run|plan|destroy]
//!
//! Environment (all optional):
//! - AWS_ACCOUNT_ID, AWS_REGION: deployment target
//! - ENV, APP: environment and application names
//! - GITHUB_OIDC_ARN, GITHUB_REPOSITORY: federation anchor and trusted repository
//! - VPC_CIDR, MAX_AZS, NAT_GATEWAYS: network sizing
//! - ASSEMBLY_DIR: where templates are written (default: cdk.out)
//! - PROVISIONER_COMMAND: engine to run, e.g. `npx cdk`; synthesis only when unset

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use gitops_platform::{
    ArnAnchorResolver, EngineProvisioner, Operation, PlatformApp, PlatformConfig,
    ProvisioningError, Provisioner, SynthProvisioner,
};

/// Provision the GitOps platform
#[derive(Parser, Debug)]
#[command(name = "gitops-platform")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone, Copy)]
enum Commands {
    /// Synthesize and deploy every stack (default)
    #[command(alias = "apply")]
    Run,

    /// Synthesize and show pending changes
    #[command(alias = "diff")]
    Plan,

    /// Tear down every stack
    Destroy,
}

impl From<Commands> for Operation {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Run => Operation::Apply,
            Commands::Plan => Operation::Plan,
            Commands::Destroy => Operation::Destroy,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let operation: Operation = cli.command.unwrap_or(Commands::Run).into();

    let config = PlatformConfig::from_env().context("Failed to resolve configuration")?;
    info!("📋 Configuration loaded:");
    info!("  - Target: {}/{}", config.context.account(), config.context.region());
    info!(
        "  - Deployment: {}/{}",
        config.context.application(),
        config.context.environment()
    );
    info!("  - Assembly: {}", config.assembly_dir.display());

    let provisioner: Box<dyn Provisioner> = match &config.provisioner_command {
        Some(command) => Box::new(EngineProvisioner::new(command.clone(), &config.assembly_dir)),
        None => Box::new(SynthProvisioner::new(&config.assembly_dir)),
    };
    let resolver = ArnAnchorResolver::new(config.context.account().clone());
    let app = PlatformApp::new(config);

    match app.run(operation, &resolver, provisioner.as_ref()).await {
        Ok(outcome) => {
            info!(
                "✅ {} complete (run {}): {}",
                outcome.operation,
                outcome.run_id,
                outcome.stacks.join(", ")
            );
            Ok(())
        }
        Err(ProvisioningError::Engine { code }) => {
            error!("❌ Provisioning engine exited with status {}", code);
            std::process::exit(code);
        }
        Err(e) => Err(e).with_context(|| format!("Failed to {}", operation)),
    }
}
