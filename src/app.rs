// Copyright (c) 2025 - Cowboy AI, Inc.
//! Orchestration Entry Point
//!
//! Builds every stack in a fixed order, synthesizes the result, and hands it
//! to a provisioner.
//!
//! ```text
//! PlatformConfig
//!     │
//!     ├─ NetworkStack::construct      ──> NetworkBoundary      (CommonNetworkStack)
//!     ├─ TrustBootstrap::construct    ──> FederatedIdentity ┐
//!     ├─ RegistryStack::construct     ──> Registry          ├─ (EksEcrStack)
//!     └─ ClusterStack::construct      ──> ClusterDeployment ┘
//!            │
//!            ▼
//!     ResourceGraph ──> CloudAssembly ──> Provisioner
//! ```
//!
//! Any failure before the provisioner call leaves no side effects.

use tracing::info;

use crate::config::PlatformConfig;
use crate::errors::ProvisioningResult;
use crate::graph::{CloudAssembly, Declare, ResourceGraph};
use crate::provisioner::{Operation, ProvisionOutcome, Provisioner};
use crate::stacks::{
    AnchorResolver, ClusterDeployment, ClusterStack, NetworkBoundary, NetworkStack, RegistryStack,
    TrustBootstrap,
};

/// Stack holding the network boundary
pub const NETWORK_STACK: &str = "CommonNetworkStack";

/// Stack holding the cluster, registry and deployment identity
pub const CLUSTER_STACK: &str = "EksEcrStack";

/// Every constructed stack of one deployment
#[derive(Debug, Clone)]
pub struct Platform {
    pub network: NetworkBoundary,
    pub deployment: ClusterDeployment,
}

impl Platform {
    /// Declare both stacks into a fresh graph
    pub fn graph(&self) -> ProvisioningResult<ResourceGraph> {
        let mut graph = ResourceGraph::new();
        self.network.declare(NETWORK_STACK, &mut graph)?;
        self.deployment.declare(CLUSTER_STACK, &mut graph)?;
        Ok(graph)
    }
}

/// Provisioning application
#[derive(Debug, Clone)]
pub struct PlatformApp {
    config: PlatformConfig,
}

impl PlatformApp {
    pub fn new(config: PlatformConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    /// Construct every stack in dependency order
    ///
    /// The federation anchor is resolved before the registry or cluster is
    /// built, so an unresolvable anchor aborts with nothing else constructed.
    pub fn build(&self, resolver: &dyn AnchorResolver) -> ProvisioningResult<Platform> {
        let ctx = &self.config.context;

        let network = NetworkStack::construct(ctx, &self.config.network)?;
        let identity =
            TrustBootstrap::construct(ctx.federation_anchor(), resolver, ctx, &self.config.trust)?;
        let registry = RegistryStack::construct(ctx, &self.config.registry)?;
        let deployment =
            ClusterStack::construct(&network, identity, registry, ctx, &self.config.cluster)?;

        Ok(Platform {
            network,
            deployment,
        })
    }

    /// Build and synthesize without side effects
    pub fn synth(&self, resolver: &dyn AnchorResolver) -> ProvisioningResult<CloudAssembly> {
        let platform = self.build(resolver)?;
        let graph = platform.graph()?;
        let ctx = &self.config.context;

        info!(
            "Synthesizing {} resources for {}/{}",
            graph.len(),
            ctx.application(),
            ctx.environment()
        );
        CloudAssembly::synthesize(&graph, ctx.account(), ctx.region())
    }

    /// Synthesize and hand the assembly to `provisioner`
    pub async fn run(
        &self,
        operation: Operation,
        resolver: &dyn AnchorResolver,
        provisioner: &dyn Provisioner,
    ) -> ProvisioningResult<ProvisionOutcome> {
        let assembly = self.synth(resolver)?;

        info!("Starting {} with provisioner {}", operation, provisioner.name());
        let outcome = provisioner.provision(operation, &assembly).await?;
        info!(
            "Run {} finished {} for {}",
            outcome.run_id,
            operation,
            outcome.stacks.join(", ")
        );
        Ok(outcome)
    }
}
