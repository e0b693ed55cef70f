//! GitOps platform provisioning core
//!
//! Declares a network boundary, a managed Kubernetes cluster, a container
//! image registry, and a federated deployment identity for an external CI
//! system, then synthesizes them into a cloud assembly for a provisioning
//! engine.

pub mod app;
pub mod config;
pub mod domain;
pub mod errors;
pub mod graph;
pub mod provisioner;
pub mod stacks;

// Re-export commonly used types
pub use app::{Platform, PlatformApp, CLUSTER_STACK, NETWORK_STACK};
pub use config::{EnvironmentContext, PlatformConfig};
pub use errors::{ProvisioningError, ProvisioningResult};
pub use graph::{CloudAssembly, ResourceGraph};
pub use provisioner::{EngineProvisioner, Operation, ProvisionOutcome, Provisioner, SynthProvisioner};
pub use stacks::{AnchorResolver, ArnAnchorResolver, KnownAnchors};
