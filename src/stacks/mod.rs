// Copyright (c) 2025 - Cowboy AI, Inc.
//! Provisioning Stacks
//!
//! Each stack turns the [`EnvironmentContext`](crate::config::EnvironmentContext)
//! into fully tagged resource handles. Handles are plain values; nothing is
//! sent to the provider until they are declared into a
//! [`ResourceGraph`](crate::graph::ResourceGraph) and synthesized.
//!
//! | Stack | Constructor | Produces |
//! |---|---|---|
//! | Network | [`NetworkStack::construct`] | [`NetworkBoundary`] |
//! | Trust | [`TrustBootstrap::construct`] | [`FederatedIdentity`] |
//! | Registry | [`RegistryStack::construct`] | [`Registry`] |
//! | Cluster | [`ClusterStack::construct`] | [`ClusterDeployment`] |

pub mod cluster;
pub mod network;
pub mod registry;
pub mod trust;

pub use cluster::{
    CapacityPool, CapacityPoolSpec, Cluster, ClusterDeployment, ClusterStack, ControlPlaneTooling,
    KubernetesVersion,
};
pub use network::{Egress, NetworkBoundary, NetworkStack, Subnet, SubnetGroup, SubnetKind};
pub use registry::{EncryptionMode, Registry, RegistryStack, RetentionRule};
pub use trust::{
    AnchorResolver, ArnAnchorResolver, AssumableRole, FederatedIdentity, FederationAnchor,
    GitHubRepository, KnownAnchors, TrustBootstrap, TrustPolicy,
};
