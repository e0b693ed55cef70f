// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cluster Stack
//!
//! Managed Kubernetes control plane, its capacity pools, and the wiring that
//! gives the deployment identity access to both the cluster and the registry.
//!
//! # Construction Order
//!
//! ```text
//! NetworkBoundary ─┐
//! FederatedIdentity ├──> ClusterStack::construct ──> ClusterDeployment
//! Registry ────────┘        │
//!                           ├─ validate tooling and capacity bounds
//!                           ├─ place control plane in private subnets
//!                           ├─ grant identity: cluster read-only, registry pull/push
//!                           └─ tag cluster, identity, registry
//! ```
//!
//! Every failure happens before anything is declared into a graph.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

use crate::config::{ClusterSettings, EnvironmentContext};
use crate::domain::{apply_tags, Arn, PolicyDocument, PolicyStatement, Principal, Taggable, Tags};
use crate::errors::{ProvisioningError, ProvisioningResult};
use crate::graph::{attribute, reference, Declare, LogicalId, Resource, ResourceGraph, ResourceKind};
use crate::stacks::network::NetworkBoundary;
use crate::stacks::registry::Registry;
use crate::stacks::trust::FederatedIdentity;

const STACK: &str = crate::app::CLUSTER_STACK;
const CLUSTER_LOGICAL_ID: &str = "EksCluster";

/// Managed policies attached to the control-plane service role
const CONTROL_PLANE_POLICIES: [&str; 1] = ["AmazonEKSClusterPolicy"];

/// Managed policies attached to the worker node role
const NODE_POLICIES: [&str; 3] = [
    "AmazonEKSWorkerNodePolicy",
    "AmazonEKS_CNI_Policy",
    "AmazonEC2ContainerRegistryReadOnly",
];

/// Kubernetes minor release
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct KubernetesVersion {
    major: u16,
    minor: u16,
}

impl KubernetesVersion {
    pub const V1_28: Self = Self::new(1, 28);
    pub const V1_29: Self = Self::new(1, 29);
    pub const V1_30: Self = Self::new(1, 30);
    pub const V1_31: Self = Self::new(1, 31);
    pub const V1_32: Self = Self::new(1, 32);
    pub const V1_33: Self = Self::new(1, 33);
    pub const V1_34: Self = Self::new(1, 34);

    /// Oldest control-plane version the platform provisions
    pub const OLDEST_SUPPORTED: Self = Self::V1_28;

    /// Newest control-plane version the platform provisions
    pub const NEWEST_SUPPORTED: Self = Self::V1_34;

    pub const fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    pub fn major(&self) -> u16 {
        self.major
    }

    pub fn minor(&self) -> u16 {
        self.minor
    }

    pub fn is_supported(&self) -> bool {
        (Self::OLDEST_SUPPORTED..=Self::NEWEST_SUPPORTED).contains(self)
    }
}

impl fmt::Display for KubernetesVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for KubernetesVersion {
    type Err = ProvisioningError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ProvisioningError::Configuration(format!("Invalid Kubernetes version: {:?}", s));
        let (major, minor) = s.trim_start_matches('v').split_once('.').ok_or_else(invalid)?;
        Ok(Self::new(
            major.parse().map_err(|_| invalid())?,
            minor.parse().map_err(|_| invalid())?,
        ))
    }
}

/// Control-plane management tooling bundled with the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlPlaneTooling {
    kubectl: KubernetesVersion,
}

impl ControlPlaneTooling {
    pub fn kubectl(version: KubernetesVersion) -> Self {
        Self { kubectl: version }
    }

    pub fn version(&self) -> KubernetesVersion {
        self.kubectl
    }

    /// Layer name, e.g. `KubectlV34Layer`
    pub fn layer_name(&self) -> String {
        format!("KubectlV{}Layer", self.kubectl.minor)
    }

    /// Tooling can manage a cluster of the same minor release or older
    pub fn supports(&self, cluster: KubernetesVersion) -> bool {
        self.kubectl.major == cluster.major && self.kubectl.minor >= cluster.minor
    }
}

/// Requested bounds and shape of one capacity pool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapacityPoolSpec {
    pub name: String,
    pub min_size: u32,
    pub max_size: u32,
    pub desired_size: u32,
    pub instance_types: Vec<String>,
    pub disk_size_gib: u32,
}

impl CapacityPoolSpec {
    /// Default managed pool: 2-4 `t3.small` nodes with 30 GiB disks
    pub fn managed_default() -> Self {
        Self {
            name: "ManagedNodeGroup".to_string(),
            min_size: 2,
            max_size: 4,
            desired_size: 2,
            instance_types: vec!["t3.small".to_string()],
            disk_size_gib: 30,
        }
    }

    /// # Invariants
    /// - `min_size <= desired_size <= max_size` and `max_size >= 1`
    /// - At least one instance type and a non-zero disk
    /// - Name is usable as a logical id suffix
    pub fn validate(&self) -> ProvisioningResult<()> {
        let fail = |reason: String| -> ProvisioningResult<()> {
            Err(ProvisioningError::construction(STACK, reason))
        };

        if self.name.is_empty() || !self.name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return fail(format!("Invalid capacity pool name {:?}", self.name));
        }
        if self.max_size == 0 {
            return fail(format!("Capacity pool {} has max size 0", self.name));
        }
        if !(self.min_size <= self.desired_size && self.desired_size <= self.max_size) {
            return fail(format!(
                "Capacity pool {} violates min <= desired <= max ({} <= {} <= {})",
                self.name, self.min_size, self.desired_size, self.max_size
            ));
        }
        if self.instance_types.is_empty() {
            return fail(format!("Capacity pool {} has no instance type", self.name));
        }
        if self.disk_size_gib == 0 {
            return fail(format!("Capacity pool {} has no disk", self.name));
        }
        Ok(())
    }
}

/// Node capacity attached to the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapacityPool {
    logical_id: LogicalId,
    spec: CapacityPoolSpec,
    placement: Vec<LogicalId>,
    tags: Tags,
}

impl CapacityPool {
    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &CapacityPoolSpec {
        &self.spec
    }

    pub fn placement(&self) -> &[LogicalId] {
        &self.placement
    }

    pub fn desired_size(&self) -> u32 {
        self.spec.desired_size
    }

    /// Change desired capacity within the pool's bounds
    pub fn scale_to(&mut self, desired: u32) -> ProvisioningResult<()> {
        if desired < self.spec.min_size || desired > self.spec.max_size {
            return Err(ProvisioningError::construction(
                STACK,
                format!(
                    "Cannot scale {} to {}: bounds are {}..={}",
                    self.spec.name, desired, self.spec.min_size, self.spec.max_size
                ),
            ));
        }
        self.spec.desired_size = desired;
        Ok(())
    }
}

impl Taggable for CapacityPool {
    fn tag(&mut self, key: &str, value: &str) {
        self.tags.insert(key.to_string(), value.to_string());
    }

    fn tags(&self) -> &Tags {
        &self.tags
    }
}

/// Managed Kubernetes cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    logical_id: LogicalId,
    name: String,
    arn: Arn,
    version: KubernetesVersion,
    tooling: ControlPlaneTooling,
    /// Subnets the control plane is placed in
    placement: Vec<LogicalId>,
    pools: Vec<CapacityPool>,
    tags: Tags,
}

impl Cluster {
    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arn(&self) -> &Arn {
        &self.arn
    }

    pub fn version(&self) -> KubernetesVersion {
        self.version
    }

    pub fn tooling(&self) -> ControlPlaneTooling {
        self.tooling
    }

    pub fn placement(&self) -> &[LogicalId] {
        &self.placement
    }

    /// Default capacity is always zero; all nodes come from named pools
    pub fn default_capacity(&self) -> u32 {
        0
    }

    pub fn pools(&self) -> &[CapacityPool] {
        &self.pools
    }

    pub fn pool(&self, name: &str) -> Option<&CapacityPool> {
        self.pools.iter().find(|p| p.name() == name)
    }

    pub fn pool_mut(&mut self, name: &str) -> Option<&mut CapacityPool> {
        self.pools.iter_mut().find(|p| p.name() == name)
    }

    fn service_role_id(&self) -> ProvisioningResult<LogicalId> {
        self.logical_id.child("Role")
    }

    fn node_role_id(&self) -> ProvisioningResult<LogicalId> {
        self.logical_id.child("NodegroupRole")
    }
}

impl Taggable for Cluster {
    /// Tags the cluster and its capacity pools
    fn tag(&mut self, key: &str, value: &str) {
        self.tags.insert(key.to_string(), value.to_string());
        for pool in &mut self.pools {
            pool.tag(key, value);
        }
    }

    fn tags(&self) -> &Tags {
        &self.tags
    }
}

fn service_role(
    id: LogicalId,
    service: &str,
    policies: &[&str],
    tags: &Tags,
) -> ProvisioningResult<Resource> {
    let trust = PolicyDocument::new().with_statement(
        PolicyStatement::allow()
            .principal(Principal::Service(service.to_string()))
            .actions(["sts:AssumeRole"]),
    );
    let managed: Vec<String> = policies
        .iter()
        .map(|p| Arn::managed_policy(p).to_string())
        .collect();

    Ok(Resource::new(id, ResourceKind::Role)
        .property("AssumeRolePolicyDocument", serde_json::to_value(trust)?)
        .property("ManagedPolicyArns", json!(managed))
        .tags(tags))
}

impl Declare for Cluster {
    fn declare(&self, stack: &str, graph: &mut ResourceGraph) -> ProvisioningResult<()> {
        let service_role_id = self.service_role_id()?;
        graph.add(
            stack,
            service_role(
                service_role_id.clone(),
                "eks.amazonaws.com",
                &CONTROL_PLANE_POLICIES,
                &self.tags,
            )?,
        )?;

        let subnets: Vec<_> = self.placement.iter().map(reference).collect();
        graph.add(
            stack,
            Resource::new(self.logical_id.clone(), ResourceKind::Cluster)
                .property("Name", json!(self.name))
                .property("Version", json!(self.version.to_string()))
                .property("RoleArn", attribute(&service_role_id, "Arn"))
                .property(
                    "ResourcesVpcConfig",
                    json!({
                        "SubnetIds": subnets,
                        "EndpointPublicAccess": true,
                        "EndpointPrivateAccess": true
                    }),
                )
                .metadata("KubectlLayer", json!(self.tooling.layer_name()))
                .metadata("KubectlVersion", json!(self.tooling.version().to_string()))
                .tags(&self.tags),
        )?;

        if self.pools.is_empty() {
            return Ok(());
        }

        let node_role_id = self.node_role_id()?;
        graph.add(
            stack,
            service_role(node_role_id.clone(), "ec2.amazonaws.com", &NODE_POLICIES, &self.tags)?,
        )?;

        for pool in &self.pools {
            let pool_subnets: Vec<_> = pool.placement.iter().map(reference).collect();
            graph.add(
                stack,
                Resource::new(pool.logical_id.clone(), ResourceKind::Nodegroup)
                    .property("ClusterName", reference(&self.logical_id))
                    .property("NodeRole", attribute(&node_role_id, "Arn"))
                    .property("Subnets", json!(pool_subnets))
                    .property(
                        "ScalingConfig",
                        json!({
                            "MinSize": pool.spec.min_size,
                            "MaxSize": pool.spec.max_size,
                            "DesiredSize": pool.spec.desired_size
                        }),
                    )
                    .property("InstanceTypes", json!(pool.spec.instance_types))
                    .property("DiskSize", json!(pool.spec.disk_size_gib))
                    .property("AmiType", json!("AL2_x86_64"))
                    .tags(&pool.tags),
            )?;
        }

        Ok(())
    }
}

/// Cluster together with the identity and registry it was wired to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterDeployment {
    pub cluster: Cluster,
    pub identity: FederatedIdentity,
    pub registry: Registry,
}

impl Declare for ClusterDeployment {
    fn declare(&self, stack: &str, graph: &mut ResourceGraph) -> ProvisioningResult<()> {
        self.identity.declare(stack, graph)?;
        self.registry.declare(stack, graph)?;
        self.cluster.declare(stack, graph)?;

        let cluster_id = self.cluster.logical_id();
        graph.output(stack, "ClusterName", reference(cluster_id), "Cluster name")?;
        graph.output(stack, "ClusterArn", attribute(cluster_id, "Arn"), "Cluster identifier")?;
        graph.output(
            stack,
            "ClusterEndpoint",
            attribute(cluster_id, "Endpoint"),
            "Cluster API endpoint",
        )?;
        graph.output(
            stack,
            "RegistryUri",
            attribute(self.registry.logical_id(), "RepositoryUri"),
            "Image registry URI",
        )?;
        graph.output(
            stack,
            "DeploymentRoleArn",
            attribute(self.identity.role().logical_id(), "Arn"),
            "Role assumed by the CI system",
        )?;

        debug!("Declared cluster deployment {} into {}", self.cluster.name, stack);
        Ok(())
    }
}

/// Cluster stack constructor
pub struct ClusterStack;

/// The control plane and its pools only ever land in private subnets
fn private_placement(subnets: Vec<LogicalId>) -> ProvisioningResult<Vec<LogicalId>> {
    if subnets.is_empty() {
        return Err(ProvisioningError::construction(
            STACK,
            "Network boundary has no private subnets to place the cluster in",
        ));
    }
    Ok(subnets)
}

impl ClusterStack {
    /// Build the cluster inside `network` and wire `identity` and `registry` to it
    ///
    /// Fails with a construction error when tooling is missing or too old for
    /// the requested version, the version is unsupported, or any capacity pool
    /// violates its bounds.
    pub fn construct(
        network: &NetworkBoundary,
        mut identity: FederatedIdentity,
        mut registry: Registry,
        ctx: &EnvironmentContext,
        settings: &ClusterSettings,
    ) -> ProvisioningResult<ClusterDeployment> {
        let version = settings.version;
        if !version.is_supported() {
            return Err(ProvisioningError::construction(
                STACK,
                format!(
                    "Kubernetes {} is outside the supported range {}..={}",
                    version,
                    KubernetesVersion::OLDEST_SUPPORTED,
                    KubernetesVersion::NEWEST_SUPPORTED
                ),
            ));
        }

        let tooling = settings.tooling.ok_or_else(|| {
            ProvisioningError::construction(STACK, "No control-plane tooling configured")
        })?;
        if !tooling.supports(version) {
            return Err(ProvisioningError::construction(
                STACK,
                format!(
                    "kubectl {} cannot manage a Kubernetes {} control plane",
                    tooling.version(),
                    version
                ),
            ));
        }
        if tooling.version() != version {
            warn!(
                "kubectl {} is newer than the Kubernetes {} control plane",
                tooling.version(),
                version
            );
        }

        let mut names = BTreeSet::new();
        for spec in &settings.pools {
            spec.validate()?;
            if !names.insert(spec.name.as_str()) {
                return Err(ProvisioningError::construction(
                    STACK,
                    format!("Capacity pool {} declared twice", spec.name),
                ));
            }
        }

        let logical_id = LogicalId::new(CLUSTER_LOGICAL_ID)?;
        let placement = private_placement(network.private_subnet_ids())?;

        let mut pools = Vec::with_capacity(settings.pools.len());
        for spec in &settings.pools {
            pools.push(CapacityPool {
                logical_id: logical_id.child(&format!("Nodegroup{}", spec.name))?,
                spec: spec.clone(),
                placement: placement.clone(),
                tags: Tags::new(),
            });
        }

        let mut cluster = Cluster {
            logical_id,
            name: ctx.cluster_name(),
            arn: ctx.cluster_arn(),
            version,
            tooling,
            placement,
            pools,
            tags: Tags::new(),
        };

        identity.grant_cluster_introspection(&cluster.arn);
        registry.grant_pull_push(&mut identity);

        apply_tags(&mut cluster, ctx.tags());
        apply_tags(&mut identity, ctx.tags());
        apply_tags(&mut registry, ctx.tags());

        info!(
            "Built cluster {} (Kubernetes {}) with {} capacity pool(s)",
            cluster.name,
            cluster.version,
            cluster.pools.len()
        );

        Ok(ClusterDeployment {
            cluster,
            identity,
            registry,
        })
    }
}
