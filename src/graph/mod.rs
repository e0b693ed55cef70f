// Copyright (c) 2025 - Cowboy AI, Inc.
//! Declarative Resource Graph
//!
//! Stacks do not talk to the provider. They declare resources into a
//! [`ResourceGraph`], which is later synthesized into a
//! [`CloudAssembly`](assembly::CloudAssembly) and handed to a provisioner.
//!
//! # Ordering
//!
//! ```text
//! declare(Network) ──> declare(Trust) ──> declare(Registry) ──> declare(Cluster)
//!        │                                                          │
//!        └──────────── references (Ref / GetAtt) ◄──────────────────┘
//! ```
//!
//! A resource can only be added once everything it references or depends on
//! is already in the graph. Insertion order is therefore always a valid
//! topological order, and a dangling reference is a structural error at
//! build time rather than a provider failure at apply time.

pub mod assembly;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use tracing::debug;

use crate::domain::Tags;
use crate::errors::{ProvisioningError, ProvisioningResult};

pub use assembly::{CloudAssembly, StackArtifact, Template};

/// Logical identifier of a resource within the graph
///
/// # Invariants
/// - 1-255 ASCII alphanumeric characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
    pub fn new(id: impl Into<String>) -> ProvisioningResult<Self> {
        let id = id.into();
        if id.is_empty() || id.len() > 255 || !id.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ProvisioningError::Structural(format!(
                "Invalid logical id: {:?}",
                id
            )));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive a child id by appending an alphanumeric suffix
    pub fn child(&self, suffix: &str) -> ProvisioningResult<Self> {
        Self::new(format!("{}{}", self.0, suffix))
    }
}

impl fmt::Display for LogicalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a resource type accepts tags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagFormat {
    /// `[{"Key": k, "Value": v}, ...]`
    List,
    /// `{k: v, ...}`
    Map,
    /// Resource type cannot be tagged
    Unsupported,
}

/// Provider resource types declared by this platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    Vpc,
    Subnet,
    InternetGateway,
    GatewayAttachment,
    ElasticIp,
    NatGateway,
    RouteTable,
    Route,
    SubnetRouteTableAssociation,
    Role,
    Repository,
    Cluster,
    Nodegroup,
}

impl ResourceKind {
    /// Provider type name
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Vpc => "AWS::EC2::VPC",
            Self::Subnet => "AWS::EC2::Subnet",
            Self::InternetGateway => "AWS::EC2::InternetGateway",
            Self::GatewayAttachment => "AWS::EC2::VPCGatewayAttachment",
            Self::ElasticIp => "AWS::EC2::EIP",
            Self::NatGateway => "AWS::EC2::NatGateway",
            Self::RouteTable => "AWS::EC2::RouteTable",
            Self::Route => "AWS::EC2::Route",
            Self::SubnetRouteTableAssociation => "AWS::EC2::SubnetRouteTableAssociation",
            Self::Role => "AWS::IAM::Role",
            Self::Repository => "AWS::ECR::Repository",
            Self::Cluster => "AWS::EKS::Cluster",
            Self::Nodegroup => "AWS::EKS::Nodegroup",
        }
    }

    pub fn tag_format(&self) -> TagFormat {
        match self {
            Self::GatewayAttachment | Self::Route | Self::SubnetRouteTableAssociation => {
                TagFormat::Unsupported
            }
            Self::Nodegroup => TagFormat::Map,
            _ => TagFormat::List,
        }
    }

    pub fn supports_tags(&self) -> bool {
        self.tag_format() != TagFormat::Unsupported
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Reference to another resource's primary identifier
pub fn reference(id: &LogicalId) -> Value {
    json!({ "Ref": id.as_str() })
}

/// Reference to an attribute of another resource, resolved at apply time
pub fn attribute(id: &LogicalId, name: &str) -> Value {
    json!({ "Fn::GetAtt": [id.as_str(), name] })
}

/// Logical ids referenced from a property tree via `Ref` / `Fn::GetAtt`
pub fn referenced_ids(value: &Value) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    collect_references(value, &mut found);
    found
}

fn collect_references(value: &Value, found: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(target)) = map.get("Ref") {
                found.insert(target.clone());
            }
            if let Some(Value::Array(parts)) = map.get("Fn::GetAtt") {
                if let Some(Value::String(target)) = parts.first() {
                    found.insert(target.clone());
                }
            }
            for nested in map.values() {
                collect_references(nested, found);
            }
        }
        Value::Array(items) => items.iter().for_each(|v| collect_references(v, found)),
        _ => {}
    }
}

/// Single declared resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub logical_id: LogicalId,
    pub kind: ResourceKind,
    /// Owning stack
    pub stack: String,
    pub properties: Map<String, Value>,
    pub tags: Tags,
    pub depends_on: BTreeSet<LogicalId>,
    /// Keep the physical resource when the stack is torn down
    pub retain_on_delete: bool,
    pub metadata: Map<String, Value>,
}

impl Resource {
    pub fn new(logical_id: LogicalId, kind: ResourceKind) -> Self {
        Self {
            logical_id,
            kind,
            stack: String::new(),
            properties: Map::new(),
            tags: Tags::new(),
            depends_on: BTreeSet::new(),
            retain_on_delete: false,
            metadata: Map::new(),
        }
    }

    pub fn property(mut self, key: &str, value: Value) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }

    pub fn tags(mut self, tags: &Tags) -> Self {
        self.tags = tags.clone();
        self
    }

    pub fn depends_on(mut self, id: &LogicalId) -> Self {
        self.depends_on.insert(id.clone());
        self
    }

    pub fn retain(mut self) -> Self {
        self.retain_on_delete = true;
        self
    }

    pub fn metadata(mut self, key: &str, value: Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }

    /// Every logical id this resource needs to exist first
    pub fn dependencies(&self) -> BTreeSet<LogicalId> {
        let mut deps = self.depends_on.clone();
        for target in referenced_ids(&Value::Object(self.properties.clone())) {
            deps.insert(LogicalId(target));
        }
        deps
    }
}

/// Stack output exposed to downstream consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub name: String,
    pub stack: String,
    pub value: Value,
    pub description: String,
}

/// Anything that can declare itself into a resource graph
pub trait Declare {
    fn declare(&self, stack: &str, graph: &mut ResourceGraph) -> ProvisioningResult<()>;
}

/// Ordered, validated set of resources across all stacks
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    order: Vec<LogicalId>,
    resources: BTreeMap<LogicalId, Resource>,
    outputs: Vec<Output>,
}

impl ResourceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resource to `stack`
    ///
    /// # Invariants
    /// - Logical ids are unique across the graph
    /// - Every dependency and reference is already declared
    /// - Resources without tag support carry no tags
    pub fn add(&mut self, stack: &str, mut resource: Resource) -> ProvisioningResult<&Resource> {
        if self.resources.contains_key(&resource.logical_id) {
            return Err(ProvisioningError::Structural(format!(
                "Resource {} declared twice",
                resource.logical_id
            )));
        }

        for dependency in resource.dependencies() {
            if !self.resources.contains_key(&dependency) {
                return Err(ProvisioningError::Structural(format!(
                    "Resource {} depends on undeclared resource {}",
                    resource.logical_id, dependency
                )));
            }
        }

        if !resource.kind.supports_tags() {
            resource.tags.clear();
        }

        resource.stack = stack.to_string();
        debug!("Declared {} ({}) in {}", resource.logical_id, resource.kind, stack);

        let id = resource.logical_id.clone();
        self.order.push(id.clone());
        Ok(self.resources.entry(id).or_insert(resource))
    }

    /// Expose a value as a stack output
    pub fn output(
        &mut self,
        stack: &str,
        name: &str,
        value: Value,
        description: &str,
    ) -> ProvisioningResult<()> {
        for target in referenced_ids(&value) {
            if !self.resources.contains_key(target.as_str()) {
                return Err(ProvisioningError::Structural(format!(
                    "Output {} references undeclared resource {}",
                    name, target
                )));
            }
        }
        if self.outputs.iter().any(|o| o.stack == stack && o.name == name) {
            return Err(ProvisioningError::Structural(format!(
                "Output {} declared twice in {}",
                name, stack
            )));
        }

        self.outputs.push(Output {
            name: name.to_string(),
            stack: stack.to_string(),
            value,
            description: description.to_string(),
        });
        Ok(())
    }

    pub fn get(&self, id: &LogicalId) -> Option<&Resource> {
        self.resources.get(id)
    }

    pub fn contains(&self, id: &LogicalId) -> bool {
        self.resources.contains_key(id)
    }

    /// Resources in declaration (topological) order
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.order.iter().filter_map(|id| self.resources.get(id))
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Stack names in first-declaration order
    pub fn stacks(&self) -> Vec<String> {
        let mut stacks: Vec<String> = Vec::new();
        for resource in self.resources() {
            if !stacks.contains(&resource.stack) {
                stacks.push(resource.stack.clone());
            }
        }
        stacks
    }

    /// Resources whose dependencies include `id`
    pub fn dependents_of(&self, id: &LogicalId) -> Vec<&Resource> {
        self.resources()
            .filter(|r| r.dependencies().contains(id))
            .collect()
    }
}

impl std::borrow::Borrow<str> for LogicalId {
    fn borrow(&self) -> &str {
        &self.0
    }
}
