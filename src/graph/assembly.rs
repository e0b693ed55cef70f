// Copyright (c) 2025 - Cowboy AI, Inc.
//! Cloud Assembly Synthesis
//!
//! Turns a [`ResourceGraph`] into one template per stack plus a manifest, the
//! artifact an external provisioning engine deploys.
//!
//! # Cross-stack References
//!
//! ```text
//! CommonNetworkStack                    EksEcrStack
//! ──────────────────                    ───────────
//! Outputs:                              Cluster.SubnetIds:
//!   ExportVpcPrivateSubnet1Ref  ◄─────    { "Fn::ImportValue": "CommonNetworkStack:ExportVpcPrivateSubnet1Ref" }
//!     Export.Name = CommonNetworkStack:ExportVpcPrivateSubnet1Ref
//! ```
//!
//! A `Ref` or `Fn::GetAtt` that crosses a stack boundary is rewritten into an
//! import, the producing stack gains a matching export, and the consuming
//! stack records a deployment dependency. Synthesis is a pure function of the
//! graph: the same graph always yields byte-identical templates.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

use super::{Output, Resource, ResourceGraph, TagFormat};
use crate::domain::{AccountId, Region};
use crate::errors::{ProvisioningError, ProvisioningResult};

/// Template format version
pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// Assembly manifest schema version
pub const ASSEMBLY_VERSION: &str = "1.0.0";

/// Synthesized template for a single stack
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,

    #[serde(rename = "Description")]
    pub description: String,

    #[serde(rename = "Resources")]
    pub resources: Map<String, Value>,

    #[serde(rename = "Outputs", skip_serializing_if = "Map::is_empty", default)]
    pub outputs: Map<String, Value>,
}

impl Template {
    fn new(stack: &str) -> Self {
        Self {
            format_version: TEMPLATE_FORMAT_VERSION.to_string(),
            description: format!("{} (synthesized by gitops-platform)", stack),
            resources: Map::new(),
            outputs: Map::new(),
        }
    }

    /// Resource entry by logical id
    pub fn resource(&self, logical_id: &str) -> Option<&Value> {
        self.resources.get(logical_id)
    }

    /// Logical ids of every resource with the given provider type
    pub fn resources_of_type(&self, type_name: &str) -> Vec<&str> {
        self.resources
            .iter()
            .filter(|(_, r)| r["Type"] == type_name)
            .map(|(id, _)| id.as_str())
            .collect()
    }
}

/// Deployable unit: one template plus its target and ordering
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackArtifact {
    pub name: String,
    pub account: AccountId,
    pub region: Region,
    /// Stacks that must be deployed first
    pub dependencies: Vec<String>,
    pub template: Template,
}

impl StackArtifact {
    /// File name of the template within an assembly directory
    pub fn template_file(&self) -> String {
        format!("{}.template.json", self.name)
    }
}

/// Complete synthesis output, ordered for deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CloudAssembly {
    pub version: String,
    pub stacks: Vec<StackArtifact>,
}

struct Import {
    producer: String,
    export_id: String,
    value: Value,
}

impl CloudAssembly {
    /// Synthesize every stack in the graph
    pub fn synthesize(
        graph: &ResourceGraph,
        account: &AccountId,
        region: &Region,
    ) -> ProvisioningResult<Self> {
        let stack_names = graph.stacks();
        let mut templates: BTreeMap<String, Template> = stack_names
            .iter()
            .map(|name| (name.clone(), Template::new(name)))
            .collect();
        let mut dependencies: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut imports: Vec<Import> = Vec::new();

        for resource in graph.resources() {
            let mut found = Vec::new();
            let entry = render_resource(resource, graph, &mut found)?;

            for dependency in &resource.depends_on {
                if let Some(other) = graph.get(dependency) {
                    if other.stack != resource.stack {
                        dependencies
                            .entry(resource.stack.clone())
                            .or_default()
                            .insert(other.stack.clone());
                    }
                }
            }
            record_imports(&resource.stack, found, &mut dependencies, &mut imports);

            if let Some(template) = templates.get_mut(&resource.stack) {
                template
                    .resources
                    .insert(resource.logical_id.to_string(), entry);
            }
        }

        for output in graph.outputs() {
            let mut found = Vec::new();
            let entry = render_output(output, graph, &mut found);
            record_imports(&output.stack, found, &mut dependencies, &mut imports);

            let template = templates
                .entry(output.stack.clone())
                .or_insert_with(|| Template::new(&output.stack));
            template.outputs.insert(output.name.clone(), entry);
        }

        for import in imports {
            if let Some(template) = templates.get_mut(&import.producer) {
                template.outputs.insert(
                    import.export_id.clone(),
                    json!({
                        "Value": import.value,
                        "Export": { "Name": export_name(&import.producer, &import.export_id) }
                    }),
                );
            }
        }

        let mut ordered: Vec<String> = stack_names;
        for name in templates.keys() {
            if !ordered.contains(name) {
                ordered.push(name.clone());
            }
        }

        let mut stacks = Vec::with_capacity(ordered.len());
        for (position, name) in ordered.iter().enumerate() {
            let deps: Vec<String> = dependencies
                .get(name)
                .map(|d| d.iter().cloned().collect())
                .unwrap_or_default();

            // Invariant: a stack may only depend on stacks deployed before it
            for dep in &deps {
                let dep_position = ordered.iter().position(|n| n == dep).unwrap_or(usize::MAX);
                if dep_position >= position {
                    return Err(ProvisioningError::Structural(format!(
                        "Stack {} depends on {} which is not deployed before it",
                        name, dep
                    )));
                }
            }

            let template = templates
                .remove(name)
                .unwrap_or_else(|| Template::new(name));
            debug!(
                "Synthesized {} with {} resources and {} outputs",
                name,
                template.resources.len(),
                template.outputs.len()
            );

            stacks.push(StackArtifact {
                name: name.clone(),
                account: account.clone(),
                region: region.clone(),
                dependencies: deps,
                template,
            });
        }

        info!("Synthesized cloud assembly with {} stacks", stacks.len());

        Ok(Self {
            version: ASSEMBLY_VERSION.to_string(),
            stacks,
        })
    }

    pub fn stack(&self, name: &str) -> Option<&StackArtifact> {
        self.stacks.iter().find(|s| s.name == name)
    }

    pub fn stack_names(&self) -> Vec<&str> {
        self.stacks.iter().map(|s| s.name.as_str()).collect()
    }

    /// Manifest describing every artifact in the assembly
    pub fn manifest(&self) -> Value {
        let artifacts: Map<String, Value> = self
            .stacks
            .iter()
            .map(|stack| {
                (
                    stack.name.clone(),
                    json!({
                        "type": "aws:cloudformation:stack",
                        "environment": format!("aws://{}/{}", stack.account, stack.region),
                        "properties": { "templateFile": stack.template_file() },
                        "dependencies": stack.dependencies,
                    }),
                )
            })
            .collect();

        json!({
            "version": self.version,
            "artifacts": artifacts,
        })
    }
}

fn export_name(producer: &str, export_id: &str) -> String {
    format!("{}:{}", producer, export_id)
}

fn record_imports(
    consumer: &str,
    found: Vec<Import>,
    dependencies: &mut BTreeMap<String, BTreeSet<String>>,
    imports: &mut Vec<Import>,
) {
    for import in found {
        dependencies
            .entry(consumer.to_string())
            .or_default()
            .insert(import.producer.clone());
        if !imports
            .iter()
            .any(|i| i.producer == import.producer && i.export_id == import.export_id)
        {
            imports.push(import);
        }
    }
}

fn render_resource(
    resource: &Resource,
    graph: &ResourceGraph,
    imports: &mut Vec<Import>,
) -> ProvisioningResult<Value> {
    let mut properties = Map::new();
    for (key, value) in &resource.properties {
        properties.insert(key.clone(), localize(value, &resource.stack, graph, imports));
    }

    if !resource.tags.is_empty() {
        let tags = match resource.kind.tag_format() {
            TagFormat::List => Value::Array(
                resource
                    .tags
                    .iter()
                    .map(|(k, v)| json!({ "Key": k, "Value": v }))
                    .collect(),
            ),
            TagFormat::Map => json!(resource.tags),
            TagFormat::Unsupported => {
                return Err(ProvisioningError::Structural(format!(
                    "{} cannot carry tags",
                    resource.kind
                )))
            }
        };
        properties.insert("Tags".to_string(), tags);
    }

    let mut entry = Map::new();
    entry.insert("Type".to_string(), json!(resource.kind.type_name()));
    entry.insert("Properties".to_string(), Value::Object(properties));

    let same_stack: Vec<&str> = resource
        .depends_on
        .iter()
        .filter(|id| graph.get(id).is_some_and(|r| r.stack == resource.stack))
        .map(|id| id.as_str())
        .collect();
    if !same_stack.is_empty() {
        entry.insert("DependsOn".to_string(), json!(same_stack));
    }

    if resource.retain_on_delete {
        entry.insert("DeletionPolicy".to_string(), json!("Retain"));
        entry.insert("UpdateReplacePolicy".to_string(), json!("Retain"));
    }

    if !resource.metadata.is_empty() {
        entry.insert("Metadata".to_string(), Value::Object(resource.metadata.clone()));
    }

    Ok(Value::Object(entry))
}

fn render_output(output: &Output, graph: &ResourceGraph, imports: &mut Vec<Import>) -> Value {
    json!({
        "Description": output.description,
        "Value": localize(&output.value, &output.stack, graph, imports),
    })
}

/// Rewrite references that leave `stack` into imports
fn localize(value: &Value, stack: &str, graph: &ResourceGraph, imports: &mut Vec<Import>) -> Value {
    match value {
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some(Value::String(target)) = map.get("Ref") {
                    if let Some(producer) = foreign_stack(graph, target, stack) {
                        return import(producer, format!("Export{}Ref", target), value, imports);
                    }
                }
                if let Some(Value::Array(parts)) = map.get("Fn::GetAtt") {
                    if let [Value::String(target), Value::String(attr)] = parts.as_slice() {
                        if let Some(producer) = foreign_stack(graph, target, stack) {
                            let export_id = format!("Export{}{}", target, attr.replace('.', ""));
                            return import(producer, export_id, value, imports);
                        }
                    }
                }
            }
            Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), localize(v, stack, graph, imports)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|v| localize(v, stack, graph, imports))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn foreign_stack(graph: &ResourceGraph, target: &str, stack: &str) -> Option<String> {
    graph
        .resources()
        .find(|r| r.logical_id.as_str() == target)
        .filter(|r| r.stack != stack)
        .map(|r| r.stack.clone())
}

fn import(producer: String, export_id: String, value: &Value, imports: &mut Vec<Import>) -> Value {
    let name = export_name(&producer, &export_id);
    imports.push(Import {
        producer,
        export_id,
        value: value.clone(),
    });
    json!({ "Fn::ImportValue": name })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{reference, LogicalId, ResourceKind};
    use pretty_assertions::assert_eq;

    fn id(s: &str) -> LogicalId {
        LogicalId::new(s).unwrap()
    }

    fn target() -> (AccountId, Region) {
        (
            AccountId::new("123456789012").unwrap(),
            Region::new("us-east-1").unwrap(),
        )
    }

    fn two_stack_graph() -> ResourceGraph {
        let mut graph = ResourceGraph::new();
        graph
            .add("Network", Resource::new(id("Vpc"), ResourceKind::Vpc))
            .unwrap();
        graph
            .add(
                "Network",
                Resource::new(id("SubnetA"), ResourceKind::Subnet)
                    .property("VpcId", reference(&id("Vpc"))),
            )
            .unwrap();
        graph
            .add(
                "Compute",
                Resource::new(id("Cluster"), ResourceKind::Cluster)
                    .property("SubnetIds", json!([reference(&id("SubnetA"))])),
            )
            .unwrap();
        graph
    }

    #[test]
    fn test_cross_stack_reference_becomes_import() {
        let (account, region) = target();
        let assembly = CloudAssembly::synthesize(&two_stack_graph(), &account, &region).unwrap();

        assert_eq!(assembly.stack_names(), vec!["Network", "Compute"]);

        let compute = assembly.stack("Compute").unwrap();
        assert_eq!(compute.dependencies, vec!["Network".to_string()]);
        assert_eq!(
            compute.template.resource("Cluster").unwrap()["Properties"]["SubnetIds"],
            json!([{ "Fn::ImportValue": "Network:ExportSubnetARef" }])
        );

        let network = assembly.stack("Network").unwrap();
        assert_eq!(
            network.template.outputs["ExportSubnetARef"],
            json!({
                "Value": { "Ref": "SubnetA" },
                "Export": { "Name": "Network:ExportSubnetARef" }
            })
        );
        // Same-stack references stay local
        assert_eq!(
            network.template.resource("SubnetA").unwrap()["Properties"]["VpcId"],
            json!({ "Ref": "Vpc" })
        );
    }

    #[test]
    fn test_backward_stack_dependency_is_rejected() {
        let mut graph = ResourceGraph::new();
        graph
            .add("Compute", Resource::new(id("Role"), ResourceKind::Role))
            .unwrap();
        graph
            .add("Network", Resource::new(id("Vpc"), ResourceKind::Vpc))
            .unwrap();
        graph
            .add(
                "Compute",
                Resource::new(id("Cluster"), ResourceKind::Cluster)
                    .property("VpcId", reference(&id("Vpc"))),
            )
            .unwrap();

        let (account, region) = target();
        let err = CloudAssembly::synthesize(&graph, &account, &region).unwrap_err();
        assert!(matches!(err, ProvisioningError::Structural(_)));
    }

    #[test]
    fn test_tags_and_retention_rendering() {
        let mut tags = crate::domain::Tags::new();
        tags.insert("app".into(), "demo".into());

        let mut graph = ResourceGraph::new();
        graph
            .add(
                "Compute",
                Resource::new(id("Repo"), ResourceKind::Repository)
                    .tags(&tags)
                    .retain(),
            )
            .unwrap();
        graph
            .add(
                "Compute",
                Resource::new(id("Pool"), ResourceKind::Nodegroup).tags(&tags),
            )
            .unwrap();

        let (account, region) = target();
        let assembly = CloudAssembly::synthesize(&graph, &account, &region).unwrap();
        let template = &assembly.stack("Compute").unwrap().template;

        let repo = template.resource("Repo").unwrap();
        assert_eq!(repo["Properties"]["Tags"], json!([{ "Key": "app", "Value": "demo" }]));
        assert_eq!(repo["DeletionPolicy"], "Retain");

        let pool = template.resource("Pool").unwrap();
        assert_eq!(pool["Properties"]["Tags"], json!({ "app": "demo" }));
        assert!(pool.get("DeletionPolicy").is_none());
    }

    #[test]
    fn test_synthesis_is_deterministic() {
        let (account, region) = target();
        let first = CloudAssembly::synthesize(&two_stack_graph(), &account, &region).unwrap();
        let second = CloudAssembly::synthesize(&two_stack_graph(), &account, &region).unwrap();
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_manifest_lists_templates() {
        let (account, region) = target();
        let assembly = CloudAssembly::synthesize(&two_stack_graph(), &account, &region).unwrap();
        let manifest = assembly.manifest();

        assert_eq!(
            manifest["artifacts"]["Compute"]["properties"]["templateFile"],
            "Compute.template.json"
        );
        assert_eq!(
            manifest["artifacts"]["Compute"]["environment"],
            "aws://123456789012/us-east-1"
        );
        assert_eq!(manifest["artifacts"]["Compute"]["dependencies"], json!(["Network"]));
    }
}
