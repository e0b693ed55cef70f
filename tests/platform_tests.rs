// Copyright (c) 2025 - Cowboy AI, Inc.
//! End-to-end construction and synthesis of the platform

mod fixtures;

use fixtures::*;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use gitops_platform::graph::ResourceKind;
use gitops_platform::stacks::trust::CLUSTER_READ_ACTIONS;
use gitops_platform::config::ACCOUNT_VAR;
use gitops_platform::{
    ArnAnchorResolver, KnownAnchors, PlatformApp, PlatformConfig, ProvisioningError,
    CLUSTER_STACK, NETWORK_STACK,
};

#[test]
fn test_demo_names() {
    let (app, resolver) = demo_app();
    let platform = app.build(&resolver).unwrap();
    let deployment = &platform.deployment;

    assert_eq!(deployment.registry.name(), "demo-app-dev");
    assert_eq!(deployment.cluster.name(), "demo-eks-cluster-dev");
    assert_eq!(deployment.identity.role().name(), "demo-github-actions-role-dev");
    assert_eq!(
        deployment.registry.uri(),
        "123456789012.dkr.ecr.us-east-1.amazonaws.com/demo-app-dev"
    );
}

#[test]
fn test_defaults_without_environment() {
    let config = default_config();
    let resolver = resolver_for(&config);
    let app = PlatformApp::new(config);

    let platform = app.build(&resolver).unwrap();
    assert_eq!(
        platform.deployment.cluster.name(),
        "gitops-platform-aws-eks-cluster-dev"
    );
    assert_eq!(
        platform.deployment.cluster.arn().to_string(),
        "arn:aws:eks:ap-southeast-2:695418593935:cluster/gitops-platform-aws-eks-cluster-dev"
    );
}

#[test]
fn test_account_override_keeps_default_anchor_resolvable() {
    let config = PlatformConfig::from_lookup(lookup(&[(ACCOUNT_VAR, ACCOUNT)])).unwrap();
    let resolver = ArnAnchorResolver::new(config.context.account().clone());
    let app = PlatformApp::new(config);

    let platform = app.build(&resolver).unwrap();
    assert_eq!(
        platform.deployment.identity.anchor().arn().to_string(),
        ANCHOR
    );
    assert_eq!(
        platform.deployment.identity.role().arn().to_string(),
        "arn:aws:iam::123456789012:role/gitops-platform-aws-github-actions-role-dev"
    );
}

#[test]
fn test_unresolved_anchor_fails_before_dependent_stacks() {
    let app = PlatformApp::new(demo_config());
    let err = app.synth(&KnownAnchors::new()).unwrap_err();

    assert!(matches!(err, ProvisioningError::AnchorNotFound(_)));
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn test_cluster_placed_in_private_subnets_only() {
    let (app, resolver) = demo_app();
    let assembly = app.synth(&resolver).unwrap();

    let network = &assembly.stack(NETWORK_STACK).unwrap().template;
    let cluster_stack = &assembly.stack(CLUSTER_STACK).unwrap().template;

    let imported: Vec<Value> = network
        .resources_of_type("AWS::EC2::Subnet")
        .into_iter()
        .filter(|id| id.contains("PrivateSubnet"))
        .map(|id| {
            json!({ "Fn::ImportValue": format!("{}:Export{}Ref", NETWORK_STACK, id) })
        })
        .collect();
    assert_eq!(imported.len(), 2);

    let cluster = cluster_stack.resource("EksCluster").unwrap();
    assert_eq!(
        cluster["Properties"]["ResourcesVpcConfig"]["SubnetIds"],
        Value::Array(imported.clone())
    );

    for id in cluster_stack.resources_of_type("AWS::EKS::Nodegroup") {
        let pool = cluster_stack.resource(id).unwrap();
        assert_eq!(pool["Properties"]["Subnets"], Value::Array(imported.clone()));
    }

    // Public subnets are never exported to the cluster stack
    for name in network.outputs.keys() {
        assert!(!name.contains("PublicSubnet"), "unexpected export {}", name);
    }
}

#[test]
fn test_every_taggable_resource_carries_tag_set() {
    let (app, resolver) = demo_app();
    let platform = app.build(&resolver).unwrap();
    let graph = platform.graph().unwrap();
    let tags = app.config().context.tags();
    assert!(platform.network.is_tagged_with(tags));

    let mut checked = 0;
    for resource in graph.resources() {
        if resource.kind.supports_tags() {
            assert!(
                tags.is_carried_by(&resource.tags),
                "{} ({}) is missing tags",
                resource.logical_id,
                resource.kind
            );
            checked += 1;
        } else {
            assert!(resource.tags.is_empty());
        }
    }
    assert!(checked > 10);

    let assembly = app.synth(&resolver).unwrap();
    let role = assembly
        .stack(CLUSTER_STACK)
        .unwrap()
        .template
        .resource("GitHubActionsRole")
        .unwrap()
        .clone();
    let role_tags = role["Properties"]["Tags"].as_array().unwrap();
    assert!(role_tags.contains(&json!({ "Key": "env", "Value": "dev" })));
    assert!(role_tags.contains(&json!({ "Key": "app", "Value": "demo" })));
}

#[test]
fn test_deployment_role_permissions_in_template() {
    let (app, resolver) = demo_app();
    let assembly = app.synth(&resolver).unwrap();
    let template = &assembly.stack(CLUSTER_STACK).unwrap().template;
    let role = &template.resource("GitHubActionsRole").unwrap()["Properties"];

    assert_eq!(role["RoleName"], "demo-github-actions-role-dev");
    assert_eq!(
        role["ManagedPolicyArns"],
        json!(["arn:aws:iam::aws:policy/PowerUserAccess"])
    );

    let statements = role["Policies"][0]["PolicyDocument"]["Statement"]
        .as_array()
        .unwrap();
    let introspection = statements
        .iter()
        .find(|s| s["Action"] == json!(CLUSTER_READ_ACTIONS))
        .unwrap();
    assert_eq!(
        introspection["Resource"],
        json!(["arn:aws:eks:us-east-1:123456789012:cluster/demo-eks-cluster-dev"])
    );

    let login = statements
        .iter()
        .find(|s| s["Action"] == json!(["ecr:GetAuthorizationToken"]))
        .unwrap();
    assert_eq!(login["Resource"], json!(["*"]));
}

#[test]
fn test_registry_template() {
    let (app, resolver) = demo_app();
    let assembly = app.synth(&resolver).unwrap();
    let template = &assembly.stack(CLUSTER_STACK).unwrap().template;
    let registry = template.resource("AppECR").unwrap();

    assert_eq!(registry["Type"], "AWS::ECR::Repository");
    assert_eq!(registry["DeletionPolicy"], "Retain");
    assert_eq!(registry["Properties"]["RepositoryName"], "demo-app-dev");
    assert_eq!(
        registry["Properties"]["ImageScanningConfiguration"],
        json!({ "ScanOnPush": true })
    );
}

#[test]
fn test_network_template_shape() {
    let (app, resolver) = demo_app();
    let platform = app.build(&resolver).unwrap();
    let graph = platform.graph().unwrap();

    let count = |kind: ResourceKind| graph.resources().filter(|r| r.kind == kind).count();
    assert_eq!(count(ResourceKind::Vpc), 1);
    assert_eq!(count(ResourceKind::Subnet), 4);
    assert_eq!(count(ResourceKind::NatGateway), 1);
    assert_eq!(count(ResourceKind::InternetGateway), 1);
    assert_eq!(count(ResourceKind::Route), 4);
    assert_eq!(count(ResourceKind::Cluster), 1);
    assert_eq!(count(ResourceKind::Nodegroup), 1);
}

#[test]
fn test_synthesis_is_deterministic() {
    let (first_app, first_resolver) = demo_app();
    let (second_app, second_resolver) = demo_app();

    let first = serde_json::to_string(&first_app.synth(&first_resolver).unwrap()).unwrap();
    let second = serde_json::to_string(&second_app.synth(&second_resolver).unwrap()).unwrap();
    assert_eq!(first, second);
}
