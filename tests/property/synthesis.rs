// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Deterministic Synthesis
//!
//! Identical configuration must always yield identical names and
//! byte-identical templates.

use gitops_platform::config::{APPLICATION_VAR, ENVIRONMENT_VAR};
use gitops_platform::{PlatformApp, PlatformConfig, CLUSTER_STACK, NETWORK_STACK};
use proptest::prelude::*;

use crate::fixtures::{lookup, resolver_for};

fn config(env: &str, app: &str) -> PlatformConfig {
    PlatformConfig::from_lookup(lookup(&[(ENVIRONMENT_VAR, env), (APPLICATION_VAR, app)])).unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_names_follow_application_and_environment(
        env in "[a-z][a-z0-9]{0,7}",
        app in "[a-z][a-z0-9-]{0,15}",
    ) {
        let ctx = config(&env, &app).context;
        prop_assert_eq!(ctx.cluster_name(), format!("{}-eks-cluster-{}", app, env));
        prop_assert_eq!(ctx.registry_name(), format!("{}-app-{}", app, env));
        prop_assert_eq!(ctx.role_name(), format!("{}-github-actions-role-{}", app, env));
    }

    #[test]
    fn prop_synthesis_is_deterministic(
        env in "[a-z][a-z0-9]{0,7}",
        app in "[a-z][a-z0-9-]{0,15}",
    ) {
        let render = || {
            let config = config(&env, &app);
            let resolver = resolver_for(&config);
            let assembly = PlatformApp::new(config).synth(&resolver).unwrap();
            serde_json::to_string(&assembly).unwrap()
        };
        prop_assert_eq!(render(), render());
    }

    #[test]
    fn prop_every_synthesized_resource_is_tagged(env in "[a-z][a-z0-9]{0,7}") {
        let config = config(&env, "demo");
        let resolver = resolver_for(&config);
        let assembly = PlatformApp::new(config).synth(&resolver).unwrap();

        for stack in [NETWORK_STACK, CLUSTER_STACK] {
            let template = &assembly.stack(stack).unwrap().template;
            for (id, resource) in &template.resources {
                let tags = &resource["Properties"]["Tags"];
                if tags.is_null() {
                    continue;
                }
                let carried = match tags {
                    serde_json::Value::Array(list) => {
                        list.contains(&serde_json::json!({ "Key": "env", "Value": env }))
                            && list.contains(&serde_json::json!({ "Key": "app", "Value": "demo" }))
                    }
                    serde_json::Value::Object(map) => {
                        map.get("env") == Some(&serde_json::json!(env))
                            && map.get("app") == Some(&serde_json::json!("demo"))
                    }
                    _ => false,
                };
                prop_assert!(carried, "{} in {} lacks the tag set", id, stack);
            }
        }
    }
}
