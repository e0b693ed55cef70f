// Copyright (c) 2025 - Cowboy AI, Inc.
//! Test Fixtures for gitops-platform
//!
//! Configuration is always resolved from a fixed variable map, never from the
//! real process environment, so tests are reproducible and can run in parallel.

#![allow(dead_code)]

use std::collections::HashMap;

use gitops_platform::config::{
    ACCOUNT_VAR, APPLICATION_VAR, ENVIRONMENT_VAR, FEDERATION_ANCHOR_VAR, REGION_VAR,
};
use gitops_platform::{KnownAnchors, PlatformApp, PlatformConfig};

pub const ACCOUNT: &str = "123456789012";
pub const REGION: &str = "us-east-1";
pub const ANCHOR: &str =
    "arn:aws:iam::123456789012:oidc-provider/token.actions.githubusercontent.com";

/// Variable source backed by a fixed map
pub fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let vars: HashMap<String, String> = pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key| vars.get(key).cloned()
}

/// `ENV=dev, APP=demo` in a fixed test account
pub fn demo_config() -> PlatformConfig {
    PlatformConfig::from_lookup(lookup(&[
        (ENVIRONMENT_VAR, "dev"),
        (APPLICATION_VAR, "demo"),
        (ACCOUNT_VAR, ACCOUNT),
        (REGION_VAR, REGION),
        (FEDERATION_ANCHOR_VAR, ANCHOR),
    ]))
    .expect("Invalid demo configuration")
}

/// Configuration resolved with no variables set
pub fn default_config() -> PlatformConfig {
    PlatformConfig::from_lookup(|_| None).expect("Defaults must resolve")
}

/// Resolver that knows exactly the configured anchor
pub fn resolver_for(config: &PlatformConfig) -> KnownAnchors {
    KnownAnchors::new()
        .register(config.context.federation_anchor())
        .expect("Invalid anchor in test fixture")
}

pub fn demo_app() -> (PlatformApp, KnownAnchors) {
    let config = demo_config();
    let resolver = resolver_for(&config);
    (PlatformApp::new(config), resolver)
}
