// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for the Trust Subject Allow-List
//!
//! The deployment role must accept the configured repository (bare, or with
//! any ref suffix) and nothing else.

use gitops_platform::domain::string_like;
use gitops_platform::stacks::trust::STS_AUDIENCE;
use gitops_platform::stacks::TrustPolicy;
use gitops_platform::PlatformApp;
use proptest::prelude::*;

use crate::fixtures::{demo_config, resolver_for};

const OWNER: &str = "kenneth-de-guzman";
const NAME: &str = "gitops-platform-aws";

fn trust_policy() -> TrustPolicy {
    let config = demo_config();
    let resolver = resolver_for(&config);
    let platform = PlatformApp::new(config).build(&resolver).unwrap();
    platform.deployment.identity.trust().clone()
}

proptest! {
    #[test]
    fn prop_any_ref_of_repository_is_accepted(suffix in "[a-zA-Z0-9/:._-]{0,40}") {
        let policy = trust_policy();
        let subject = format!("repo:{}/{}/{}", OWNER, NAME, suffix);
        prop_assert!(policy.permits(STS_AUDIENCE, &subject));
    }

    #[test]
    fn prop_other_repositories_are_rejected(
        owner in "[a-z0-9-]{1,20}",
        name in "[a-z0-9-]{1,24}",
        suffix in "(/[a-z0-9:/]{0,20})?",
    ) {
        prop_assume!(owner != OWNER || name != NAME);
        let policy = trust_policy();
        let subject = format!("repo:{}/{}{}", owner, name, suffix);
        prop_assert!(!policy.permits(STS_AUDIENCE, &subject));
    }

    #[test]
    fn prop_wrong_audience_is_rejected(audience in "[a-z.]{1,30}") {
        prop_assume!(audience != STS_AUDIENCE);
        let policy = trust_policy();
        let subject = format!("repo:{}/{}", OWNER, NAME);
        prop_assert!(!policy.permits(&audience, &subject));
    }

    #[test]
    fn prop_literal_patterns_match_only_themselves(a in "[a-z:/]{0,12}", b in "[a-z:/]{0,12}") {
        prop_assert_eq!(string_like(&a, &b), a == b);
    }
}
