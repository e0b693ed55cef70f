// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Capacity Pool Bounds
//!
//! A pool is accepted exactly when `min <= desired <= max` and `max >= 1`,
//! and scaling never leaves the declared bounds.

use gitops_platform::stacks::CapacityPoolSpec;
use gitops_platform::{PlatformApp, ProvisioningError};
use proptest::prelude::*;

use crate::fixtures::{demo_config, resolver_for};

fn pool(min: u32, desired: u32, max: u32) -> CapacityPoolSpec {
    CapacityPoolSpec {
        min_size: min,
        desired_size: desired,
        max_size: max,
        ..CapacityPoolSpec::managed_default()
    }
}

proptest! {
    #[test]
    fn prop_pool_accepted_iff_bounds_hold(min in 0u32..8, desired in 0u32..8, max in 0u32..8) {
        let mut config = demo_config();
        config.cluster.pools = vec![pool(min, desired, max)];
        let resolver = resolver_for(&config);
        let result = PlatformApp::new(config).build(&resolver);

        let valid = min <= desired && desired <= max && max >= 1;
        prop_assert_eq!(result.is_ok(), valid);
        if !valid {
            let is_construction_err = matches!(result, Err(ProvisioningError::Construction { .. }));
            prop_assert!(is_construction_err);
        }
    }

    #[test]
    fn prop_scaling_stays_within_bounds(target in 0u32..10) {
        let config = demo_config();
        let resolver = resolver_for(&config);
        let mut platform = PlatformApp::new(config).build(&resolver).unwrap();
        let pool = platform
            .deployment
            .cluster
            .pool_mut("ManagedNodeGroup")
            .unwrap();

        let before = pool.desired_size();
        let result = pool.scale_to(target);
        let (min, max) = (pool.spec().min_size, pool.spec().max_size);

        if (min..=max).contains(&target) {
            prop_assert!(result.is_ok());
            prop_assert_eq!(pool.desired_size(), target);
        } else {
            prop_assert!(result.is_err());
            prop_assert_eq!(pool.desired_size(), before);
        }
        prop_assert!(pool.desired_size() >= min && pool.desired_size() <= max);
    }
}
