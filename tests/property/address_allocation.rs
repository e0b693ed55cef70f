// Copyright (c) 2025 - Cowboy AI, Inc.
//! Property-Based Tests for Network Address Allocation

use gitops_platform::config::NetworkSettings;
use gitops_platform::domain::{Ipv4Cidr, ZoneCount};
use gitops_platform::stacks::{Egress, NetworkStack, SubnetKind};
use gitops_platform::ProvisioningError;
use proptest::prelude::*;

use crate::fixtures::demo_config;

proptest! {
    #[test]
    fn prop_subnets_are_disjoint_and_contained(zones in 1usize..=6, nat in 1usize..=6) {
        prop_assume!(nat <= zones);
        let ctx = demo_config().context;
        let settings = NetworkSettings::new(
            Ipv4Cidr::new("10.0.0.0/16").unwrap(),
            ZoneCount::new(zones).unwrap(),
            24,
            nat,
        )
        .unwrap();
        let boundary = NetworkStack::construct(&ctx, &settings).unwrap();

        prop_assert_eq!(boundary.public_subnets().subnets().len(), zones);
        prop_assert_eq!(boundary.private_subnets().subnets().len(), zones);
        prop_assert_eq!(boundary.nat_gateways().len(), nat);

        let subnets: Vec<_> = boundary.subnets().collect();
        for (i, a) in subnets.iter().enumerate() {
            prop_assert!(boundary.cidr().contains(&a.cidr()));
            for b in &subnets[i + 1..] {
                prop_assert!(!a.cidr().overlaps(&b.cidr()));
            }
        }

        for subnet in boundary.private_subnets().subnets() {
            prop_assert_eq!(subnet.kind(), SubnetKind::Private);
            prop_assert!(matches!(subnet.egress(), Egress::Nat(_)));
        }
    }

    #[test]
    fn prop_allocation_fits_or_fails_cleanly(prefix in 17u8..=28, zones in 1usize..=6) {
        let ctx = demo_config().context;
        let settings = NetworkSettings::new(
            Ipv4Cidr::new("10.0.0.0/16").unwrap(),
            ZoneCount::new(zones).unwrap(),
            prefix,
            1,
        )
        .unwrap();

        let capacity = 1usize << (prefix - 16);
        match NetworkStack::construct(&ctx, &settings) {
            Ok(boundary) => {
                prop_assert!(2 * zones <= capacity);
                prop_assert!(boundary.subnets().all(|s| s.cidr().prefix_length() == prefix));
            }
            Err(err) => {
                prop_assert!(2 * zones > capacity);
                prop_assert!(matches!(err, ProvisioningError::Configuration(_)));
            }
        }
    }
}
