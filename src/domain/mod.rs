// Copyright (c) 2025 - Cowboy AI, Inc.
//! Platform Domain Models
//!
//! Value objects shared by every stack. All of them validate on construction,
//! so a stack that holds one never re-checks it.
//!
//! # Value Objects with Invariants
//!
//! - [`Ipv4Cidr`] - IPv4 address range with host bits clear
//! - [`ZoneCount`] - Availability zones spanned by the network (1-6)
//! - [`AccountId`] / [`Region`] - Deployment target
//! - [`Arn`] - Provider resource name
//! - [`TagSet`] - Validated labels applied through [`Taggable`]
//! - [`PolicyDocument`] - Identity and trust policies

pub mod arn;
pub mod network;
pub mod policy;
pub mod tags;

pub use arn::{AccountId, Arn, ArnError, Region};
pub use network::{Ipv4Cidr, NetworkError, ZoneCount};
pub use policy::{
    string_like, ConditionOperator, Effect, PolicyDocument, PolicyStatement, Principal,
    POLICY_VERSION,
};
pub use tags::{apply_tags, TagError, TagSet, Taggable, Tags, APP_TAG_KEY, ENV_TAG_KEY};
