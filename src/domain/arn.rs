// Copyright (c) 2025 - Cowboy AI, Inc.
//! Provider Identity Value Objects
//!
//! Account, region and resource-name (ARN) value objects. Every identifier the
//! core hands to downstream consumers is built from these, so a malformed
//! account or region is rejected once, at configuration time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identity validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArnError {
    #[error("Malformed ARN: {0}")]
    Malformed(String),

    #[error("Invalid account identifier: {0} (must be 12 digits)")]
    InvalidAccount(String),

    #[error("Invalid region: {0}")]
    InvalidRegion(String),
}

/// Cloud account identifier
///
/// # Invariants
/// - Exactly 12 ASCII digits
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Result<Self, ArnError> {
        let id = id.into();
        if id.len() != 12 || !id.chars().all(|c| c.is_ascii_digit()) {
            return Err(ArnError::InvalidAccount(id));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for AccountId {
    type Error = ArnError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AccountId> for String {
    fn from(id: AccountId) -> Self {
        id.0
    }
}

/// Cloud region such as `ap-southeast-2`
///
/// # Invariants
/// - At least three hyphen-separated lowercase segments
/// - Final segment is numeric
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Region(String);

impl Region {
    pub fn new(region: impl Into<String>) -> Result<Self, ArnError> {
        let region = region.into();
        let segments: Vec<&str> = region.split('-').collect();

        let well_formed = segments.len() >= 3
            && segments
                .iter()
                .all(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()))
            && segments
                .last()
                .is_some_and(|s| s.chars().all(|c| c.is_ascii_digit()));

        if !well_formed {
            return Err(ArnError::InvalidRegion(region));
        }
        Ok(Self(region))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Region {
    type Error = ArnError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Region> for String {
    fn from(region: Region) -> Self {
        region.0
    }
}

/// Amazon Resource Name
///
/// `arn:partition:service:region:account:resource`. Global services (IAM)
/// leave the region empty; managed policies leave the account as `aws`.
///
/// # Examples
///
/// ```rust
/// use gitops_platform::domain::Arn;
///
/// let arn: Arn = "arn:aws:iam::695418593935:oidc-provider/token.actions.githubusercontent.com"
///     .parse()
///     .unwrap();
/// assert_eq!(arn.service(), "iam");
/// assert_eq!(arn.resource(), "oidc-provider/token.actions.githubusercontent.com");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Arn {
    partition: String,
    service: String,
    region: String,
    account: String,
    resource: String,
}

impl Arn {
    /// Default partition
    pub const PARTITION: &'static str = "aws";

    /// Build an ARN for a regional resource owned by `account`
    pub fn regional(service: &str, region: &Region, account: &AccountId, resource: impl Into<String>) -> Self {
        Self {
            partition: Self::PARTITION.to_string(),
            service: service.to_string(),
            region: region.as_str().to_string(),
            account: account.as_str().to_string(),
            resource: resource.into(),
        }
    }

    /// Build an ARN for a global (region-less) resource owned by `account`
    pub fn global(service: &str, account: &AccountId, resource: impl Into<String>) -> Self {
        Self {
            partition: Self::PARTITION.to_string(),
            service: service.to_string(),
            region: String::new(),
            account: account.as_str().to_string(),
            resource: resource.into(),
        }
    }

    /// ARN of a provider-managed policy
    pub fn managed_policy(name: &str) -> Self {
        Self {
            partition: Self::PARTITION.to_string(),
            service: "iam".to_string(),
            region: String::new(),
            account: "aws".to_string(),
            resource: format!("policy/{}", name),
        }
    }

    pub fn partition(&self) -> &str {
        &self.partition
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Resource type prefix (`role` in `role/deployer`)
    pub fn resource_type(&self) -> &str {
        self.resource
            .split_once('/')
            .map_or(self.resource.as_str(), |(kind, _)| kind)
    }

    /// Resource name after the type prefix (`deployer` in `role/deployer`)
    pub fn resource_name(&self) -> &str {
        self.resource
            .split_once('/')
            .map_or(self.resource.as_str(), |(_, name)| name)
    }
}

impl fmt::Display for Arn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:{}:{}:{}:{}:{}",
            self.partition, self.service, self.region, self.account, self.resource
        )
    }
}

impl FromStr for Arn {
    type Err = ArnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.splitn(6, ':').collect();
        if parts.len() != 6 || parts[0] != "arn" {
            return Err(ArnError::Malformed(s.to_string()));
        }

        let (partition, service, resource) = (parts[1], parts[2], parts[5]);
        if partition.is_empty() || service.is_empty() || resource.is_empty() {
            return Err(ArnError::Malformed(s.to_string()));
        }

        Ok(Self {
            partition: partition.to_string(),
            service: service.to_string(),
            region: parts[3].to_string(),
            account: parts[4].to_string(),
            resource: resource.to_string(),
        })
    }
}

impl TryFrom<String> for Arn {
    type Error = ArnError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Arn> for String {
    fn from(arn: Arn) -> Self {
        arn.to_string()
    }
}
