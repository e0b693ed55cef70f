// Copyright (c) 2025 - Cowboy AI, Inc.
//! Platform Configuration
//!
//! Everything the platform reads from the process environment is resolved
//! exactly once into an immutable [`PlatformConfig`]. Stacks receive the
//! [`EnvironmentContext`] by reference and never look at the environment
//! themselves.
//!
//! Every variable is optional. A variable that is unset or set to the empty
//! string falls back to its default; only a value that is present and
//! malformed is a configuration error.

use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

use crate::domain::{AccountId, Arn, Ipv4Cidr, NetworkError, Region, TagSet, ZoneCount};
use crate::errors::{ProvisioningError, ProvisioningResult};
use crate::stacks::cluster::{CapacityPoolSpec, ControlPlaneTooling, KubernetesVersion};
use crate::stacks::trust::{GitHubRepository, STS_AUDIENCE};

pub const ACCOUNT_VAR: &str = "AWS_ACCOUNT_ID";
pub const REGION_VAR: &str = "AWS_REGION";
pub const ENVIRONMENT_VAR: &str = "ENV";
pub const APPLICATION_VAR: &str = "APP";
pub const FEDERATION_ANCHOR_VAR: &str = "GITHUB_OIDC_ARN";
pub const REPOSITORY_VAR: &str = "GITHUB_REPOSITORY";
pub const VPC_CIDR_VAR: &str = "VPC_CIDR";
pub const MAX_AZS_VAR: &str = "MAX_AZS";
pub const NAT_GATEWAYS_VAR: &str = "NAT_GATEWAYS";
pub const ASSEMBLY_DIR_VAR: &str = "ASSEMBLY_DIR";
pub const PROVISIONER_COMMAND_VAR: &str = "PROVISIONER_COMMAND";

pub const DEFAULT_ACCOUNT: &str = "695418593935";
pub const DEFAULT_REGION: &str = "ap-southeast-2";
pub const DEFAULT_ENVIRONMENT: &str = "dev";
pub const DEFAULT_APPLICATION: &str = "gitops-platform-aws";
/// Identity provider resource the default federation anchor points at
pub const DEFAULT_FEDERATION_PROVIDER: &str = "oidc-provider/token.actions.githubusercontent.com";
pub const DEFAULT_REPOSITORY: &str = "kenneth-de-guzman/gitops-platform-aws";
pub const DEFAULT_VPC_CIDR: &str = "10.0.0.0/16";
pub const DEFAULT_SUBNET_PREFIX: u8 = 24;
pub const DEFAULT_NAT_GATEWAYS: usize = 1;
pub const DEFAULT_ASSEMBLY_DIR: &str = "cdk.out";
pub const DEFAULT_MAX_IMAGE_COUNT: u32 = 10;

/// Longest role name the identity provider accepts
const MAX_ROLE_NAME_LEN: usize = 64;

/// Longest cluster name the orchestrator service accepts
const MAX_CLUSTER_NAME_LEN: usize = 100;

/// Read a variable, treating an empty value as absent
fn lookup_or<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_count<F>(lookup: &F, key: &str, default: usize) -> ProvisioningResult<usize>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).filter(|value| !value.is_empty()) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            ProvisioningError::Configuration(format!("{} must be a positive integer, got {:?}", key, raw))
        }),
        None => Ok(default),
    }
}

/// CI identity provider registered in `account`
pub fn default_federation_anchor(account: &AccountId) -> Arn {
    Arn::global("iam", account, DEFAULT_FEDERATION_PROVIDER)
}

/// Environment and application names become part of provider resource
/// names, so they are restricted to the intersection of what every
/// resource type accepts.
fn validate_name_segment(kind: &str, value: &str) -> ProvisioningResult<()> {
    let mut chars = value.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_');

    if !valid {
        return Err(ProvisioningError::Configuration(format!(
            "Invalid {} name {:?}: use lowercase letters, digits, '-' and '_'",
            kind, value
        )));
    }
    Ok(())
}

/// Immutable deployment context shared by every stack
///
/// # Invariants
/// - Environment and application names are valid resource-name segments
/// - Every derived resource name fits its provider limit
/// - `tags` is exactly `{env: environment, app: application}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentContext {
    environment: String,
    application: String,
    federation_anchor: String,
    account: AccountId,
    region: Region,
    tags: TagSet,
}

impl EnvironmentContext {
    pub fn new(
        environment: impl Into<String>,
        application: impl Into<String>,
        federation_anchor: impl Into<String>,
        account: AccountId,
        region: Region,
    ) -> ProvisioningResult<Self> {
        let environment = environment.into();
        let application = application.into();

        validate_name_segment("environment", &environment)?;
        validate_name_segment("application", &application)?;

        let tags = TagSet::for_deployment(&environment, &application)?;
        let context = Self {
            environment,
            application,
            federation_anchor: federation_anchor.into(),
            account,
            region,
            tags,
        };

        if context.role_name().len() > MAX_ROLE_NAME_LEN {
            return Err(ProvisioningError::Configuration(format!(
                "Role name {} exceeds {} characters",
                context.role_name(),
                MAX_ROLE_NAME_LEN
            )));
        }
        if context.cluster_name().len() > MAX_CLUSTER_NAME_LEN {
            return Err(ProvisioningError::Configuration(format!(
                "Cluster name {} exceeds {} characters",
                context.cluster_name(),
                MAX_CLUSTER_NAME_LEN
            )));
        }

        Ok(context)
    }

    /// Resolve from the process environment
    pub fn from_env() -> ProvisioningResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve from an arbitrary variable source
    ///
    /// Without `GITHUB_OIDC_ARN` the anchor defaults to the CI identity
    /// provider in the resolved account, not in the default account.
    pub fn from_lookup<F>(lookup: F) -> ProvisioningResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let account = AccountId::new(lookup_or(&lookup, ACCOUNT_VAR, DEFAULT_ACCOUNT))?;
        let region = Region::new(lookup_or(&lookup, REGION_VAR, DEFAULT_REGION))?;
        let anchor = default_federation_anchor(&account).to_string();

        Self::new(
            lookup_or(&lookup, ENVIRONMENT_VAR, DEFAULT_ENVIRONMENT),
            lookup_or(&lookup, APPLICATION_VAR, DEFAULT_APPLICATION),
            lookup_or(&lookup, FEDERATION_ANCHOR_VAR, &anchor),
            account,
            region,
        )
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn application(&self) -> &str {
        &self.application
    }

    /// Identifier of the pre-existing federation anchor
    pub fn federation_anchor(&self) -> &str {
        &self.federation_anchor
    }

    pub fn account(&self) -> &AccountId {
        &self.account
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    /// Tag set applied to every provisioned resource
    pub fn tags(&self) -> &TagSet {
        &self.tags
    }

    pub fn cluster_name(&self) -> String {
        format!("{}-eks-cluster-{}", self.application, self.environment)
    }

    pub fn registry_name(&self) -> String {
        format!("{}-app-{}", self.application, self.environment)
    }

    pub fn role_name(&self) -> String {
        format!("{}-github-actions-role-{}", self.application, self.environment)
    }

    pub fn cluster_arn(&self) -> Arn {
        Arn::regional(
            "eks",
            &self.region,
            &self.account,
            format!("cluster/{}", self.cluster_name()),
        )
    }

    pub fn registry_arn(&self) -> Arn {
        Arn::regional(
            "ecr",
            &self.region,
            &self.account,
            format!("repository/{}", self.registry_name()),
        )
    }

    pub fn registry_uri(&self) -> String {
        format!(
            "{}.dkr.ecr.{}.amazonaws.com/{}",
            self.account,
            self.region,
            self.registry_name()
        )
    }

    pub fn role_arn(&self) -> Arn {
        Arn::global("iam", &self.account, format!("role/{}", self.role_name()))
    }
}

/// Network boundary sizing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkSettings {
    pub cidr: Ipv4Cidr,
    pub zones: ZoneCount,
    /// Prefix length of every public and private subnet
    pub subnet_prefix: u8,
    pub nat_gateways: usize,
}

impl NetworkSettings {
    /// # Invariants
    /// - `1 <= nat_gateways <= zones`
    /// - Subnets are strictly smaller than the address range
    pub fn new(
        cidr: Ipv4Cidr,
        zones: ZoneCount,
        subnet_prefix: u8,
        nat_gateways: usize,
    ) -> Result<Self, NetworkError> {
        if subnet_prefix > 32 {
            return Err(NetworkError::InvalidPrefixLength(subnet_prefix));
        }
        if subnet_prefix <= cidr.prefix_length() {
            return Err(NetworkError::Exhausted {
                range: cidr.to_string(),
                index: 0,
                prefix_length: subnet_prefix,
            });
        }
        if nat_gateways == 0 || nat_gateways > zones.value() {
            return Err(NetworkError::InvalidNatCount {
                nat: nat_gateways,
                zones: zones.value(),
            });
        }

        Ok(Self {
            cidr,
            zones,
            subnet_prefix,
            nat_gateways,
        })
    }
}

/// Federation trust settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrustSettings {
    /// Source repository allowed to assume the deployment role
    pub repository: GitHubRepository,
    /// Required token audience
    pub audience: String,
}

/// Image registry settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegistrySettings {
    /// Most recent images kept by the retention rule
    pub max_image_count: u32,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            max_image_count: DEFAULT_MAX_IMAGE_COUNT,
        }
    }
}

/// Cluster settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClusterSettings {
    pub version: KubernetesVersion,
    /// Control-plane tooling bundled for cluster management; `None` fails construction
    pub tooling: Option<ControlPlaneTooling>,
    pub pools: Vec<CapacityPoolSpec>,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            version: KubernetesVersion::V1_28,
            tooling: Some(ControlPlaneTooling::kubectl(KubernetesVersion::V1_34)),
            pools: vec![CapacityPoolSpec::managed_default()],
        }
    }
}

/// Complete platform configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlatformConfig {
    pub context: EnvironmentContext,
    pub network: NetworkSettings,
    pub trust: TrustSettings,
    pub registry: RegistrySettings,
    pub cluster: ClusterSettings,
    /// Directory the cloud assembly is written to
    pub assembly_dir: PathBuf,
    /// External engine command; synthesis only when unset
    pub provisioner_command: Option<String>,
}

impl PlatformConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> ProvisioningResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> ProvisioningResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let context = EnvironmentContext::from_lookup(&lookup)?;

        let cidr = Ipv4Cidr::new(lookup_or(&lookup, VPC_CIDR_VAR, DEFAULT_VPC_CIDR))?;
        let zones = ZoneCount::new(parse_count(&lookup, MAX_AZS_VAR, ZoneCount::default().value())?)?;
        let nat_gateways = parse_count(&lookup, NAT_GATEWAYS_VAR, DEFAULT_NAT_GATEWAYS)?;
        let network = NetworkSettings::new(cidr, zones, DEFAULT_SUBNET_PREFIX, nat_gateways)?;

        let repository: GitHubRepository = lookup_or(&lookup, REPOSITORY_VAR, DEFAULT_REPOSITORY)
            .parse()
            .map_err(ProvisioningError::Configuration)?;

        let assembly_dir = PathBuf::from(lookup_or(&lookup, ASSEMBLY_DIR_VAR, DEFAULT_ASSEMBLY_DIR));
        let provisioner_command = lookup(PROVISIONER_COMMAND_VAR).filter(|c| !c.trim().is_empty());

        debug!(
            "Resolved configuration for {}/{} in {}",
            context.application(),
            context.environment(),
            context.region()
        );

        Ok(Self {
            context,
            network,
            trust: TrustSettings {
                repository,
                audience: STS_AUDIENCE.to_string(),
            },
            registry: RegistrySettings::default(),
            cluster: ClusterSettings::default(),
            assembly_dir,
            provisioner_command,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_variables() {
        let config = PlatformConfig::from_lookup(|_| None).unwrap();
        let ctx = &config.context;

        assert_eq!(ctx.environment(), "dev");
        assert_eq!(ctx.application(), "gitops-platform-aws");
        assert_eq!(ctx.account().as_str(), "695418593935");
        assert_eq!(ctx.region().as_str(), "ap-southeast-2");
        assert_eq!(
            ctx.federation_anchor(),
            "arn:aws:iam::695418593935:oidc-provider/token.actions.githubusercontent.com"
        );
        assert_eq!(config.network.cidr.to_string(), "10.0.0.0/16");
        assert_eq!(config.network.zones.value(), 2);
        assert_eq!(config.network.nat_gateways, 1);
        assert_eq!(config.registry.max_image_count, 10);
        assert_eq!(config.assembly_dir, PathBuf::from("cdk.out"));
        assert_eq!(config.provisioner_command, None);
    }

    #[test]
    fn test_empty_values_fall_back_to_defaults() {
        let config = PlatformConfig::from_lookup(vars(&[
            (ENVIRONMENT_VAR, ""),
            (APPLICATION_VAR, ""),
            (MAX_AZS_VAR, ""),
            (PROVISIONER_COMMAND_VAR, "  "),
        ]))
        .unwrap();

        assert_eq!(config.context.environment(), "dev");
        assert_eq!(config.context.application(), "gitops-platform-aws");
        assert_eq!(config.network.zones.value(), 2);
        assert_eq!(config.provisioner_command, None);
    }

    #[test]
    fn test_derived_names() {
        let ctx = EnvironmentContext::from_lookup(vars(&[
            (ENVIRONMENT_VAR, "dev"),
            (APPLICATION_VAR, "demo"),
            (ACCOUNT_VAR, "123456789012"),
            (REGION_VAR, "us-east-1"),
        ]))
        .unwrap();

        assert_eq!(ctx.registry_name(), "demo-app-dev");
        assert_eq!(ctx.cluster_name(), "demo-eks-cluster-dev");
        assert_eq!(ctx.role_name(), "demo-github-actions-role-dev");
        assert_eq!(
            ctx.cluster_arn().to_string(),
            "arn:aws:eks:us-east-1:123456789012:cluster/demo-eks-cluster-dev"
        );
        assert_eq!(
            ctx.registry_uri(),
            "123456789012.dkr.ecr.us-east-1.amazonaws.com/demo-app-dev"
        );
        assert_eq!(
            ctx.role_arn().to_string(),
            "arn:aws:iam::123456789012:role/demo-github-actions-role-dev"
        );
        assert_eq!(ctx.tags().get("env"), Some("dev"));
        assert_eq!(ctx.tags().get("app"), Some("demo"));
    }

    #[test]
    fn test_default_anchor_follows_account() {
        let ctx = EnvironmentContext::from_lookup(vars(&[(ACCOUNT_VAR, "123456789012")])).unwrap();
        assert_eq!(
            ctx.federation_anchor(),
            "arn:aws:iam::123456789012:oidc-provider/token.actions.githubusercontent.com"
        );

        let explicit = "arn:aws:iam::123456789012:oidc-provider/idp.example.com";
        let ctx = EnvironmentContext::from_lookup(vars(&[
            (ACCOUNT_VAR, "123456789012"),
            (FEDERATION_ANCHOR_VAR, explicit),
        ]))
        .unwrap();
        assert_eq!(ctx.federation_anchor(), explicit);
    }

    #[test]
    fn test_malformed_values_are_configuration_errors() {
        for pairs in [
            vec![(ACCOUNT_VAR, "12345")],
            vec![(REGION_VAR, "nowhere")],
            vec![(ENVIRONMENT_VAR, "Prod")],
            vec![(VPC_CIDR_VAR, "10.0.0.1/16")],
            vec![(MAX_AZS_VAR, "seven")],
            vec![(MAX_AZS_VAR, "7")],
            vec![(NAT_GATEWAYS_VAR, "3")],
            vec![(NAT_GATEWAYS_VAR, "0")],
            vec![(REPOSITORY_VAR, "no-slash")],
        ] {
            let result = PlatformConfig::from_lookup(vars(&pairs));
            assert!(
                matches!(result, Err(ProvisioningError::Configuration(_))),
                "expected configuration error for {:?}",
                pairs
            );
        }
    }

    #[test]
    fn test_role_name_length_limit() {
        let long_app = "a".repeat(41);
        let result = EnvironmentContext::from_lookup(vars(&[(APPLICATION_VAR, long_app.as_str())]));
        assert!(matches!(result, Err(ProvisioningError::Configuration(_))));
    }

    #[test]
    fn test_network_settings_reject_oversized_subnets() {
        let cidr = Ipv4Cidr::new("10.0.0.0/24").unwrap();
        assert!(NetworkSettings::new(cidr, ZoneCount::default(), 24, 1).is_err());
        assert!(NetworkSettings::new(cidr, ZoneCount::default(), 26, 2).is_ok());
    }
}
