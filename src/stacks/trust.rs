// Copyright (c) 2025 - Cowboy AI, Inc.
//! Trust Bootstrap
//!
//! Lets an external CI system assume a deployment role through web identity
//! federation, without long-lived credentials.
//!
//! ```text
//! CI token ──> federation anchor (existing OIDC provider)
//!                     │  aud == sts.amazonaws.com
//!                     │  sub ~= repo:OWNER/REPO | repo:OWNER/REPO/*
//!                     ▼
//!             AssumableRole ──> PowerUserAccess
//!                           ──> read-only statement on the cluster
//!                           ──> pull/push on the registry
//! ```
//!
//! The anchor is never created here. It is resolved through an injected
//! [`AnchorResolver`]; failing to resolve it aborts the whole build before
//! any dependent stack is constructed.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use crate::config::{EnvironmentContext, TrustSettings};
use crate::domain::{
    apply_tags, AccountId, Arn, ConditionOperator, PolicyDocument, PolicyStatement, Principal,
    Taggable, Tags,
};
use crate::errors::{ProvisioningError, ProvisioningResult};
use crate::graph::{Declare, LogicalId, Resource, ResourceGraph, ResourceKind};

/// Audience every federated token must carry
pub const STS_AUDIENCE: &str = "sts.amazonaws.com";

/// Action granted to the federation anchor
pub const ASSUME_ROLE_ACTION: &str = "sts:AssumeRoleWithWebIdentity";

/// Broad managed permission set attached to the deployment role
pub const MANAGED_PERMISSION_SET: &str = "PowerUserAccess";

/// Read-only cluster introspection actions
pub const CLUSTER_READ_ACTIONS: [&str; 4] = [
    "eks:DescribeCluster",
    "eks:ListClusters",
    "eks:DescribeNodegroup",
    "eks:ListNodegroups",
];

const ROLE_LOGICAL_ID: &str = "GitHubActionsRole";

/// Source repository allowed to assume the deployment role
///
/// # Invariants
/// - Owner and name are non-empty and free of wildcard characters
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GitHubRepository {
    owner: String,
    name: String,
}

impl GitHubRepository {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self, String> {
        let owner = owner.into();
        let name = name.into();

        let valid = |part: &str| {
            !part.is_empty()
                && part
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        };
        if !valid(&owner) || !valid(&name) {
            return Err(format!("Invalid repository {}/{}", owner, name));
        }

        Ok(Self { owner, name })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Subject claims accepted from this repository: any ref, or the bare repository
    pub fn subject_patterns(&self) -> Vec<String> {
        vec![
            format!("repo:{}/{}/*", self.owner, self.name),
            format!("repo:{}/{}", self.owner, self.name),
        ]
    }
}

impl fmt::Display for GitHubRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl FromStr for GitHubRepository {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (owner, name) = s
            .split_once('/')
            .ok_or_else(|| format!("Repository must be OWNER/NAME, got {:?}", s))?;
        Self::new(owner, name)
    }
}

impl TryFrom<String> for GitHubRepository {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GitHubRepository> for String {
    fn from(repository: GitHubRepository) -> Self {
        repository.to_string()
    }
}

/// Resolved, pre-existing identity provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederationAnchor {
    arn: Arn,
    /// Issuer host and path, used as the condition key prefix
    issuer: String,
}

impl FederationAnchor {
    /// Build an anchor from an identity-provider ARN
    pub fn from_arn(arn: Arn) -> ProvisioningResult<Self> {
        if arn.service() != "iam" || arn.resource_type() != "oidc-provider" {
            return Err(ProvisioningError::Configuration(format!(
                "{} is not an OIDC identity provider",
                arn
            )));
        }
        let issuer = arn.resource_name().to_string();
        if issuer.is_empty() || issuer == arn.resource() {
            return Err(ProvisioningError::Configuration(format!(
                "{} has no issuer",
                arn
            )));
        }
        Ok(Self { arn, issuer })
    }

    pub fn arn(&self) -> &Arn {
        &self.arn
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn audience_key(&self) -> String {
        format!("{}:aud", self.issuer)
    }

    pub fn subject_key(&self) -> String {
        format!("{}:sub", self.issuer)
    }
}

/// Capability to look up an existing federation anchor by identifier
pub trait AnchorResolver: Send + Sync {
    fn resolve(&self, identifier: &str) -> ProvisioningResult<FederationAnchor>;
}

/// Import-by-identifier resolver
///
/// Accepts any well-formed identity-provider ARN in the target account
/// without contacting the provider, the way an import by ARN does.
#[derive(Debug, Clone)]
pub struct ArnAnchorResolver {
    account: AccountId,
}

impl ArnAnchorResolver {
    pub fn new(account: AccountId) -> Self {
        Self { account }
    }
}

impl AnchorResolver for ArnAnchorResolver {
    fn resolve(&self, identifier: &str) -> ProvisioningResult<FederationAnchor> {
        if identifier.trim().is_empty() {
            return Err(ProvisioningError::AnchorNotFound(
                "no federation anchor identifier supplied".to_string(),
            ));
        }
        let arn: Arn = identifier.parse()?;
        if arn.account() != self.account.as_str() {
            return Err(ProvisioningError::Configuration(format!(
                "Federation anchor {} belongs to account {}, not {}",
                arn,
                arn.account(),
                self.account
            )));
        }
        FederationAnchor::from_arn(arn)
    }
}

/// Resolver backed by an explicit set of registered anchors
#[derive(Debug, Clone, Default)]
pub struct KnownAnchors {
    anchors: BTreeMap<String, FederationAnchor>,
}

impl KnownAnchors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an anchor by its ARN
    pub fn register(mut self, identifier: &str) -> ProvisioningResult<Self> {
        let anchor = FederationAnchor::from_arn(identifier.parse()?)?;
        self.anchors.insert(anchor.arn.to_string(), anchor);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

impl AnchorResolver for KnownAnchors {
    fn resolve(&self, identifier: &str) -> ProvisioningResult<FederationAnchor> {
        self.anchors
            .get(identifier)
            .cloned()
            .ok_or_else(|| ProvisioningError::AnchorNotFound(identifier.to_string()))
    }
}

/// Conditions under which the anchor may assume the role
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustPolicy {
    anchor: FederationAnchor,
    audience: String,
    subjects: Vec<String>,
}

impl TrustPolicy {
    pub fn new(anchor: FederationAnchor, audience: impl Into<String>, subjects: Vec<String>) -> Self {
        Self {
            anchor,
            audience: audience.into(),
            subjects,
        }
    }

    pub fn anchor(&self) -> &FederationAnchor {
        &self.anchor
    }

    pub fn audience(&self) -> &str {
        &self.audience
    }

    pub fn subjects(&self) -> &[String] {
        &self.subjects
    }

    pub fn statement(&self) -> PolicyStatement {
        PolicyStatement::allow()
            .principal(Principal::Federated(self.anchor.arn.to_string()))
            .actions([ASSUME_ROLE_ACTION])
            .condition(
                ConditionOperator::StringEquals,
                self.anchor.audience_key(),
                [self.audience.clone()],
            )
            .condition(
                ConditionOperator::StringLike,
                self.anchor.subject_key(),
                self.subjects.clone(),
            )
    }

    /// Assume-role policy document
    pub fn document(&self) -> PolicyDocument {
        PolicyDocument::new().with_statement(self.statement())
    }

    /// Evaluate the trust conditions for a token's audience and subject claims
    pub fn permits(&self, audience: &str, subject: &str) -> bool {
        let context = BTreeMap::from([
            (self.anchor.audience_key(), audience.to_string()),
            (self.anchor.subject_key(), subject.to_string()),
        ]);
        self.statement().conditions_hold(&context)
    }
}

/// Role with a trust policy, managed policies, and an inline policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssumableRole {
    logical_id: LogicalId,
    name: String,
    arn: Arn,
    trust: TrustPolicy,
    managed_policies: BTreeSet<String>,
    inline: PolicyDocument,
    tags: Tags,
}

impl AssumableRole {
    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arn(&self) -> &Arn {
        &self.arn
    }

    pub fn trust(&self) -> &TrustPolicy {
        &self.trust
    }

    pub fn managed_policies(&self) -> impl Iterator<Item = &str> {
        self.managed_policies.iter().map(String::as_str)
    }

    pub fn inline_policy(&self) -> &PolicyDocument {
        &self.inline
    }

    pub fn add_managed_policy(&mut self, policy: &Arn) {
        self.managed_policies.insert(policy.to_string());
    }

    /// Add a statement to the role's own inline policy
    pub fn add_to_principal_policy(&mut self, statement: PolicyStatement) {
        self.inline.add_statement(statement);
    }

    /// Check whether the role's managed or inline grants cover `action` on `resource`
    ///
    /// Managed permission sets are opaque here; only inline statements are evaluated.
    pub fn inline_allows(&self, action: &str, resource: &str) -> bool {
        self.inline.allows(action, resource)
    }
}

impl Taggable for AssumableRole {
    fn tag(&mut self, key: &str, value: &str) {
        self.tags.insert(key.to_string(), value.to_string());
    }

    fn tags(&self) -> &Tags {
        &self.tags
    }
}

impl Declare for AssumableRole {
    fn declare(&self, stack: &str, graph: &mut ResourceGraph) -> ProvisioningResult<()> {
        let mut resource = Resource::new(self.logical_id.clone(), ResourceKind::Role)
            .property("RoleName", json!(self.name))
            .property("AssumeRolePolicyDocument", serde_json::to_value(self.trust.document())?)
            .property("ManagedPolicyArns", json!(self.managed_policies))
            .tags(&self.tags);

        if !self.inline.is_empty() {
            resource = resource.property(
                "Policies",
                json!([{
                    "PolicyName": format!("{}DefaultPolicy", self.logical_id),
                    "PolicyDocument": serde_json::to_value(&self.inline)?,
                }]),
            );
        }

        graph.add(stack, resource)?;
        Ok(())
    }
}

/// Deployment identity assumed by the CI system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FederatedIdentity {
    role: AssumableRole,
}

impl FederatedIdentity {
    pub fn role(&self) -> &AssumableRole {
        &self.role
    }

    pub fn role_mut(&mut self) -> &mut AssumableRole {
        &mut self.role
    }

    pub fn anchor(&self) -> &FederationAnchor {
        self.role.trust.anchor()
    }

    pub fn trust(&self) -> &TrustPolicy {
        &self.role.trust
    }

    /// Grant read-only describe/list access scoped to one cluster
    pub fn grant_cluster_introspection(&mut self, cluster: &Arn) {
        self.role.add_to_principal_policy(
            PolicyStatement::allow()
                .actions(CLUSTER_READ_ACTIONS)
                .resources([cluster.to_string()]),
        );
    }
}

impl Taggable for FederatedIdentity {
    fn tag(&mut self, key: &str, value: &str) {
        self.role.tag(key, value);
    }

    fn tags(&self) -> &Tags {
        self.role.tags()
    }
}

impl Declare for FederatedIdentity {
    fn declare(&self, stack: &str, graph: &mut ResourceGraph) -> ProvisioningResult<()> {
        self.role.declare(stack, graph)
    }
}

/// Trust bootstrap constructor
pub struct TrustBootstrap;

impl TrustBootstrap {
    /// Resolve the anchor and build the deployment identity
    pub fn construct(
        anchor_identifier: &str,
        resolver: &dyn AnchorResolver,
        ctx: &EnvironmentContext,
        settings: &TrustSettings,
    ) -> ProvisioningResult<FederatedIdentity> {
        let anchor = resolver.resolve(anchor_identifier)?;
        debug!("Resolved federation anchor {}", anchor.arn());

        let trust = TrustPolicy::new(
            anchor,
            settings.audience.clone(),
            settings.repository.subject_patterns(),
        );

        let mut role = AssumableRole {
            logical_id: LogicalId::new(ROLE_LOGICAL_ID)?,
            name: ctx.role_name(),
            arn: ctx.role_arn(),
            trust,
            managed_policies: BTreeSet::new(),
            inline: PolicyDocument::new(),
            tags: Tags::new(),
        };
        role.add_managed_policy(&Arn::managed_policy(MANAGED_PERMISSION_SET));

        let mut identity = FederatedIdentity { role };
        apply_tags(&mut identity, ctx.tags());

        info!(
            "Built deployment role {} trusted for {}",
            identity.role.name, settings.repository
        );
        Ok(identity)
    }
}
