// Copyright (c) 2025 - Cowboy AI, Inc.
//! Image Registry
//!
//! Container image repository for the application. Encryption at rest and
//! scan-on-push are fixed; only the retention depth is configurable.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::config::{EnvironmentContext, RegistrySettings};
use crate::domain::{apply_tags, Arn, PolicyStatement, Taggable, Tags};
use crate::errors::{ProvisioningError, ProvisioningResult};
use crate::graph::{Declare, LogicalId, Resource, ResourceGraph, ResourceKind};
use crate::stacks::trust::FederatedIdentity;

const REGISTRY_LOGICAL_ID: &str = "AppECR";

/// Actions needed to pull an image
pub const PULL_ACTIONS: [&str; 3] = [
    "ecr:BatchCheckLayerAvailability",
    "ecr:GetDownloadUrlForLayer",
    "ecr:BatchGetImage",
];

/// Actions needed to push an image
pub const PUSH_ACTIONS: [&str; 4] = [
    "ecr:PutImage",
    "ecr:InitiateLayerUpload",
    "ecr:UploadLayerPart",
    "ecr:CompleteLayerUpload",
];

/// Registry login; the provider only accepts it on `*`
pub const LOGIN_ACTION: &str = "ecr:GetAuthorizationToken";

/// At-rest encryption mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncryptionMode {
    #[serde(rename = "AES256")]
    Aes256,
}

impl EncryptionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aes256 => "AES256",
        }
    }
}

/// Keep only the most recent images
///
/// # Invariants
/// - `max_image_count >= 1`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetentionRule {
    max_image_count: u32,
}

impl RetentionRule {
    pub fn new(max_image_count: u32) -> ProvisioningResult<Self> {
        if max_image_count == 0 {
            return Err(ProvisioningError::Configuration(
                "Retention rule must keep at least one image".to_string(),
            ));
        }
        Ok(Self { max_image_count })
    }

    pub fn max_image_count(&self) -> u32 {
        self.max_image_count
    }

    /// Lifecycle policy expiring images beyond the newest `max_image_count`
    pub fn lifecycle_policy(&self) -> serde_json::Value {
        json!({
            "rules": [{
                "rulePriority": 1,
                "selection": {
                    "tagStatus": "any",
                    "countType": "imageCountMoreThan",
                    "countNumber": self.max_image_count
                },
                "action": { "type": "expire" }
            }]
        })
    }
}

/// Container image registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registry {
    logical_id: LogicalId,
    name: String,
    arn: Arn,
    uri: String,
    encryption: EncryptionMode,
    retention: RetentionRule,
    tags: Tags,
}

impl Registry {
    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arn(&self) -> &Arn {
        &self.arn
    }

    /// Address images are pushed to and pulled from
    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn encryption(&self) -> EncryptionMode {
        self.encryption
    }

    /// Always `true`; there is no way to build a registry without scanning
    pub fn scan_on_push(&self) -> bool {
        true
    }

    pub fn retention(&self) -> RetentionRule {
        self.retention
    }

    /// Authorize push and pull on this registry only
    pub fn grant_pull_push(&self, identity: &mut FederatedIdentity) {
        let role = identity.role_mut();
        role.add_to_principal_policy(
            PolicyStatement::allow()
                .actions(PULL_ACTIONS.iter().chain(PUSH_ACTIONS.iter()).copied())
                .resources([self.arn.to_string()]),
        );
        role.add_to_principal_policy(
            PolicyStatement::allow()
                .actions([LOGIN_ACTION])
                .resources(["*"]),
        );
    }
}

impl Taggable for Registry {
    fn tag(&mut self, key: &str, value: &str) {
        self.tags.insert(key.to_string(), value.to_string());
    }

    fn tags(&self) -> &Tags {
        &self.tags
    }
}

impl Declare for Registry {
    fn declare(&self, stack: &str, graph: &mut ResourceGraph) -> ProvisioningResult<()> {
        let lifecycle = serde_json::to_string(&self.retention.lifecycle_policy())?;

        graph.add(
            stack,
            Resource::new(self.logical_id.clone(), ResourceKind::Repository)
                .property("RepositoryName", json!(self.name))
                .property("ImageScanningConfiguration", json!({ "ScanOnPush": true }))
                .property(
                    "EncryptionConfiguration",
                    json!({ "EncryptionType": self.encryption.as_str() }),
                )
                .property("LifecyclePolicy", json!({ "LifecyclePolicyText": lifecycle }))
                .tags(&self.tags)
                .retain(),
        )?;
        Ok(())
    }
}

/// Registry constructor
pub struct RegistryStack;

impl RegistryStack {
    pub fn construct(
        ctx: &EnvironmentContext,
        settings: &RegistrySettings,
    ) -> ProvisioningResult<Registry> {
        let mut registry = Registry {
            logical_id: LogicalId::new(REGISTRY_LOGICAL_ID)?,
            name: ctx.registry_name(),
            arn: ctx.registry_arn(),
            uri: ctx.registry_uri(),
            encryption: EncryptionMode::Aes256,
            retention: RetentionRule::new(settings.max_image_count)?,
            tags: Tags::new(),
        };
        apply_tags(&mut registry, ctx.tags());

        info!(
            "Built registry {} keeping {} images",
            registry.name, settings.max_image_count
        );
        Ok(registry)
    }
}
