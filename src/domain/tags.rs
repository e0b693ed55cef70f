// Copyright (c) 2025 - Cowboy AI, Inc.
//! Resource Tagging
//!
//! Every provisioned resource carries the same label set so billing and
//! ownership queries can filter on any key. Resources opt in through the
//! [`Taggable`] capability; [`apply_tags`] is the only way stacks tag.
//!
//! Tag limits are checked when the [`TagSet`] is built, so applying a tag
//! set to a resource cannot fail.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Tag key carrying the deployment environment
pub const ENV_TAG_KEY: &str = "env";

/// Tag key carrying the application name
pub const APP_TAG_KEY: &str = "app";

/// Tags attached to a single resource, ordered by key
pub type Tags = BTreeMap<String, String>;

/// Tag validation error
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TagError {
    #[error("Tag key cannot be empty")]
    EmptyKey,

    #[error("Tag key too long: {0} (max 128 characters)")]
    KeyTooLong(String),

    #[error("Tag value for {0} too long (max 256 characters)")]
    ValueTooLong(String),

    #[error("Tag key uses reserved prefix: {0}")]
    ReservedPrefix(String),
}

/// Validated set of tags applied uniformly across a deployment
///
/// # Invariants
/// - Keys are 1-128 characters and do not start with `aws:`
/// - Values are at most 256 characters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Tags", into = "Tags")]
pub struct TagSet(Tags);

impl TagSet {
    pub const MAX_KEY_LEN: usize = 128;
    pub const MAX_VALUE_LEN: usize = 256;

    pub fn new() -> Self {
        Self(Tags::new())
    }

    /// Standard `{env, app}` tag set for a deployment
    pub fn for_deployment(environment: &str, application: &str) -> Result<Self, TagError> {
        Self::new()
            .with(ENV_TAG_KEY, environment)?
            .with(APP_TAG_KEY, application)
    }

    /// Add a tag, validating provider limits
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Result<Self, TagError> {
        let key = key.into();
        let value = value.into();

        if key.is_empty() {
            return Err(TagError::EmptyKey);
        }
        if key.chars().count() > Self::MAX_KEY_LEN {
            return Err(TagError::KeyTooLong(key));
        }
        if key.to_ascii_lowercase().starts_with("aws:") {
            return Err(TagError::ReservedPrefix(key));
        }
        if value.chars().count() > Self::MAX_VALUE_LEN {
            return Err(TagError::ValueTooLong(key));
        }

        self.0.insert(key, value);
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Check that every tag in this set is present with the same value
    pub fn is_carried_by(&self, tags: &Tags) -> bool {
        self.0.iter().all(|(k, v)| tags.get(k) == Some(v))
    }
}

impl TryFrom<Tags> for TagSet {
    type Error = TagError;

    fn try_from(tags: Tags) -> Result<Self, Self::Error> {
        tags.into_iter()
            .try_fold(Self::new(), |set, (key, value)| set.with(key, value))
    }
}

impl From<TagSet> for Tags {
    fn from(set: TagSet) -> Self {
        set.0
    }
}

/// Capability of a resource handle to carry tags
pub trait Taggable {
    /// Set a single tag, replacing any previous value for the key
    fn tag(&mut self, key: &str, value: &str);

    /// Tags currently attached
    fn tags(&self) -> &Tags;
}

/// Apply every pair of `tags` to `resource`
///
/// Idempotent: reapplying the same set leaves the resource unchanged.
pub fn apply_tags<T: Taggable + ?Sized>(resource: &mut T, tags: &TagSet) {
    for (key, value) in tags.iter() {
        resource.tag(key, value);
    }
}
