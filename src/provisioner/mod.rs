// Copyright (c) 2025 - Cowboy AI, Inc.
//! Provisioner Boundary
//!
//! The only side-effecting step of a run. Everything before it is a pure
//! function of configuration; a provisioner receives the finished
//! [`CloudAssembly`] and either writes it out or hands it to an external
//! engine.
//!
//! ```text
//! PlatformApp::synth ──> CloudAssembly ──> Provisioner::provision(operation)
//!                                              │
//!                         ┌────────────────────┴──────────────────┐
//!                         ▼                                       ▼
//!                 SynthProvisioner                        EngineProvisioner
//!           (write templates + manifest)        (write, then run `<cmd> deploy ...`)
//! ```
//!
//! A provisioner call is one atomic operation from the core's point of view.
//! The core never retries; an engine failure is reported with the engine's
//! exit status.

pub mod engine;
pub mod synth;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::errors::ProvisioningResult;
use crate::graph::CloudAssembly;

pub use engine::EngineProvisioner;
pub use synth::{AssemblyWriter, SynthProvisioner, MANIFEST_FILE};

/// What the provisioner is asked to do with the assembly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    /// Show the changes an apply would make
    Plan,
    /// Create or update every stack
    Apply,
    /// Tear down every stack
    Destroy,
}

impl Operation {
    /// Engine verb for this operation
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Plan => "diff",
            Self::Apply => "deploy",
            Self::Destroy => "destroy",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plan => write!(f, "plan"),
            Self::Apply => write!(f, "apply"),
            Self::Destroy => write!(f, "destroy"),
        }
    }
}

/// Result of one provisioner call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionOutcome {
    /// Time-ordered run identifier
    pub run_id: Uuid,
    pub operation: Operation,
    /// Stacks in the order they were handed to the engine
    pub stacks: Vec<String>,
    pub assembly_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ProvisionOutcome {
    pub(crate) fn new(
        operation: Operation,
        stacks: Vec<String>,
        assembly_dir: PathBuf,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            operation,
            stacks,
            assembly_dir,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Order in which an operation visits the assembly's stacks
///
/// Teardown runs dependents first.
pub fn stack_order(assembly: &CloudAssembly, operation: Operation) -> Vec<String> {
    let mut names: Vec<String> = assembly.stacks.iter().map(|s| s.name.clone()).collect();
    if operation == Operation::Destroy {
        names.reverse();
    }
    names
}

/// Capability that applies a synthesized assembly
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Carry out `operation` for every stack in the assembly
    async fn provision(
        &self,
        operation: Operation,
        assembly: &CloudAssembly,
    ) -> ProvisioningResult<ProvisionOutcome>;

    async fn plan(&self, assembly: &CloudAssembly) -> ProvisioningResult<ProvisionOutcome> {
        self.provision(Operation::Plan, assembly).await
    }

    async fn apply(&self, assembly: &CloudAssembly) -> ProvisioningResult<ProvisionOutcome> {
        self.provision(Operation::Apply, assembly).await
    }

    async fn destroy(&self, assembly: &CloudAssembly) -> ProvisioningResult<ProvisionOutcome> {
        self.provision(Operation::Destroy, assembly).await
    }

    /// Name used in logs
    fn name(&self) -> &str;
}
