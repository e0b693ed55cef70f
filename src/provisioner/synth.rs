// Copyright (c) 2025 - Cowboy AI, Inc.
//! Assembly writing and the synth-only provisioner

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::{stack_order, Operation, ProvisionOutcome, Provisioner};
use crate::errors::ProvisioningResult;
use crate::graph::CloudAssembly;

/// File name of the assembly manifest
pub const MANIFEST_FILE: &str = "manifest.json";

/// Writes a cloud assembly to a directory
#[derive(Debug, Clone)]
pub struct AssemblyWriter {
    dir: PathBuf,
}

impl AssemblyWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the manifest and one template per stack
    ///
    /// Existing files with the same names are replaced; unrelated files in the
    /// directory are left alone.
    pub async fn write(&self, assembly: &CloudAssembly) -> ProvisioningResult<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;

        for stack in &assembly.stacks {
            let path = self.dir.join(stack.template_file());
            let body = serde_json::to_vec_pretty(&stack.template)?;
            tokio::fs::write(&path, body).await?;
            debug!("Wrote template {}", path.display());
        }

        let manifest = serde_json::to_vec_pretty(&assembly.manifest())?;
        tokio::fs::write(self.dir.join(MANIFEST_FILE), manifest).await?;

        info!(
            "Wrote cloud assembly with {} stacks to {}",
            assembly.stacks.len(),
            self.dir.display()
        );
        Ok(self.dir.clone())
    }
}

/// Provisioner that only writes the assembly
///
/// Used when no external engine is configured. Every operation writes the
/// same assembly; nothing is deployed or torn down.
#[derive(Debug, Clone)]
pub struct SynthProvisioner {
    writer: AssemblyWriter,
}

impl SynthProvisioner {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            writer: AssemblyWriter::new(dir),
        }
    }
}

#[async_trait]
impl Provisioner for SynthProvisioner {
    async fn provision(
        &self,
        operation: Operation,
        assembly: &CloudAssembly,
    ) -> ProvisioningResult<ProvisionOutcome> {
        let started_at = Utc::now();
        let dir = self.writer.write(assembly).await?;

        if operation != Operation::Plan {
            warn!(
                "No provisioning engine configured; {} stopped after synthesis",
                operation
            );
        }

        Ok(ProvisionOutcome::new(
            operation,
            stack_order(assembly, operation),
            dir,
            started_at,
        ))
    }

    fn name(&self) -> &str {
        "synth"
    }
}
