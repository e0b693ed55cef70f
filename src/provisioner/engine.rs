// Copyright (c) 2025 - Cowboy AI, Inc.
//! External provisioning engine
//!
//! Writes the assembly, then runs the configured command through the shell:
//!
//! ```text
//! <command> <diff|deploy|destroy> --app '<assembly dir>' <stack>...
//! ```
//!
//! The engine's output streams straight through to the caller's terminal.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{error, info};

use super::synth::AssemblyWriter;
use super::{stack_order, Operation, ProvisionOutcome, Provisioner};
use crate::errors::{ProvisioningError, ProvisioningResult};
use crate::graph::CloudAssembly;

/// Provisioner backed by an external command
#[derive(Debug, Clone)]
pub struct EngineProvisioner {
    command: String,
    writer: AssemblyWriter,
}

impl EngineProvisioner {
    pub fn new(command: impl Into<String>, assembly_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            writer: AssemblyWriter::new(assembly_dir),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Full shell command line for an operation
    pub fn command_line(&self, operation: Operation, dir: &Path, stacks: &[String]) -> String {
        let mut line = format!(
            "{} {} --app {}",
            self.command,
            operation.verb(),
            shell_quote(&dir.display().to_string())
        );
        for stack in stacks {
            line.push(' ');
            line.push_str(&shell_quote(stack));
        }
        line
    }
}

fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[async_trait]
impl Provisioner for EngineProvisioner {
    async fn provision(
        &self,
        operation: Operation,
        assembly: &CloudAssembly,
    ) -> ProvisioningResult<ProvisionOutcome> {
        let started_at = Utc::now();
        let dir = self.writer.write(assembly).await?;
        let stacks = stack_order(assembly, operation);
        let line = self.command_line(operation, &dir, &stacks);

        info!(command = %line, "Running provisioning engine for {}", operation);

        let status = Command::new("sh")
            .arg("-c")
            .arg(&line)
            .status()
            .await
            .map_err(|e| {
                ProvisioningError::Provider(format!("Failed to launch {}: {}", self.command, e))
            })?;

        if !status.success() {
            // Killed by a signal: no exit code to propagate
            let code = status.code().unwrap_or(1);
            error!("Provisioning engine failed during {} with status {}", operation, code);
            return Err(ProvisioningError::Engine { code });
        }

        info!("Provisioning engine finished {} for {} stacks", operation, stacks.len());
        Ok(ProvisionOutcome::new(operation, stacks, dir, started_at))
    }

    fn name(&self) -> &str {
        &self.command
    }
}
