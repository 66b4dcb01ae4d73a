/// Test Executor - High-Level Orchestration
///
/// **Responsibility:**
/// Sequence one submission through the sandbox:
/// validate id -> stage code -> build command -> invoke -> unstage -> normalize.
///
/// This module is the glue layer - it knows nothing about:
/// - How commands run (engine's job)
/// - How output is cleaned up (normalizer's job)
/// - Where staged files live (workspace's job)
///
/// Nothing before invocation touches the container runtime, and the staged
/// file is released before a result or an error leaves this module.

use crate::command::build_command;
use crate::engine::{CommandInvoker, ProcessInvoker};
use crate::error::{ExecutorError, Result};
use crate::normalizer::normalizer_for;
use crate::validator::validate_exercise_id;
use crate::workspace::Workspace;
use gauntlet_common::config::Settings;
use gauntlet_common::registry::EcosystemRegistry;
use gauntlet_common::types::{Ecosystem, ExecutionRequest, ExecutionResult};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Entry point for running learner submissions against exercise test suites.
///
/// Holds no per-request state; safe to share across concurrent requests.
#[derive(Clone)]
pub struct TestExecutor {
    registry: Arc<EcosystemRegistry>,
    workspace: Workspace,
    invoker: Arc<dyn CommandInvoker>,
    runtime: String,
}

impl TestExecutor {
    pub fn new(
        registry: EcosystemRegistry,
        workspace: Workspace,
        invoker: Arc<dyn CommandInvoker>,
        runtime: impl Into<String>,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            workspace,
            invoker,
            runtime: runtime.into(),
        }
    }

    /// Production wiring: local scratch directory, real processes
    pub fn from_settings(settings: &Settings, registry: EcosystemRegistry) -> Result<Self> {
        let workspace = Workspace::local(&settings.scratch_dir)
            .map_err(|e| ExecutorError::Workspace { source: e })?;

        Ok(Self::new(
            registry,
            workspace,
            Arc::new(ProcessInvoker::new()),
            settings.container_runtime.clone(),
        ))
    }

    pub fn registry(&self) -> &EcosystemRegistry {
        &self.registry
    }

    pub async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        self.execute_test(request.ecosystem, &request.submitted_code, &request.exercise_id)
            .await
    }

    /// Run `submitted_code` against exercise `exercise_id` of `ecosystem`.
    ///
    /// Failing tests, crashes and timeouts come back as `successful: false`;
    /// only invalid input, staging and spawn failures are errors.
    #[instrument(
        skip(self, submitted_code),
        fields(ecosystem = %ecosystem, code_bytes = submitted_code.len())
    )]
    pub async fn execute_test(
        &self,
        ecosystem: Ecosystem,
        submitted_code: &str,
        exercise_id: &str,
    ) -> Result<ExecutionResult> {
        let profile = self.registry.profile(ecosystem);

        // Step 1: validate before the id goes anywhere near a path or command
        let exercise_id = validate_exercise_id(ecosystem, profile, exercise_id).map_err(|e| {
            warn!(error = %e, "Rejected exercise id");
            e
        })?;

        // Step 2: stage; the guard releases the file on every path below
        let staged = self.workspace.stage(profile, submitted_code)?;

        // Step 3: build
        let container_name = format!("gauntlet-{}", staged.name());
        let command = build_command(
            &self.runtime,
            profile,
            staged.host_path(),
            &container_name,
            exercise_id,
        );
        debug!(exercise_id, command = %command, "Invoking container");

        // Step 4: invoke
        let start = Instant::now();
        let invoked = self.invoker.invoke(&command).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        // Step 5: release the staged file, whatever happened
        self.workspace.unstage(staged);

        let outcome = invoked.map_err(|e| {
            warn!(exercise_id, error = %e, "Container command could not run");
            ExecutorError::Invocation { source: e }
        })?;

        // Step 6: normalize
        let output = normalizer_for(profile.parser).normalize(
            outcome.exit_code,
            &outcome.stdout,
            outcome.error_stream(),
        );
        let result = ExecutionResult {
            successful: outcome.succeeded(),
            output,
        };

        info!(
            exercise_id,
            successful = result.successful,
            timed_out = result.timed_out(),
            exit_code = outcome.exit_code,
            elapsed_ms,
            "Execution completed"
        );

        Ok(result)
    }
}
