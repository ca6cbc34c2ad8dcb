//! Task submission
//!
//! Turns the builder's accumulated state plus the staged invocation into a
//! `TaskDescription` and hands it to the task backend.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, instrument};

use crate::offload::{config::ExecutorConfig, run_id::RunId};
use crate::task::{
    Executor, Resources, TaskBackend, TaskBackendError, TaskDescription, TaskId, TaskInput,
    TaskOutput,
};

/// Shell script that launches the entrypoint inside the container
pub const RUNNER_SCRIPT: &str = include_str!("../../resources/runner.sh");

const RUNNER_FILE: &str = "runner.sh";
const INVOCATION_FILE: &str = "invocation.bin";
const RESULT_FILE: &str = "result.bin";

/// Snapshot of one call, ready to be described as a task
#[derive(Debug, Clone)]
pub struct StagedCall<'a> {
    pub run_id: &'a RunId,
    pub resources: &'a Resources,
    pub inputs: &'a [TaskInput],
    pub outputs: &'a [TaskOutput],
    /// URL of the uploaded invocation blob
    pub invocation_url: String,
    /// URL the executor's result blob will be uploaded to
    pub result_url: String,
}

/// Thin adapter between builder state and the task backend
pub struct TaskSubmitter<B> {
    backend: Arc<B>,
    executor: ExecutorConfig,
}

impl<B> TaskSubmitter<B>
where
    B: TaskBackend,
{
    pub fn new(backend: Arc<B>, executor: ExecutorConfig) -> Self {
        Self { backend, executor }
    }

    /// Build the task description for a staged call
    ///
    /// Input order: runner script, registered inputs, invocation blob.
    /// Output order: registered outputs, result blob.
    pub fn describe(&self, call: &StagedCall<'_>) -> TaskDescription {
        let executor = &self.executor;

        let mut inputs = Vec::with_capacity(call.inputs.len() + 2);
        inputs.push(
            TaskInput::inline(RUNNER_SCRIPT, executor.workdir_path(RUNNER_FILE))
                .named("farcall runner script"),
        );
        inputs.extend(call.inputs.iter().cloned());
        inputs.push(
            TaskInput::from_url(&call.invocation_url, executor.workdir_path(INVOCATION_FILE))
                .named("serialized invocation"),
        );

        let mut outputs = Vec::with_capacity(call.outputs.len() + 1);
        outputs.extend(call.outputs.iter().cloned());
        outputs.push(
            TaskOutput::new(&call.result_url, executor.workdir_path(RESULT_FILE))
                .named("serialized result"),
        );

        let mut env = BTreeMap::new();
        env.insert("FARCALL_ENTRYPOINT".to_string(), executor.entrypoint.clone());
        env.insert("FARCALL_RUN_ID".to_string(), call.run_id.to_string());

        TaskDescription::new(
            format!("farcall remote execution {}", call.run_id),
            Executor {
                image: executor.image.clone(),
                command: vec!["sh".to_string(), "-c".to_string(), self.command()],
                workdir: executor.workdir.clone(),
                stdout: executor.workdir_path("stdout"),
                stderr: executor.workdir_path("stderr"),
                env,
            },
            call.resources.clone(),
            inputs,
            outputs,
        )
    }

    /// Describe and submit a staged call
    #[instrument(skip(self, call), fields(run_id = %call.run_id))]
    pub async fn submit(&self, call: &StagedCall<'_>) -> Result<TaskId, TaskBackendError> {
        let task = self.describe(call);
        let id = self.backend.submit(&task).await?;
        info!(task_id = %id, image = %task.image(), "Submitted remote task");
        Ok(id)
    }

    fn command(&self) -> String {
        let executor = &self.executor;
        let run = format!(
            "sh {} {} {}",
            executor.workdir_path(RUNNER_FILE),
            executor.workdir_path(INVOCATION_FILE),
            executor.workdir_path(RESULT_FILE)
        );

        if executor.extra_dependencies.is_empty() {
            run
        } else {
            format!(
                "{} {} && {}",
                executor.install_command,
                executor.extra_dependencies.join(" "),
                run
            )
        }
    }
}
