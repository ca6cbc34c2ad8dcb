//! TES v1 JSON messages
//!
//! Only the fields Farcall sends or reads are modelled.

use std::collections::BTreeMap;

use farcall_domain::task::{TaskDescription, TaskState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TesTask {
    pub name: String,
    pub resources: TesResources,
    pub executors: Vec<TesExecutor>,
    pub inputs: Vec<TesInput>,
    pub outputs: Vec<TesOutput>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TesResources {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_cores: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ram_gb: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_gb: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TesExecutor {
    pub image: String,
    pub command: Vec<String>,
    pub workdir: String,
    pub stdout: String,
    pub stderr: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileType {
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TesInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: FileType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TesOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub url: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: FileType,
}

impl From<&TaskDescription> for TesTask {
    fn from(task: &TaskDescription) -> Self {
        let executor = task.executor();
        let resources = task.resources();
        Self {
            name: task.name().to_string(),
            resources: TesResources {
                cpu_cores: resources.cpu_cores,
                ram_gb: resources.ram_gb,
                disk_gb: resources.disk_gb,
            },
            executors: vec![TesExecutor {
                image: executor.image.clone(),
                command: executor.command.clone(),
                workdir: executor.workdir.clone(),
                stdout: executor.stdout.clone(),
                stderr: executor.stderr.clone(),
                env: executor.env.clone(),
            }],
            inputs: task
                .inputs()
                .iter()
                .map(|input| TesInput {
                    name: input.name.clone(),
                    url: input.url.clone(),
                    path: input.path.clone(),
                    kind: FileType::File,
                    content: input.contents.clone(),
                })
                .collect(),
            outputs: task
                .outputs()
                .iter()
                .map(|output| TesOutput {
                    name: output.name.clone(),
                    url: output.url.clone(),
                    path: output.path.clone(),
                    kind: FileType::File,
                })
                .collect(),
        }
    }
}

/// Body of a successful `POST /v1/tasks`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTaskResponse {
    pub id: String,
}

/// `MINIMAL` view of a task
#[derive(Debug, Clone, Deserialize)]
pub struct MinimalTask {
    pub id: String,
    #[serde(default)]
    pub state: WireState,
}

/// Task states as spelled by TES servers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WireState {
    #[default]
    Unknown,
    Queued,
    Initializing,
    Running,
    Paused,
    Complete,
    ExecutorError,
    SystemError,
    Canceled,
    Canceling,
    Preempted,
    #[serde(other)]
    Unrecognized,
}

impl From<WireState> for TaskState {
    fn from(state: WireState) -> Self {
        match state {
            WireState::Unknown | WireState::Unrecognized => TaskState::Unknown,
            WireState::Queued | WireState::Paused => TaskState::Queued,
            WireState::Initializing => TaskState::Initializing,
            // Still running until the server confirms the cancel
            WireState::Running | WireState::Canceling => TaskState::Running,
            WireState::Complete => TaskState::Complete,
            WireState::ExecutorError => TaskState::Error,
            WireState::SystemError | WireState::Preempted => TaskState::SystemError,
            WireState::Canceled => TaskState::Canceled,
        }
    }
}
