//! Task description handed to the execution backend
//!
//! A `TaskDescription` is an immutable snapshot: once built for a submission
//! it is never edited, only serialized by the backend adapter.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Compute resources requested for a task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resources {
    pub cpu_cores: Option<u32>,
    pub ram_gb: Option<f64>,
    pub disk_gb: Option<f64>,
}

/// A file placed into the task before it runs
///
/// Either `url` (fetched by the backend) or `contents` (inlined) is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInput {
    pub name: Option<String>,
    pub url: Option<String>,
    pub path: String,
    pub contents: Option<String>,
}

impl TaskInput {
    /// Input fetched from a storage URL
    pub fn from_url(url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: None,
            url: Some(url.into()),
            path: path.into(),
            contents: None,
        }
    }

    /// Input whose contents travel inside the task description
    pub fn inline(contents: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: None,
            url: None,
            path: path.into(),
            contents: Some(contents.into()),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A file collected from the task after it finishes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskOutput {
    pub name: Option<String>,
    pub url: String,
    pub path: String,
}

impl TaskOutput {
    pub fn new(url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: None,
            url: url.into(),
            path: path.into(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// The container command of a task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Executor {
    pub image: String,
    pub command: Vec<String>,
    pub workdir: String,
    pub stdout: String,
    pub stderr: String,
    pub env: BTreeMap<String, String>,
}

/// Everything the backend needs to run one remote call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDescription {
    name: String,
    executor: Executor,
    resources: Resources,
    inputs: Vec<TaskInput>,
    outputs: Vec<TaskOutput>,
}

impl TaskDescription {
    pub fn new(
        name: impl Into<String>,
        executor: Executor,
        resources: Resources,
        inputs: Vec<TaskInput>,
        outputs: Vec<TaskOutput>,
    ) -> Self {
        Self {
            name: name.into(),
            executor,
            resources,
            inputs,
            outputs,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn executor(&self) -> &Executor {
        &self.executor
    }

    pub fn image(&self) -> &str {
        &self.executor.image
    }

    pub fn command(&self) -> &[String] {
        &self.executor.command
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    /// Inputs in the order they were registered
    pub fn inputs(&self) -> &[TaskInput] {
        &self.inputs
    }

    /// Outputs in the order they were registered
    pub fn outputs(&self) -> &[TaskOutput] {
        &self.outputs
    }
}
