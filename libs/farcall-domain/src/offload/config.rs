//! Configuration for remote calls
//!
//! `ExecutorConfig` describes the container a call runs in, `ResourceRequest`
//! carries per-field resource overrides, and `PollConfig` tunes how result
//! handles wait on the backend.

use std::time::Duration;

use crate::task::Resources;

/// Default container image for remote calls
pub const DEFAULT_IMAGE: &str = "alpine:3.20";

/// Default package install command used for extra dependencies
pub const DEFAULT_INSTALL_COMMAND: &str = "apk add --no-cache";

/// Default program the runner script hands the staged invocation to
pub const DEFAULT_ENTRYPOINT: &str = "farcall-entrypoint";

/// Default working directory inside the task container
pub const DEFAULT_WORKDIR: &str = "/tmp/farcall";

/// Container settings shared by every task a builder submits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutorConfig {
    /// Container image (e.g. "alpine:3.20")
    pub image: String,
    /// Packages installed before the call runs
    pub extra_dependencies: Vec<String>,
    /// Command prefix used to install `extra_dependencies`
    pub install_command: String,
    /// Program that executes the invocation inside the container
    pub entrypoint: String,
    /// Working directory; `./` runtime paths resolve against it
    pub workdir: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            image: DEFAULT_IMAGE.to_string(),
            extra_dependencies: Vec::new(),
            install_command: DEFAULT_INSTALL_COMMAND.to_string(),
            entrypoint: DEFAULT_ENTRYPOINT.to_string(),
            workdir: DEFAULT_WORKDIR.to_string(),
        }
    }
}

impl ExecutorConfig {
    /// Absolute in-container path of a file in the working directory
    pub fn workdir_path(&self, file: &str) -> String {
        format!("{}/{}", self.workdir.trim_end_matches('/'), file)
    }
}

/// Explicit per-field overrides for resources and container settings
///
/// Fields left unset keep whatever the builder already has.
///
/// # Example
///
/// ```rust
/// use farcall_domain::offload::ResourceRequest;
///
/// let request = ResourceRequest::new().cpu_cores(2).ram_gb(4.0);
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceRequest {
    cpu_cores: Option<u32>,
    ram_gb: Option<f64>,
    disk_gb: Option<f64>,
    image: Option<String>,
    extra_dependencies: Option<Vec<String>>,
}

impl ResourceRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cpu_cores(mut self, cores: u32) -> Self {
        self.cpu_cores = Some(cores);
        self
    }

    pub fn ram_gb(mut self, gb: f64) -> Self {
        self.ram_gb = Some(gb);
        self
    }

    pub fn disk_gb(mut self, gb: f64) -> Self {
        self.disk_gb = Some(gb);
        self
    }

    pub fn image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    pub fn extra_dependencies<I, D>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<String>,
    {
        self.extra_dependencies = Some(dependencies.into_iter().map(Into::into).collect());
        self
    }

    /// Apply the set fields onto existing resources and executor settings
    pub(crate) fn apply(self, resources: &mut Resources, executor: &mut ExecutorConfig) {
        if let Some(cores) = self.cpu_cores {
            resources.cpu_cores = Some(cores);
        }
        if let Some(ram) = self.ram_gb {
            resources.ram_gb = Some(ram);
        }
        if let Some(disk) = self.disk_gb {
            resources.disk_gb = Some(disk);
        }
        if let Some(image) = self.image {
            executor.image = image;
        }
        if let Some(dependencies) = self.extra_dependencies {
            executor.extra_dependencies = dependencies;
        }
    }
}

/// How result handles poll the task backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollConfig {
    /// Delay before the second status poll
    pub initial_interval: Duration,
    /// Upper bound for the exponential backoff between polls
    pub max_interval: Duration,
    /// Consecutive transient backend errors tolerated before giving up
    pub max_transient_failures: u32,
    /// How long a submission claim may sit unchanged before another run
    /// takes it over
    pub claim_timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(10),
            max_transient_failures: 5,
            claim_timeout: Duration::from_secs(60),
        }
    }
}

impl PollConfig {
    pub(crate) fn next_interval(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_interval)
    }
}
