//! Invocation builder
//!
//! Accumulates the description of one remote call (inputs, outputs,
//! resources, container settings and run namespace) and stages it with
//! [`InvocationBuilder::run`].
//!
//! ## Call caching
//!
//! Every artifact of a call lives under `<run id>/` in the file store, named
//! after the SHA-256 of the serialized invocation. Running the same
//! invocation twice under one run id therefore finds the first result
//! instead of submitting a second task.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::future::{
    remote::RemoteTarget, CachedFuture, RemoteFuture, ResultHandle,
};
use crate::invocation::{CacheKey, CallArtifacts, InvocationCodec};
use crate::offload::{
    config::{ExecutorConfig, PollConfig, ResourceRequest},
    error::{OffloadError, Result},
    claim::{ClaimToken, Marker},
    run_id::{RunId, RunIdentity},
    submitter::{StagedCall, TaskSubmitter},
};
use crate::storage::{EntryKind, Scheme, StorageBackend, StorageError, StorageLocation, UploadRequest};
use crate::task::{Resources, TaskBackend, TaskBackendError, TaskId, TaskInput, TaskOutput};

/// Outcome of contending for a call's task marker
enum Claim {
    /// This run submits; the token is written to the marker
    Won(ClaimToken),
    /// Another submission already covers the call
    Attach(TaskId),
}

/// A local file uploaded into the run namespace by `with_upload`
#[derive(Debug, Clone, PartialEq, Eq)]
struct StagedUpload {
    local_path: PathBuf,
    file_name: String,
}

/// Builder for one remote call
///
/// Registration errors are raised immediately; nothing touches the task
/// backend until [`run`](Self::run).
///
/// # Example
///
/// ```rust,ignore
/// let mut builder = InvocationBuilder::new(Arc::new(store), Arc::new(tes));
/// builder
///     .with_resources(ResourceRequest::new().cpu_cores(2))
///     .with_call_caching("hello-cache")?
///     .with_output("./out.txt")?;
///
/// let handle = builder
///     .run(Arc::new(JsonCodec::<String>::new()), &Invocation::new("hello", vec![json!("world")])?)
///     .await?;
/// assert_eq!(handle.result(None).await?, "hello world");
/// ```
pub struct InvocationBuilder<S, B> {
    storage: Arc<S>,
    backend: Arc<B>,
    executor: ExecutorConfig,
    resources: Resources,
    poll: PollConfig,
    inputs: Vec<TaskInput>,
    outputs: Vec<TaskOutput>,
    staged: Vec<StagedUpload>,
    identity: RunIdentity,
}

impl<S, B> Clone for InvocationBuilder<S, B> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            backend: Arc::clone(&self.backend),
            executor: self.executor.clone(),
            resources: self.resources.clone(),
            poll: self.poll.clone(),
            inputs: self.inputs.clone(),
            outputs: self.outputs.clone(),
            staged: self.staged.clone(),
            identity: self.identity.clone(),
        }
    }
}

impl<S, B> InvocationBuilder<S, B>
where
    S: StorageBackend,
    B: TaskBackend,
{
    pub fn new(storage: Arc<S>, backend: Arc<B>) -> Self {
        Self {
            storage,
            backend,
            executor: ExecutorConfig::default(),
            resources: Resources::default(),
            poll: PollConfig::default(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            staged: Vec::new(),
            identity: RunIdentity::Unassigned,
        }
    }

    pub fn with_executor(mut self, executor: ExecutorConfig) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Override the fields set on `request`, keeping all others
    pub fn with_resources(&mut self, request: ResourceRequest) -> &mut Self {
        request.apply(&mut self.resources, &mut self.executor);
        self
    }

    /// Make a file available to the task at `runtime_path`
    ///
    /// # Errors
    ///
    /// - `OffloadError::UnsupportedScheme` if the URL scheme is not served by
    ///   the file store
    /// - `OffloadError::LocalStoreMismatch` for a local input when the file
    ///   store is remote
    /// - `OffloadError::InvalidPath` if `runtime_path` is neither absolute nor
    ///   `./`-relative
    pub fn with_input(&mut self, url: &str, runtime_path: &str) -> Result<&mut Self> {
        let url = self.input_url(url)?;
        let path = self.runtime_path(runtime_path)?;
        self.inputs.push(TaskInput::from_url(url, path));
        Ok(self)
    }

    /// Collect the file the task writes at `runtime_path`
    ///
    /// It is stored at `<run id>/<runtime_path>` in the file store.
    pub fn with_output(&mut self, runtime_path: &str) -> Result<&mut Self> {
        let path = self.runtime_path(runtime_path)?;
        let run_id = self.ensure_run_id();

        let relative = runtime_path.strip_prefix("file://").unwrap_or(runtime_path);
        let relative = relative
            .strip_prefix("./")
            .unwrap_or(relative)
            .trim_start_matches('/');
        let url = self
            .storage
            .generate_url(&format!("{}/{}", run_id, relative));

        self.outputs.push(TaskOutput::new(url, path));
        Ok(self)
    }

    /// Upload a local file into the run namespace and register it as input
    ///
    /// The upload happens once: if the namespace already holds a file with
    /// the same name it is reused.
    pub async fn with_upload(&mut self, local_path: impl AsRef<Path>) -> Result<&mut Self> {
        let local_path = absolute(local_path.as_ref())?;
        let file_name = local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                OffloadError::invalid_path(local_path.display().to_string(), "not a file")
            })?;

        let run_id = self.ensure_run_id();
        let name = format!("{}/{}", run_id, file_name);
        let url = match self.storage.exists(&name, EntryKind::File).await? {
            true => {
                warn!(name = %name, "File already uploaded to this run, skipping upload");
                self.storage.generate_url(&name)
            }
            false => {
                self.storage
                    .upload(UploadRequest::from_path(&local_path).named(&name))
                    .await?
            }
        };

        let upload = StagedUpload {
            local_path: local_path.clone(),
            file_name,
        };
        if !self.staged.contains(&upload) {
            self.staged.push(upload);
        }

        let already_registered = self
            .inputs
            .iter()
            .any(|input| input.url.as_deref() == Some(url.as_str()));
        if !already_registered {
            let runtime_path = local_path.to_string_lossy().into_owned();
            self.with_input(&url, &runtime_path)?;
        }
        Ok(self)
    }

    /// Store this call's artifacts under `name` so later runs can reuse them
    ///
    /// URLs already registered under a generated run id are rewritten to use
    /// `name`.
    pub fn with_call_caching(&mut self, name: &str) -> Result<&mut Self> {
        let cached = RunId::named(name)?;
        if let Some(previous) = self.identity.current().cloned() {
            if previous != cached {
                self.rebind(&previous, &cached);
            }
        }
        self.identity = RunIdentity::Cached(cached);
        Ok(self)
    }

    /// Stage the invocation and return a handle to its result
    ///
    /// Returns a cached handle when the result already exists under the run
    /// id, attaches to a task another submission already started for the
    /// same invocation, and otherwise submits a new task.
    #[instrument(skip_all, fields(run_id = tracing::field::Empty))]
    pub async fn run<C>(
        &mut self,
        codec: Arc<C>,
        invocation: &C::Invocation,
    ) -> Result<ResultHandle<C::Output>>
    where
        C: InvocationCodec,
        C::Invocation: Sync,
    {
        let run_id = self.resolve_run_id().await?;
        tracing::Span::current().record("run_id", run_id.as_str());
        self.restage_uploads(&run_id).await?;
        if let RunIdentity::Generated { consumed, .. } = &mut self.identity {
            *consumed = true;
        }

        let blob = codec.encode(invocation)?;
        let key = CacheKey::of(&blob);
        let artifacts = CallArtifacts::new(&run_id, &key);

        let staged = self
            .storage
            .exists(&artifacts.invocation, EntryKind::File)
            .await?;
        if staged {
            debug!(key = %key, "Invocation already staged");
        }

        if self.storage.exists(&artifacts.result, EntryKind::File).await? {
            info!(key = %key, "Found cached result, skipping submission");
            return Ok(ResultHandle::Cached(CachedFuture::spawn(
                artifacts.result,
                Arc::clone(&self.storage),
                codec,
            )));
        }

        let token = match self.claim(&artifacts).await? {
            Claim::Attach(task_id) => {
                info!(task_id = %task_id, key = %key, "Attaching to task already computing this call");
                return Ok(ResultHandle::Remote(
                    self.follow(task_id, artifacts.result, codec),
                ));
            }
            Claim::Won(token) => token,
        };

        let submitted = self.submit_claimed(&run_id, &artifacts, blob, staged).await;
        let marker = match &submitted {
            Ok(task_id) => task_id.as_str().to_owned(),
            Err(_) => token.released(),
        };
        if let Err(err) = self
            .storage
            .upload(
                UploadRequest::from_bytes(marker)
                    .named(&artifacts.task_marker)
                    .overwrite_existing(true),
            )
            .await
        {
            warn!(error = %err, "Failed to update task marker");
        }
        let task_id = submitted?;

        Ok(ResultHandle::Remote(
            self.follow(task_id, artifacts.result, codec),
        ))
    }

    pub fn run_id(&self) -> Option<&RunId> {
        self.identity.current()
    }

    pub fn inputs(&self) -> &[TaskInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TaskOutput] {
        &self.outputs
    }

    pub fn resources(&self) -> &Resources {
        &self.resources
    }

    pub fn executor(&self) -> &ExecutorConfig {
        &self.executor
    }

    fn input_url(&self, url: &str) -> Result<String> {
        let supported = self.storage.supported_schemes();
        let scheme = match url.split_once("://") {
            Some((scheme, _)) if !scheme.is_empty() => scheme
                .parse::<Scheme>()
                .ok()
                .filter(|scheme| supported.contains(scheme))
                .ok_or_else(|| {
                    let names: Vec<_> = supported.iter().map(Scheme::as_str).collect();
                    OffloadError::unsupported_scheme(url, names.join(", "))
                })?,
            _ => Scheme::File,
        };

        if scheme.is_local() && !self.storage.scheme().is_local() {
            return Err(OffloadError::LocalStoreMismatch(url.to_string()));
        }

        Ok(StorageLocation::parse(url)?.to_string())
    }

    /// Resolve a runtime path to an absolute in-container path
    fn runtime_path(&self, runtime_path: &str) -> Result<String> {
        let path = match runtime_path.split_once("://") {
            Some(("file", rest)) => rest,
            Some(_) => {
                return Err(OffloadError::invalid_path(
                    runtime_path,
                    "runtime paths are local to the task container",
                ))
            }
            None => runtime_path,
        };

        if Path::new(path)
            .components()
            .any(|component| component == Component::ParentDir)
        {
            return Err(OffloadError::invalid_path(
                runtime_path,
                "'..' is not allowed",
            ));
        }

        if let Some(relative) = path.strip_prefix("./") {
            let relative = relative.trim_start_matches('/');
            if relative.is_empty() {
                return Err(OffloadError::invalid_path(runtime_path, "names no file"));
            }
            Ok(self.executor.workdir_path(relative))
        } else if path.starts_with('/') {
            Ok(path.to_string())
        } else {
            Err(OffloadError::invalid_path(
                runtime_path,
                "must be absolute or start with './'",
            ))
        }
    }

    fn ensure_run_id(&mut self) -> RunId {
        if matches!(self.identity, RunIdentity::Unassigned) {
            self.identity = RunIdentity::Generated {
                id: RunId::generate(),
                consumed: false,
            };
        }
        match &self.identity {
            RunIdentity::Generated { id, .. } | RunIdentity::Cached(id) => id.clone(),
            RunIdentity::Unassigned => RunId::generate(),
        }
    }

    async fn resolve_run_id(&mut self) -> Result<RunId> {
        match self.identity.clone() {
            RunIdentity::Cached(id) => Ok(id),
            RunIdentity::Unassigned => {
                let id = self.fresh_run_id().await?;
                self.identity = RunIdentity::Generated {
                    id: id.clone(),
                    consumed: false,
                };
                Ok(id)
            }
            RunIdentity::Generated { id, consumed } => {
                let taken = consumed
                    || (self.staged.is_empty()
                        && self.storage.exists(id.as_str(), EntryKind::Directory).await?);
                if !taken {
                    return Ok(id);
                }

                let fresh = self.fresh_run_id().await?;
                debug!(previous = %id, run_id = %fresh, "Run id already used, regenerating");
                self.rebind(&id, &fresh);
                self.identity = RunIdentity::Generated {
                    id: fresh.clone(),
                    consumed: false,
                };
                Ok(fresh)
            }
        }
    }

    async fn fresh_run_id(&self) -> Result<RunId> {
        loop {
            let id = RunId::generate();
            if !self.storage.exists(id.as_str(), EntryKind::Directory).await? {
                return Ok(id);
            }
        }
    }

    /// Point every registered URL under `old`'s namespace at `new`'s
    fn rebind(&mut self, old: &RunId, new: &RunId) {
        let old_prefix = format!("{}/", self.storage.generate_url(old.as_str()));
        let new_prefix = format!("{}/", self.storage.generate_url(new.as_str()));
        let rebind = |url: &str| -> Option<String> {
            url.strip_prefix(&old_prefix)
                .map(|rest| format!("{}{}", new_prefix, rest))
        };

        for input in &mut self.inputs {
            if let Some(url) = input.url.as_deref().and_then(rebind) {
                input.url = Some(url);
            }
        }
        for output in &mut self.outputs {
            if let Some(url) = rebind(&output.url) {
                output.url = url;
            }
        }
    }

    /// Make sure every `with_upload` file exists in the final namespace
    async fn restage_uploads(&self, run_id: &RunId) -> Result<()> {
        for upload in &self.staged {
            let name = format!("{}/{}", run_id, upload.file_name);
            if self.storage.exists(&name, EntryKind::File).await? {
                continue;
            }
            debug!(name = %name, "Re-staging upload into run namespace");
            self.storage
                .upload(UploadRequest::from_path(&upload.local_path).named(&name))
                .await?;
        }
        Ok(())
    }

    /// Become the one run that submits this call, or find the task to attach to
    ///
    /// The marker is created exclusively. A marker naming a failed or unknown
    /// task, a released claim, or a claim left unchanged for `claim_timeout`
    /// is contested through `CallArtifacts::takeover_claim`, so at most one
    /// contender replaces each marker state.
    async fn claim(&self, artifacts: &CallArtifacts) -> Result<Claim> {
        let token = ClaimToken::generate();
        let timeout = self.poll.claim_timeout.max(Duration::from_millis(1));
        let mut interval = self.poll.initial_interval;
        let mut observed: Option<(Bytes, Instant)> = None;

        loop {
            let raw = match self.storage.fetch(&artifacts.task_marker).await {
                Ok(raw) => raw,
                Err(StorageError::ArtifactNotFound(_)) => {
                    let request = UploadRequest::from_bytes(token.pending()).named(&artifacts.task_marker);
                    match self.storage.upload(request).await {
                        Ok(_) => return Ok(Claim::Won(token)),
                        Err(StorageError::ArtifactExists(_)) => continue,
                        Err(err) => return Err(err.into()),
                    }
                }
                Err(err) => return Err(err.into()),
            };

            let contested = match Marker::parse(&raw) {
                Marker::Task(task_id) => match self.backend.poll_status(&task_id).await {
                    Ok(state) if state.is_failure() => {
                        info!(task_id = %task_id, state = %state, "Previous task for this call failed, resubmitting");
                        true
                    }
                    Ok(_) => return Ok(Claim::Attach(task_id)),
                    Err(TaskBackendError::TaskNotFound(_)) => true,
                    Err(err) => return Err(err.into()),
                },
                Marker::Released => true,
                Marker::Pending => false,
            };

            let since = match &observed {
                Some((seen, since)) if *seen == raw => *since,
                _ => {
                    let now = Instant::now();
                    observed = Some((raw.clone(), now));
                    now
                }
            };
            let round = u32::try_from(since.elapsed().as_nanos() / timeout.as_nanos()).unwrap_or(u32::MAX);

            if contested || round > 0 {
                if round > 0 {
                    warn!(round, "Task marker unchanged for too long, taking over");
                }
                let request = UploadRequest::from_bytes(token.pending())
                    .named(&artifacts.takeover_claim(&raw, round));
                match self.storage.upload(request).await {
                    Ok(_) => {
                        let request = UploadRequest::from_bytes(token.pending())
                            .named(&artifacts.task_marker)
                            .overwrite_existing(true);
                        self.storage.upload(request).await?;
                        return Ok(Claim::Won(token));
                    }
                    Err(StorageError::ArtifactExists(_)) => {}
                    Err(err) => return Err(err.into()),
                }
            }

            debug!(interval = ?interval, "Another run is submitting this call, waiting");
            tokio::time::sleep(interval).await;
            interval = self.poll.next_interval(interval);
        }
    }

    /// Stage the invocation blob and submit the task, holding the claim
    async fn submit_claimed(
        &self,
        run_id: &RunId,
        artifacts: &CallArtifacts,
        blob: Bytes,
        staged: bool,
    ) -> Result<TaskId> {
        if !staged {
            let request = UploadRequest::from_bytes(blob).named(&artifacts.invocation);
            match self.storage.upload(request).await {
                Ok(_) | Err(StorageError::ArtifactExists(_)) => {}
                Err(err) => return Err(err.into()),
            }
        }

        let call = StagedCall {
            run_id,
            resources: &self.resources,
            inputs: &self.inputs,
            outputs: &self.outputs,
            invocation_url: self.storage.generate_url(&artifacts.invocation),
            result_url: self.storage.generate_url(&artifacts.result),
        };
        let task_id = TaskSubmitter::new(Arc::clone(&self.backend), self.executor.clone())
            .submit(&call)
            .await?;
        Ok(task_id)
    }

    fn follow<C>(&self, task_id: TaskId, result_name: String, codec: Arc<C>) -> RemoteFuture<C::Output>
    where
        C: InvocationCodec,
    {
        RemoteFuture::spawn(RemoteTarget {
            task_id,
            result_name,
            storage: Arc::clone(&self.storage),
            backend: Arc::clone(&self.backend),
            codec,
            poll: self.poll.clone(),
        })
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|err| OffloadError::invalid_path(path.display().to_string(), err.to_string()))
}
