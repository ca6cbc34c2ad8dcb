//! In-memory fakes for the storage and task backend ports

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use serde_json::{json, Value};

use crate::invocation::Invocation;
use crate::storage::{EntryKind, StorageBackend, StorageError, StorageLocation, UploadRequest};
use crate::task::{TaskBackend, TaskBackendError, TaskDescription, TaskId, TaskState};

/// Storage backed by a shared map; clones see the same artifacts
#[derive(Clone)]
pub(crate) struct InMemoryStorage {
    location: StorageLocation,
    data: Arc<Mutex<HashMap<String, Bytes>>>,
    fetches: Arc<Mutex<Vec<String>>>,
}

impl InMemoryStorage {
    pub(crate) fn at(url: &str) -> Self {
        Self {
            location: StorageLocation::parse(url).unwrap(),
            data: Arc::new(Mutex::new(HashMap::new())),
            fetches: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn put(&self, name: &str, contents: impl Into<Bytes>) {
        self.data
            .lock()
            .unwrap()
            .insert(name.to_string(), contents.into());
    }

    pub(crate) fn get(&self, name: &str) -> Option<Bytes> {
        self.data.lock().unwrap().get(name).cloned()
    }

    /// Number of `fetch` calls for names starting with `prefix`
    pub(crate) fn fetch_count(&self, prefix: &str) -> usize {
        self.fetches
            .lock()
            .unwrap()
            .iter()
            .filter(|name| name.starts_with(prefix))
            .count()
    }

    /// Artifact name for a URL generated by this store
    fn name_of(&self, url: &str) -> Option<String> {
        let root = self.location.generate_url("");
        url.strip_prefix(&root).map(str::to_string)
    }
}

impl StorageBackend for InMemoryStorage {
    fn location(&self) -> &StorageLocation {
        &self.location
    }

    async fn exists(&self, name: &str, kind: EntryKind) -> Result<bool, StorageError> {
        let data = self.data.lock().unwrap();
        let name = name.trim_matches('/');
        Ok(match kind {
            EntryKind::File => data.contains_key(name),
            EntryKind::Directory => {
                let prefix = format!("{}/", name);
                data.keys().any(|key| key.starts_with(&prefix))
            }
        })
    }

    async fn upload(&self, request: UploadRequest) -> Result<String, StorageError> {
        let name = request.resolve_name();
        let contents = request.read_contents().await?;
        {
            let mut data = self.data.lock().unwrap();
            if !request.allows_overwrite() && data.contains_key(&name) {
                return Err(StorageError::ArtifactExists(name));
            }
            data.insert(name.clone(), contents);
        }
        Ok(self.generate_url(&name))
    }

    async fn download(
        &self,
        name: &str,
        destination: &Path,
        overwrite_existing: bool,
    ) -> Result<PathBuf, StorageError> {
        if destination.exists() && !overwrite_existing {
            return Err(StorageError::DestinationExists(destination.to_path_buf()));
        }
        let contents = self
            .get(name)
            .ok_or_else(|| StorageError::ArtifactNotFound(name.to_string()))?;
        tokio::fs::write(destination, &contents)
            .await
            .map_err(|err| StorageError::io(destination, err))?;
        Ok(destination.to_path_buf())
    }

    async fn fetch(&self, name: &str) -> Result<Bytes, StorageError> {
        self.fetches.lock().unwrap().push(name.to_string());
        self.get(name)
            .ok_or_else(|| StorageError::ArtifactNotFound(name.to_string()))
    }
}

#[derive(Default)]
struct Script {
    next_id: u32,
    tasks: HashMap<TaskId, TaskState>,
    submitted: Vec<TaskDescription>,
    cancels: usize,
    hold: bool,
    fail_with: Option<TaskState>,
    transient_polls: u32,
    submit_delay: Option<Duration>,
    rejections: u32,
}

/// Task backend that runs calls inline against an [`InMemoryStorage`]
///
/// Supported functions: `hello(name)` and `add(a, b, ...)`.
#[derive(Clone)]
pub(crate) struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
    storage: Option<InMemoryStorage>,
}

impl ScriptedBackend {
    /// Backend that accepts tasks but never executes them
    pub(crate) fn detached() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                hold: true,
                ..Script::default()
            })),
            storage: None,
        }
    }

    /// Backend that executes submitted calls against `storage`
    pub(crate) fn linked(storage: &InMemoryStorage) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script::default())),
            storage: Some(storage.clone()),
        }
    }

    /// Leave submitted tasks running until cancelled
    pub(crate) fn holding(self) -> Self {
        self.script.lock().unwrap().hold = true;
        self
    }

    /// End submitted tasks in `state` without writing a result
    pub(crate) fn failing_with(self, state: TaskState) -> Self {
        self.script.lock().unwrap().fail_with = Some(state);
        self
    }

    /// Fail the next `count` status polls with a transient error
    pub(crate) fn with_transient_polls(self, count: u32) -> Self {
        self.script.lock().unwrap().transient_polls = count;
        self
    }

    /// Take `delay` to answer each submission
    pub(crate) fn with_submit_delay(self, delay: Duration) -> Self {
        self.script.lock().unwrap().submit_delay = Some(delay);
        self
    }

    /// Reject the next `count` submissions
    pub(crate) fn rejecting(self, count: u32) -> Self {
        self.script.lock().unwrap().rejections = count;
        self
    }

    /// Let later submissions succeed
    pub(crate) fn recover(&self) {
        let mut script = self.script.lock().unwrap();
        script.fail_with = None;
        script.hold = false;
    }

    pub(crate) fn submissions(&self) -> usize {
        self.script.lock().unwrap().submitted.len()
    }

    pub(crate) fn cancels(&self) -> usize {
        self.script.lock().unwrap().cancels
    }

    pub(crate) fn last_task(&self) -> Option<TaskDescription> {
        self.script.lock().unwrap().submitted.last().cloned()
    }

    /// Run the call described by `task`, writing its outputs to storage
    fn execute(&self, task: &TaskDescription) -> TaskState {
        let Some(storage) = &self.storage else {
            return TaskState::Complete;
        };

        let invocation = task
            .inputs()
            .iter()
            .find(|input| input.path.ends_with("/invocation.bin"))
            .and_then(|input| input.url.as_deref())
            .and_then(|url| storage.name_of(url))
            .and_then(|name| storage.get(&name))
            .and_then(|blob| serde_json::from_slice::<Invocation>(&blob).ok());
        let Some(value) = invocation.as_ref().and_then(evaluate) else {
            return TaskState::Error;
        };

        for output in task.outputs() {
            let Some(name) = storage.name_of(&output.url) else {
                continue;
            };
            if output.path.ends_with("/result.bin") {
                storage.put(&name, serde_json::to_vec(&value).unwrap());
            } else {
                storage.put(&name, format!("written to {}", output.path));
            }
        }
        TaskState::Complete
    }
}

fn evaluate(invocation: &Invocation) -> Option<Value> {
    match invocation.function() {
        "hello" => {
            let name = invocation.args().first()?.as_str()?;
            Some(json!(format!("hello {}", name)))
        }
        "add" => Some(json!(invocation
            .args()
            .iter()
            .filter_map(Value::as_i64)
            .sum::<i64>())),
        _ => None,
    }
}

impl TaskBackend for ScriptedBackend {
    async fn submit(&self, task: &TaskDescription) -> Result<TaskId, TaskBackendError> {
        let delay = self.script.lock().unwrap().submit_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let (hold, fail_with, id) = {
            let mut script = self.script.lock().unwrap();
            if script.rejections > 0 {
                script.rejections -= 1;
                return Err(TaskBackendError::Rejected("quota exceeded".to_string()));
            }
            script.next_id += 1;
            script.submitted.push(task.clone());
            (
                script.hold,
                script.fail_with,
                TaskId::new(format!("task-{}", script.next_id)),
            )
        };

        let state = match (hold, fail_with) {
            (_, Some(state)) => state,
            (true, None) => TaskState::Running,
            (false, None) => self.execute(task),
        };
        self.script.lock().unwrap().tasks.insert(id.clone(), state);
        Ok(id)
    }

    async fn poll_status(&self, id: &TaskId) -> Result<TaskState, TaskBackendError> {
        let mut script = self.script.lock().unwrap();
        if script.transient_polls > 0 {
            script.transient_polls -= 1;
            return Err(TaskBackendError::transient("connection reset"));
        }
        script
            .tasks
            .get(id)
            .copied()
            .ok_or_else(|| TaskBackendError::TaskNotFound(id.clone()))
    }

    async fn cancel(&self, id: &TaskId) -> Result<(), TaskBackendError> {
        let mut script = self.script.lock().unwrap();
        script.cancels += 1;
        match script.tasks.get_mut(id) {
            Some(state) if !state.is_terminal() => {
                *state = TaskState::Canceled;
                Ok(())
            }
            Some(_) => Ok(()),
            None => Err(TaskBackendError::TaskNotFound(id.clone())),
        }
    }

    async fn get_full(&self, id: &TaskId) -> Result<String, TaskBackendError> {
        let script = self.script.lock().unwrap();
        let state = script
            .tasks
            .get(id)
            .ok_or_else(|| TaskBackendError::TaskNotFound(id.clone()))?;
        Ok(format!(
            "{{\"id\": \"{}\", \"state\": \"{}\", \"logs\": \"exit code 1\"}}",
            id, state
        ))
    }
}
