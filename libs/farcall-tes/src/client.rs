//! TES HTTP client

use farcall_domain::{
    ports::TaskBackend,
    task::{TaskBackendError, TaskDescription, TaskId, TaskState},
};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, instrument, warn};

use crate::config::TesConfig;
use crate::wire::{CreateTaskResponse, MinimalTask, TesTask};

type Result<T> = std::result::Result<T, TaskBackendError>;

/// `TaskBackend` talking to a GA4GH TES v1 server
#[derive(Debug, Clone)]
pub struct TesClient {
    http: reqwest::Client,
    base_url: String,
}

impl TesClient {
    /// Create a client for the service described by `config`
    ///
    /// # Errors
    ///
    /// Returns `TaskBackendError::Rejected` if the HTTP client cannot be
    /// built (e.g. TLS backend initialisation failure).
    pub fn new(config: &TesConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| TaskBackendError::rejected(format!("HTTP client setup failed: {}", err)))?;

        info!(url = %config.url, "Created TES client");
        Ok(Self {
            http,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(&TesConfig::from_env())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn tasks_url(&self) -> String {
        format!("{}/v1/tasks", self.base_url)
    }

    fn task_url(&self, id: &TaskId) -> String {
        format!("{}/v1/tasks/{}", self.base_url, id)
    }

    /// Send `request`, turning transport failures and error statuses into
    /// `TaskBackendError`s
    async fn send(&self, request: RequestBuilder, task: Option<&TaskId>) -> Result<Response> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body, task))
    }

    async fn json<T: DeserializeOwned>(response: Response) -> Result<T> {
        response
            .json::<T>()
            .await
            .map_err(|err| TaskBackendError::invalid_response(err.to_string()))
    }
}

fn transport_error(err: reqwest::Error) -> TaskBackendError {
    if err.is_decode() {
        return TaskBackendError::invalid_response(err.to_string());
    }
    // Connection refused, reset or timed out
    TaskBackendError::transient(err.to_string())
}

fn status_error(status: StatusCode, body: &str, task: Option<&TaskId>) -> TaskBackendError {
    let detail = if body.trim().is_empty() {
        status.to_string()
    } else {
        format!("{}: {}", status, body.trim())
    };

    match (status, task) {
        (StatusCode::NOT_FOUND, Some(id)) => TaskBackendError::TaskNotFound(id.clone()),
        (StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT, _) => {
            TaskBackendError::transient(detail)
        }
        (status, _) if status.is_server_error() => TaskBackendError::transient(detail),
        _ => TaskBackendError::rejected(detail),
    }
}

impl TaskBackend for TesClient {
    #[instrument(skip(self, task), fields(name = %task.name()))]
    async fn submit(&self, task: &TaskDescription) -> Result<TaskId> {
        let body = TesTask::from(task);
        let response = self
            .send(self.http.post(self.tasks_url()).json(&body), None)
            .await
            .map_err(|err| {
                error!(error = %err, "Task submission failed");
                err
            })?;

        let created: CreateTaskResponse = Self::json(response).await?;
        if created.id.trim().is_empty() {
            return Err(TaskBackendError::invalid_response("empty task id"));
        }

        info!(task_id = %created.id, "Submitted task");
        Ok(TaskId::new(created.id))
    }

    async fn poll_status(&self, id: &TaskId) -> Result<TaskState> {
        let request = self
            .http
            .get(self.task_url(id))
            .query(&[("view", "MINIMAL")]);
        let task: MinimalTask = Self::json(self.send(request, Some(id)).await?).await?;

        if task.id != id.as_str() {
            warn!(expected = %id, received = %task.id, "TES answered for another task id");
        }
        let state = TaskState::from(task.state);
        debug!(task_id = %id, state = %state, "Polled task");
        Ok(state)
    }

    #[instrument(skip(self))]
    async fn cancel(&self, id: &TaskId) -> Result<()> {
        let url = format!("{}:cancel", self.task_url(id));
        self.send(self.http.post(url).json(&serde_json::json!({})), Some(id))
            .await?;
        info!(task_id = %id, "Requested task cancellation");
        Ok(())
    }

    async fn get_full(&self, id: &TaskId) -> Result<String> {
        let request = self.http.get(self.task_url(id)).query(&[("view", "FULL")]);
        let body = self
            .send(request, Some(id))
            .await?
            .text()
            .await
            .map_err(|err| TaskBackendError::invalid_response(err.to_string()))?;

        Ok(serde_json::from_str::<serde_json::Value>(&body)
            .and_then(|value| serde_json::to_string_pretty(&value))
            .unwrap_or(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let id = TaskId::new("task-1");

        assert_eq!(
            status_error(StatusCode::NOT_FOUND, "", Some(&id)),
            TaskBackendError::TaskNotFound(id.clone())
        );
        assert!(status_error(StatusCode::BAD_GATEWAY, "", Some(&id)).is_transient());
        assert!(status_error(StatusCode::TOO_MANY_REQUESTS, "", None).is_transient());
        assert!(matches!(
            status_error(StatusCode::BAD_REQUEST, "missing executors", None),
            TaskBackendError::Rejected(msg) if msg.contains("missing executors")
        ));
        // A 404 on submission is a misconfigured URL, not a missing task
        assert!(matches!(
            status_error(StatusCode::NOT_FOUND, "", None),
            TaskBackendError::Rejected(_)
        ));
    }

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = TesClient::new(&TesConfig::new("http://tes.local:8000/")).unwrap();
        assert_eq!(client.tasks_url(), "http://tes.local:8000/v1/tasks");
        assert_eq!(
            client.task_url(&TaskId::new("abc")),
            "http://tes.local:8000/v1/tasks/abc"
        );
    }
}
