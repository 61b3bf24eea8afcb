//! Transport between the client cache and the task board server.

use futures::FutureExt;
use futures::future::BoxFuture;
use reqwest::{Client, IntoUrl, Method, Response, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::error::SyncError;
use crate::api::{ApiError, PatchTaskResponse};
use crate::domain::{Task, TaskDraft, TaskId, TaskPatch};

/// Future returned by every transport call.
pub type ApiFuture<'a, T> = BoxFuture<'a, Result<T, SyncError>>;

/// The REST operations the sync manager relies on.
///
/// Each call is a single request: nothing is retried or queued.
pub trait TaskApi: Send + Sync {
    /// `GET /tasks`.
    fn list(&self) -> ApiFuture<'_, Vec<Task>>;

    /// `GET /tasks/{id}`.
    fn get<'a>(&'a self, id: &'a TaskId) -> ApiFuture<'a, Task>;

    /// `POST /tasks`.
    fn create<'a>(&'a self, draft: &'a TaskDraft) -> ApiFuture<'a, Task>;

    /// `PUT /tasks/{id}`.
    fn update<'a>(&'a self, id: &'a TaskId, patch: &'a TaskPatch)
    -> ApiFuture<'a, PatchTaskResponse>;

    /// `PATCH /tasks/{id}`.
    fn patch<'a>(&'a self, id: &'a TaskId, patch: &'a TaskPatch)
    -> ApiFuture<'a, PatchTaskResponse>;

    /// `DELETE /tasks/{id}`.
    fn delete<'a>(&'a self, id: &'a TaskId) -> ApiFuture<'a, ()>;
}

// =============================================================================
// HTTP Transport
// =============================================================================

/// `TaskApi` over HTTP with `reqwest`.
///
/// `base_url` is the prefix the task routes hang off, such as
/// `http://localhost:3001` or `http://localhost:3001/api`.
#[derive(Debug, Clone)]
pub struct HttpTaskApi {
    client: Client,
    base_url: String,
}

impl HttpTaskApi {
    /// Creates a transport with a default `reqwest` client.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    /// Creates a transport that sends requests through `client`.
    #[must_use]
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `{base_url}/tasks/{id}`, with the id percent-encoded as one segment.
    fn task_url(&self, id: &TaskId) -> Result<Url, SyncError> {
        let invalid = || SyncError::InvalidUrl(self.base_url.clone());
        let mut url =
            Url::parse(&format!("{}/tasks", self.base_url)).map_err(|_| invalid())?;
        url.path_segments_mut()
            .map_err(|()| invalid())?
            .push(id.as_str());
        Ok(url)
    }

    async fn send<B: Serialize + Sync + ?Sized>(
        &self,
        method: Method,
        url: impl IntoUrl + Send,
        body: Option<&B>,
    ) -> Result<Response, SyncError> {
        let request = self.client.request(method, url);
        let request = match body {
            Some(body) => request.json(body),
            None => request,
        };
        Ok(request.send().await?)
    }
}

impl TaskApi for HttpTaskApi {
    fn list(&self) -> ApiFuture<'_, Vec<Task>> {
        async move {
            let url = format!("{}/tasks", self.base_url);
            let response = self.send::<()>(Method::GET, url, None).await?;
            parse_response(response, None).await
        }
        .boxed()
    }

    fn get<'a>(&'a self, id: &'a TaskId) -> ApiFuture<'a, Task> {
        async move {
            let response = self.send::<()>(Method::GET, self.task_url(id)?, None).await?;
            parse_response(response, Some(id)).await
        }
        .boxed()
    }

    fn create<'a>(&'a self, draft: &'a TaskDraft) -> ApiFuture<'a, Task> {
        async move {
            let url = format!("{}/tasks", self.base_url);
            let response = self.send(Method::POST, url, Some(draft)).await?;
            parse_response(response, None).await
        }
        .boxed()
    }

    fn update<'a>(
        &'a self,
        id: &'a TaskId,
        patch: &'a TaskPatch,
    ) -> ApiFuture<'a, PatchTaskResponse> {
        async move {
            let response = self.send(Method::PUT, self.task_url(id)?, Some(patch)).await?;
            parse_response(response, Some(id)).await
        }
        .boxed()
    }

    fn patch<'a>(
        &'a self,
        id: &'a TaskId,
        patch: &'a TaskPatch,
    ) -> ApiFuture<'a, PatchTaskResponse> {
        async move {
            let response = self
                .send(Method::PATCH, self.task_url(id)?, Some(patch))
                .await?;
            parse_response(response, Some(id)).await
        }
        .boxed()
    }

    fn delete<'a>(&'a self, id: &'a TaskId) -> ApiFuture<'a, ()> {
        async move {
            let response = self
                .send::<()>(Method::DELETE, self.task_url(id)?, None)
                .await?;
            check_status(response, Some(id)).await.map(drop)
        }
        .boxed()
    }
}

async fn parse_response<T: DeserializeOwned>(
    response: Response,
    id: Option<&TaskId>,
) -> Result<T, SyncError> {
    let response = check_status(response, id).await?;
    response
        .json()
        .await
        .map_err(|error| SyncError::Decode(error.to_string()))
}

/// Passes a success response through and turns anything else into a `SyncError`.
async fn check_status(response: Response, id: Option<&TaskId>) -> Result<Response, SyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if let (StatusCode::NOT_FOUND, Some(id)) = (status, id) {
        return Err(SyncError::NotFound(id.clone()));
    }

    let text = response.text().await.unwrap_or_default();
    let (message, details) = match serde_json::from_str::<ApiError>(&text) {
        Ok(body) => (body.error, body.details.unwrap_or_default()),
        Err(_) => (text, Vec::new()),
    };
    Err(SyncError::Server {
        status: status.as_u16(),
        message,
        details,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("http://localhost:3001", "abc", "http://localhost:3001/tasks/abc")]
    #[case("http://localhost:3001/api/", "abc", "http://localhost:3001/api/tasks/abc")]
    #[case(
        "http://localhost:3001",
        "ops/weekly?due=1#x",
        "http://localhost:3001/tasks/ops%2Fweekly%3Fdue=1%23x"
    )]
    #[case("http://localhost:3001", "two words", "http://localhost:3001/tasks/two%20words")]
    fn test_task_url(#[case] base_url: &str, #[case] id: &str, #[case] expected: &str) {
        let api = HttpTaskApi::new(base_url);
        assert_eq!(api.task_url(&TaskId::new(id)).unwrap().as_str(), expected);
    }

    #[rstest]
    #[tokio::test]
    async fn test_unusable_base_url_is_reported() {
        let api = HttpTaskApi::new("not a url");
        let result = api.get(&TaskId::new("abc")).await;
        assert!(matches!(result, Err(SyncError::InvalidUrl(_))));
    }

    #[rstest]
    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let api = HttpTaskApi::new("http://127.0.0.1:9");
        let result = api.list().await;
        assert!(matches!(result, Err(SyncError::Network(_))));
    }
}
