//! HTTP gateway backed by `reqwest`.
//!
//! [`ApiClient`] owns the connection pool and base URL and turns responses
//! into [`GatewayError`] categories. [`HttpGateway`] layers the bearer token
//! and the project/task endpoints on top of it; the auth session reuses the
//! same client for the unauthenticated endpoints.

use std::time::Duration;

use devtrack_proto::codec;
use devtrack_proto::dto::{
    CreateProjectDto, CreateTaskDto, PageQuery, UpdateProjectDto, UpdateTaskDto,
    UpdateTaskStatusDto,
};
use devtrack_proto::model::{Project, ProjectId, Task, TaskId, TaskStatus};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

use super::{GatewayError, ResourceGateway};

/// Shared HTTP plumbing for the REST API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// Builds a client for the API rooted at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Network`] if the underlying HTTP client cannot
    /// be constructed (for example, no TLS backend is available).
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, base_url })
    }

    /// Returns the API base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolves path segments against the base URL, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Starts a request, attaching the bearer token when one is given.
    pub(crate) fn request(
        &self,
        method: Method,
        segments: &[&str],
        token: Option<&str>,
    ) -> RequestBuilder {
        let url = self.url(segments);
        tracing::debug!(%method, %url, "api request");
        let builder = self.client.request(method, url);
        match token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Sends a request and returns the raw body of a successful response.
    ///
    /// 401 maps to [`GatewayError::Unauthenticated`], any other non-2xx status
    /// to [`GatewayError::Server`] carrying the server's reason, and transport
    /// failures to [`GatewayError::Network`].
    pub(crate) async fn execute(&self, request: RequestBuilder) -> Result<Vec<u8>, GatewayError> {
        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(transport_error)?;

        if status == StatusCode::UNAUTHORIZED {
            tracing::debug!("api answered 401");
            return Err(GatewayError::Unauthenticated);
        }
        if !status.is_success() {
            let error = codec::decode_error(&body);
            let message = error.reason().map_or_else(
                || {
                    status
                        .canonical_reason()
                        .unwrap_or("request failed")
                        .to_string()
                },
                ToString::to_string,
            );
            tracing::debug!(status = status.as_u16(), %message, "api request failed");
            return Err(GatewayError::Server {
                status: status.as_u16(),
                message,
            });
        }
        Ok(body.to_vec())
    }

    /// Sends a request and decodes the (possibly enveloped) payload.
    pub(crate) async fn fetch<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, GatewayError> {
        let body = self.execute(request).await?;
        codec::decode(&body).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

/// Maps a `reqwest` transport failure to a gateway error.
fn transport_error(error: reqwest::Error) -> GatewayError {
    if error.is_timeout() {
        GatewayError::Network(format!("request timed out: {error}"))
    } else if error.is_connect() {
        GatewayError::Network(format!("connection failed: {error}"))
    } else {
        GatewayError::Network(error.to_string())
    }
}

/// [`ResourceGateway`] over the REST API, authenticated with a bearer token.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    api: ApiClient,
    token: String,
}

impl HttpGateway {
    /// Creates a gateway that sends `token` with every request.
    pub fn new(api: ApiClient, token: impl Into<String>) -> Self {
        Self {
            api,
            token: token.into(),
        }
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        self.api.request(method, segments, Some(&self.token))
    }
}

impl ResourceGateway for HttpGateway {
    async fn list_projects(&self, page_size: u32) -> Result<Vec<Project>, GatewayError> {
        let query = PageQuery {
            page: None,
            page_size: Some(page_size),
        };
        let request = self.request(Method::GET, &["projects"]).query(&query);
        let body = self.api.execute(request).await?;
        codec::decode_projects(&body).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn get_project(&self, id: &ProjectId) -> Result<Project, GatewayError> {
        let request = self.request(Method::GET, &["projects", id.as_str()]);
        self.api.fetch(request).await
    }

    async fn create_project(&self, name: &str) -> Result<Project, GatewayError> {
        let body = CreateProjectDto {
            name: name.to_string(),
        };
        let request = self.request(Method::POST, &["projects"]).json(&body);
        self.api.fetch(request).await
    }

    async fn rename_project(&self, id: &ProjectId, name: &str) -> Result<Project, GatewayError> {
        let body = UpdateProjectDto {
            name: name.to_string(),
        };
        let request = self
            .request(Method::PUT, &["projects", id.as_str()])
            .json(&body);
        self.api.fetch(request).await
    }

    async fn delete_project(&self, id: &ProjectId) -> Result<(), GatewayError> {
        let request = self.request(Method::DELETE, &["projects", id.as_str()]);
        self.api.execute(request).await.map(drop)
    }

    async fn list_tasks(
        &self,
        project_id: &ProjectId,
        page_size: u32,
    ) -> Result<Vec<Task>, GatewayError> {
        let query = PageQuery {
            page: None,
            page_size: Some(page_size),
        };
        let request = self
            .request(Method::GET, &["tasks", "by-project", project_id.as_str()])
            .query(&query);
        let body = self.api.execute(request).await?;
        codec::decode_listing(&body).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn create_task(&self, title: &str, project_id: &ProjectId) -> Result<Task, GatewayError> {
        let body = CreateTaskDto {
            title: title.to_string(),
            project_id: project_id.clone(),
        };
        let request = self.request(Method::POST, &["tasks"]).json(&body);
        self.api.fetch(request).await
    }

    async fn rename_task(&self, id: &TaskId, title: &str) -> Result<Task, GatewayError> {
        let body = UpdateTaskDto {
            title: title.to_string(),
        };
        let request = self
            .request(Method::PUT, &["tasks", id.as_str()])
            .json(&body);
        self.api.fetch(request).await
    }

    async fn set_task_status(&self, id: &TaskId, status: TaskStatus) -> Result<Task, GatewayError> {
        let body = UpdateTaskStatusDto { status };
        let request = self
            .request(Method::PATCH, &["tasks", id.as_str(), "status"])
            .json(&body);
        self.api.fetch(request).await
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), GatewayError> {
        let request = self.request(Method::DELETE, &["tasks", id.as_str()]);
        self.api.execute(request).await.map(drop)
    }
}
