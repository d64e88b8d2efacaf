//! Resource gateway abstraction for `DevTrack`.
//!
//! Defines the [`ResourceGateway`] trait through which the client reads and
//! mutates projects and tasks. Implementations:
//! - [`http::HttpGateway`]: REST calls against the remote API
//! - [`memory::InMemoryGateway`]: in-process store for tests and demos

pub mod http;
pub mod memory;

use std::fmt;
use std::future::Future;

use devtrack_proto::model::{Project, ProjectId, Task, TaskId, TaskStatus};

/// Coarse failure category used to decide how a failure is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The session is missing or expired; the user must log in again.
    Unauthenticated,
    /// The server rejected or failed the request.
    ServerError,
    /// The server could not be reached.
    NetworkError,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "unauthenticated"),
            Self::ServerError => write!(f, "server error"),
            Self::NetworkError => write!(f, "network error"),
        }
    }
}

/// Errors returned by gateway calls.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    /// The server answered 401 or no session token is available.
    #[error("not authenticated")]
    Unauthenticated,

    /// The server answered with a non-success status.
    #[error("server error ({status}): {message}")]
    Server {
        /// HTTP status code.
        status: u16,
        /// Reason reported by the server, or a generic description.
        message: String,
    },

    /// The request never produced a response (connect failure, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// The server answered successfully but the body could not be decoded.
    #[error("unexpected response: {0}")]
    Decode(String),
}

impl GatewayError {
    /// Returns the category this failure belongs to.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Unauthenticated => ErrorCategory::Unauthenticated,
            Self::Server { .. } | Self::Decode(_) => ErrorCategory::ServerError,
            Self::Network(_) => ErrorCategory::NetworkError,
        }
    }

    /// Whether this failure must send the user back to the login entry point.
    #[must_use]
    pub const fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated)
    }
}

/// Async CRUD contract for projects and tasks.
///
/// Every call is an independent request/response exchange. Implementations
/// do not retry; a failed call returns its [`GatewayError`] and the caller
/// decides how to surface it.
pub trait ResourceGateway: Send + Sync {
    /// Fetches the user's projects, each optionally carrying nested tasks.
    fn list_projects(
        &self,
        page_size: u32,
    ) -> impl Future<Output = Result<Vec<Project>, GatewayError>> + Send;

    /// Fetches a single project.
    fn get_project(
        &self,
        id: &ProjectId,
    ) -> impl Future<Output = Result<Project, GatewayError>> + Send;

    /// Creates a project. `name` is already trimmed and validated.
    fn create_project(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Project, GatewayError>> + Send;

    /// Renames a project.
    fn rename_project(
        &self,
        id: &ProjectId,
        name: &str,
    ) -> impl Future<Output = Result<Project, GatewayError>> + Send;

    /// Deletes a project; the server cascades the delete to its tasks.
    fn delete_project(&self, id: &ProjectId)
    -> impl Future<Output = Result<(), GatewayError>> + Send;

    /// Fetches the tasks of one project.
    fn list_tasks(
        &self,
        project_id: &ProjectId,
        page_size: u32,
    ) -> impl Future<Output = Result<Vec<Task>, GatewayError>> + Send;

    /// Creates a task attached to an existing project.
    fn create_task(
        &self,
        title: &str,
        project_id: &ProjectId,
    ) -> impl Future<Output = Result<Task, GatewayError>> + Send;

    /// Replaces a task's title.
    fn rename_task(
        &self,
        id: &TaskId,
        title: &str,
    ) -> impl Future<Output = Result<Task, GatewayError>> + Send;

    /// Persists a task's workflow status.
    fn set_task_status(
        &self,
        id: &TaskId,
        status: TaskStatus,
    ) -> impl Future<Output = Result<Task, GatewayError>> + Send;

    /// Deletes a task.
    fn delete_task(&self, id: &TaskId) -> impl Future<Output = Result<(), GatewayError>> + Send;
}

impl<T: ResourceGateway + ?Sized> ResourceGateway for std::sync::Arc<T> {
    fn list_projects(
        &self,
        page_size: u32,
    ) -> impl Future<Output = Result<Vec<Project>, GatewayError>> + Send {
        (**self).list_projects(page_size)
    }

    fn get_project(
        &self,
        id: &ProjectId,
    ) -> impl Future<Output = Result<Project, GatewayError>> + Send {
        (**self).get_project(id)
    }

    fn create_project(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Project, GatewayError>> + Send {
        (**self).create_project(name)
    }

    fn rename_project(
        &self,
        id: &ProjectId,
        name: &str,
    ) -> impl Future<Output = Result<Project, GatewayError>> + Send {
        (**self).rename_project(id, name)
    }

    fn delete_project(&self, id: &ProjectId)
    -> impl Future<Output = Result<(), GatewayError>> + Send {
        (**self).delete_project(id)
    }

    fn list_tasks(
        &self,
        project_id: &ProjectId,
        page_size: u32,
    ) -> impl Future<Output = Result<Vec<Task>, GatewayError>> + Send {
        (**self).list_tasks(project_id, page_size)
    }

    fn create_task(
        &self,
        title: &str,
        project_id: &ProjectId,
    ) -> impl Future<Output = Result<Task, GatewayError>> + Send {
        (**self).create_task(title, project_id)
    }

    fn rename_task(
        &self,
        id: &TaskId,
        title: &str,
    ) -> impl Future<Output = Result<Task, GatewayError>> + Send {
        (**self).rename_task(id, title)
    }

    fn set_task_status(
        &self,
        id: &TaskId,
        status: TaskStatus,
    ) -> impl Future<Output = Result<Task, GatewayError>> + Send {
        (**self).set_task_status(id, status)
    }

    fn delete_task(&self, id: &TaskId) -> impl Future<Output = Result<(), GatewayError>> + Send {
        (**self).delete_task(id)
    }
}
