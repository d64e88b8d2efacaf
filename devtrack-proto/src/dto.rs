//! Request and response bodies of the REST API.
//!
//! Field names follow the API's camelCase JSON convention.

use serde::{Deserialize, Serialize};

use crate::model::{ProjectId, TaskStatus};

/// Body of `POST /auth/register`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterDto {
    /// Account e-mail address.
    pub email: String,
    /// Plain-text password (sent over TLS).
    pub password: String,
    /// Display name.
    pub name: String,
}

/// Body of `POST /auth/login`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginDto {
    /// Account e-mail address.
    pub email: String,
    /// Plain-text password (sent over TLS).
    pub password: String,
}

/// Public user profile returned alongside a token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// User identifier.
    pub id: String,
    /// Account e-mail address.
    pub email: String,
    /// Display name.
    pub name: String,
}

/// Response of the register and login endpoints.
///
/// Registration may succeed without issuing a token, in which case the user
/// has to log in separately.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuthResponse {
    /// Bearer token, when the server issued one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// Profile of the authenticated user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserInfo>,
}

/// Body of `POST /projects`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateProjectDto {
    /// New project name.
    pub name: String,
}

/// Body of `PUT /projects/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateProjectDto {
    /// Replacement project name.
    pub name: String,
}

/// Body of `POST /tasks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskDto {
    /// New task title.
    pub title: String,
    /// Project the task is attached to.
    pub project_id: ProjectId,
}

/// Body of `PUT /tasks/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTaskDto {
    /// Replacement task title.
    pub title: String,
}

/// Body of `PATCH /tasks/{id}/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTaskStatusDto {
    /// New workflow status.
    pub status: TaskStatus,
}

/// Query string of the listing endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    /// One-based page number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    /// Items per page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,
}

/// Standard response envelope: `{ success, message, data }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the request succeeded.
    pub success: bool,
    /// Optional human-readable message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Payload.
    pub data: T,
}

impl<T> ApiResponse<T> {
    /// Wraps a successful payload.
    pub const fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data,
        }
    }

    /// Wraps a successful payload with a message.
    pub fn ok_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data,
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// Total number of items across all pages.
    pub total_count: u64,
    /// One-based page number.
    pub page: u32,
    /// Requested page size.
    pub page_size: u32,
    /// Number of pages.
    pub total_pages: u32,
}

/// Error body returned by the API on non-2xx responses.
///
/// The API reports either a single `message` or a list of `errors`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApiErrorBody {
    /// Always `false` for errors.
    #[serde(default)]
    pub success: bool,
    /// Primary error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Field-level error messages.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ApiErrorBody {
    /// Builds an error body carrying a single message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            errors: Vec::new(),
        }
    }

    /// The most specific reason available: `message`, else the first error.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.message
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .or_else(|| self.errors.first().map(String::as_str))
    }
}
