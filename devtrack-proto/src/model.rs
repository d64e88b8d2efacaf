//! Project and task model shared by the client and the API server.
//!
//! Identifiers are opaque strings minted by the server. Task status travels
//! on the wire as the integer codes `0`, `1` and `2`; anything else is
//! rejected at decode time.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Maximum allowed project name length in characters.
pub const MAX_PROJECT_NAME_LENGTH: usize = 100;

/// Maximum allowed task title length in characters.
pub const MAX_TASK_TITLE_LENGTH: usize = 150;

/// Opaque server-assigned project identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    /// Wraps a server-assigned identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque server-assigned task identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Wraps a server-assigned identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Workflow status of a task.
///
/// The workflow is a fixed cycle: `Pending -> InProgress -> Completed -> Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum TaskStatus {
    /// Not started. Wire code `0`.
    #[default]
    Pending,
    /// Being worked on. Wire code `1`.
    InProgress,
    /// Done. Wire code `2`.
    Completed,
}

impl TaskStatus {
    /// All statuses in workflow order.
    pub const ALL: [Self; 3] = [Self::Pending, Self::InProgress, Self::Completed];

    /// Returns the wire code of this status.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::InProgress => 1,
            Self::Completed => 2,
        }
    }

    /// Returns the status that follows this one, wrapping modulo 3.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::Pending => Self::InProgress,
            Self::InProgress => Self::Completed,
            Self::Completed => Self::Pending,
        }
    }

    /// Human-readable label for display.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
        }
    }
}

impl From<TaskStatus> for u8 {
    fn from(status: TaskStatus) -> Self {
        status.code()
    }
}

impl TryFrom<u8> for TaskStatus {
    type Error = InvalidStatus;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Self::Pending),
            1 => Ok(Self::InProgress),
            2 => Ok(Self::Completed),
            other => Err(InvalidStatus(other)),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A status code outside the three-value workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid task status code {0} (expected 0, 1 or 2)")]
pub struct InvalidStatus(pub u8);

/// A unit of work belonging to exactly one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Server-assigned identifier.
    pub id: TaskId,
    /// Title, 1 to [`MAX_TASK_TITLE_LENGTH`] characters.
    pub title: String,
    /// Optional free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Current workflow status.
    pub status: TaskStatus,
    /// Owning project. Tasks nested inside a project listing may omit it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
    /// Creation timestamp as sent by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

/// A named container of tasks owned by the authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    /// Server-assigned identifier.
    pub id: ProjectId,
    /// Name, 1 to [`MAX_PROJECT_NAME_LENGTH`] characters.
    pub name: String,
    /// Owning user, when the server includes it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    /// Creation timestamp as sent by the server.
    #[serde(default)]
    pub created_at: String,
    /// Nested tasks. `None` when the server omitted the list entirely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<Vec<Task>>,
}

impl Project {
    /// Number of nested tasks, treating an absent list as empty.
    #[must_use]
    pub fn task_count(&self) -> usize {
        self.tasks.as_ref().map_or(0, Vec::len)
    }

    /// Nested tasks as a slice, empty when absent.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        self.tasks.as_deref().unwrap_or_default()
    }

    /// Finds a nested task by identifier.
    #[must_use]
    pub fn task(&self, task_id: &TaskId) -> Option<&Task> {
        self.tasks().iter().find(|t| &t.id == task_id)
    }
}

/// Which user-editable text field a validation error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// A project name.
    ProjectName,
    /// A task title.
    TaskTitle,
}

impl Field {
    /// Maximum length in characters for this field.
    #[must_use]
    pub const fn max_len(self) -> usize {
        match self {
            Self::ProjectName => MAX_PROJECT_NAME_LENGTH,
            Self::TaskTitle => MAX_TASK_TITLE_LENGTH,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ProjectName => f.write_str("project name"),
            Self::TaskTitle => f.write_str("task title"),
        }
    }
}

/// Local validation failure for a name or title.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The value is empty or whitespace only.
    #[error("{field} cannot be empty")]
    Empty {
        /// Offending field.
        field: Field,
    },
    /// The trimmed value exceeds the field's maximum length.
    #[error("{field} too long (max {max} characters)")]
    TooLong {
        /// Offending field.
        field: Field,
        /// Maximum allowed characters.
        max: usize,
    },
}

/// Trims `raw` and checks it against the limits of `field`.
///
/// Returns the trimmed value on success. Length is counted in characters,
/// not bytes.
///
/// # Errors
///
/// Returns [`ValidationError::Empty`] for empty or whitespace-only input and
/// [`ValidationError::TooLong`] when the trimmed value is over the limit.
pub fn validate_text(field: Field, raw: &str) -> Result<String, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    let max = field.max_len();
    if trimmed.chars().count() > max {
        return Err(ValidationError::TooLong { field, max });
    }
    Ok(trimmed.to_string())
}
