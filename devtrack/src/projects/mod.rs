//! Project and task list management.
//!
//! [`ProjectList`] holds the locally cached projects (each with its nested
//! tasks) and patches that cache only after the gateway confirms a mutation.
//! Derived views (search filtering, dashboard counts) are recomputed from the
//! cache on every read and never written back.

pub mod edit;
pub mod forms;
pub mod reconciler;
pub mod stats;

pub use edit::{Draft, EditState, TaskKey};
pub use forms::{CreateProjectForm, CreateTaskForm};
pub use reconciler::{ListState, LoadState, Pending, ProjectList};
pub use stats::DashboardStats;

use devtrack_proto::model::{Project, ProjectId, TaskId, ValidationError};
use thiserror::Error;

use crate::gateway::GatewayError;
use crate::notify::{Level, ViewSink};

/// Errors returned by list and form operations.
///
/// By the time one of these is returned it has already been shown to the
/// user (inline, as a notification, as the page error, or as a redirect).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconcileError {
    /// The input was rejected locally; no gateway call was made.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// The gateway call failed; local state is unchanged.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    /// No project with this identifier is loaded.
    #[error("project not found: {0}")]
    ProjectNotFound(ProjectId),
    /// No task with this identifier is loaded under the given project.
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
    /// A save was requested while nothing was in edit mode.
    #[error("nothing is being edited")]
    NotEditing,
    /// A task form was submitted without choosing a project.
    #[error("select a project")]
    NoProjectSelected,
}

/// Explicit user confirmation for irreversible operations.
pub trait Confirm {
    /// Asks the user to confirm `prompt`; `true` means proceed.
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F: Fn(&str) -> bool> Confirm for F {
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// [`Confirm`] that approves everything, for pre-confirmed invocations.
#[derive(Debug, Clone, Copy, Default)]
pub struct AssumeYes;

impl Confirm for AssumeYes {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

/// Returns the projects whose name contains `term`, ignoring case.
///
/// An empty or whitespace-only term matches everything. The term itself is
/// not trimmed, so inner and surrounding spaces take part in the match.
#[must_use]
pub fn filter_projects<'a>(projects: &'a [Project], term: &str) -> Vec<&'a Project> {
    if term.trim().is_empty() {
        return projects.iter().collect();
    }
    let needle = term.to_lowercase();
    projects
        .iter()
        .filter(|p| p.name.to_lowercase().contains(&needle))
        .collect()
}

/// Short user-facing explanation of a gateway failure.
#[must_use]
pub fn describe(error: &GatewayError) -> String {
    match error {
        GatewayError::Unauthenticated => "session expired, please log in again".to_string(),
        GatewayError::Server { message, .. } => message.clone(),
        GatewayError::Network(_) => "could not reach the server".to_string(),
        GatewayError::Decode(_) => "unexpected response from the server".to_string(),
    }
}

/// Reports a failed gateway call: logs it, notifies the user and, for an
/// expired session, redirects to login.
pub(crate) fn surface_failure<V: ViewSink>(view: &V, error: &GatewayError, context: &str) {
    tracing::warn!(error = %error, category = %error.category(), "{context}");
    view.notify(&format!("{context}: {}", describe(error)), Level::Error);
    if error.is_unauthenticated() {
        view.redirect_to_login();
    }
}
