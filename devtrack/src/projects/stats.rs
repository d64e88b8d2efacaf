//! Dashboard aggregates derived from the project collection.

use devtrack_proto::model::{Project, TaskStatus};

use super::{ReconcileError, surface_failure};
use crate::gateway::ResourceGateway;
use crate::notify::ViewSink;

/// Counts shown on the dashboard.
///
/// `pending_tasks` is everything not completed, so in-progress tasks are
/// counted as pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DashboardStats {
    /// Number of projects.
    pub total_projects: usize,
    /// Number of tasks across all projects.
    pub total_tasks: usize,
    /// Tasks whose status is [`TaskStatus::Completed`].
    pub completed_tasks: usize,
    /// `total_tasks - completed_tasks`.
    pub pending_tasks: usize,
}

impl DashboardStats {
    /// Aggregates `projects`. Projects without a task list count as empty.
    #[must_use]
    pub fn from_projects(projects: &[Project]) -> Self {
        let tasks = projects.iter().flat_map(Project::tasks);
        let (total_tasks, completed_tasks) = tasks.fold((0, 0), |(total, done), task| {
            (
                total + 1,
                done + usize::from(task.status == TaskStatus::Completed),
            )
        });
        Self {
            total_projects: projects.len(),
            total_tasks,
            completed_tasks,
            pending_tasks: total_tasks - completed_tasks,
        }
    }
}

/// Fetches up to `page_size` projects and aggregates them.
///
/// Failures are reported through `view` before being returned.
///
/// # Errors
///
/// Returns [`ReconcileError::Gateway`] if the fetch fails.
pub async fn load_dashboard<G, V>(
    gateway: &G,
    view: &V,
    page_size: u32,
) -> Result<DashboardStats, ReconcileError>
where
    G: ResourceGateway,
    V: ViewSink,
{
    match gateway.list_projects(page_size).await {
        Ok(projects) => {
            let stats = DashboardStats::from_projects(&projects);
            tracing::debug!(?stats, "dashboard loaded");
            Ok(stats)
        }
        Err(error) => {
            surface_failure(view, &error, "Failed to load dashboard");
            Err(error.into())
        }
    }
}
