//! In-process gateway for tests and offline demos.
//!
//! [`InMemoryGateway`] keeps projects (newest first) and tasks in a
//! mutex-guarded vector and mints UUID v7 identifiers, so it behaves like the
//! remote API without a network. Failures can be queued per call with
//! [`InMemoryGateway::fail_next`], and an artificial latency makes concurrent
//! calls genuinely overlap.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::Utc;
use devtrack_proto::model::{Project, ProjectId, Task, TaskId, TaskStatus};
use parking_lot::Mutex;
use uuid::Uuid;

use super::{GatewayError, ResourceGateway};

/// A recorded gateway call, used to assert which requests were issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    /// `list_projects(page_size)`
    ListProjects(u32),
    /// `get_project(id)`
    GetProject(ProjectId),
    /// `create_project(name)`
    CreateProject(String),
    /// `rename_project(id, name)`
    RenameProject(ProjectId, String),
    /// `delete_project(id)`
    DeleteProject(ProjectId),
    /// `list_tasks(project_id, page_size)`
    ListTasks(ProjectId, u32),
    /// `create_task(title, project_id)`
    CreateTask(String, ProjectId),
    /// `rename_task(id, title)`
    RenameTask(TaskId, String),
    /// `set_task_status(id, status)`
    SetTaskStatus(TaskId, TaskStatus),
    /// `delete_task(id)`
    DeleteTask(TaskId),
}

#[derive(Default)]
struct Inner {
    projects: Vec<Project>,
    calls: Vec<Call>,
    failures: VecDeque<GatewayError>,
}

/// In-memory [`ResourceGateway`].
#[derive(Default)]
pub struct InMemoryGateway {
    inner: Mutex<Inner>,
    latency: Option<Duration>,
}

impl InMemoryGateway {
    /// Creates an empty gateway.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a gateway pre-populated with `projects`.
    #[must_use]
    pub fn with_projects(projects: Vec<Project>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                projects,
                ..Inner::default()
            }),
            latency: None,
        }
    }

    /// Delays every call by `latency` before it takes effect.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes the next call fail with `error` instead of taking effect.
    ///
    /// Queued failures are consumed in FIFO order, one per call.
    pub fn fail_next(&self, error: GatewayError) {
        self.inner.lock().failures.push_back(error);
    }

    /// Returns every call received so far, in arrival order.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().calls.clone()
    }

    /// Returns a snapshot of the stored projects.
    #[must_use]
    pub fn projects(&self) -> Vec<Project> {
        self.inner.lock().projects.clone()
    }

    /// Records the call, sleeps for the configured latency, then either pops
    /// a queued failure or runs `apply` against the store.
    async fn call<T>(
        &self,
        call: Call,
        apply: impl FnOnce(&mut Vec<Project>) -> Result<T, GatewayError> + Send,
    ) -> Result<T, GatewayError> {
        self.inner.lock().calls.push(call);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mut inner = self.inner.lock();
        if let Some(error) = inner.failures.pop_front() {
            return Err(error);
        }
        apply(&mut inner.projects)
    }
}

fn new_id() -> String {
    Uuid::now_v7().to_string()
}

fn not_found(what: &str) -> GatewayError {
    GatewayError::Server {
        status: 404,
        message: format!("{what} not found"),
    }
}

fn find_project<'a>(
    projects: &'a mut [Project],
    id: &ProjectId,
) -> Result<&'a mut Project, GatewayError> {
    projects
        .iter_mut()
        .find(|p| &p.id == id)
        .ok_or_else(|| not_found("project"))
}

fn find_task<'a>(projects: &'a mut [Project], id: &TaskId) -> Result<&'a mut Task, GatewayError> {
    projects
        .iter_mut()
        .filter_map(|p| p.tasks.as_mut())
        .flatten()
        .find(|t| &t.id == id)
        .ok_or_else(|| not_found("task"))
}

impl ResourceGateway for InMemoryGateway {
    async fn list_projects(&self, page_size: u32) -> Result<Vec<Project>, GatewayError> {
        self.call(Call::ListProjects(page_size), |projects| {
            let limit = usize::try_from(page_size).unwrap_or(usize::MAX);
            Ok(projects.iter().take(limit).cloned().collect())
        })
        .await
    }

    async fn get_project(&self, id: &ProjectId) -> Result<Project, GatewayError> {
        self.call(Call::GetProject(id.clone()), |projects| {
            find_project(projects, id).map(|p| p.clone())
        })
        .await
    }

    async fn create_project(&self, name: &str) -> Result<Project, GatewayError> {
        self.call(Call::CreateProject(name.to_string()), |projects| {
            let project = Project {
                id: ProjectId::new(new_id()),
                name: name.to_string(),
                user_id: None,
                created_at: Utc::now().to_rfc3339(),
                tasks: Some(Vec::new()),
            };
            projects.insert(0, project.clone());
            Ok(project)
        })
        .await
    }

    async fn rename_project(&self, id: &ProjectId, name: &str) -> Result<Project, GatewayError> {
        self.call(
            Call::RenameProject(id.clone(), name.to_string()),
            |projects| {
                let project = find_project(projects, id)?;
                project.name = name.to_string();
                Ok(project.clone())
            },
        )
        .await
    }

    async fn delete_project(&self, id: &ProjectId) -> Result<(), GatewayError> {
        self.call(Call::DeleteProject(id.clone()), |projects| {
            let before = projects.len();
            projects.retain(|p| &p.id != id);
            if projects.len() == before {
                return Err(not_found("project"));
            }
            Ok(())
        })
        .await
    }

    async fn list_tasks(
        &self,
        project_id: &ProjectId,
        page_size: u32,
    ) -> Result<Vec<Task>, GatewayError> {
        self.call(
            Call::ListTasks(project_id.clone(), page_size),
            |projects| {
                let limit = usize::try_from(page_size).unwrap_or(usize::MAX);
                let project = find_project(projects, project_id)?;
                Ok(project.tasks().iter().take(limit).cloned().collect())
            },
        )
        .await
    }

    async fn create_task(&self, title: &str, project_id: &ProjectId) -> Result<Task, GatewayError> {
        self.call(
            Call::CreateTask(title.to_string(), project_id.clone()),
            |projects| {
                let project = find_project(projects, project_id)?;
                let task = Task {
                    id: TaskId::new(new_id()),
                    title: title.to_string(),
                    description: None,
                    status: TaskStatus::Pending,
                    project_id: Some(project_id.clone()),
                    created_at: Some(Utc::now().to_rfc3339()),
                };
                project.tasks.get_or_insert_with(Vec::new).push(task.clone());
                Ok(task)
            },
        )
        .await
    }

    async fn rename_task(&self, id: &TaskId, title: &str) -> Result<Task, GatewayError> {
        self.call(Call::RenameTask(id.clone(), title.to_string()), |projects| {
            let task = find_task(projects, id)?;
            task.title = title.to_string();
            Ok(task.clone())
        })
        .await
    }

    async fn set_task_status(&self, id: &TaskId, status: TaskStatus) -> Result<Task, GatewayError> {
        self.call(Call::SetTaskStatus(id.clone(), status), |projects| {
            let task = find_task(projects, id)?;
            task.status = status;
            Ok(task.clone())
        })
        .await
    }

    async fn delete_task(&self, id: &TaskId) -> Result<(), GatewayError> {
        self.call(Call::DeleteTask(id.clone()), |projects| {
            for project in projects.iter_mut() {
                if let Some(tasks) = project.tasks.as_mut()
                    && let Some(pos) = tasks.iter().position(|t| &t.id == id)
                {
                    tasks.remove(pos);
                    return Ok(());
                }
            }
            Err(not_found("task"))
        })
        .await
    }
}
