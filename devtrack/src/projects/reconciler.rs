//! List reconciler: the locally cached projects-with-tasks collection.
//!
//! `ProjectList` is the single writer of the cache. Every mutation follows the
//! same shape: validate locally, call the gateway, and only when the gateway
//! confirms, patch the one field or entry it touched. The state lock is never
//! held across a gateway call, so several calls may be in flight at once;
//! each applies its own patch when it resolves and the last one applied wins.

use std::collections::HashMap;

use devtrack_proto::model::{Field, Project, ProjectId, TaskId, TaskStatus, validate_text};
use parking_lot::Mutex;

use super::edit::{EditState, TaskKey};
use super::stats::DashboardStats;
use super::{Confirm, ReconcileError, filter_projects, surface_failure};
use crate::gateway::ResourceGateway;
use crate::notify::{Level, ViewSink};

/// Progress of the initial project fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoadState {
    /// Nothing fetched yet.
    #[default]
    Idle,
    /// A fetch is in flight.
    Loading,
    /// The cache holds the last fetched collection.
    Ready,
    /// The last fetch failed; the message is shown as the page error.
    Failed(String),
}

/// Entity with a gateway call in flight, for disabling its controls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Pending {
    /// The whole list is being fetched.
    List,
    /// A project mutation is in flight.
    Project(ProjectId),
    /// A task mutation is in flight.
    Task(TaskId),
}

/// Everything the project list view renders from.
#[derive(Debug, Clone, Default)]
pub struct ListState {
    projects: Vec<Project>,
    search_term: String,
    load: LoadState,
    project_edit: EditState<ProjectId>,
    task_edit: EditState<TaskKey>,
    in_flight: HashMap<Pending, usize>,
}

impl ListState {
    /// All cached projects in server order.
    #[must_use]
    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    /// Current search term.
    #[must_use]
    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    /// Cached projects matching the search term.
    #[must_use]
    pub fn visible(&self) -> Vec<&Project> {
        filter_projects(&self.projects, &self.search_term)
    }

    /// Progress of the last fetch.
    #[must_use]
    pub const fn load_state(&self) -> &LoadState {
        &self.load
    }

    /// Project name edit slot.
    #[must_use]
    pub const fn project_edit(&self) -> &EditState<ProjectId> {
        &self.project_edit
    }

    /// Task title edit slot.
    #[must_use]
    pub const fn task_edit(&self) -> &EditState<TaskKey> {
        &self.task_edit
    }

    /// Whether a gateway call for `what` is in flight.
    #[must_use]
    pub fn is_pending(&self, what: &Pending) -> bool {
        self.in_flight.get(what).is_some_and(|n| *n > 0)
    }

    /// Dashboard aggregates over the cached projects.
    #[must_use]
    pub fn stats(&self) -> DashboardStats {
        DashboardStats::from_projects(&self.projects)
    }

    fn project(&self, id: &ProjectId) -> Option<&Project> {
        self.projects.iter().find(|p| &p.id == id)
    }

    fn project_mut(&mut self, id: &ProjectId) -> Option<&mut Project> {
        self.projects.iter_mut().find(|p| &p.id == id)
    }
}

/// Marks an entity busy for as long as it lives.
struct InFlight<'a> {
    state: &'a Mutex<ListState>,
    what: Pending,
}

impl<'a> InFlight<'a> {
    fn start(state: &'a Mutex<ListState>, what: Pending) -> Self {
        *state.lock().in_flight.entry(what.clone()).or_default() += 1;
        Self { state, what }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if let Some(count) = state.in_flight.get_mut(&self.what) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                state.in_flight.remove(&self.what);
            }
        }
    }
}

/// Owner of the cached project collection.
pub struct ProjectList<G, V> {
    gateway: G,
    view: V,
    page_size: u32,
    state: Mutex<ListState>,
}

impl<G: ResourceGateway, V: ViewSink> ProjectList<G, V> {
    /// Creates an empty list that fetches `page_size` projects on load.
    pub fn new(gateway: G, view: V, page_size: u32) -> Self {
        Self {
            gateway,
            view,
            page_size,
            state: Mutex::new(ListState::default()),
        }
    }

    /// Returns the gateway this list talks to.
    pub const fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Returns the sink notifications are reported to.
    pub const fn view(&self) -> &V {
        &self.view
    }

    /// Runs `f` against the current state.
    pub fn read<R>(&self, f: impl FnOnce(&ListState) -> R) -> R {
        f(&self.state.lock())
    }

    /// Returns a copy of the current state.
    pub fn snapshot(&self) -> ListState {
        self.state.lock().clone()
    }

    /// Cached projects matching the current search term.
    pub fn visible(&self) -> Vec<Project> {
        self.read(|s| s.visible().into_iter().cloned().collect())
    }

    /// Sets the search term used by [`visible`](Self::visible).
    pub fn set_search_term(&self, term: impl Into<String>) {
        self.state.lock().search_term = term.into();
    }

    /// Replaces the cache with the gateway's current project list.
    ///
    /// On failure the previous cache is kept, the page error is set, and an
    /// expired session redirects to login.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Gateway`] if the fetch fails.
    pub async fn load(&self) -> Result<(), ReconcileError> {
        self.state.lock().load = LoadState::Loading;
        let result = {
            let _busy = InFlight::start(&self.state, Pending::List);
            self.gateway.list_projects(self.page_size).await
        };

        match result {
            Ok(mut projects) => {
                adopt_tasks(&mut projects);
                tracing::info!(count = projects.len(), "projects loaded");
                let mut state = self.state.lock();
                state.projects = projects;
                state.load = LoadState::Ready;
                Ok(())
            }
            Err(error) => {
                tracing::warn!(error = %error, "failed to load projects");
                self.state.lock().load = LoadState::Failed("Failed to load projects".to_string());
                if error.is_unauthenticated() {
                    self.view.redirect_to_login();
                }
                Err(error.into())
            }
        }
    }

    /// Enters edit mode for a project name, cancelling any other project edit.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::ProjectNotFound`] if the project is not loaded.
    pub fn begin_project_edit(&self, id: &ProjectId) -> Result<(), ReconcileError> {
        let mut state = self.state.lock();
        let name = state
            .project(id)
            .map(|p| p.name.clone())
            .ok_or_else(|| ReconcileError::ProjectNotFound(id.clone()))?;
        if let Some(previous) = state.project_edit.begin(id.clone(), &name) {
            tracing::debug!(project_id = %previous, "project edit implicitly cancelled");
        }
        Ok(())
    }

    /// Replaces the project name draft. Ignored outside edit mode.
    pub fn set_project_draft(&self, text: impl Into<String>) {
        self.state.lock().project_edit.set_text(text);
    }

    /// Leaves project edit mode without saving.
    pub fn cancel_project_edit(&self) {
        self.state.lock().project_edit.cancel();
    }

    /// Saves the project name draft via [`rename_project`](Self::rename_project).
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::NotEditing`] outside edit mode, otherwise
    /// whatever the rename returns.
    pub async fn save_project_edit(&self) -> Result<(), ReconcileError> {
        let (id, text) = self
            .read(|s| s.project_edit.draft().map(|d| (d.key.clone(), d.text.clone())))
            .ok_or(ReconcileError::NotEditing)?;
        self.rename_project(&id, &text).await
    }

    /// Renames a project.
    ///
    /// Empty or whitespace-only names are rejected without a gateway call and
    /// edit mode stays active. The trimmed name is sent; on success it replaces
    /// the cached name and edit mode exits. On failure the cache is untouched
    /// and edit mode stays active with the error recorded.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Validation`] or [`ReconcileError::Gateway`].
    pub async fn rename_project(&self, id: &ProjectId, new_name: &str) -> Result<(), ReconcileError> {
        let name = match validate_text(Field::ProjectName, new_name) {
            Ok(name) => name,
            Err(error) => {
                self.state.lock().project_edit.fail(id, error.to_string());
                self.view.notify(&error.to_string(), Level::Error);
                return Err(error.into());
            }
        };

        let result = {
            let _busy = InFlight::start(&self.state, Pending::Project(id.clone()));
            self.gateway.rename_project(id, &name).await
        };

        match result {
            Ok(_) => {
                {
                    let mut state = self.state.lock();
                    if let Some(project) = state.project_mut(id) {
                        project.name.clone_from(&name);
                    }
                    state.project_edit.commit(id);
                }
                tracing::info!(project_id = %id, "project renamed");
                self.view.notify("Project updated", Level::Success);
                Ok(())
            }
            Err(error) => {
                self.state
                    .lock()
                    .project_edit
                    .fail(id, super::describe(&error));
                surface_failure(&self.view, &error, "Failed to update project");
                Err(error.into())
            }
        }
    }

    /// Deletes a project after explicit confirmation.
    ///
    /// Returns `Ok(false)` when the user declines; no gateway call is made.
    /// On success the project and any edit referring to it leave the cache.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::ProjectNotFound`] if the project is not
    /// loaded, or [`ReconcileError::Gateway`] if the delete fails.
    pub async fn delete_project(
        &self,
        id: &ProjectId,
        confirm: &impl Confirm,
    ) -> Result<bool, ReconcileError> {
        let Some(name) = self.read(|s| s.project(id).map(|p| p.name.clone())) else {
            self.view
                .notify(&format!("Project {id} is not loaded"), Level::Error);
            return Err(ReconcileError::ProjectNotFound(id.clone()));
        };
        if !confirm.confirm(&format!("Delete project \"{name}\" and all its tasks?")) {
            tracing::debug!(project_id = %id, "project delete declined");
            return Ok(false);
        }

        let result = {
            let _busy = InFlight::start(&self.state, Pending::Project(id.clone()));
            self.gateway.delete_project(id).await
        };

        match result {
            Ok(()) => {
                {
                    let mut state = self.state.lock();
                    state.projects.retain(|p| &p.id != id);
                    state.project_edit.commit(id);
                    if state
                        .task_edit
                        .draft()
                        .is_some_and(|d| &d.key.project_id == id)
                    {
                        state.task_edit.cancel();
                    }
                }
                tracing::info!(project_id = %id, "project deleted");
                self.view.notify("Project deleted", Level::Success);
                Ok(true)
            }
            Err(error) => {
                surface_failure(&self.view, &error, "Failed to delete project");
                Err(error.into())
            }
        }
    }

    /// Enters edit mode for a task title, cancelling any other task edit.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::ProjectNotFound`] or
    /// [`ReconcileError::TaskNotFound`] if the task is not loaded.
    pub fn begin_task_edit(
        &self,
        project_id: &ProjectId,
        task_id: &TaskId,
    ) -> Result<(), ReconcileError> {
        let mut state = self.state.lock();
        let title = state
            .project(project_id)
            .ok_or_else(|| ReconcileError::ProjectNotFound(project_id.clone()))?
            .task(task_id)
            .map(|t| t.title.clone())
            .ok_or_else(|| ReconcileError::TaskNotFound(task_id.clone()))?;
        let key = TaskKey::new(project_id.clone(), task_id.clone());
        if let Some(previous) = state.task_edit.begin(key, &title) {
            tracing::debug!(task_id = %previous.task_id, "task edit implicitly cancelled");
        }
        Ok(())
    }

    /// Replaces the task title draft. Ignored outside edit mode.
    pub fn set_task_draft(&self, text: impl Into<String>) {
        self.state.lock().task_edit.set_text(text);
    }

    /// Leaves task edit mode without saving.
    pub fn cancel_task_edit(&self) {
        self.state.lock().task_edit.cancel();
    }

    /// Saves the task title draft via [`rename_task`](Self::rename_task).
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::NotEditing`] outside edit mode, otherwise
    /// whatever the rename returns.
    pub async fn save_task_edit(&self) -> Result<(), ReconcileError> {
        let (key, text) = self
            .read(|s| s.task_edit.draft().map(|d| (d.key.clone(), d.text.clone())))
            .ok_or(ReconcileError::NotEditing)?;
        self.rename_task(&key.project_id, &key.task_id, &text).await
    }

    /// Renames a task inside its owning project.
    ///
    /// Same rules as [`rename_project`](Self::rename_project); only the one
    /// task's title is patched.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Validation`] or [`ReconcileError::Gateway`].
    pub async fn rename_task(
        &self,
        project_id: &ProjectId,
        task_id: &TaskId,
        new_title: &str,
    ) -> Result<(), ReconcileError> {
        let key = TaskKey::new(project_id.clone(), task_id.clone());
        let title = match validate_text(Field::TaskTitle, new_title) {
            Ok(title) => title,
            Err(error) => {
                self.state.lock().task_edit.fail(&key, error.to_string());
                self.view.notify(&error.to_string(), Level::Error);
                return Err(error.into());
            }
        };

        let result = {
            let _busy = InFlight::start(&self.state, Pending::Task(task_id.clone()));
            self.gateway.rename_task(task_id, &title).await
        };

        match result {
            Ok(_) => {
                {
                    let mut state = self.state.lock();
                    if let Some(task) = task_mut(&mut state, project_id, task_id) {
                        task.title.clone_from(&title);
                    }
                    state.task_edit.commit(&key);
                }
                tracing::info!(task_id = %task_id, "task renamed");
                self.view.notify("Task updated", Level::Success);
                Ok(())
            }
            Err(error) => {
                self.state
                    .lock()
                    .task_edit
                    .fail(&key, super::describe(&error));
                surface_failure(&self.view, &error, "Failed to update task");
                Err(error.into())
            }
        }
    }

    /// Deletes a task after explicit confirmation.
    ///
    /// Returns `Ok(false)` when the user declines. On success only that task
    /// leaves its project's task list.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::ProjectNotFound`] or
    /// [`ReconcileError::TaskNotFound`] if the task is not loaded, or
    /// [`ReconcileError::Gateway`] if the delete fails.
    pub async fn delete_task(
        &self,
        project_id: &ProjectId,
        task_id: &TaskId,
        confirm: &impl Confirm,
    ) -> Result<bool, ReconcileError> {
        let title = match self.task_field(project_id, task_id, |t| t.title.clone()) {
            Ok(title) => title,
            Err(error) => {
                self.view.notify(&error.to_string(), Level::Error);
                return Err(error);
            }
        };
        if !confirm.confirm(&format!("Delete task \"{title}\"?")) {
            tracing::debug!(task_id = %task_id, "task delete declined");
            return Ok(false);
        }

        let result = {
            let _busy = InFlight::start(&self.state, Pending::Task(task_id.clone()));
            self.gateway.delete_task(task_id).await
        };

        match result {
            Ok(()) => {
                {
                    let mut state = self.state.lock();
                    if let Some(tasks) = state
                        .project_mut(project_id)
                        .and_then(|p| p.tasks.as_mut())
                    {
                        tasks.retain(|t| &t.id != task_id);
                    }
                    state
                        .task_edit
                        .commit(&TaskKey::new(project_id.clone(), task_id.clone()));
                }
                tracing::info!(task_id = %task_id, "task deleted");
                self.view.notify("Task deleted", Level::Success);
                Ok(true)
            }
            Err(error) => {
                surface_failure(&self.view, &error, "Failed to delete task");
                Err(error.into())
            }
        }
    }

    /// Advances a task to the next workflow status.
    ///
    /// The next status is computed from the cached one and persisted first;
    /// the cache shows it only after the gateway confirms, so a failure needs
    /// no rollback.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::ProjectNotFound`] or
    /// [`ReconcileError::TaskNotFound`] if the task is not loaded, or
    /// [`ReconcileError::Gateway`] if the update fails.
    pub async fn cycle_task_status(
        &self,
        project_id: &ProjectId,
        task_id: &TaskId,
    ) -> Result<TaskStatus, ReconcileError> {
        let next = match self.task_field(project_id, task_id, |t| t.status.next()) {
            Ok(next) => next,
            Err(error) => {
                self.view.notify(&error.to_string(), Level::Error);
                return Err(error);
            }
        };

        let result = {
            let _busy = InFlight::start(&self.state, Pending::Task(task_id.clone()));
            self.gateway.set_task_status(task_id, next).await
        };

        match result {
            Ok(_) => {
                if let Some(task) = task_mut(&mut self.state.lock(), project_id, task_id) {
                    task.status = next;
                }
                tracing::info!(task_id = %task_id, status = %next, "task status changed");
                self.view.notify(&format!("Status: {next}"), Level::Success);
                Ok(next)
            }
            Err(error) => {
                surface_failure(&self.view, &error, "Failed to change status");
                Err(error.into())
            }
        }
    }

    fn task_field<R>(
        &self,
        project_id: &ProjectId,
        task_id: &TaskId,
        f: impl FnOnce(&devtrack_proto::model::Task) -> R,
    ) -> Result<R, ReconcileError> {
        self.read(|s| {
            let project = s
                .project(project_id)
                .ok_or_else(|| ReconcileError::ProjectNotFound(project_id.clone()))?;
            project
                .task(task_id)
                .map(f)
                .ok_or_else(|| ReconcileError::TaskNotFound(task_id.clone()))
        })
    }
}

fn task_mut<'a>(
    state: &'a mut ListState,
    project_id: &ProjectId,
    task_id: &TaskId,
) -> Option<&'a mut devtrack_proto::model::Task> {
    state
        .project_mut(project_id)?
        .tasks
        .as_mut()?
        .iter_mut()
        .find(|t| &t.id == task_id)
}

/// Stamps nested tasks that arrived without an owner with their parent's id.
fn adopt_tasks(projects: &mut [Project]) {
    for project in projects {
        let id = project.id.clone();
        for task in project.tasks.iter_mut().flatten() {
            if task.project_id.is_none() {
                task.project_id = Some(id.clone());
            }
        }
    }
}
