//! Creation forms for projects and tasks.
//!
//! Both forms validate locally before touching the gateway. A rejected
//! submission leaves the error on the form and makes no call.

use devtrack_proto::model::{Field, Project, ProjectId, Task, validate_text};

use super::{ReconcileError, surface_failure};
use crate::gateway::ResourceGateway;
use crate::notify::{Level, ViewSink};

/// Form for creating a new project.
#[derive(Debug, Clone, Default)]
pub struct CreateProjectForm {
    name: String,
    error: Option<String>,
}

impl CreateProjectForm {
    /// Creates an empty form.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the name field.
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Current name field, unvalidated.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Error from the last submission.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Validates the name and creates the project.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Validation`] without a gateway call, or
    /// [`ReconcileError::Gateway`] if the create fails.
    pub async fn submit<G, V>(&mut self, gateway: &G, view: &V) -> Result<Project, ReconcileError>
    where
        G: ResourceGateway,
        V: ViewSink,
    {
        let name = match validate_text(Field::ProjectName, &self.name) {
            Ok(name) => name,
            Err(error) => {
                self.error = Some(error.to_string());
                return Err(error.into());
            }
        };

        match gateway.create_project(&name).await {
            Ok(project) => {
                tracing::info!(project_id = %project.id, "project created");
                view.notify(&format!("Project \"{name}\" created"), Level::Success);
                *self = Self::default();
                Ok(project)
            }
            Err(error) => {
                self.error = Some(super::describe(&error));
                surface_failure(view, &error, "Failed to create project");
                Err(error.into())
            }
        }
    }
}

/// Form for creating a task inside a chosen project.
#[derive(Debug, Clone, Default)]
pub struct CreateTaskForm {
    projects: Vec<Project>,
    selected: Option<ProjectId>,
    title: String,
    error: Option<String>,
}

impl CreateTaskForm {
    /// Creates an empty form with no project choices loaded.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the project picker. A single available project is preselected.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Gateway`] if the fetch fails.
    pub async fn load_projects<G, V>(
        &mut self,
        gateway: &G,
        view: &V,
        page_size: u32,
    ) -> Result<(), ReconcileError>
    where
        G: ResourceGateway,
        V: ViewSink,
    {
        let projects = match gateway.list_projects(page_size).await {
            Ok(projects) => projects,
            Err(error) => {
                surface_failure(view, &error, "Failed to load projects");
                return Err(error.into());
            }
        };

        if let [only] = projects.as_slice() {
            self.selected = Some(only.id.clone());
        } else if self
            .selected
            .as_ref()
            .is_some_and(|id| !projects.iter().any(|p| &p.id == id))
        {
            self.selected = None;
        }
        self.projects = projects;
        Ok(())
    }

    /// Projects available in the picker.
    #[must_use]
    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    /// Chooses the owning project.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::ProjectNotFound`] if `id` is not in the picker.
    pub fn select(&mut self, id: &ProjectId) -> Result<(), ReconcileError> {
        if !self.projects.iter().any(|p| &p.id == id) {
            return Err(ReconcileError::ProjectNotFound(id.clone()));
        }
        self.selected = Some(id.clone());
        Ok(())
    }

    /// Currently chosen project.
    #[must_use]
    pub const fn selected(&self) -> Option<&ProjectId> {
        self.selected.as_ref()
    }

    /// Replaces the title field.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Error from the last submission.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Validates the form and creates the task.
    ///
    /// # Errors
    ///
    /// Returns [`ReconcileError::Validation`] or
    /// [`ReconcileError::NoProjectSelected`] without a gateway call, or
    /// [`ReconcileError::Gateway`] if the create fails.
    pub async fn submit<G, V>(&mut self, gateway: &G, view: &V) -> Result<Task, ReconcileError>
    where
        G: ResourceGateway,
        V: ViewSink,
    {
        let title = match validate_text(Field::TaskTitle, &self.title) {
            Ok(title) => title,
            Err(error) => {
                self.error = Some(error.to_string());
                return Err(error.into());
            }
        };
        let Some(project_id) = self.selected.clone() else {
            self.error = Some(ReconcileError::NoProjectSelected.to_string());
            return Err(ReconcileError::NoProjectSelected);
        };

        match gateway.create_task(&title, &project_id).await {
            Ok(task) => {
                tracing::info!(task_id = %task.id, project_id = %project_id, "task created");
                view.notify(&format!("Task \"{title}\" created"), Level::Success);
                self.title.clear();
                self.error = None;
                Ok(task)
            }
            Err(error) => {
                self.error = Some(super::describe(&error));
                surface_failure(view, &error, "Failed to create task");
                Err(error.into())
            }
        }
    }
}
