//! In-memory account, project and task storage.
//!
//! The [`ApiStore`] keeps users, session tokens, projects and tasks behind a
//! single [`RwLock`]. Every project operation is scoped to the requesting
//! user: a project owned by someone else behaves exactly like a missing one.
//! Deleting a project deletes its tasks.
//!
//! Passwords are kept as given. This store backs local development and tests
//! only and is never exposed beyond them.

use std::collections::HashMap;

use chrono::Utc;
use devtrack_proto::dto::{PaginatedResponse, RegisterDto, UserInfo};
use devtrack_proto::model::{
    Field, Project, ProjectId, Task, TaskId, TaskStatus, ValidationError, validate_text,
};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Errors returned by store operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// Registration with an e-mail that already has an account.
    #[error("email already registered")]
    EmailTaken,
    /// Unknown e-mail or wrong password.
    #[error("invalid email or password")]
    InvalidCredentials,
    /// No project with this id belongs to the user.
    #[error("project not found")]
    ProjectNotFound,
    /// No task with this id belongs to the user.
    #[error("task not found")]
    TaskNotFound,
    /// A name or title failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// A registration field failed validation.
    #[error("{0}")]
    InvalidRegistration(&'static str),
}

struct UserRecord {
    info: UserInfo,
    password: String,
}

struct ProjectRecord {
    id: ProjectId,
    name: String,
    user_id: String,
    created_at: String,
}

/// Requested page of a listing, already clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// One-based page number.
    pub number: u32,
    /// Items per page.
    pub size: u32,
}

impl Page {
    fn slice<T: Clone>(self, items: &[T]) -> PaginatedResponse<T> {
        let size = self.size.max(1);
        let number = self.number.max(1);
        let start = usize::try_from(u64::from(number - 1) * u64::from(size)).unwrap_or(usize::MAX);
        let page_items = items
            .iter()
            .skip(start)
            .take(usize::try_from(size).unwrap_or(usize::MAX))
            .cloned()
            .collect();
        let total = items.len();
        PaginatedResponse {
            items: page_items,
            total_count: u64::try_from(total).unwrap_or(u64::MAX),
            page: number,
            page_size: size,
            total_pages: u32::try_from(total.div_ceil(usize::try_from(size).unwrap_or(1)))
                .unwrap_or(u32::MAX),
        }
    }
}

#[derive(Default)]
struct Inner {
    users: HashMap<String, UserRecord>,
    sessions: HashMap<String, String>,
    projects: Vec<ProjectRecord>,
    tasks: Vec<Task>,
}

impl Inner {
    fn owned_project(&self, user_id: &str, id: &ProjectId) -> Result<&ProjectRecord, StoreError> {
        self.projects
            .iter()
            .find(|p| &p.id == id && p.user_id == user_id)
            .ok_or(StoreError::ProjectNotFound)
    }

    fn owns_project(&self, user_id: &str, id: &ProjectId) -> bool {
        self.owned_project(user_id, id).is_ok()
    }

    fn project_view(&self, record: &ProjectRecord) -> Project {
        Project {
            id: record.id.clone(),
            name: record.name.clone(),
            user_id: Some(record.user_id.clone()),
            created_at: record.created_at.clone(),
            tasks: Some(
                self.tasks
                    .iter()
                    .filter(|t| t.project_id.as_ref() == Some(&record.id))
                    .cloned()
                    .collect(),
            ),
        }
    }

    fn owned_task_mut(&mut self, user_id: &str, id: &TaskId) -> Result<&mut Task, StoreError> {
        let owner_ok = self
            .tasks
            .iter()
            .find(|t| &t.id == id)
            .and_then(|t| t.project_id.as_ref())
            .is_some_and(|pid| self.owns_project(user_id, pid));
        if !owner_ok {
            return Err(StoreError::TaskNotFound);
        }
        self.tasks
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or(StoreError::TaskNotFound)
    }
}

/// Thread-safe in-memory backing store of the API.
#[derive(Default)]
pub struct ApiStore {
    inner: RwLock<Inner>,
}

fn new_id() -> String {
    Uuid::now_v7().to_string()
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

impl ApiStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an account. Returns the new user's profile.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EmailTaken`] or
    /// [`StoreError::InvalidRegistration`].
    pub async fn register(&self, dto: &RegisterDto) -> Result<UserInfo, StoreError> {
        let name = dto.name.trim();
        let email = dto.email.trim().to_lowercase();
        if name.chars().count() < 3 {
            return Err(StoreError::InvalidRegistration(
                "name must be at least 3 characters",
            ));
        }
        if email.is_empty() {
            return Err(StoreError::InvalidRegistration("email is required"));
        }
        if dto.password.chars().count() < 6 {
            return Err(StoreError::InvalidRegistration(
                "password must be at least 6 characters",
            ));
        }

        let mut inner = self.inner.write().await;
        if inner.users.contains_key(&email) {
            return Err(StoreError::EmailTaken);
        }
        let info = UserInfo {
            id: new_id(),
            email: email.clone(),
            name: name.to_string(),
        };
        inner.users.insert(
            email,
            UserRecord {
                info: info.clone(),
                password: dto.password.clone(),
            },
        );
        Ok(info)
    }

    /// Checks credentials and opens a session. Returns the token and profile.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidCredentials`].
    pub async fn login(&self, email: &str, password: &str) -> Result<(String, UserInfo), StoreError> {
        let email = email.trim().to_lowercase();
        let mut inner = self.inner.write().await;
        let info = match inner.users.get(&email) {
            Some(user) if user.password == password => user.info.clone(),
            _ => return Err(StoreError::InvalidCredentials),
        };
        let token = Uuid::new_v4().simple().to_string();
        inner.sessions.insert(token.clone(), info.id.clone());
        Ok((token, info))
    }

    /// Resolves a session token to its user id.
    pub async fn authenticate(&self, token: &str) -> Option<String> {
        self.inner.read().await.sessions.get(token).cloned()
    }

    /// Lists the user's projects with their tasks, newest first.
    pub async fn list_projects(&self, user_id: &str, page: Page) -> PaginatedResponse<Project> {
        let inner = self.inner.read().await;
        let projects: Vec<Project> = inner
            .projects
            .iter()
            .rev()
            .filter(|p| p.user_id == user_id)
            .map(|p| inner.project_view(p))
            .collect();
        page.slice(&projects)
    }

    /// Fetches one of the user's projects with its tasks.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ProjectNotFound`].
    pub async fn get_project(&self, user_id: &str, id: &ProjectId) -> Result<Project, StoreError> {
        let inner = self.inner.read().await;
        let record = inner.owned_project(user_id, id)?;
        Ok(inner.project_view(record))
    }

    /// Creates a project for the user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] for an empty or over-long name.
    pub async fn create_project(&self, user_id: &str, name: &str) -> Result<Project, StoreError> {
        let name = validate_text(Field::ProjectName, name)?;
        let mut inner = self.inner.write().await;
        let record = ProjectRecord {
            id: ProjectId::new(new_id()),
            name,
            user_id: user_id.to_string(),
            created_at: now(),
        };
        let view = inner.project_view(&record);
        inner.projects.push(record);
        Ok(view)
    }

    /// Renames one of the user's projects.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] or [`StoreError::ProjectNotFound`].
    pub async fn rename_project(
        &self,
        user_id: &str,
        id: &ProjectId,
        name: &str,
    ) -> Result<Project, StoreError> {
        let name = validate_text(Field::ProjectName, name)?;
        let mut inner = self.inner.write().await;
        let record = inner
            .projects
            .iter_mut()
            .find(|p| &p.id == id && p.user_id == user_id)
            .ok_or(StoreError::ProjectNotFound)?;
        record.name = name;
        let record = inner.owned_project(user_id, id)?;
        Ok(inner.project_view(record))
    }

    /// Deletes one of the user's projects and all its tasks.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ProjectNotFound`].
    pub async fn delete_project(&self, user_id: &str, id: &ProjectId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.owned_project(user_id, id)?;
        inner.projects.retain(|p| &p.id != id);
        inner.tasks.retain(|t| t.project_id.as_ref() != Some(id));
        Ok(())
    }

    /// Lists the tasks of one of the user's projects.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ProjectNotFound`].
    pub async fn list_tasks(
        &self,
        user_id: &str,
        project_id: &ProjectId,
        page: Page,
    ) -> Result<PaginatedResponse<Task>, StoreError> {
        let inner = self.inner.read().await;
        inner.owned_project(user_id, project_id)?;
        let tasks: Vec<Task> = inner
            .tasks
            .iter()
            .filter(|t| t.project_id.as_ref() == Some(project_id))
            .cloned()
            .collect();
        Ok(page.slice(&tasks))
    }

    /// Creates a pending task in one of the user's projects.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] or [`StoreError::ProjectNotFound`].
    pub async fn create_task(
        &self,
        user_id: &str,
        title: &str,
        project_id: &ProjectId,
    ) -> Result<Task, StoreError> {
        let title = validate_text(Field::TaskTitle, title)?;
        let mut inner = self.inner.write().await;
        inner.owned_project(user_id, project_id)?;
        let task = Task {
            id: TaskId::new(new_id()),
            title,
            description: None,
            status: TaskStatus::Pending,
            project_id: Some(project_id.clone()),
            created_at: Some(now()),
        };
        inner.tasks.push(task.clone());
        Ok(task)
    }

    /// Renames one of the user's tasks.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Validation`] or [`StoreError::TaskNotFound`].
    pub async fn rename_task(
        &self,
        user_id: &str,
        id: &TaskId,
        title: &str,
    ) -> Result<Task, StoreError> {
        let title = validate_text(Field::TaskTitle, title)?;
        let mut inner = self.inner.write().await;
        let task = inner.owned_task_mut(user_id, id)?;
        task.title = title;
        Ok(task.clone())
    }

    /// Sets the status of one of the user's tasks.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TaskNotFound`].
    pub async fn set_task_status(
        &self,
        user_id: &str,
        id: &TaskId,
        status: TaskStatus,
    ) -> Result<Task, StoreError> {
        let mut inner = self.inner.write().await;
        let task = inner.owned_task_mut(user_id, id)?;
        task.status = status;
        Ok(task.clone())
    }

    /// Deletes one of the user's tasks.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::TaskNotFound`].
    pub async fn delete_task(&self, user_id: &str, id: &TaskId) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        inner.owned_task_mut(user_id, id)?;
        inner.tasks.retain(|t| &t.id != id);
        Ok(())
    }
}
