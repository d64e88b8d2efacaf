//! Command-line front end: subcommands, console notifications and rendering.
//!
//! Each invocation runs one [`Command`] to completion. Resource commands go
//! through the same [`ProjectList`] and forms a long-running view would use,
//! so edits, deletes and status changes follow the confirm-then-patch rules
//! of the core; only the output is text.

use std::io::{self, BufRead, Write};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use devtrack_proto::dto::UserInfo;
use devtrack_proto::model::{Project, ProjectId, Task, TaskId};
use thiserror::Error;

use crate::auth::{AuthError, AuthGateway, RegisterForm, Registered, Session, TokenStore};
use crate::config::ClientConfig;
use crate::gateway::ResourceGateway;
use crate::notify::{Level, ViewSink};
use crate::projects::stats::load_dashboard;
use crate::projects::{
    Confirm, CreateProjectForm, CreateTaskForm, ProjectList, ReconcileError, surface_failure,
};

/// Hint printed whenever the session is missing or expired.
pub const LOGIN_HINT: &str = "You are not logged in or your session expired. Run `devtrack login`.";

/// Subcommands of the `devtrack` binary.
#[derive(clap::Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create an account.
    Register {
        /// Display name (at least 3 characters).
        #[arg(long)]
        name: String,
        /// Account e-mail address.
        #[arg(long)]
        email: String,
        /// Password (at least 6 characters).
        #[arg(long, env = "DEVTRACK_PASSWORD")]
        password: String,
        /// Password again.
        #[arg(long)]
        confirm_password: String,
    },
    /// Log in and store the session token.
    Login {
        /// Account e-mail address.
        #[arg(long)]
        email: String,
        /// Password.
        #[arg(long, env = "DEVTRACK_PASSWORD")]
        password: String,
    },
    /// Forget the stored session token.
    Logout,
    /// Show who is logged in.
    Whoami,
    /// Show project and task counts.
    Dashboard,
    /// List projects with their tasks.
    Projects {
        /// Only show projects whose name contains this text.
        #[arg(long)]
        search: Option<String>,
    },
    /// Show one project and its tasks.
    Show {
        /// Project id or name.
        project: String,
    },
    /// Create a project.
    CreateProject {
        /// Project name.
        name: String,
    },
    /// Rename a project.
    RenameProject {
        /// Project id or name.
        project: String,
        /// New name.
        name: String,
    },
    /// Delete a project and all its tasks.
    DeleteProject {
        /// Project id or name.
        project: String,
    },
    /// Create a task.
    CreateTask {
        /// Task title.
        title: String,
        /// Owning project id or name; optional when only one project exists.
        #[arg(long)]
        project: Option<String>,
    },
    /// Rename a task.
    RenameTask {
        /// Project id or name.
        project: String,
        /// Task id or title.
        task: String,
        /// New title.
        title: String,
    },
    /// Delete a task.
    DeleteTask {
        /// Project id or name.
        project: String,
        /// Task id or title.
        task: String,
    },
    /// Advance a task to its next status.
    CycleStatus {
        /// Project id or name.
        project: String,
        /// Task id or title.
        task: String,
    },
}

/// Failure of a single command.
#[derive(Debug, Error)]
pub enum AppError {
    /// A list or form operation failed.
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    /// A session operation failed.
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// Writing output failed.
    #[error("output error: {0}")]
    Io(#[from] io::Error),
}

impl AppError {
    /// Whether the user has to log in before retrying.
    #[must_use]
    pub const fn is_unauthenticated(&self) -> bool {
        match self {
            Self::Reconcile(ReconcileError::Gateway(e)) => e.is_unauthenticated(),
            Self::Auth(e) => e.is_unauthenticated(),
            _ => false,
        }
    }
}

/// [`ViewSink`] writing notifications to stderr.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    redirected: AtomicBool,
}

impl ConsoleSink {
    /// Creates a sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a redirect to login was requested.
    #[must_use]
    pub fn redirected(&self) -> bool {
        self.redirected.load(Ordering::Relaxed)
    }
}

impl ViewSink for ConsoleSink {
    fn notify(&self, message: &str, level: Level) {
        match level {
            Level::Success => eprintln!("ok: {message}"),
            Level::Error => eprintln!("error: {message}"),
        }
    }

    fn redirect_to_login(&self) {
        if !self.redirected.swap(true, Ordering::Relaxed) {
            eprintln!("{LOGIN_HINT}");
        }
    }
}

/// [`Confirm`] that asks on stderr and reads the answer from stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdinConfirm;

impl Confirm for StdinConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        ask(&mut io::stderr(), &mut io::stdin().lock(), prompt)
    }
}

/// Writes the prompt and reads one answer line. Any I/O failure declines.
fn ask(out: &mut impl Write, input: &mut impl BufRead, prompt: &str) -> bool {
    if write!(out, "{prompt} [y/N] ").and_then(|()| out.flush()).is_err() {
        return false;
    }
    let mut answer = String::new();
    if input.read_line(&mut answer).is_err() {
        return false;
    }
    is_yes(&answer)
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Runs a session command. Returns `None` for commands that need a
/// resource gateway instead.
///
/// # Errors
///
/// Returns [`AppError`] if the command fails.
pub async fn run_session<S: TokenStore>(
    command: &Command,
    session: &Session<S>,
    out: &mut impl Write,
) -> Option<Result<(), AppError>> {
    let result = match command {
        Command::Register {
            name,
            email,
            password,
            confirm_password,
        } => {
            let form = RegisterForm {
                name: name.clone(),
                email: email.clone(),
                password: password.clone(),
                confirm_password: confirm_password.clone(),
            };
            match session.register(&form).await {
                Ok(Registered::SignedIn(user)) => {
                    writeln!(out, "Account created. {}", greeting(user.as_ref())).map_err(Into::into)
                }
                Ok(Registered::LoginRequired) => {
                    writeln!(out, "Account created. Run `devtrack login` to sign in.")
                        .map_err(Into::into)
                }
                Err(e) => Err(e.into()),
            }
        }
        Command::Login { email, password } => match session.login(email, password).await {
            Ok(user) => writeln!(out, "{}", greeting(user.as_ref())).map_err(Into::into),
            Err(e) => Err(e.into()),
        },
        Command::Logout => session
            .logout()
            .map_err(AppError::from)
            .and_then(|()| writeln!(out, "Logged out.").map_err(Into::into)),
        Command::Whoami => match session.credentials() {
            Ok(Some(credentials)) => {
                writeln!(out, "{}", greeting(credentials.user.as_ref())).map_err(Into::into)
            }
            Ok(None) => Err(AuthError::Gateway(crate::gateway::GatewayError::Unauthenticated).into()),
            Err(e) => Err(e.into()),
        },
        _ => return None,
    };
    Some(result)
}

fn greeting(user: Option<&UserInfo>) -> String {
    user.map_or_else(
        || "Logged in.".to_string(),
        |u| format!("Logged in as {} <{}>.", u.name, u.email),
    )
}

/// Runs a resource command against `gateway`.
///
/// Session commands are ignored here; see [`run_session`].
///
/// # Errors
///
/// Returns [`AppError`] if the command fails. The failure has already been
/// reported through `view`.
pub async fn run_resource<G, V, C, W>(
    command: &Command,
    gateway: G,
    view: V,
    confirm: &C,
    config: &ClientConfig,
    out: &mut W,
) -> Result<(), AppError>
where
    G: ResourceGateway,
    V: ViewSink,
    C: Confirm,
    W: Write,
{
    let fmt = config.date_format.as_str();
    match command {
        Command::Dashboard => {
            let stats = load_dashboard(&gateway, &view, config.dashboard_page_size).await?;
            writeln!(out, "Projects:  {}", stats.total_projects)?;
            writeln!(out, "Tasks:     {}", stats.total_tasks)?;
            writeln!(out, "Completed: {}", stats.completed_tasks)?;
            writeln!(out, "Pending:   {}", stats.pending_tasks)?;
        }
        Command::Projects { search } => {
            let list = ProjectList::new(gateway, view, config.projects_page_size);
            list.load().await?;
            if let Some(term) = search {
                list.set_search_term(term.as_str());
            }
            let visible = list.visible();
            writeln!(out, "{}", projects_found(visible.len()))?;
            for project in &visible {
                render_project(out, project, fmt)?;
            }
        }
        Command::Show { project } => {
            let list = ProjectList::new(gateway, view, config.projects_page_size);
            list.load().await?;
            let id = find_project(&list, project)?;
            let mut detail = match list.gateway().get_project(&id).await {
                Ok(detail) => detail,
                Err(e) => {
                    surface_failure(list.view(), &e, "Failed to load project");
                    return Err(ReconcileError::Gateway(e).into());
                }
            };
            if detail.tasks.is_none() {
                match list
                    .gateway()
                    .list_tasks(&id, config.dashboard_page_size)
                    .await
                {
                    Ok(tasks) => detail.tasks = Some(tasks),
                    Err(e) => {
                        surface_failure(list.view(), &e, "Failed to load tasks");
                        return Err(ReconcileError::Gateway(e).into());
                    }
                }
            }
            render_project(out, &detail, fmt)?;
        }
        Command::CreateProject { name } => {
            let mut form = CreateProjectForm::new();
            form.set_name(name.as_str());
            let project = form.submit(&gateway, &view).await?;
            writeln!(out, "{}", project.id)?;
        }
        Command::RenameProject { project, name } => {
            let list = ProjectList::new(gateway, view, config.projects_page_size);
            list.load().await?;
            let id = find_project(&list, project)?;
            list.begin_project_edit(&id)?;
            list.set_project_draft(name.as_str());
            list.save_project_edit().await?;
        }
        Command::DeleteProject { project } => {
            let list = ProjectList::new(gateway, view, config.projects_page_size);
            list.load().await?;
            let id = find_project(&list, project)?;
            if !list.delete_project(&id, confirm).await? {
                writeln!(out, "Cancelled.")?;
            }
        }
        Command::CreateTask { title, project } => {
            let mut form = CreateTaskForm::new();
            form.load_projects(&gateway, &view, config.dashboard_page_size)
                .await?;
            if let Some(key) = project {
                let id = match_project(form.projects(), key)
                    .ok_or_else(|| ReconcileError::ProjectNotFound(ProjectId::new(key.as_str())))?;
                form.select(&id)?;
            }
            form.set_title(title.as_str());
            let task = match form.submit(&gateway, &view).await {
                Ok(task) => task,
                Err(ReconcileError::NoProjectSelected) => {
                    view.notify("Select a project with --project", Level::Error);
                    return Err(ReconcileError::NoProjectSelected.into());
                }
                Err(e) => return Err(e.into()),
            };
            writeln!(out, "{}", task.id)?;
        }
        Command::RenameTask {
            project,
            task,
            title,
        } => {
            let list = ProjectList::new(gateway, view, config.projects_page_size);
            list.load().await?;
            let (project_id, task_id) = find_task(&list, project, task)?;
            list.begin_task_edit(&project_id, &task_id)?;
            list.set_task_draft(title.as_str());
            list.save_task_edit().await?;
        }
        Command::DeleteTask { project, task } => {
            let list = ProjectList::new(gateway, view, config.projects_page_size);
            list.load().await?;
            let (project_id, task_id) = find_task(&list, project, task)?;
            if !list.delete_task(&project_id, &task_id, confirm).await? {
                writeln!(out, "Cancelled.")?;
            }
        }
        Command::CycleStatus { project, task } => {
            let list = ProjectList::new(gateway, view, config.projects_page_size);
            list.load().await?;
            let (project_id, task_id) = find_task(&list, project, task)?;
            let status = list.cycle_task_status(&project_id, &task_id).await?;
            writeln!(out, "{status}")?;
        }
        Command::Register { .. } | Command::Login { .. } | Command::Logout | Command::Whoami => {
            tracing::debug!(?command, "session command passed to resource runner");
        }
    }
    Ok(())
}

/// Resolves `key` against a project's id first, then its name (ignoring case).
fn match_project(projects: &[Project], key: &str) -> Option<ProjectId> {
    projects
        .iter()
        .find(|p| p.id.as_str() == key)
        .or_else(|| projects.iter().find(|p| p.name.eq_ignore_ascii_case(key)))
        .map(|p| p.id.clone())
}

fn match_task(tasks: &[Task], key: &str) -> Option<TaskId> {
    tasks
        .iter()
        .find(|t| t.id.as_str() == key)
        .or_else(|| tasks.iter().find(|t| t.title.eq_ignore_ascii_case(key)))
        .map(|t| t.id.clone())
}

fn find_project<G: ResourceGateway, V: ViewSink>(
    list: &ProjectList<G, V>,
    key: &str,
) -> Result<ProjectId, ReconcileError> {
    list.read(|s| match_project(s.projects(), key))
        .ok_or_else(|| ReconcileError::ProjectNotFound(ProjectId::new(key)))
}

fn find_task<G: ResourceGateway, V: ViewSink>(
    list: &ProjectList<G, V>,
    project: &str,
    task: &str,
) -> Result<(ProjectId, TaskId), ReconcileError> {
    let project_id = find_project(list, project)?;
    list.read(|s| {
        s.projects()
            .iter()
            .find(|p| p.id == project_id)
            .and_then(|p| match_task(p.tasks(), task))
    })
    .map(|task_id| (project_id, task_id))
    .ok_or_else(|| ReconcileError::TaskNotFound(TaskId::new(task)))
}

/// Header line of the project listing.
#[must_use]
pub fn projects_found(count: usize) -> String {
    format!("{count} project(s) found")
}

/// Renders a server timestamp with `fmt`, or "date unavailable".
///
/// Accepts RFC 3339 as well as offset-less ISO 8601 date-times and plain
/// dates.
#[must_use]
pub fn format_date(raw: &str, fmt: &str) -> String {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format(fmt).to_string();
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return dt.format(fmt).to_string();
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return d.format(fmt).to_string();
    }
    "date unavailable".to_string()
}

fn render_project(out: &mut impl Write, project: &Project, fmt: &str) -> io::Result<()> {
    writeln!(
        out,
        "{}  ({})  created {}  {} task(s)",
        project.name,
        project.id,
        format_date(&project.created_at, fmt),
        project.task_count()
    )?;
    for task in project.tasks() {
        writeln!(out, "  [{}] {}  ({})", task.status.label(), task.title, task.id)?;
    }
    Ok(())
}
