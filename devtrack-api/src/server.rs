//! HTTP surface of the API: routing, bearer authentication and error mapping.
//!
//! All routes live under `/api`. Successful responses use the
//! `{ success, message, data }` envelope; failures use [`ApiErrorBody`] with
//! the matching status code (401 for a missing or unknown token).

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use devtrack_proto::dto::{
    ApiErrorBody, ApiResponse, AuthResponse, CreateProjectDto, CreateTaskDto, LoginDto,
    PageQuery, PaginatedResponse, RegisterDto, UpdateProjectDto, UpdateTaskDto,
    UpdateTaskStatusDto,
};
use devtrack_proto::model::{Project, ProjectId, Task, TaskId};

use crate::store::{ApiStore, Page, StoreError};

/// Default page size when a listing request does not specify one.
const DEFAULT_PAGE_SIZE: u32 = 10;

/// Upper bound applied to requested page sizes.
const DEFAULT_MAX_PAGE_SIZE: u32 = 100;

/// Shared server state.
pub struct ApiState {
    /// Backing store.
    pub store: ApiStore,
    default_page_size: u32,
    max_page_size: u32,
    register_issues_token: bool,
}

impl Default for ApiState {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiState {
    /// Creates a state with an empty store and default paging limits.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(DEFAULT_PAGE_SIZE, DEFAULT_MAX_PAGE_SIZE, true)
    }

    /// Creates a state with custom paging limits.
    ///
    /// When `register_issues_token` is false, registration only creates the
    /// account and the client has to log in separately.
    #[must_use]
    pub fn with_config(default_page_size: u32, max_page_size: u32, register_issues_token: bool) -> Self {
        Self {
            store: ApiStore::new(),
            default_page_size,
            max_page_size: max_page_size.max(1),
            register_issues_token,
        }
    }

    fn page(&self, query: PageQuery) -> Page {
        Page {
            number: query.page.unwrap_or(1).max(1),
            size: query
                .page_size
                .unwrap_or(self.default_page_size)
                .clamp(1, self.max_page_size),
        }
    }
}

/// Error response of a handler.
#[derive(Debug)]
pub enum ApiError {
    /// Missing, malformed or unknown bearer token.
    Unauthorized,
    /// A store operation failed.
    Store(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(error: StoreError) -> Self {
        Self::Store(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),
            Self::Store(e) => {
                let status = match e {
                    StoreError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                    StoreError::ProjectNotFound | StoreError::TaskNotFound => StatusCode::NOT_FOUND,
                    StoreError::EmailTaken => StatusCode::CONFLICT,
                    StoreError::Validation(_) | StoreError::InvalidRegistration(_) => {
                        StatusCode::BAD_REQUEST
                    }
                };
                (status, capitalize(&e.to_string()))
            }
        };
        tracing::debug!(status = status.as_u16(), %message, "request failed");
        (status, Json(ApiErrorBody::message(message))).into_response()
    }
}

fn capitalize(message: &str) -> String {
    let mut chars = message.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

type Reply<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Resolves the bearer token of a request to a user id.
async fn authenticate(state: &ApiState, headers: &HeaderMap) -> Result<String, ApiError> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(ApiError::Unauthorized)?;
    state
        .store
        .authenticate(token)
        .await
        .ok_or(ApiError::Unauthorized)
}

/// Builds the API router.
pub fn router(state: Arc<ApiState>) -> axum::Router {
    let api = axum::Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/{id}",
            get(get_project).put(rename_project).delete(delete_project),
        )
        .route("/tasks", post(create_task))
        .route("/tasks/by-project/{project_id}", get(list_tasks))
        .route("/tasks/{id}", axum::routing::put(rename_task).delete(delete_task))
        .route("/tasks/{id}/status", patch(set_task_status))
        .with_state(state);
    axum::Router::new().nest("/api", api)
}

async fn register(State(state): State<Arc<ApiState>>, Json(dto): Json<RegisterDto>) -> Reply<AuthResponse> {
    let user = state.store.register(&dto).await?;
    tracing::info!(user_id = %user.id, "account registered");
    if !state.register_issues_token {
        return Ok(Json(ApiResponse::ok_with_message(
            AuthResponse {
                token: None,
                user: Some(user),
            },
            "Account created",
        )));
    }
    let (token, user) = state.store.login(&dto.email, &dto.password).await?;
    Ok(Json(ApiResponse::ok(AuthResponse {
        token: Some(token),
        user: Some(user),
    })))
}

async fn login(State(state): State<Arc<ApiState>>, Json(dto): Json<LoginDto>) -> Reply<AuthResponse> {
    let (token, user) = state.store.login(&dto.email, &dto.password).await?;
    tracing::info!(user_id = %user.id, "session opened");
    Ok(Json(ApiResponse::ok(AuthResponse {
        token: Some(token),
        user: Some(user),
    })))
}

async fn list_projects(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Reply<PaginatedResponse<Project>> {
    let user = authenticate(&state, &headers).await?;
    Ok(Json(ApiResponse::ok(
        state.store.list_projects(&user, state.page(query)).await,
    )))
}

async fn get_project(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Reply<Project> {
    let user = authenticate(&state, &headers).await?;
    let project = state.store.get_project(&user, &ProjectId::new(id)).await?;
    Ok(Json(ApiResponse::ok(project)))
}

async fn create_project(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(dto): Json<CreateProjectDto>,
) -> Result<(StatusCode, Json<ApiResponse<Project>>), ApiError> {
    let user = authenticate(&state, &headers).await?;
    let project = state.store.create_project(&user, &dto.name).await?;
    tracing::info!(project_id = %project.id, "project created");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(project))))
}

async fn rename_project(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(dto): Json<UpdateProjectDto>,
) -> Reply<Project> {
    let user = authenticate(&state, &headers).await?;
    let project = state
        .store
        .rename_project(&user, &ProjectId::new(id), &dto.name)
        .await?;
    Ok(Json(ApiResponse::ok(project)))
}

async fn delete_project(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let user = authenticate(&state, &headers).await?;
    state.store.delete_project(&user, &ProjectId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_tasks(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(project_id): Path<String>,
    Query(query): Query<PageQuery>,
) -> Reply<PaginatedResponse<Task>> {
    let user = authenticate(&state, &headers).await?;
    let tasks = state
        .store
        .list_tasks(&user, &ProjectId::new(project_id), state.page(query))
        .await?;
    Ok(Json(ApiResponse::ok(tasks)))
}

async fn create_task(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Json(dto): Json<CreateTaskDto>,
) -> Result<(StatusCode, Json<ApiResponse<Task>>), ApiError> {
    let user = authenticate(&state, &headers).await?;
    let task = state
        .store
        .create_task(&user, &dto.title, &dto.project_id)
        .await?;
    tracing::info!(task_id = %task.id, "task created");
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(task))))
}

async fn rename_task(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(dto): Json<UpdateTaskDto>,
) -> Reply<Task> {
    let user = authenticate(&state, &headers).await?;
    let task = state
        .store
        .rename_task(&user, &TaskId::new(id), &dto.title)
        .await?;
    Ok(Json(ApiResponse::ok(task)))
}

async fn set_task_status(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(dto): Json<UpdateTaskStatusDto>,
) -> Reply<Task> {
    let user = authenticate(&state, &headers).await?;
    let task = state
        .store
        .set_task_status(&user, &TaskId::new(id), dto.status)
        .await?;
    Ok(Json(ApiResponse::ok(task)))
}

async fn delete_task(
    State(state): State<Arc<ApiState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let user = authenticate(&state, &headers).await?;
    state.store.delete_task(&user, &TaskId::new(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Starts the API server on the given address and returns the bound address
/// and a join handle.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server(
    addr: &str,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    start_server_with_state(addr, Arc::new(ApiState::new())).await
}

/// Starts the API server with a pre-configured [`ApiState`].
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind to the given address.
pub async fn start_server_with_state(
    addr: &str,
    state: Arc<ApiState>,
) -> Result<
    (std::net::SocketAddr, tokio::task::JoinHandle<()>),
    Box<dyn std::error::Error + Send + Sync>,
> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "api server error");
        }
    });

    Ok((bound_addr, handle))
}
