//! Integration tests for the HTTP resource gateway.
//!
//! Starts the development API server on an ephemeral port and drives it with
//! the real client stack: `Session` for authentication, `HttpGateway` for
//! resources and `ProjectList` on top.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use devtrack::auth::{AuthGateway, MemoryTokenStore, RegisterForm, Session};
use devtrack::gateway::http::{ApiClient, HttpGateway};
use devtrack::gateway::{GatewayError, ResourceGateway};
use devtrack::notify::{ChannelSink, Level, UiEvent};
use devtrack::projects::stats::load_dashboard;
use devtrack::projects::{AssumeYes, ProjectList};
use devtrack_api::server::{ApiState, start_server, start_server_with_state};
use devtrack_proto::model::{ProjectId, TaskStatus};

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

async fn spawn_api() -> String {
    let (addr, _handle) = start_server("127.0.0.1:0").await.unwrap();
    format!("http://{addr}/api")
}

fn api_client(base: &str) -> ApiClient {
    ApiClient::new(url::Url::parse(base).unwrap(), Duration::from_secs(5)).unwrap()
}

fn form(name: &str, email: &str) -> RegisterForm {
    RegisterForm {
        name: name.to_string(),
        email: email.to_string(),
        password: "secret1".to_string(),
        confirm_password: "secret1".to_string(),
    }
}

/// Registers a fresh account and returns a gateway authenticated as it.
async fn signed_in(base: &str, email: &str) -> HttpGateway {
    let session = Session::new(api_client(base), MemoryTokenStore::new());
    session.register(&form("Ana Lima", email)).await.unwrap();
    session.resource_gateway().unwrap()
}

// ---------------------------------------------------------------------------
// Resource CRUD
// ---------------------------------------------------------------------------

#[tokio::test]
async fn project_and_task_lifecycle() {
    let base = spawn_api().await;
    let gateway = signed_in(&base, "ana@example.com").await;

    let project = gateway.create_project("Sistema de Vendas").await.unwrap();
    assert_eq!(project.name, "Sistema de Vendas");
    assert_eq!(project.task_count(), 0);

    let task = gateway.create_task("Model", &project.id).await.unwrap();
    assert_eq!(task.status, TaskStatus::Pending);
    assert_eq!(task.project_id.as_ref(), Some(&project.id));

    let renamed = gateway.rename_task(&task.id, "Domain model").await.unwrap();
    assert_eq!(renamed.title, "Domain model");

    let advanced = gateway
        .set_task_status(&task.id, TaskStatus::InProgress)
        .await
        .unwrap();
    assert_eq!(advanced.status, TaskStatus::InProgress);

    let listed = gateway.list_projects(50).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].tasks()[0].status, TaskStatus::InProgress);

    let tasks = gateway.list_tasks(&project.id, 50).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "Domain model");

    gateway.delete_task(&task.id).await.unwrap();
    assert!(gateway.list_tasks(&project.id, 50).await.unwrap().is_empty());

    let renamed = gateway
        .rename_project(&project.id, "Vendas 2.0")
        .await
        .unwrap();
    assert_eq!(renamed.name, "Vendas 2.0");
    assert_eq!(
        gateway.get_project(&project.id).await.unwrap().name,
        "Vendas 2.0"
    );

    gateway.delete_project(&project.id).await.unwrap();
    assert!(gateway.list_projects(50).await.unwrap().is_empty());
}

#[tokio::test]
async fn deleting_project_cascades_to_tasks() {
    let base = spawn_api().await;
    let gateway = signed_in(&base, "ana@example.com").await;

    let project = gateway.create_project("Website").await.unwrap();
    let task = gateway.create_task("Landing page", &project.id).await.unwrap();
    gateway.delete_project(&project.id).await.unwrap();

    let err = gateway.rename_task(&task.id, "Gone").await.unwrap_err();
    assert!(matches!(err, GatewayError::Server { status: 404, .. }));
}

#[tokio::test]
async fn missing_project_maps_to_server_error_with_reason() {
    let base = spawn_api().await;
    let gateway = signed_in(&base, "ana@example.com").await;

    let err = gateway
        .get_project(&ProjectId::new("does-not-exist"))
        .await
        .unwrap_err();

    match err {
        GatewayError::Server { status, message } => {
            assert_eq!(status, 404);
            assert!(!message.is_empty());
        }
        other => panic!("expected server error, got {other:?}"),
    }
}

#[tokio::test]
async fn projects_are_scoped_to_their_owner() {
    let base = spawn_api().await;
    let ana = signed_in(&base, "ana@example.com").await;
    let bruno = signed_in(&base, "bruno@example.com").await;

    let project = ana.create_project("Private").await.unwrap();

    assert!(bruno.list_projects(50).await.unwrap().is_empty());
    assert!(bruno.get_project(&project.id).await.is_err());
    assert!(bruno.delete_project(&project.id).await.is_err());
    assert_eq!(ana.list_projects(50).await.unwrap().len(), 1);
}

#[tokio::test]
async fn list_respects_requested_page_size() {
    let base = spawn_api().await;
    let gateway = signed_in(&base, "ana@example.com").await;
    for i in 0..5 {
        gateway.create_project(&format!("Project {i}")).await.unwrap();
    }

    assert_eq!(gateway.list_projects(3).await.unwrap().len(), 3);
    assert_eq!(gateway.list_projects(50).await.unwrap().len(), 5);
}

#[tokio::test]
async fn new_project_is_listed_when_page_is_full() {
    let base = spawn_api().await;
    let gateway = signed_in(&base, "ana@example.com").await;
    for i in 0..50 {
        gateway.create_project(&format!("Project {i}")).await.unwrap();
    }

    let newest = gateway.create_project("Newest").await.unwrap();

    let listed = gateway.list_projects(50).await.unwrap();
    assert_eq!(listed.len(), 50);
    assert_eq!(listed.iter().filter(|p| p.id == newest.id).count(), 1);
    assert_eq!(listed[0].id, newest.id);
}

// ---------------------------------------------------------------------------
// Authentication failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_token_is_unauthenticated() {
    let base = spawn_api().await;
    let gateway = HttpGateway::new(api_client(&base), "not-a-real-token");

    let err = gateway.list_projects(10).await.unwrap_err();
    assert_eq!(err, GatewayError::Unauthenticated);
}

#[tokio::test]
async fn unreachable_server_is_network_error() {
    let (addr, handle) = start_server("127.0.0.1:0").await.unwrap();
    handle.abort();
    let _ = handle.await;

    let gateway = HttpGateway::new(api_client(&format!("http://{addr}/api")), "token");
    let err = gateway.list_projects(10).await.unwrap_err();
    assert!(matches!(err, GatewayError::Network(_)), "got {err:?}");
}

#[tokio::test]
async fn logout_then_resource_call_requires_login() {
    let base = spawn_api().await;
    let session = Session::new(api_client(&base), MemoryTokenStore::new());
    session
        .register(&form("Ana Lima", "ana@example.com"))
        .await
        .unwrap();
    assert!(session.resource_gateway().is_ok());

    session.logout().unwrap();
    assert!(session.resource_gateway().unwrap_err().is_unauthenticated());
}

// ---------------------------------------------------------------------------
// Reconciler over HTTP
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reconciler_over_http() {
    let base = spawn_api().await;
    let gateway = Arc::new(signed_in(&base, "ana@example.com").await);
    let project = gateway.create_project("Sistema de Vendas").await.unwrap();
    let task = gateway.create_task("Model", &project.id).await.unwrap();

    let (sink, mut rx) = ChannelSink::channel(32);
    let list = ProjectList::new(Arc::clone(&gateway), sink, 50);
    list.load().await.unwrap();

    assert_eq!(
        list.cycle_task_status(&project.id, &task.id).await.unwrap(),
        TaskStatus::InProgress
    );
    list.rename_project(&project.id, "  Vendas  ").await.unwrap();

    let server_side = gateway.get_project(&project.id).await.unwrap();
    assert_eq!(server_side.name, "Vendas");
    assert_eq!(server_side.tasks()[0].status, TaskStatus::InProgress);

    assert!(list.delete_task(&project.id, &task.id, &AssumeYes).await.unwrap());
    list.load().await.unwrap();
    assert_eq!(list.read(|s| s.projects()[0].task_count()), 0);

    let mut toasts = Vec::new();
    while let Ok(UiEvent::Toast { message, level }) = rx.try_recv() {
        assert_eq!(level, Level::Success);
        toasts.push(message);
    }
    assert_eq!(
        toasts,
        vec!["Status: In Progress", "Project updated", "Task deleted"]
    );
}

#[tokio::test]
async fn dashboard_over_http() {
    let state = Arc::new(ApiState::with_config(10, 100, true));
    let (addr, _handle) = start_server_with_state("127.0.0.1:0", state)
        .await
        .unwrap();
    let gateway = signed_in(&format!("http://{addr}/api"), "ana@example.com").await;

    let p1 = gateway.create_project("P1").await.unwrap();
    let p2 = gateway.create_project("P2").await.unwrap();
    for (title, status) in [
        ("a", TaskStatus::Pending),
        ("b", TaskStatus::Completed),
        ("c", TaskStatus::Completed),
    ] {
        let task = gateway.create_task(title, &p1.id).await.unwrap();
        gateway.set_task_status(&task.id, status).await.unwrap();
    }
    let task = gateway.create_task("d", &p2.id).await.unwrap();
    gateway
        .set_task_status(&task.id, TaskStatus::InProgress)
        .await
        .unwrap();

    let (sink, _rx) = ChannelSink::channel(4);
    let stats = load_dashboard(&gateway, &sink, 100).await.unwrap();
    assert_eq!(
        (
            stats.total_projects,
            stats.total_tasks,
            stats.completed_tasks,
            stats.pending_tasks
        ),
        (2, 4, 2, 2)
    );
}
