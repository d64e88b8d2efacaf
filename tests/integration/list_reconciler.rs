//! Integration tests for the project list reconciler.
//!
//! Drives `ProjectList` against the in-memory gateway and checks that the
//! local cache changes only after the gateway confirms, that failures leave
//! it untouched, and that every failure is made visible.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::similar_names)]

use std::sync::Arc;
use std::time::Duration;

use devtrack::gateway::memory::{Call, InMemoryGateway};
use devtrack::gateway::{GatewayError, ResourceGateway};
use devtrack::notify::{ChannelSink, Level, UiEvent};
use devtrack::projects::{
    AssumeYes, CreateProjectForm, EditState, LoadState, Pending, ProjectList, ReconcileError,
};
use devtrack_proto::model::{Project, ProjectId, Task, TaskId, TaskStatus, ValidationError};
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

fn task(id: &str, title: &str, status: TaskStatus) -> Task {
    Task {
        id: TaskId::new(id),
        title: title.to_string(),
        description: None,
        status,
        project_id: None,
        created_at: None,
    }
}

fn project(id: &str, name: &str, tasks: Vec<Task>) -> Project {
    Project {
        id: ProjectId::new(id),
        name: name.to_string(),
        user_id: None,
        created_at: "2024-03-01T10:00:00Z".to_string(),
        tasks: Some(tasks),
    }
}

/// P1 with tasks in status 0, 2, 2 and P2 with one task in status 1.
fn fixture() -> Vec<Project> {
    vec![
        project(
            "p1",
            "Sistema de Vendas",
            vec![
                task("t1", "Model", TaskStatus::Pending),
                task("t2", "API", TaskStatus::Completed),
                task("t3", "Docs", TaskStatus::Completed),
            ],
        ),
        project(
            "p2",
            "Website",
            vec![task("t4", "Landing page", TaskStatus::InProgress)],
        ),
    ]
}

type List = ProjectList<Arc<InMemoryGateway>, ChannelSink>;

async fn loaded_list(gateway: &Arc<InMemoryGateway>) -> (List, mpsc::Receiver<UiEvent>) {
    let (sink, rx) = ChannelSink::channel(64);
    let list = ProjectList::new(Arc::clone(gateway), sink, 50);
    list.load().await.unwrap();
    (list, rx)
}

fn drain(rx: &mut mpsc::Receiver<UiEvent>) -> Vec<UiEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn toast(message: &str, level: Level) -> UiEvent {
    UiEvent::Toast {
        message: message.to_string(),
        level,
    }
}

fn status_of(list: &List, project_id: &str, task_id: &str) -> TaskStatus {
    list.read(|s| {
        s.projects()
            .iter()
            .find(|p| p.id.as_str() == project_id)
            .and_then(|p| p.task(&TaskId::new(task_id)))
            .map(|t| t.status)
            .unwrap()
    })
}

fn server_error() -> GatewayError {
    GatewayError::Server {
        status: 500,
        message: "Internal error".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

#[tokio::test]
async fn load_replaces_collection_wholesale() {
    let gateway = Arc::new(InMemoryGateway::with_projects(fixture()));
    let (list, _rx) = loaded_list(&gateway).await;
    assert_eq!(list.read(|s| s.projects().len()), 2);

    gateway.delete_project(&ProjectId::new("p2")).await.unwrap();
    list.load().await.unwrap();

    let names: Vec<String> = list.read(|s| s.projects().iter().map(|p| p.name.clone()).collect());
    assert_eq!(names, vec!["Sistema de Vendas"]);
}

#[tokio::test]
async fn failed_load_sets_page_error_and_keeps_cache() {
    let gateway = Arc::new(InMemoryGateway::with_projects(fixture()));
    let (list, mut rx) = loaded_list(&gateway).await;

    gateway.fail_next(GatewayError::Network("refused".to_string()));
    let err = list.load().await.unwrap_err();

    assert!(matches!(err, ReconcileError::Gateway(GatewayError::Network(_))));
    assert_eq!(
        list.read(|s| s.load_state().clone()),
        LoadState::Failed("Failed to load projects".to_string())
    );
    assert_eq!(list.read(|s| s.projects().len()), 2);
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn unauthenticated_load_redirects_to_login() {
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.fail_next(GatewayError::Unauthenticated);
    let (sink, mut rx) = ChannelSink::channel(8);
    let list = ProjectList::new(Arc::clone(&gateway), sink, 50);

    assert!(list.load().await.is_err());
    assert_eq!(drain(&mut rx), vec![UiEvent::RedirectToLogin]);
}

#[tokio::test]
async fn created_project_appears_exactly_once_after_load() {
    let gateway = Arc::new(InMemoryGateway::with_projects(fixture()));
    let (sink, _rx) = ChannelSink::channel(8);
    let mut form = CreateProjectForm::new();
    form.set_name("  Mobile App ");
    let created = form.submit(&*gateway, &sink).await.unwrap();

    let (list, _rx) = loaded_list(&gateway).await;

    let matches = list.read(|s| s.projects().iter().filter(|p| p.id == created.id).count());
    assert_eq!(matches, 1);
    assert_eq!(created.name, "Mobile App");
}

// ---------------------------------------------------------------------------
// Filter
// ---------------------------------------------------------------------------

#[tokio::test]
async fn search_term_filters_without_mutating() {
    let gateway = Arc::new(InMemoryGateway::with_projects(fixture()));
    let (list, _rx) = loaded_list(&gateway).await;

    list.set_search_term("VENDAS");
    let visible: Vec<String> = list.visible().into_iter().map(|p| p.name).collect();
    assert_eq!(visible, vec!["Sistema de Vendas"]);
    assert_eq!(list.read(|s| s.projects().len()), 2);

    list.set_search_term("  ");
    assert_eq!(list.visible().len(), 2);
}

// ---------------------------------------------------------------------------
// Status cycling
// ---------------------------------------------------------------------------

#[tokio::test]
async fn three_cycles_return_to_original_status() {
    let gateway = Arc::new(InMemoryGateway::with_projects(fixture()));
    let (list, mut rx) = loaded_list(&gateway).await;
    let (pid, tid) = (ProjectId::new("p1"), TaskId::new("t1"));

    let mut seen = Vec::new();
    for _ in 0..3 {
        seen.push(list.cycle_task_status(&pid, &tid).await.unwrap());
    }

    assert_eq!(
        seen,
        vec![
            TaskStatus::InProgress,
            TaskStatus::Completed,
            TaskStatus::Pending
        ]
    );
    assert_eq!(status_of(&list, "p1", "t1"), TaskStatus::Pending);
    assert_eq!(
        drain(&mut rx),
        vec![
            toast("Status: In Progress", Level::Success),
            toast("Status: Completed", Level::Success),
            toast("Status: Pending", Level::Success),
        ]
    );
}

#[tokio::test]
async fn cycle_persists_next_status_before_showing_it() {
    let gateway = Arc::new(InMemoryGateway::with_projects(fixture()));
    let (list, _rx) = loaded_list(&gateway).await;

    list.cycle_task_status(&ProjectId::new("p2"), &TaskId::new("t4"))
        .await
        .unwrap();

    assert!(
        gateway
            .calls()
            .contains(&Call::SetTaskStatus(TaskId::new("t4"), TaskStatus::Completed))
    );
    assert_eq!(status_of(&list, "p2", "t4"), TaskStatus::Completed);
}

#[tokio::test]
async fn status_is_not_shown_until_gateway_confirms() {
    let gateway = Arc::new(
        InMemoryGateway::with_projects(fixture()).with_latency(Duration::from_millis(100)),
    );
    let (list, _rx) = loaded_list(&gateway).await;
    let list = Arc::new(list);

    let worker = {
        let list = Arc::clone(&list);
        tokio::spawn(async move {
            list.cycle_task_status(&ProjectId::new("p1"), &TaskId::new("t1"))
                .await
        })
    };
    tokio::time::sleep(Duration::from_millis(30)).await;

    assert_eq!(status_of(&list, "p1", "t1"), TaskStatus::Pending);
    assert!(list.read(|s| s.is_pending(&Pending::Task(TaskId::new("t1")))));

    worker.await.unwrap().unwrap();
    assert_eq!(status_of(&list, "p1", "t1"), TaskStatus::InProgress);
    assert!(!list.read(|s| s.is_pending(&Pending::Task(TaskId::new("t1")))));
}

#[tokio::test]
async fn failed_cycle_leaves_status_and_notifies() {
    let gateway = Arc::new(InMemoryGateway::with_projects(fixture()));
    let (list, mut rx) = loaded_list(&gateway).await;
    gateway.fail_next(server_error());

    let err = list
        .cycle_task_status(&ProjectId::new("p1"), &TaskId::new("t2"))
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::Gateway(_)));
    assert_eq!(status_of(&list, "p1", "t2"), TaskStatus::Completed);
    assert_eq!(
        drain(&mut rx),
        vec![toast("Failed to change status: Internal error", Level::Error)]
    );
}

// ---------------------------------------------------------------------------
// Rename
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rename_project_patches_only_that_name() {
    let gateway = Arc::new(InMemoryGateway::with_projects(fixture()));
    let (list, mut rx) = loaded_list(&gateway).await;
    let pid = ProjectId::new("p2");

    list.begin_project_edit(&pid).unwrap();
    list.set_project_draft("  Company Website  ");
    list.save_project_edit().await.unwrap();

    let state = list.snapshot();
    assert_eq!(state.projects()[1].name, "Company Website");
    assert_eq!(state.projects()[0].name, "Sistema de Vendas");
    assert_eq!(state.project_edit(), &EditState::Viewing);
    assert!(gateway.calls().contains(&Call::RenameProject(
        pid,
        "Company Website".to_string()
    )));
    assert_eq!(drain(&mut rx), vec![toast("Project updated", Level::Success)]);
}

#[tokio::test]
async fn failed_rename_leaves_name_exactly_as_before() {
    let gateway = Arc::new(InMemoryGateway::with_projects(fixture()));
    let (list, mut rx) = loaded_list(&gateway).await;
    let pid = ProjectId::new("p1");
    let before = list.snapshot().projects().to_vec();

    list.begin_project_edit(&pid).unwrap();
    list.set_project_draft("Renamed");
    gateway.fail_next(server_error());
    assert!(list.save_project_edit().await.is_err());

    let state = list.snapshot();
    assert_eq!(state.projects(), before.as_slice());
    let draft = state.project_edit().draft().unwrap();
    assert_eq!(draft.key, pid);
    assert_eq!(draft.text, "Renamed");
    assert_eq!(draft.error.as_deref(), Some("Internal error"));
    assert_eq!(
        drain(&mut rx),
        vec![toast("Failed to update project: Internal error", Level::Error)]
    );
}

#[tokio::test]
async fn blank_rename_makes_no_call_and_stays_editing() {
    let gateway = Arc::new(InMemoryGateway::with_projects(fixture()));
    let (list, mut rx) = loaded_list(&gateway).await;
    let calls_before = gateway.calls().len();
    let pid = ProjectId::new("p1");

    list.begin_project_edit(&pid).unwrap();
    list.set_project_draft("   ");
    let err = list.save_project_edit().await.unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::Validation(ValidationError::Empty { .. })
    ));
    assert_eq!(gateway.calls().len(), calls_before);
    let state = list.snapshot();
    assert!(state.project_edit().is_editing(&pid));
    assert!(state.project_edit().draft().unwrap().error.is_some());
    assert_eq!(state.projects()[0].name, "Sistema de Vendas");
    assert_eq!(drain(&mut rx).len(), 1);
}

#[tokio::test]
async fn blank_task_rename_makes_no_call() {
    let gateway = Arc::new(InMemoryGateway::with_projects(fixture()));
    let (list, _rx) = loaded_list(&gateway).await;
    let calls_before = gateway.calls().len();
    let (pid, tid) = (ProjectId::new("p1"), TaskId::new("t1"));

    list.begin_task_edit(&pid, &tid).unwrap();
    list.set_task_draft("\t\n");
    assert!(list.save_task_edit().await.is_err());

    assert_eq!(gateway.calls().len(), calls_before);
    assert!(
        list.read(|s| s
            .task_edit()
            .is_editing(&devtrack::projects::TaskKey::new(pid.clone(), tid.clone())))
    );
}

#[tokio::test]
async fn rename_task_touches_only_that_task() {
    let gateway = Arc::new(InMemoryGateway::with_projects(fixture()));
    let (list, _rx) = loaded_list(&gateway).await;
    let before = list.snapshot().projects().to_vec();

    list.rename_task(&ProjectId::new("p1"), &TaskId::new("t2"), "REST API")
        .await
        .unwrap();

    let after = list.snapshot().projects().to_vec();
    assert_eq!(after[0].tasks()[1].title, "REST API");
    assert_eq!(after[0].tasks()[0], before[0].tasks()[0]);
    assert_eq!(after[0].tasks()[2], before[0].tasks()[2]);
    assert_eq!(after[1], before[1]);
}

#[tokio::test]
async fn cancel_discards_draft_without_call() {
    let gateway = Arc::new(InMemoryGateway::with_projects(fixture()));
    let (list, _rx) = loaded_list(&gateway).await;
    let calls_before = gateway.calls().len();

    list.begin_project_edit(&ProjectId::new("p1")).unwrap();
    list.set_project_draft("Something else");
    list.cancel_project_edit();

    assert_eq!(list.read(|s| s.project_edit().clone()), EditState::Viewing);
    assert_eq!(gateway.calls().len(), calls_before);
    assert_eq!(list.read(|s| s.projects()[0].name.clone()), "Sistema de Vendas");
}

#[tokio::test]
async fn second_edit_implicitly_cancels_first() {
    let gateway = Arc::new(InMemoryGateway::with_projects(fixture()));
    let (list, _rx) = loaded_list(&gateway).await;

    list.begin_project_edit(&ProjectId::new("p1")).unwrap();
    list.set_project_draft("Draft for p1");
    list.begin_project_edit(&ProjectId::new("p2")).unwrap();

    let state = list.snapshot();
    let draft = state.project_edit().draft().unwrap();
    assert_eq!(draft.key, ProjectId::new("p2"));
    assert_eq!(draft.text, "Website");
}

#[tokio::test]
async fn project_and_task_edits_are_independent() {
    let gateway = Arc::new(InMemoryGateway::with_projects(fixture()));
    let (list, _rx) = loaded_list(&gateway).await;

    list.begin_project_edit(&ProjectId::new("p1")).unwrap();
    list.begin_task_edit(&ProjectId::new("p2"), &TaskId::new("t4"))
        .unwrap();
    list.cancel_task_edit();

    assert!(list.read(|s| s.project_edit().is_editing(&ProjectId::new("p1"))));
}

// ---------------------------------------------------------------------------
// Delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_project_removes_exactly_that_project() {
    let gateway = Arc::new(InMemoryGateway::with_projects(fixture()));
    let (list, mut rx) = loaded_list(&gateway).await;
    let before = list.snapshot().projects().to_vec();

    assert!(list.delete_project(&ProjectId::new("p1"), &AssumeYes).await.unwrap());

    assert_eq!(list.snapshot().projects(), &before[1..]);
    assert_eq!(drain(&mut rx), vec![toast("Project deleted", Level::Success)]);
}

#[tokio::test]
async fn declined_delete_makes_no_call() {
    let gateway = Arc::new(InMemoryGateway::with_projects(fixture()));
    let (list, _rx) = loaded_list(&gateway).await;
    let prompts = std::cell::RefCell::new(Vec::new());
    let calls_before = gateway.calls().len();

    let decline = |prompt: &str| {
        prompts.borrow_mut().push(prompt.to_string());
        false
    };
    let deleted = list
        .delete_task(&ProjectId::new("p1"), &TaskId::new("t3"), &decline)
        .await
        .unwrap();

    assert!(!deleted);
    assert_eq!(gateway.calls().len(), calls_before);
    assert_eq!(prompts.into_inner(), vec!["Delete task \"Docs\"?".to_string()]);
    assert_eq!(list.read(|s| s.projects()[0].task_count()), 3);
}

#[tokio::test]
async fn delete_task_leaves_siblings_and_other_projects() {
    let gateway = Arc::new(InMemoryGateway::with_projects(fixture()));
    let (list, _rx) = loaded_list(&gateway).await;
    let before = list.snapshot().projects().to_vec();

    assert!(
        list.delete_task(&ProjectId::new("p1"), &TaskId::new("t2"), &AssumeYes)
            .await
            .unwrap()
    );

    let after = list.snapshot().projects().to_vec();
    let remaining: Vec<&str> = after[0].tasks().iter().map(|t| t.id.as_str()).collect();
    assert_eq!(remaining, vec!["t1", "t3"]);
    assert_eq!(after[0].tasks()[0], before[0].tasks()[0]);
    assert_eq!(after[1], before[1]);
}

#[tokio::test]
async fn failed_delete_keeps_project() {
    let gateway = Arc::new(InMemoryGateway::with_projects(fixture()));
    let (list, mut rx) = loaded_list(&gateway).await;
    gateway.fail_next(GatewayError::Network("reset".to_string()));

    assert!(list.delete_project(&ProjectId::new("p2"), &AssumeYes).await.is_err());

    assert_eq!(list.read(|s| s.projects().len()), 2);
    assert_eq!(
        drain(&mut rx),
        vec![toast(
            "Failed to delete project: could not reach the server",
            Level::Error
        )]
    );
}

#[tokio::test]
async fn expired_session_during_mutation_redirects() {
    let gateway = Arc::new(InMemoryGateway::with_projects(fixture()));
    let (list, mut rx) = loaded_list(&gateway).await;
    gateway.fail_next(GatewayError::Unauthenticated);

    assert!(
        list.rename_task(&ProjectId::new("p1"), &TaskId::new("t1"), "New")
            .await
            .is_err()
    );

    let events = drain(&mut rx);
    assert_eq!(events.last(), Some(&UiEvent::RedirectToLogin));
    assert_eq!(list.read(|s| s.projects()[0].tasks()[0].title.clone()), "Model");
}

// ---------------------------------------------------------------------------
// Concurrency and stats
// ---------------------------------------------------------------------------

#[tokio::test]
async fn concurrent_mutations_each_apply_their_own_patch() {
    let gateway = Arc::new(
        InMemoryGateway::with_projects(fixture()).with_latency(Duration::from_millis(20)),
    );
    let (list, _rx) = loaded_list(&gateway).await;
    let (p1, p2) = (ProjectId::new("p1"), ProjectId::new("p2"));
    let (t1, t3) = (TaskId::new("t1"), TaskId::new("t3"));

    let (renamed, cycled, deleted) = tokio::join!(
        list.rename_project(&p2, "Site"),
        list.cycle_task_status(&p1, &t1),
        list.delete_task(&p1, &t3, &AssumeYes),
    );
    renamed.unwrap();
    assert_eq!(cycled.unwrap(), TaskStatus::InProgress);
    assert!(deleted.unwrap());

    let state = list.snapshot();
    assert_eq!(state.projects()[1].name, "Site");
    assert_eq!(state.projects()[0].tasks()[0].status, TaskStatus::InProgress);
    assert_eq!(state.projects()[0].task_count(), 2);
}

#[tokio::test]
async fn stats_follow_the_cache() {
    let gateway = Arc::new(InMemoryGateway::with_projects(fixture()));
    let (list, _rx) = loaded_list(&gateway).await;

    let stats = list.read(|s| s.stats());
    assert_eq!(
        (
            stats.total_projects,
            stats.total_tasks,
            stats.completed_tasks,
            stats.pending_tasks
        ),
        (2, 4, 2, 2)
    );

    list.cycle_task_status(&ProjectId::new("p2"), &TaskId::new("t4"))
        .await
        .unwrap();
    let stats = list.read(|s| s.stats());
    assert_eq!((stats.completed_tasks, stats.pending_tasks), (3, 1));
}
