//! Property-based tests for project creation followed by a list reload.
//!
//! Uses proptest to verify that a project created through the form shows up
//! exactly once after `load`, whatever its name and however many projects
//! already exceed the fetched page.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;

use devtrack::gateway::memory::InMemoryGateway;
use devtrack::notify::ChannelSink;
use devtrack::projects::{CreateProjectForm, ProjectList};
use devtrack_proto::model::{Project, ProjectId};
use proptest::prelude::*;

const PAGE_SIZE: u32 = 50;

// --- Strategies ---

fn arb_valid_name() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9][a-zA-Z0-9 ]{0,99}"
}

fn existing(count: usize) -> Vec<Project> {
    (0..count)
        .map(|i| Project {
            id: ProjectId::new(format!("p{i}")),
            name: format!("Existing {i}"),
            user_id: None,
            created_at: "2024-03-01T10:00:00Z".to_string(),
            tasks: Some(Vec::new()),
        })
        .collect()
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

// --- Properties ---

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn created_project_listed_once_after_load(
        name in arb_valid_name(),
        count in 50usize..80,
    ) {
        let hits = runtime().block_on(async {
            let gateway = Arc::new(InMemoryGateway::with_projects(existing(count)));
            let (sink, _rx) = ChannelSink::channel(8);
            let mut form = CreateProjectForm::new();
            form.set_name(name.clone());
            let created = form.submit(&*gateway, &sink).await.unwrap();

            let (sink, _rx) = ChannelSink::channel(8);
            let list = ProjectList::new(Arc::clone(&gateway), sink, PAGE_SIZE);
            list.load().await.unwrap();
            list.read(|s| s.projects().iter().filter(|p| p.id == created.id).count())
        });

        prop_assert_eq!(hits, 1);
    }
}
