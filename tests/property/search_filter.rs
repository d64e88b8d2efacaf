//! Property-based tests for project search filtering and dashboard counts.
//!
//! Uses proptest to verify:
//! 1. A blank search term keeps every project in its original order.
//! 2. Any non-blank term keeps exactly the projects whose name contains it,
//!    ignoring case, preserving order.
//! 3. Dashboard counts always add up: completed + pending == total tasks.

use devtrack::projects::{DashboardStats, filter_projects};
use devtrack_proto::model::{Project, ProjectId, Task, TaskId, TaskStatus};
use proptest::prelude::*;

// --- Strategies ---

fn arb_status() -> impl Strategy<Value = TaskStatus> {
    prop::sample::select(TaskStatus::ALL.to_vec())
}

fn arb_project() -> impl Strategy<Value = Project> {
    (
        "[a-zA-Z ]{1,24}",
        prop::option::of(prop::collection::vec(arb_status(), 0..6)),
    )
        .prop_map(|(name, statuses)| Project {
            id: ProjectId::new(name.to_lowercase().replace(' ', "-")),
            name,
            user_id: None,
            created_at: String::new(),
            tasks: statuses.map(|statuses| {
                statuses
                    .into_iter()
                    .enumerate()
                    .map(|(i, status)| Task {
                        id: TaskId::new(format!("t{i}")),
                        title: format!("task {i}"),
                        description: None,
                        status,
                        project_id: None,
                        created_at: None,
                    })
                    .collect()
            }),
        })
}

fn names(projects: &[&Project]) -> Vec<String> {
    projects.iter().map(|p| p.name.clone()).collect()
}

// --- Properties ---

proptest! {
    #[test]
    fn blank_term_keeps_everything_in_order(
        projects in prop::collection::vec(arb_project(), 0..12),
        blank in "[ \t]{0,4}",
    ) {
        let filtered = filter_projects(&projects, &blank);
        let all: Vec<String> = projects.iter().map(|p| p.name.clone()).collect();
        prop_assert_eq!(names(&filtered), all);
    }

    #[test]
    fn term_matches_case_insensitive_substring(
        projects in prop::collection::vec(arb_project(), 0..12),
        term in "[a-zA-Z]{1,3}",
    ) {
        let filtered = filter_projects(&projects, &term);
        let needle = term.to_lowercase();
        let expected: Vec<String> = projects
            .iter()
            .filter(|p| p.name.to_lowercase().contains(&needle))
            .map(|p| p.name.clone())
            .collect();
        prop_assert_eq!(names(&filtered), expected);
    }

    #[test]
    fn every_project_matches_its_own_uppercased_name(
        projects in prop::collection::vec(arb_project(), 1..8),
    ) {
        for project in &projects {
            if project.name.trim().is_empty() {
                continue;
            }
            let filtered = filter_projects(&projects, &project.name.to_uppercase());
            prop_assert!(filtered.iter().any(|p| p.name == project.name));
        }
    }

    #[test]
    fn dashboard_counts_are_consistent(projects in prop::collection::vec(arb_project(), 0..12)) {
        let stats = DashboardStats::from_projects(&projects);
        let tasks: Vec<&Task> = projects.iter().flat_map(Project::tasks).collect();
        prop_assert_eq!(stats.total_projects, projects.len());
        prop_assert_eq!(stats.total_tasks, tasks.len());
        prop_assert_eq!(
            stats.completed_tasks,
            tasks.iter().filter(|t| t.status == TaskStatus::Completed).count()
        );
        prop_assert_eq!(stats.completed_tasks + stats.pending_tasks, stats.total_tasks);
    }
}
