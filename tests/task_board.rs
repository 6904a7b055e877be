//! Project task board behavior under concurrent completion and mixed state.

use std::sync::Arc;

use chrono::{Duration, Utc};
use registry_core::models::{ProjectTaskBoard, TaskItem, TaskPriority, TaskState};
use registry_core::RegistryError;
use tokio_util::sync::CancellationToken;

fn task(name: &str, priority: TaskPriority, due_days: i64) -> TaskItem {
    TaskItem::new(name, priority, Utc::now() + Duration::days(due_days))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_completions_converge() {
    let board = Arc::new(ProjectTaskBoard::new());
    let id = board.add_task(task("release", TaskPriority::High, 2)).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let board = board.clone();
            tokio::spawn(async move { board.mark_completed(id) })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(board.store().get(id).unwrap().state, TaskState::Completed);
}

#[tokio::test]
async fn pending_stream_skips_completed_and_orders_by_priority() {
    let board = ProjectTaskBoard::new();
    board.add_task(task("tidy backlog", TaskPriority::Low, 10)).unwrap();
    let done = board.add_task(task("cut branch", TaskPriority::High, 1)).unwrap();
    board.add_task(task("write notes", TaskPriority::Medium, 4)).unwrap();
    board.add_task(task("fix regression", TaskPriority::High, 1)).unwrap();
    board.mark_completed(done).unwrap();

    let names: Vec<String> = board
        .pending_tasks(CancellationToken::new())
        .collect()
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.name)
        .collect();
    assert_eq!(names, vec!["fix regression", "write notes", "tidy backlog"]);
}

#[tokio::test]
async fn cancelled_pending_stream_reports_cancellation() {
    let board = ProjectTaskBoard::new();
    for i in 0..5 {
        board
            .add_task(task(&format!("task-{i}"), TaskPriority::Medium, 3))
            .unwrap();
    }

    let cancel = CancellationToken::new();
    let mut stream = board.pending_tasks(cancel.clone());
    assert!(stream.next().await.unwrap().is_some());

    cancel.cancel();
    assert!(stream.next().await.unwrap_err().is_cancelled());
}

#[test]
fn summary_reflects_board_state() {
    let board = ProjectTaskBoard::new();
    board.add_task(task("overdue", TaskPriority::High, -3)).unwrap();
    board.add_task(task("on time", TaskPriority::Low, 3)).unwrap();
    let done = board.add_task(task("wrapped up", TaskPriority::Medium, -1)).unwrap();
    board.mark_completed(done).unwrap();

    let summary = board.summary();
    assert_eq!(summary.total, 3);
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.overdue, 1);
}

#[test]
fn blank_task_name_is_rejected() {
    let board = ProjectTaskBoard::new();
    let err = board
        .add_task(task("   ", TaskPriority::Low, 1))
        .unwrap_err();
    assert!(matches!(err, RegistryError::InvalidArgument { .. }));
    assert_eq!(board.summary().total, 0);
}
