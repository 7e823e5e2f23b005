//! Task board ordering
//!
//! Tasks sort by status column (todo, in progress, review, done), then by
//! priority (high first), then by due date with undated tasks last, then by
//! creation time. Ties fall back to the id so the order is total.
//!
//! The same order exists twice: [`TASK_BOARD_ORDER_SQL`] for queries and
//! [`compare_tasks`] for rows already in memory. The two must agree.

use std::cmp::Ordering;

use crate::models::task::{Task, TaskListItem, TaskPriority, TaskStatus};

/// `ORDER BY` body for a query that aliases `tasks` as `t`
pub const TASK_BOARD_ORDER_SQL: &str = "CASE t.status \
        WHEN 'todo' THEN 0 WHEN 'in_progress' THEN 1 WHEN 'review' THEN 2 ELSE 3 END, \
    CASE t.priority WHEN 'high' THEN 0 WHEN 'medium' THEN 1 ELSE 2 END, \
    t.due_date ASC NULLS LAST, \
    t.created_at ASC, \
    t.id ASC";

pub fn status_rank(status: TaskStatus) -> u8 {
    match status {
        TaskStatus::Todo => 0,
        TaskStatus::InProgress => 1,
        TaskStatus::Review => 2,
        TaskStatus::Done => 3,
    }
}

pub fn priority_rank(priority: TaskPriority) -> u8 {
    match priority {
        TaskPriority::High => 0,
        TaskPriority::Medium => 1,
        TaskPriority::Low => 2,
    }
}

pub fn compare_tasks(a: &Task, b: &Task) -> Ordering {
    status_rank(a.status)
        .cmp(&status_rank(b.status))
        .then_with(|| priority_rank(a.priority).cmp(&priority_rank(b.priority)))
        .then_with(|| match (a.due_date, b.due_date) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        })
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

impl AsRef<Task> for Task {
    fn as_ref(&self) -> &Task {
        self
    }
}

impl AsRef<Task> for TaskListItem {
    fn as_ref(&self) -> &Task {
        &self.task
    }
}

/// Sorts tasks, or rows wrapping a task, into board order
pub fn sort_tasks<T: AsRef<Task>>(tasks: &mut [T]) {
    tasks.sort_by(|a, b| compare_tasks(a.as_ref(), b.as_ref()));
}
