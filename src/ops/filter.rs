use regex::Regex;
use serde::Serialize;

use crate::model::task::{Priority, Task, TaskStatus};
use crate::model::tree::TaskNode;
use crate::model::view_state::ExpandState;
use crate::ops::complete::can_complete;
use crate::ops::tree_ops::{FlatRow, build_forest, flatten};

/// Row predicates, combined with logical AND. Unset predicates pass.
#[derive(Debug, Clone, Default)]
pub struct Filters {
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    /// Regex matched against the title
    pub title: Option<Regex>,
}

impl Filters {
    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_title(mut self, pattern: Regex) -> Self {
        self.title = Some(pattern);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.priority.is_none() && self.title.is_none()
    }

    /// Does the task itself pass every predicate?
    pub fn matches(&self, task: &Task) -> bool {
        self.status.is_none_or(|s| task.status == s)
            && self.priority.is_none_or(|p| task.priority == p)
            && self.title.as_ref().is_none_or(|re| re.is_match(&task.title))
    }
}

/// A rendered row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Row {
    pub task: Task,
    pub depth: usize,
    pub has_children: bool,
    pub is_expanded: bool,
    /// Whether a "mark done" control should be enabled
    pub can_complete: bool,
}

/// Keep the rows that should render.
///
/// A row shows only if it passes the filters, its parent row is showing,
/// and that parent is expanded. A filtered-out or collapsed ancestor hides
/// the whole subtree beneath it.
pub fn visible_rows(flat: &[FlatRow<'_>], filters: &Filters, expanded: &ExpandState) -> Vec<Row> {
    // (depth, children of this row may show)
    let mut ancestors: Vec<(usize, bool)> = Vec::new();
    let mut rows = Vec::new();

    for flat_row in flat {
        while ancestors.last().is_some_and(|(d, _)| *d >= flat_row.depth) {
            ancestors.pop();
        }
        let parent_open = ancestors.last().is_none_or(|(_, open)| *open);

        let node = flat_row.node;
        let shown = parent_open && filters.matches(&node.task);
        let is_expanded = node.has_children() && expanded.is_expanded(node.id());
        ancestors.push((flat_row.depth, shown && is_expanded));

        if shown {
            rows.push(Row {
                task: node.task.clone(),
                depth: flat_row.depth,
                has_children: node.has_children(),
                is_expanded,
                can_complete: can_complete(node),
            });
        }
    }
    rows
}

/// Rows for an already-built forest
pub fn rows_for_forest(forest: &[TaskNode], filters: &Filters, expanded: &ExpandState) -> Vec<Row> {
    visible_rows(&flatten(forest), filters, expanded)
}

/// The full pipeline: build the tree, flatten it, then apply visibility
pub fn build_visible_rows(tasks: &[Task], filters: &Filters, expanded: &ExpandState) -> Vec<Row> {
    let forest = build_forest(tasks);
    rows_for_forest(&forest, filters, expanded)
}
