use serde::Serialize;

use crate::model::task::{Priority, Task, TaskId, TaskStatus};
use crate::ops::bulk::BulkSummary;
use crate::ops::filter::Row;
use crate::sync::reconcile::Column;
use crate::util::text::fit_to_width;

/// Width of one board column, including the gap
pub const BOARD_COLUMN_WIDTH: usize = 28;

// ---------------------------------------------------------------------------
// JSON output structs
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowJson {
    pub id: TaskId,
    pub title: String,
    pub status: TaskStatus,
    pub priority: Priority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<TaskId>,
    pub depth: usize,
    pub has_children: bool,
    pub expanded: bool,
    pub can_complete: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckJson {
    pub id: TaskId,
    pub can_complete: bool,
    pub blocking: Vec<TaskId>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkJson {
    pub success: usize,
    pub failure: usize,
    pub skipped: usize,
    pub failed: Vec<TaskId>,
}

pub fn row_to_json(row: &Row) -> RowJson {
    RowJson {
        id: row.task.id.clone(),
        title: row.task.title.clone(),
        status: row.task.status,
        priority: row.task.priority,
        parent_id: row.task.parent_id.clone(),
        depth: row.depth,
        has_children: row.has_children,
        expanded: row.is_expanded,
        can_complete: row.can_complete,
    }
}

pub fn bulk_to_json(summary: &BulkSummary) -> BulkJson {
    BulkJson {
        success: summary.success_count,
        failure: summary.failure_count,
        skipped: summary.skipped_count,
        failed: summary.failures.iter().map(|(id, _)| id.clone()).collect(),
    }
}

// ---------------------------------------------------------------------------
// Text formatting
// ---------------------------------------------------------------------------

fn status_box(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Todo => "[ ]",
        TaskStatus::InProgress => "[>]",
        TaskStatus::Done => "[x]",
    }
}

/// `[ ] 3 Title`, with a priority flag for HIGH and URGENT
pub fn format_task_line(task: &Task) -> String {
    let mut line = format!("{} {} {}", status_box(task.status), task.id, task.title);
    if task.priority >= Priority::High {
        line.push_str(&format!(" !{}", task.priority.as_str().to_lowercase()));
    }
    line
}

/// One tree row: indentation, expand marker, then the task line
pub fn format_row(row: &Row) -> String {
    let marker = match (row.has_children, row.is_expanded) {
        (false, _) => "  ",
        (true, false) => "\u{25b8} ",
        (true, true) => "\u{25be} ",
    };
    format!(
        "{}{}{}",
        "  ".repeat(row.depth),
        marker,
        format_task_line(&row.task)
    )
}

pub fn format_rows(rows: &[Row]) -> String {
    rows.iter().map(format_row).collect::<Vec<_>>().join("\n")
}

/// Columns side by side, one task per line
pub fn format_board(columns: &[Column]) -> String {
    let cell = BOARD_COLUMN_WIDTH - 2;
    let height = columns.iter().map(|c| c.tasks.len()).max().unwrap_or(0);

    let mut lines = Vec::with_capacity(height + 1);
    let header: String = columns
        .iter()
        .map(|c| format!("{}  ", fit_to_width(&format!("{} ({})", c.status, c.tasks.len()), cell)))
        .collect();
    lines.push(header.trim_end().to_string());

    for i in 0..height {
        let line: String = columns
            .iter()
            .map(|c| {
                let text = c.tasks.get(i).map(format_task_line).unwrap_or_default();
                format!("{}  ", fit_to_width(&text, cell))
            })
            .collect();
        lines.push(line.trim_end().to_string());
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::view_state::ExpandState;
    use crate::ops::filter::{Filters, build_visible_rows};
    use crate::sync::reconcile::Reconciler;
    use insta::assert_snapshot;

    fn tasks() -> Vec<Task> {
        vec![
            Task::new(1, "Plan release"),
            Task::new(2, "Write notes").with_parent(1).with_status(TaskStatus::Done),
            Task::new(3, "Tag build").with_parent(1).with_priority(Priority::High),
            Task::new(4, "Fix login bug")
                .with_priority(Priority::Urgent)
                .with_status(TaskStatus::InProgress),
            Task::new(5, "Repro").with_parent(4),
        ]
    }

    #[test]
    fn rows_collapsed() {
        let rows = build_visible_rows(&tasks(), &Filters::default(), &ExpandState::default());
        assert_snapshot!(format_rows(&rows), @r"
        ▸ [ ] 1 Plan release
        ▸ [>] 4 Fix login bug !urgent
        ");
    }

    #[test]
    fn rows_expanded() {
        let mut expanded = ExpandState::default();
        expanded.expand(TaskId::from(1));
        let rows = build_visible_rows(&tasks(), &Filters::default(), &expanded);
        assert_snapshot!(format_rows(&rows), @r"
        ▾ [ ] 1 Plan release
            [x] 2 Write notes
            [ ] 3 Tag build !high
        ▸ [>] 4 Fix login bug !urgent
        ");
    }

    #[test]
    fn board_columns() {
        let mut r = Reconciler::new(64);
        r.apply_snapshot(tasks());
        assert_snapshot!(format_board(&r.board()), @r"
        TODO (3)                    IN_PROGRESS (1)             DONE (1)
        [ ] 1 Plan release          [>] 4 Fix login bug !urge…  [x] 2 Write notes
        [ ] 3 Tag build !high
        [ ] 5 Repro
        ");
    }

    #[test]
    fn row_json_shape() {
        let rows = build_visible_rows(&tasks(), &Filters::default(), &ExpandState::default());
        let json = serde_json::to_value(row_to_json(&rows[0])).unwrap();
        assert_eq!(json["id"], "1");
        assert_eq!(json["status"], "TODO");
        assert_eq!(json["hasChildren"], true);
        assert_eq!(json["canComplete"], false);
        assert!(json.get("parentId").is_none());
    }
}
