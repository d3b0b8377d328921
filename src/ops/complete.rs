use crate::model::task::{Task, TaskId, TaskStatus};
use crate::model::tree::TaskNode;

/// Can `node` move to DONE? True for leaves, or when every direct child
/// is already DONE. Deeper levels are covered by induction: a child can
/// only be DONE if its own children were.
pub fn can_complete(node: &TaskNode) -> bool {
    node.children.iter().all(|c| c.task.status == TaskStatus::Done)
}

/// Direct children that stop `node` from being completed
pub fn blocking_children(node: &TaskNode) -> Vec<&Task> {
    node.children
        .iter()
        .map(|c| &c.task)
        .filter(|t| t.status != TaskStatus::Done)
        .collect()
}

/// [`can_complete`] against a flat collection, without building a tree.
/// An unknown id has no children and so can complete.
pub fn can_complete_in(tasks: &[Task], id: &TaskId) -> bool {
    tasks
        .iter()
        .filter(|t| t.parent_id.as_ref() == Some(id) && &t.id != id)
        .all(|t| t.status == TaskStatus::Done)
}
