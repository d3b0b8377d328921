use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;

use crate::model::task::{Task, TaskId};
use crate::model::tree::TaskNode;

/// Default nesting guard for [`build_forest`]
pub const DEFAULT_MAX_DEPTH: usize = 64;

// ---------------------------------------------------------------------------
// Tree building
// ---------------------------------------------------------------------------

/// Build a forest of root tasks from a flat collection.
///
/// Children keep their input order. Dangling or self-referencing parents
/// become roots. Tasks caught in a cycle are promoted to roots one at a
/// time, so every distinct id appears exactly once in the output.
pub fn build_forest(tasks: &[Task]) -> Vec<TaskNode> {
    build_forest_bounded(tasks, DEFAULT_MAX_DEPTH)
}

/// [`build_forest`] with an explicit nesting limit. Subtrees deeper than
/// `max_depth` are cut and their tasks promoted to roots.
pub fn build_forest_bounded(tasks: &[Task], max_depth: usize) -> Vec<TaskNode> {
    let mut by_id: IndexMap<&TaskId, &Task> = IndexMap::with_capacity(tasks.len());
    for task in tasks {
        if by_id.contains_key(&task.id) {
            tracing::warn!(id = %task.id, "duplicate task id, keeping first occurrence");
            continue;
        }
        by_id.insert(&task.id, task);
    }

    let mut children_of: HashMap<&TaskId, Vec<&Task>> = HashMap::new();
    let mut roots: Vec<&Task> = Vec::new();
    for task in by_id.values().copied() {
        match &task.parent_id {
            None => roots.push(task),
            Some(parent) if parent == &task.id => {
                tracing::warn!(id = %task.id, "task is its own parent, treating as root");
                roots.push(task);
            }
            Some(parent) if by_id.contains_key(parent) => {
                children_of.entry(parent).or_default().push(task);
            }
            Some(parent) => {
                tracing::warn!(id = %task.id, parent = %parent, "dangling parent reference, treating as root");
                roots.push(task);
            }
        }
    }

    let mut builder = Builder {
        children_of: &children_of,
        placed: HashSet::with_capacity(by_id.len()),
        max_depth,
    };

    let mut forest: Vec<TaskNode> = roots.into_iter().map(|t| builder.attach(t, 0)).collect();

    // Anything left over is unreachable from a root: a cycle, or cut by the depth guard
    for task in by_id.values().copied() {
        if !builder.placed.contains(&task.id) {
            tracing::warn!(id = %task.id, "task unreachable from any root (cycle or depth limit), promoting to root");
            forest.push(builder.attach(task, 0));
        }
    }

    forest
}

struct Builder<'a> {
    children_of: &'a HashMap<&'a TaskId, Vec<&'a Task>>,
    placed: HashSet<TaskId>,
    max_depth: usize,
}

impl Builder<'_> {
    fn attach(&mut self, task: &Task, depth: usize) -> TaskNode {
        self.placed.insert(task.id.clone());
        let mut node = TaskNode::leaf(task.clone());
        if depth >= self.max_depth {
            return node;
        }
        let children_of = self.children_of;
        if let Some(kids) = children_of.get(&task.id) {
            for child in kids {
                if self.placed.contains(&child.id) {
                    continue;
                }
                node.children.push(self.attach(child, depth + 1));
            }
        }
        node
    }
}

// ---------------------------------------------------------------------------
// Flattening
// ---------------------------------------------------------------------------

/// One task in pre-order with its nesting depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatRow<'a> {
    pub node: &'a TaskNode,
    /// 0 for roots
    pub depth: usize,
}

impl<'a> FlatRow<'a> {
    pub fn task(&self) -> &'a Task {
        &self.node.task
    }
}

/// Pre-order depth-first walk: each node before its children, each child
/// subtree complete before the next sibling.
pub fn flatten(forest: &[TaskNode]) -> Vec<FlatRow<'_>> {
    let mut rows = Vec::new();
    flatten_inner(forest, 0, &mut rows);
    rows
}

fn flatten_inner<'a>(nodes: &'a [TaskNode], depth: usize, rows: &mut Vec<FlatRow<'a>>) {
    for node in nodes {
        rows.push(FlatRow { node, depth });
        flatten_inner(&node.children, depth + 1, rows);
    }
}
