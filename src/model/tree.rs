use super::task::{Task, TaskId};

/// A task with its derived children.
///
/// Children are always rebuilt from the flat collection; they are never
/// edited in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskNode {
    pub task: Task,
    pub children: Vec<TaskNode>,
}

impl TaskNode {
    pub fn leaf(task: Task) -> Self {
        TaskNode {
            task,
            children: Vec::new(),
        }
    }

    pub fn id(&self) -> &TaskId {
        &self.task.id
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// All descendants in pre-order (children before later siblings' subtrees)
    pub fn descendants(&self) -> Vec<&TaskNode> {
        let mut out = Vec::new();
        collect_descendants(&self.children, &mut out);
        out
    }

    /// Find a node by id within this subtree (including self)
    pub fn find(&self, id: &TaskId) -> Option<&TaskNode> {
        if self.id() == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }
}

fn collect_descendants<'a>(nodes: &'a [TaskNode], out: &mut Vec<&'a TaskNode>) {
    for node in nodes {
        out.push(node);
        collect_descendants(&node.children, out);
    }
}

/// Find a node anywhere in a forest
pub fn find_node<'a>(forest: &'a [TaskNode], id: &TaskId) -> Option<&'a TaskNode> {
    forest.iter().find_map(|root| root.find(id))
}

/// Visit every node of a forest in pre-order
pub fn for_each_node<'a>(forest: &'a [TaskNode], f: &mut dyn FnMut(&'a TaskNode)) {
    for node in forest {
        f(node);
        for_each_node(&node.children, f);
    }
}
