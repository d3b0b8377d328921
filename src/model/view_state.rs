use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::task::TaskId;
use super::tree::{TaskNode, for_each_node};

/// Expand/collapse state for one view. Ids not present are collapsed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpandState {
    #[serde(default)]
    expanded: HashSet<TaskId>,
}

impl ExpandState {
    pub fn is_expanded(&self, id: &TaskId) -> bool {
        self.expanded.contains(id)
    }

    pub fn expand(&mut self, id: TaskId) {
        self.expanded.insert(id);
    }

    pub fn collapse(&mut self, id: &TaskId) {
        self.expanded.remove(id);
    }

    /// Flip the state of `id`; returns the new expanded flag
    pub fn toggle(&mut self, id: &TaskId) -> bool {
        if self.expanded.remove(id) {
            false
        } else {
            self.expanded.insert(id.clone());
            true
        }
    }

    /// Expand every node that has children
    pub fn expand_all(&mut self, forest: &[TaskNode]) {
        for_each_node(forest, &mut |node| {
            if node.has_children() {
                self.expanded.insert(node.id().clone());
            }
        });
    }

    pub fn collapse_all(&mut self) {
        self.expanded.clear();
    }
}

/// Tasks picked for a bulk action
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: HashSet<TaskId>,
}

impl Selection {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.ids.contains(id)
    }

    pub fn select(&mut self, id: TaskId) {
        self.ids.insert(id);
    }

    pub fn deselect(&mut self, id: &TaskId) {
        self.ids.remove(id);
    }

    pub fn toggle(&mut self, id: &TaskId) {
        if !self.ids.remove(id) {
            self.ids.insert(id.clone());
        }
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Selected nodes in forest pre-order. Ids no longer in the forest are skipped.
    pub fn resolve<'a>(&self, forest: &'a [TaskNode]) -> Vec<&'a TaskNode> {
        let mut out = Vec::new();
        for_each_node(forest, &mut |node| {
            if self.ids.contains(node.id()) {
                out.push(node);
            }
        });
        out
    }
}

impl FromIterator<TaskId> for Selection {
    fn from_iter<I: IntoIterator<Item = TaskId>>(iter: I) -> Self {
        Selection {
            ids: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::task::Task;
    use crate::ops::tree_ops::build_forest;

    #[test]
    fn toggle_flips() {
        let mut state = ExpandState::default();
        let id = TaskId::from(1);
        assert!(!state.is_expanded(&id));
        assert!(state.toggle(&id));
        assert!(state.is_expanded(&id));
        assert!(!state.toggle(&id));
        assert!(!state.is_expanded(&id));
    }

    #[test]
    fn expand_all_only_marks_parents() {
        let forest = build_forest(&[
            Task::new(1, "Parent"),
            Task::new(2, "Child").with_parent(1),
            Task::new(3, "Leaf"),
        ]);
        let mut state = ExpandState::default();
        state.expand_all(&forest);
        assert!(state.is_expanded(&TaskId::from(1)));
        assert!(!state.is_expanded(&TaskId::from(2)));
        assert!(!state.is_expanded(&TaskId::from(3)));

        state.collapse_all();
        assert!(!state.is_expanded(&TaskId::from(1)));
    }

    #[test]
    fn selection_resolves_in_tree_order() {
        let forest = build_forest(&[
            Task::new(1, "Parent"),
            Task::new(2, "Child").with_parent(1),
            Task::new(3, "Leaf"),
        ]);
        let selection: Selection = [TaskId::from(3), TaskId::from(2), TaskId::from(42)]
            .into_iter()
            .collect();
        let ids: Vec<&str> = selection
            .resolve(&forest)
            .iter()
            .map(|n| n.id().as_str())
            .collect();
        assert_eq!(ids, vec!["2", "3"]);
    }
}
