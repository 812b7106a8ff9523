use schema_core::WorldMut;

use crate::{ExecutableTree, NodeStatus};

/// Control-flow state of one agent on one compiled tree.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub(crate) cursor: Option<usize>,
    /// Entered nodes from the root down to the cursor.
    pub(crate) active: Vec<usize>,
    pub(crate) last_status: Vec<Option<NodeStatus>>,
    /// Truth value each aborting decorator had when last evaluated.
    pub(crate) guards: Vec<Option<bool>>,
    pub(crate) finished: Option<NodeStatus>,
}

impl ExecutionContext {
    pub fn new<W: WorldMut + 'static>(tree: &ExecutableTree<W>) -> Self {
        Self {
            cursor: None,
            active: Vec::new(),
            last_status: vec![None; tree.len()],
            guards: vec![None; tree.guard_count()],
            finished: None,
        }
    }

    /// Index of the suspended node; `None` when the next tick starts at the root.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn active_path(&self) -> &[usize] {
        &self.active
    }

    pub fn last_status(&self, index: usize) -> Option<NodeStatus> {
        self.last_status.get(index).copied().flatten()
    }

    pub fn guard_value(&self, guard: usize) -> Option<bool> {
        self.guards.get(guard).copied().flatten()
    }

    /// Final status once a single-run tree has completed.
    pub fn finished(&self) -> Option<NodeStatus> {
        self.finished
    }

    pub fn is_running(&self) -> bool {
        self.cursor.is_some()
    }

    /// Forget control-flow state; the next tick starts at the root.
    pub(crate) fn reset(&mut self) {
        self.cursor = None;
        self.active.clear();
        self.last_status.iter_mut().for_each(|s| *s = None);
        self.guards.iter_mut().for_each(|g| *g = None);
        self.finished = None;
    }
}
