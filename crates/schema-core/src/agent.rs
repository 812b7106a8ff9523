use core::fmt::Debug;

/// Identity of an agent bound to a compiled tree.
///
/// Every piece of per-run state (execution cursor, memory records, local and
/// dynamic blackboard slots) is partitioned by `stable_id`, so the id must not
/// change while the agent stays bound.
pub trait AgentId: Copy + Ord + Eq + Debug {
    fn stable_id(self) -> u64;
}

impl AgentId for u64 {
    fn stable_id(self) -> u64 {
        self
    }
}

impl AgentId for u32 {
    fn stable_id(self) -> u64 {
        self as u64
    }
}

impl AgentId for u16 {
    fn stable_id(self) -> u64 {
        self as u64
    }
}

impl AgentId for usize {
    fn stable_id(self) -> u64 {
        self as u64
    }
}
