use std::any::Any;
use std::collections::BTreeMap;

use schema_core::WorldMut;

use crate::ExecutableTree;

/// Memory of one compiled node for one agent: the node's own record plus
/// one per attached decorator and one for its modifier.
pub struct NodeMemory {
    record: Option<Box<dyn Any>>,
    decorators: Vec<Option<Box<dyn Any>>>,
    modifier: Option<Box<dyn Any>>,
    pub(crate) initialized: bool,
    pub(crate) decorators_initialized: bool,
    sentinel: (),
}

impl NodeMemory {
    fn new<W: WorldMut + 'static>(tree: &ExecutableTree<W>, index: usize) -> Self {
        Self {
            record: tree.action(index).and_then(|a| a.new_memory()),
            decorators: tree
                .decorators_of(index)
                .iter()
                .map(|d| d.conditional.new_memory())
                .collect(),
            modifier: tree.modifier(index).and_then(|m| m.new_memory()),
            initialized: false,
            decorators_initialized: false,
            sentinel: (),
        }
    }

    pub fn record(&mut self) -> &mut dyn Any {
        match self.record.as_deref_mut() {
            Some(record) => record,
            None => &mut self.sentinel,
        }
    }

    pub fn decorator(&mut self, ordinal: usize) -> &mut dyn Any {
        match self.decorators.get_mut(ordinal).and_then(|d| d.as_deref_mut()) {
            Some(record) => record,
            None => &mut self.sentinel,
        }
    }

    pub fn modifier(&mut self) -> &mut dyn Any {
        match self.modifier.as_deref_mut() {
            Some(record) => record,
            None => &mut self.sentinel,
        }
    }

    /// Typed view of the node's own record.
    pub fn downcast<M: 'static>(&mut self) -> Option<&mut M> {
        self.record().downcast_mut::<M>()
    }

    pub fn downcast_modifier<M: 'static>(&mut self) -> Option<&mut M> {
        self.modifier().downcast_mut::<M>()
    }

    /// True when the node declares no record and shares the sentinel.
    pub fn is_sentinel(&self) -> bool {
        self.record.is_none()
    }
}

/// Per-agent node memory for one compiled tree.
///
/// Records are created on first request and kept until the agent is released.
#[derive(Default)]
pub struct MemoryArena {
    agents: BTreeMap<u64, Vec<Option<NodeMemory>>>,
}

impl MemoryArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record and whether it was created by this call.
    pub fn get_or_create<W: WorldMut + 'static>(
        &mut self,
        tree: &ExecutableTree<W>,
        index: usize,
        agent: u64,
    ) -> (&mut NodeMemory, bool) {
        let slots = self.agents.entry(agent).or_default();
        if slots.len() < tree.len() {
            slots.resize_with(tree.len(), || None);
        }
        let created = slots[index].is_none();
        let memory = slots[index].get_or_insert_with(|| NodeMemory::new(tree, index));
        (memory, created)
    }

    pub fn get_mut(&mut self, index: usize, agent: u64) -> Option<&mut NodeMemory> {
        self.agents.get_mut(&agent)?.get_mut(index)?.as_mut()
    }

    pub fn contains(&self, index: usize, agent: u64) -> bool {
        self.agents
            .get(&agent)
            .and_then(|slots| slots.get(index))
            .is_some_and(Option::is_some)
    }

    pub fn release(&mut self, agent: u64) {
        self.agents.remove(&agent);
    }

    pub fn clear(&mut self) {
        self.agents.clear();
    }

    pub fn record_count(&self, agent: u64) -> usize {
        self.agents
            .get(&agent)
            .map_or(0, |slots| slots.iter().filter(|s| s.is_some()).count())
    }
}
