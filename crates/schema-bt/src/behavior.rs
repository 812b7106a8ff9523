//! Leaf behavior traits and the registry they are plugged into by id.
//!
//! Implementations are stateless templates shared by every agent; anything
//! that must survive between calls lives in the associated `Memory` record,
//! which the runtime allocates per (node, agent) with `Default`.

use std::any::{Any, TypeId};
use std::collections::BTreeMap;
use std::sync::Arc;

use schema_core::{BlackboardView, TickContext, WorldMut, WorldView};

use crate::{BehaviorId, Message, NodeStatus};

/// Everything a leaf callback may touch besides its own memory record.
pub struct NodeContext<'a, W: WorldView> {
    pub tick: &'a TickContext,
    pub agent: W::Agent,
    pub world: &'a mut W,
    pub blackboard: BlackboardView<'a>,
    /// Compiled index of the node the callback runs for.
    pub node: usize,
}

pub trait Action<W: WorldMut>: Send + Sync + 'static {
    type Memory: Default + 'static;

    /// Once per (node, agent), before the first `on_node_enter`.
    fn on_initialize(&self, _memory: &mut Self::Memory, _cx: &mut NodeContext<'_, W>) {}

    fn on_node_enter(&self, _memory: &mut Self::Memory, _cx: &mut NodeContext<'_, W>) {}

    /// Runs whenever control leaves the node, including through aborts and unbind.
    fn on_node_exit(&self, _memory: &mut Self::Memory, _cx: &mut NodeContext<'_, W>) {}

    fn tick(&self, memory: &mut Self::Memory, cx: &mut NodeContext<'_, W>) -> NodeStatus;
}

pub trait Conditional<W: WorldMut>: Send + Sync + 'static {
    type Memory: Default + 'static;

    fn on_initialize(&self, _memory: &mut Self::Memory, _cx: &mut NodeContext<'_, W>) {}

    fn evaluate(&self, memory: &mut Self::Memory, cx: &mut NodeContext<'_, W>) -> bool;
}

pub trait Modifier<W: WorldMut>: Send + Sync + 'static {
    type Memory: Default + 'static;

    /// Runs when the node is entered through its gate. Re-entries caused by
    /// [`Message::Repeat`] skip it.
    fn on_node_enter(&self, _memory: &mut Self::Memory, _cx: &mut NodeContext<'_, W>) {}

    /// Only called with terminal statuses.
    fn modify(
        &self,
        memory: &mut Self::Memory,
        cx: &mut NodeContext<'_, W>,
        status: NodeStatus,
    ) -> Message;
}

/// `None` for memoryless behaviors; those share the arena's sentinel record.
fn memory_record<M: Default + 'static>() -> Option<Box<dyn Any>> {
    if TypeId::of::<M>() == TypeId::of::<()>() {
        None
    } else {
        Some(Box::new(M::default()))
    }
}

pub(crate) trait ErasedAction<W: WorldMut>: Send + Sync {
    fn new_memory(&self) -> Option<Box<dyn Any>>;
    fn initialize(&self, memory: &mut dyn Any, cx: &mut NodeContext<'_, W>);
    fn enter(&self, memory: &mut dyn Any, cx: &mut NodeContext<'_, W>);
    fn exit(&self, memory: &mut dyn Any, cx: &mut NodeContext<'_, W>);
    fn tick(&self, memory: &mut dyn Any, cx: &mut NodeContext<'_, W>) -> NodeStatus;
}

impl<W, A> ErasedAction<W> for A
where
    W: WorldMut,
    A: Action<W>,
{
    fn new_memory(&self) -> Option<Box<dyn Any>> {
        memory_record::<A::Memory>()
    }

    fn initialize(&self, memory: &mut dyn Any, cx: &mut NodeContext<'_, W>) {
        if let Some(memory) = memory.downcast_mut::<A::Memory>() {
            <A as Action<W>>::on_initialize(self, memory, cx);
        }
    }

    fn enter(&self, memory: &mut dyn Any, cx: &mut NodeContext<'_, W>) {
        if let Some(memory) = memory.downcast_mut::<A::Memory>() {
            <A as Action<W>>::on_node_enter(self, memory, cx);
        }
    }

    fn exit(&self, memory: &mut dyn Any, cx: &mut NodeContext<'_, W>) {
        if let Some(memory) = memory.downcast_mut::<A::Memory>() {
            <A as Action<W>>::on_node_exit(self, memory, cx);
        }
    }

    fn tick(&self, memory: &mut dyn Any, cx: &mut NodeContext<'_, W>) -> NodeStatus {
        match memory.downcast_mut::<A::Memory>() {
            Some(memory) => <A as Action<W>>::tick(self, memory, cx),
            None => NodeStatus::Failure,
        }
    }
}

pub(crate) trait ErasedConditional<W: WorldMut>: Send + Sync {
    fn new_memory(&self) -> Option<Box<dyn Any>>;
    fn initialize(&self, memory: &mut dyn Any, cx: &mut NodeContext<'_, W>);
    fn evaluate(&self, memory: &mut dyn Any, cx: &mut NodeContext<'_, W>) -> bool;
}

impl<W, C> ErasedConditional<W> for C
where
    W: WorldMut,
    C: Conditional<W>,
{
    fn new_memory(&self) -> Option<Box<dyn Any>> {
        memory_record::<C::Memory>()
    }

    fn initialize(&self, memory: &mut dyn Any, cx: &mut NodeContext<'_, W>) {
        if let Some(memory) = memory.downcast_mut::<C::Memory>() {
            <C as Conditional<W>>::on_initialize(self, memory, cx);
        }
    }

    fn evaluate(&self, memory: &mut dyn Any, cx: &mut NodeContext<'_, W>) -> bool {
        memory
            .downcast_mut::<C::Memory>()
            .is_some_and(|memory| <C as Conditional<W>>::evaluate(self, memory, cx))
    }
}

pub(crate) trait ErasedModifier<W: WorldMut>: Send + Sync {
    fn new_memory(&self) -> Option<Box<dyn Any>>;
    fn enter(&self, memory: &mut dyn Any, cx: &mut NodeContext<'_, W>);
    fn modify(&self, memory: &mut dyn Any, cx: &mut NodeContext<'_, W>, status: NodeStatus)
        -> Message;
}

impl<W, M> ErasedModifier<W> for M
where
    W: WorldMut,
    M: Modifier<W>,
{
    fn new_memory(&self) -> Option<Box<dyn Any>> {
        memory_record::<M::Memory>()
    }

    fn enter(&self, memory: &mut dyn Any, cx: &mut NodeContext<'_, W>) {
        if let Some(memory) = memory.downcast_mut::<M::Memory>() {
            <M as Modifier<W>>::on_node_enter(self, memory, cx);
        }
    }

    fn modify(
        &self,
        memory: &mut dyn Any,
        cx: &mut NodeContext<'_, W>,
        status: NodeStatus,
    ) -> Message {
        match memory.downcast_mut::<M::Memory>() {
            Some(memory) => <M as Modifier<W>>::modify(self, memory, cx, status),
            None => Message::Continue,
        }
    }
}

/// Leaf implementations by id, one table per role.
pub struct BehaviorRegistry<W: WorldMut> {
    actions: BTreeMap<BehaviorId, Arc<dyn ErasedAction<W>>>,
    conditionals: BTreeMap<BehaviorId, Arc<dyn ErasedConditional<W>>>,
    modifiers: BTreeMap<BehaviorId, Arc<dyn ErasedModifier<W>>>,
}

impl<W: WorldMut + 'static> Default for BehaviorRegistry<W> {
    fn default() -> Self {
        Self {
            actions: BTreeMap::new(),
            conditionals: BTreeMap::new(),
            modifiers: BTreeMap::new(),
        }
    }
}

impl<W: WorldMut + 'static> BehaviorRegistry<W> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_action(&mut self, id: impl Into<BehaviorId>, action: impl Action<W>) -> &mut Self {
        self.actions.insert(id.into(), Arc::new(action));
        self
    }

    pub fn register_conditional(
        &mut self,
        id: impl Into<BehaviorId>,
        conditional: impl Conditional<W>,
    ) -> &mut Self {
        self.conditionals.insert(id.into(), Arc::new(conditional));
        self
    }

    pub fn register_modifier(
        &mut self,
        id: impl Into<BehaviorId>,
        modifier: impl Modifier<W>,
    ) -> &mut Self {
        self.modifiers.insert(id.into(), Arc::new(modifier));
        self
    }

    pub fn with_action(mut self, id: impl Into<BehaviorId>, action: impl Action<W>) -> Self {
        self.register_action(id, action);
        self
    }

    pub fn with_conditional(
        mut self,
        id: impl Into<BehaviorId>,
        conditional: impl Conditional<W>,
    ) -> Self {
        self.register_conditional(id, conditional);
        self
    }

    pub fn with_modifier(mut self, id: impl Into<BehaviorId>, modifier: impl Modifier<W>) -> Self {
        self.register_modifier(id, modifier);
        self
    }

    pub fn has_action(&self, id: &BehaviorId) -> bool {
        self.actions.contains_key(id)
    }

    pub fn has_conditional(&self, id: &BehaviorId) -> bool {
        self.conditionals.contains_key(id)
    }

    pub fn has_modifier(&self, id: &BehaviorId) -> bool {
        self.modifiers.contains_key(id)
    }

    pub(crate) fn action(&self, id: &BehaviorId) -> Option<Arc<dyn ErasedAction<W>>> {
        self.actions.get(id).cloned()
    }

    pub(crate) fn conditional(&self, id: &BehaviorId) -> Option<Arc<dyn ErasedConditional<W>>> {
        self.conditionals.get(id).cloned()
    }

    pub(crate) fn modifier(&self, id: &BehaviorId) -> Option<Arc<dyn ErasedModifier<W>>> {
        self.modifiers.get(id).cloned()
    }
}
