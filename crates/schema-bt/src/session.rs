//! The owner of all run-time state: compiled trees, the agents bound to them
//! and the global blackboard tier they share.

use std::collections::BTreeMap;
use std::sync::Arc;

use schema_core::{
    AgentId, BlackboardStore, DynamicBinding, EntryId, GlobalBlackboard, TickContext, Value,
    WorldMut,
};
use schema_tools::{NullTraceSink, TraceSink};
use tracing::{debug, warn};

use crate::engine::{self, Env};
use crate::{ExecutableTree, ExecutionContext, MemoryArena, NodeMemory, NodeStatus, RuntimeConfig, RuntimeError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TreeHandle(usize);

impl TreeHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

struct Binding<A> {
    agent: A,
    context: ExecutionContext,
}

struct TreeSlot<W: WorldMut> {
    tree: Arc<ExecutableTree<W>>,
    bindings: BTreeMap<u64, Binding<W::Agent>>,
    memory: MemoryArena,
    store: BlackboardStore,
}

pub struct Session<W: WorldMut> {
    config: RuntimeConfig,
    globals: GlobalBlackboard,
    trees: Vec<TreeSlot<W>>,
    trace: Box<dyn TraceSink>,
}

impl<W: WorldMut + 'static> Default for Session<W> {
    fn default() -> Self {
        Self::with_config(RuntimeConfig::default())
    }
}

impl<W: WorldMut + 'static> Session<W> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: RuntimeConfig) -> Self {
        Self {
            config,
            globals: GlobalBlackboard::new(),
            trees: Vec::new(),
            trace: Box::new(NullTraceSink),
        }
    }

    pub fn with_trace(mut self, sink: impl TraceSink + 'static) -> Self {
        self.trace = Box::new(sink);
        self
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn globals(&self) -> &GlobalBlackboard {
        &self.globals
    }

    pub fn globals_mut(&mut self) -> &mut GlobalBlackboard {
        &mut self.globals
    }

    pub fn add_tree(&mut self, tree: impl Into<Arc<ExecutableTree<W>>>) -> TreeHandle {
        let tree = tree.into();
        debug!(tree = tree.name(), nodes = tree.len(), "tree added to session");
        self.trees.push(TreeSlot {
            tree,
            bindings: BTreeMap::new(),
            memory: MemoryArena::new(),
            store: BlackboardStore::new(),
        });
        TreeHandle(self.trees.len() - 1)
    }

    pub fn tree(&self, handle: TreeHandle) -> Result<&Arc<ExecutableTree<W>>, RuntimeError> {
        self.slot(handle).map(|slot| &slot.tree)
    }

    fn slot(&self, handle: TreeHandle) -> Result<&TreeSlot<W>, RuntimeError> {
        self.trees
            .get(handle.0)
            .ok_or(RuntimeError::UnknownTree(handle.0))
    }

    fn slot_mut(&mut self, handle: TreeHandle) -> Result<&mut TreeSlot<W>, RuntimeError> {
        self.trees
            .get_mut(handle.0)
            .ok_or(RuntimeError::UnknownTree(handle.0))
    }

    /// Swap in a recompiled tree. Every agent bound to the old tree is
    /// unbound first (exit callbacks included) and returned so the host can
    /// rebind it; old indices mean nothing to the new tree.
    pub fn replace_tree(
        &mut self,
        handle: TreeHandle,
        tree: impl Into<Arc<ExecutableTree<W>>>,
        tick: &TickContext,
        world: &mut W,
    ) -> Result<Vec<W::Agent>, RuntimeError> {
        let agents = self.agents(handle)?;
        if !agents.is_empty() {
            warn!(
                tree = self.slot(handle)?.tree.name(),
                agents = agents.len(),
                "replacing tree with bound agents; they must be rebound"
            );
        }
        for agent in &agents {
            self.unbind(handle, *agent, tick, world)?;
        }

        let slot = self.slot_mut(handle)?;
        slot.tree = tree.into();
        slot.memory.clear();
        slot.store.clear();
        Ok(agents)
    }

    pub fn bind(&mut self, handle: TreeHandle, agent: W::Agent) -> Result<(), RuntimeError> {
        let slot = self.slot_mut(handle)?;
        let id = agent.stable_id();
        if slot.bindings.contains_key(&id) {
            return Err(RuntimeError::AlreadyBound(id));
        }
        let context = ExecutionContext::new(&*slot.tree);
        slot.bindings.insert(id, Binding { agent, context });
        debug!(agent = id, tree = slot.tree.name(), "agent bound");
        Ok(())
    }

    pub fn is_bound(&self, handle: TreeHandle, agent: W::Agent) -> bool {
        self.slot(handle)
            .is_ok_and(|slot| slot.bindings.contains_key(&agent.stable_id()))
    }

    /// Agents bound to `handle`, ordered by stable id.
    pub fn agents(&self, handle: TreeHandle) -> Result<Vec<W::Agent>, RuntimeError> {
        Ok(self
            .slot(handle)?
            .bindings
            .values()
            .map(|b| b.agent)
            .collect())
    }

    /// Split borrows of one binding's state into an engine [`Env`] plus the
    /// binding's execution context.
    fn env_for<'s>(
        &'s mut self,
        handle: TreeHandle,
        agent: W::Agent,
        tick: &'s TickContext,
        world: &'s mut W,
    ) -> Result<(Env<'s, W>, &'s mut ExecutionContext), RuntimeError> {
        let id = agent.stable_id();
        let Session {
            config,
            globals,
            trees,
            trace,
        } = self;
        let slot = trees
            .get_mut(handle.0)
            .ok_or(RuntimeError::UnknownTree(handle.0))?;
        let binding = slot
            .bindings
            .get_mut(&id)
            .ok_or(RuntimeError::UnboundAgent(id))?;
        let env = Env {
            tree: &slot.tree,
            memory: &mut slot.memory,
            store: &mut slot.store,
            globals,
            trace: trace.as_mut(),
            config,
            tick,
            agent: binding.agent,
            world,
        };
        Ok((env, &mut binding.context))
    }

    /// Exit every node on the agent's active path (bottom-up), then release
    /// its context, memory records and local/dynamic blackboard slots.
    pub fn unbind(
        &mut self,
        handle: TreeHandle,
        agent: W::Agent,
        tick: &TickContext,
        world: &mut W,
    ) -> Result<(), RuntimeError> {
        let id = agent.stable_id();
        {
            let (mut env, context) = self.env_for(handle, agent, tick, world)?;
            engine::unwind(&mut env, context, None);
        }

        let slot = self.slot_mut(handle)?;
        slot.bindings.remove(&id);
        slot.memory.release(id);
        slot.store.release(id);
        debug!(agent = id, tree = slot.tree.name(), "agent unbound");
        Ok(())
    }

    /// Advance one agent by one frame.
    pub fn tick(
        &mut self,
        handle: TreeHandle,
        agent: W::Agent,
        tick: &TickContext,
        world: &mut W,
    ) -> Result<NodeStatus, RuntimeError> {
        let (mut env, context) = self.env_for(handle, agent, tick, world)?;
        Ok(engine::tick(&mut env, context))
    }

    /// Tick every agent bound to `handle` once, in stable id order.
    pub fn tick_all(
        &mut self,
        handle: TreeHandle,
        tick: &TickContext,
        world: &mut W,
    ) -> Result<Vec<(W::Agent, NodeStatus)>, RuntimeError> {
        let agents = self.agents(handle)?;
        let mut results = Vec::with_capacity(agents.len());
        for agent in agents {
            let status = self.tick(handle, agent, tick, world)?;
            results.push((agent, status));
        }
        Ok(results)
    }

    /// Abandon the agent's current pass: exit its active path and start over
    /// at the root on the next tick. Memory records are kept.
    pub fn restart(
        &mut self,
        handle: TreeHandle,
        agent: W::Agent,
        tick: &TickContext,
        world: &mut W,
    ) -> Result<(), RuntimeError> {
        let (mut env, context) = self.env_for(handle, agent, tick, world)?;
        engine::unwind(&mut env, context, None);
        context.reset();
        Ok(())
    }

    pub fn context(&self, handle: TreeHandle, agent: W::Agent) -> Option<&ExecutionContext> {
        let slot = self.slot(handle).ok()?;
        slot.bindings.get(&agent.stable_id()).map(|b| &b.context)
    }

    pub fn cursor(&self, handle: TreeHandle, agent: W::Agent) -> Option<usize> {
        self.context(handle, agent)?.cursor()
    }

    /// Last status the agent observed for the node at `index`.
    pub fn status(&self, handle: TreeHandle, agent: W::Agent, index: usize) -> Option<NodeStatus> {
        self.context(handle, agent)?.last_status(index)
    }

    pub fn memory(
        &mut self,
        handle: TreeHandle,
        agent: W::Agent,
        index: usize,
    ) -> Option<&mut NodeMemory> {
        self.slot_mut(handle)
            .ok()?
            .memory
            .get_mut(index, agent.stable_id())
    }

    pub fn memory_record_count(&self, handle: TreeHandle, agent: W::Agent) -> usize {
        self.slot(handle)
            .map_or(0, |slot| slot.memory.record_count(agent.stable_id()))
    }

    /// Read an entry as `agent` sees it: the tree's own entries first, then
    /// the global tier.
    pub fn get_value(
        &mut self,
        handle: TreeHandle,
        agent: W::Agent,
        id: EntryId,
    ) -> Result<Value, RuntimeError> {
        let Session { globals, trees, .. } = self;
        let slot = trees
            .get_mut(handle.0)
            .ok_or(RuntimeError::UnknownTree(handle.0))?;
        Ok(slot
            .store
            .get(slot.tree.blackboard(), globals, id, agent.stable_id())?)
    }

    pub fn set_value(
        &mut self,
        handle: TreeHandle,
        agent: W::Agent,
        id: EntryId,
        value: impl Into<Value>,
    ) -> Result<(), RuntimeError> {
        let Session { globals, trees, .. } = self;
        let slot = trees
            .get_mut(handle.0)
            .ok_or(RuntimeError::UnknownTree(handle.0))?;
        Ok(slot.store.set(
            slot.tree.blackboard(),
            globals,
            id,
            agent.stable_id(),
            value.into(),
        )?)
    }

    /// Inspect a dynamic binding without scope checks or eviction.
    pub fn dynamic_binding(
        &self,
        handle: TreeHandle,
        agent: W::Agent,
        name: &str,
    ) -> Option<&DynamicBinding> {
        self.slot(handle)
            .ok()?
            .store
            .dynamic_binding(agent.stable_id(), name)
    }
}
