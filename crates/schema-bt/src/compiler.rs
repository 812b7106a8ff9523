//! Flattens a [`TreeModel`] into the index-addressed [`ExecutableTree`] every
//! agent ticks against.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use schema_core::{Blackboard, DynamicScope, WorldMut};
use tracing::debug;

use crate::behavior::{ErasedAction, ErasedConditional, ErasedModifier};
use crate::modifier::{ForceStatus, Loop, LoopForever, LoopUntil};
use crate::{
    AbortsType, BehaviorId, BehaviorRegistry, BehaviorRole, CompileError, FlowKind, ModifierKind,
    NodeId, NodeKind, TreeModel,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutableKind {
    Flow(FlowKind),
    Action,
}

#[derive(Debug, Clone)]
pub struct ExecutableNode {
    pub index: usize,
    pub parent: Option<usize>,
    /// Subtree size including the node itself.
    pub breadth: usize,
    /// `index + 1`; lower means evaluated earlier.
    pub priority: u32,
    pub id: NodeId,
    pub name: String,
    pub kind: ExecutableKind,
    pub behavior: Option<BehaviorId>,
    pub children: Vec<usize>,
    /// Ordinal among the parent's children.
    pub position: usize,
    decorators: (usize, usize),
}

impl ExecutableNode {
    pub fn contains(&self, index: usize) -> bool {
        index >= self.index && index < self.index + self.breadth
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, ExecutableKind::Action)
    }

    pub fn decorator_count(&self) -> usize {
        self.decorators.1 - self.decorators.0
    }
}

pub(crate) struct CompiledDecorator<W: WorldMut> {
    pub node: usize,
    /// Position among the node's decorators; indexes its memory record.
    pub ordinal: usize,
    pub aborts: AbortsType,
    pub invert: bool,
    /// Slot in the execution context's recorded guard values, if the
    /// decorator can abort.
    pub guard: Option<usize>,
    pub conditional: Arc<dyn ErasedConditional<W>>,
}

/// Compiled, immutable tree shared by every agent bound to it.
pub struct ExecutableTree<W: WorldMut> {
    name: String,
    nodes: Vec<ExecutableNode>,
    lookup: BTreeMap<NodeId, usize>,
    actions: Vec<Option<Arc<dyn ErasedAction<W>>>>,
    decorators: Vec<CompiledDecorator<W>>,
    guards: Vec<usize>,
    modifiers: Vec<Option<Arc<dyn ErasedModifier<W>>>>,
    blackboard: Blackboard,
}

impl<W: WorldMut + 'static> ExecutableTree<W> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nodes(&self) -> &[ExecutableNode] {
        &self.nodes
    }

    pub fn node(&self, index: usize) -> Option<&ExecutableNode> {
        self.nodes.get(index)
    }

    pub fn index_of(&self, id: &NodeId) -> Option<usize> {
        self.lookup.get(id).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> usize {
        0
    }

    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    /// Whether `node` lies in the subtree rooted at `ancestor` (itself included).
    pub fn is_descendant(&self, node: usize, ancestor: usize) -> bool {
        self.nodes
            .get(ancestor)
            .is_some_and(|a| a.contains(node))
    }

    /// Range a dynamic variable declared by `index` stays visible in: the
    /// declaring node's parent composite, or the whole tree at the root.
    pub fn dynamic_scope(&self, index: usize) -> DynamicScope {
        let owner = self
            .nodes
            .get(index)
            .and_then(|n| n.parent)
            .unwrap_or(0);
        let breadth = self.nodes.get(owner).map_or(0, |n| n.breadth);
        DynamicScope::new(owner, breadth)
    }

    /// Number of decorators that can abort; sizes per-agent guard records.
    pub fn guard_count(&self) -> usize {
        self.guards.len()
    }

    pub(crate) fn action(&self, index: usize) -> Option<&Arc<dyn ErasedAction<W>>> {
        self.actions.get(index).and_then(Option::as_ref)
    }

    pub(crate) fn modifier(&self, index: usize) -> Option<&Arc<dyn ErasedModifier<W>>> {
        self.modifiers.get(index).and_then(Option::as_ref)
    }

    pub(crate) fn decorators_of(&self, index: usize) -> &[CompiledDecorator<W>] {
        match self.nodes.get(index) {
            Some(node) => &self.decorators[node.decorators.0..node.decorators.1],
            None => &[],
        }
    }

    /// Aborting decorators, ascending by guarded node priority.
    pub(crate) fn guards(&self) -> impl Iterator<Item = &CompiledDecorator<W>> + '_ {
        self.guards.iter().map(|&d| &self.decorators[d])
    }
}

fn builtin_modifier<W: WorldMut + 'static>(kind: &ModifierKind) -> Option<Arc<dyn ErasedModifier<W>>> {
    match kind {
        ModifierKind::LoopForever => Some(Arc::new(LoopForever::<W>::default())),
        ModifierKind::Loop { count } => Some(Arc::new(Loop::<W>::new(*count))),
        ModifierKind::LoopUntil { status } => Some(Arc::new(LoopUntil::<W>::new(*status))),
        ModifierKind::ForceStatus { status } => Some(Arc::new(ForceStatus::<W>::new(*status))),
        ModifierKind::Custom(_) => None,
    }
}

struct Flattener<'m, W: WorldMut> {
    model: &'m TreeModel,
    registry: &'m BehaviorRegistry<W>,
    nodes: Vec<ExecutableNode>,
    lookup: BTreeMap<NodeId, usize>,
    actions: Vec<Option<Arc<dyn ErasedAction<W>>>>,
    decorators: Vec<CompiledDecorator<W>>,
    modifiers: Vec<Option<Arc<dyn ErasedModifier<W>>>>,
    on_path: BTreeSet<NodeId>,
}

impl<'m, W: WorldMut + 'static> Flattener<'m, W> {
    fn visit(
        &mut self,
        id: &NodeId,
        parent: Option<usize>,
        position: usize,
        referrer: &NodeId,
    ) -> Result<usize, CompileError> {
        if self.on_path.contains(id) {
            return Err(CompileError::Cycle(id.clone()));
        }
        if self.lookup.contains_key(id) {
            return Err(CompileError::SharedNode(id.clone()));
        }
        let node = self.model.node(id).ok_or_else(|| CompileError::UnknownNode {
            child: referrer.clone(),
            missing: id.clone(),
        })?;

        let index = self.nodes.len();
        let (kind, behavior, action) = match &node.kind {
            NodeKind::Flow(flow) => (ExecutableKind::Flow(*flow), None, None),
            NodeKind::Action(behavior) => {
                if !node.children.is_empty() {
                    return Err(CompileError::LeafWithChildren(id.clone()));
                }
                let action = self.registry.action(behavior).ok_or_else(|| {
                    CompileError::UnknownBehavior {
                        node: id.clone(),
                        role: BehaviorRole::Action,
                        behavior: behavior.clone(),
                    }
                })?;
                (ExecutableKind::Action, Some(behavior.clone()), Some(action))
            }
        };

        let first_decorator = self.decorators.len();
        for (ordinal, decorator) in node.decorators.iter().enumerate() {
            if decorator.aborts.aborts_lower() && parent.is_none() {
                return Err(CompileError::InvalidAbort(id.clone()));
            }
            let conditional = self
                .registry
                .conditional(&decorator.conditional)
                .ok_or_else(|| CompileError::UnknownBehavior {
                    node: id.clone(),
                    role: BehaviorRole::Conditional,
                    behavior: decorator.conditional.clone(),
                })?;
            self.decorators.push(CompiledDecorator {
                node: index,
                ordinal,
                aborts: decorator.aborts,
                invert: decorator.invert,
                guard: None,
                conditional,
            });
        }

        let modifier = match &node.modifier {
            None => None,
            Some(ModifierKind::Custom(behavior)) => {
                Some(self.registry.modifier(behavior).ok_or_else(|| {
                    CompileError::UnknownBehavior {
                        node: id.clone(),
                        role: BehaviorRole::Modifier,
                        behavior: behavior.clone(),
                    }
                })?)
            }
            Some(builtin) => builtin_modifier::<W>(builtin),
        };

        self.nodes.push(ExecutableNode {
            index,
            parent,
            breadth: 1,
            priority: index as u32 + 1,
            id: id.clone(),
            name: node.name.clone(),
            kind,
            behavior,
            children: Vec::with_capacity(node.children.len()),
            position,
            decorators: (first_decorator, self.decorators.len()),
        });
        self.lookup.insert(id.clone(), index);
        self.actions.push(action);
        self.modifiers.push(modifier);

        self.on_path.insert(id.clone());
        let mut breadth = 1;
        for (position, child) in node.children.iter().enumerate() {
            let child_index = self.visit(child, Some(index), position, id)?;
            breadth += self.nodes[child_index].breadth;
            self.nodes[index].children.push(child_index);
        }
        self.on_path.remove(id);

        self.nodes[index].breadth = breadth;
        Ok(index)
    }
}

/// Compile `model` against `registry`.
///
/// Pure and deterministic: the same model always yields the same index for
/// every node id. Fails without producing a partial tree.
pub fn compile<W: WorldMut + 'static>(
    model: &TreeModel,
    registry: &BehaviorRegistry<W>,
) -> Result<ExecutableTree<W>, CompileError> {
    let mut seen = BTreeSet::new();
    for node in model.nodes() {
        if !seen.insert(&node.id) {
            return Err(CompileError::DuplicateId(node.id.clone()));
        }
    }
    let root = model.root().ok_or(CompileError::EmptyTree)?;

    let mut flattener = Flattener {
        model,
        registry,
        nodes: Vec::with_capacity(model.len()),
        lookup: BTreeMap::new(),
        actions: Vec::with_capacity(model.len()),
        decorators: Vec::new(),
        modifiers: Vec::with_capacity(model.len()),
        on_path: BTreeSet::new(),
    };
    flattener.visit(root, None, 0, root)?;

    let Flattener {
        nodes,
        lookup,
        actions,
        mut decorators,
        modifiers,
        ..
    } = flattener;

    // Decorators are pushed in pre-order, so guard slots come out ascending by priority.
    let mut guards = Vec::new();
    for (d, decorator) in decorators.iter_mut().enumerate() {
        if decorator.aborts != AbortsType::None {
            decorator.guard = Some(guards.len());
            guards.push(d);
        }
    }

    debug!(
        tree = %model.name,
        nodes = nodes.len(),
        guards = guards.len(),
        "compiled behavior tree"
    );

    Ok(ExecutableTree {
        name: model.name.clone(),
        nodes,
        lookup,
        actions,
        decorators,
        guards,
        modifiers,
        blackboard: model.blackboard().clone(),
    })
}
