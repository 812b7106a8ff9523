//! Authoring-time description of a tree.
//!
//! The editor mutates a [`TreeModel`] between runs; the runtime only ever sees
//! the immutable [`crate::ExecutableTree`] compiled from a snapshot of it.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use schema_core::Blackboard;

use crate::{ModelError, NodeStatus};

/// Stable unique identifier of an authored node.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Identifier a leaf implementation is registered under.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct BehaviorId(String);

impl BehaviorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BehaviorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BehaviorId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for BehaviorId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FlowKind {
    /// Runs children left to right until one fails.
    Sequence,
    /// Runs children left to right until one succeeds.
    Selector,
}

impl FlowKind {
    /// Position of the next child to run after the child at `last` reported
    /// `status`, or `None` once the composite is done (its result is then
    /// `status`).
    pub fn select_child(self, status: NodeStatus, last: usize, child_count: usize) -> Option<usize> {
        let stop = match self {
            FlowKind::Sequence => status == NodeStatus::Failure,
            FlowKind::Selector => status == NodeStatus::Success,
        };
        if stop || last + 1 >= child_count {
            None
        } else {
            Some(last + 1)
        }
    }

    /// Result of a composite with no children.
    pub fn empty_status(self) -> NodeStatus {
        match self {
            FlowKind::Sequence => NodeStatus::Success,
            FlowKind::Selector => NodeStatus::Failure,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum NodeKind {
    Flow(FlowKind),
    Action(BehaviorId),
}

impl NodeKind {
    pub fn sequence() -> Self {
        NodeKind::Flow(FlowKind::Sequence)
    }

    pub fn selector() -> Self {
        NodeKind::Flow(FlowKind::Selector)
    }

    pub fn action(id: impl Into<BehaviorId>) -> Self {
        NodeKind::Action(id.into())
    }

    pub fn is_flow(&self) -> bool {
        matches!(self, NodeKind::Flow(_))
    }
}

/// Which running branches a decorator may interrupt when its condition
/// changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AbortsType {
    #[default]
    None,
    /// Abort the decorated node's own running subtree when the condition
    /// starts failing.
    #[cfg_attr(feature = "serde", serde(rename = "self"))]
    SelfBranch,
    /// Abort a running lower-priority sibling branch when the condition
    /// starts passing.
    LowerPriority,
    Both,
}

impl AbortsType {
    pub fn aborts_self(self) -> bool {
        matches!(self, AbortsType::SelfBranch | AbortsType::Both)
    }

    pub fn aborts_lower(self) -> bool {
        matches!(self, AbortsType::LowerPriority | AbortsType::Both)
    }
}

/// A conditional guard attached to a node.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Decorator {
    pub conditional: BehaviorId,
    #[cfg_attr(feature = "serde", serde(default))]
    pub aborts: AbortsType,
    #[cfg_attr(feature = "serde", serde(default))]
    pub invert: bool,
}

impl Decorator {
    pub fn new(conditional: impl Into<BehaviorId>) -> Self {
        Self {
            conditional: conditional.into(),
            aborts: AbortsType::None,
            invert: false,
        }
    }

    pub fn aborts(mut self, aborts: AbortsType) -> Self {
        self.aborts = aborts;
        self
    }

    pub fn inverted(mut self) -> Self {
        self.invert = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ModifierKind {
    LoopForever,
    /// Run the node `count` times in total, then pass the last result through.
    Loop { count: u32 },
    /// Repeat until the node reports `status`.
    LoopUntil { status: NodeStatus },
    ForceStatus { status: NodeStatus },
    Custom(BehaviorId),
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Node {
    pub id: NodeId,
    pub name: String,
    pub kind: NodeKind,
    #[cfg_attr(feature = "serde", serde(default))]
    pub children: Vec<NodeId>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub parent: Option<NodeId>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub decorators: Vec<Decorator>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub modifier: Option<ModifierKind>,
    /// Pre-order rank + 1 from the root; 0 while detached.
    #[cfg_attr(feature = "serde", serde(default))]
    pub priority: u32,
}

impl Node {
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        let name = match &kind {
            NodeKind::Flow(FlowKind::Sequence) => "Sequence".to_owned(),
            NodeKind::Flow(FlowKind::Selector) => "Selector".to_owned(),
            NodeKind::Action(behavior) => behavior.to_string(),
        };
        Self {
            id,
            name,
            kind,
            children: Vec::new(),
            parent: None,
            decorators: Vec::new(),
            modifier: None,
            priority: 0,
        }
    }
}

/// Editable node graph plus the tree's blackboard entry set.
///
/// The first node added becomes the root unless [`TreeModel::set_root`] says
/// otherwise. Every structural edit recomputes priorities.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TreeModel {
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: String,
    root: Option<NodeId>,
    nodes: Vec<Node>,
    #[cfg_attr(feature = "serde", serde(default))]
    blackboard: Blackboard,
}

impl TreeModel {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Rebuild a model from persisted nodes. Nothing is validated here;
    /// [`crate::compile`] rejects malformed graphs.
    pub fn from_parts(
        name: impl Into<String>,
        root: Option<NodeId>,
        nodes: Vec<Node>,
        blackboard: Blackboard,
    ) -> Self {
        let mut model = Self {
            name: name.into(),
            root,
            nodes,
            blackboard,
        };
        model.refresh_priorities();
        model
    }

    pub fn with_blackboard(mut self, blackboard: Blackboard) -> Self {
        self.blackboard = blackboard;
        self
    }

    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    pub fn blackboard_mut(&mut self) -> &mut Blackboard {
        &mut self.blackboard
    }

    pub fn root(&self) -> Option<&NodeId> {
        self.root.as_ref()
    }

    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    fn node_mut(&mut self, id: &NodeId) -> Result<&mut Node, ModelError> {
        self.nodes
            .iter_mut()
            .find(|n| &n.id == id)
            .ok_or_else(|| ModelError::UnknownNode(id.clone()))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn add_node(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId::generate();
        self.nodes.push(Node::new(id.clone(), kind));
        if self.root.is_none() {
            self.root = Some(id.clone());
        }
        self.refresh_priorities();
        id
    }

    pub fn add_node_with_id(
        &mut self,
        id: impl Into<NodeId>,
        kind: NodeKind,
    ) -> Result<NodeId, ModelError> {
        let id = id.into();
        if self.node(&id).is_some() {
            return Err(ModelError::DuplicateId(id));
        }
        self.nodes.push(Node::new(id.clone(), kind));
        if self.root.is_none() {
            self.root = Some(id.clone());
        }
        self.refresh_priorities();
        Ok(id)
    }

    /// Add a node and connect it as the last child of `parent`.
    pub fn add_child(
        &mut self,
        parent: &NodeId,
        id: impl Into<NodeId>,
        kind: NodeKind,
    ) -> Result<NodeId, ModelError> {
        let id = self.add_node_with_id(id, kind)?;
        if let Err(err) = self.connect(parent, &id) {
            self.nodes.retain(|n| n.id != id);
            return Err(err);
        }
        Ok(id)
    }

    pub fn set_name(&mut self, id: &NodeId, name: impl Into<String>) -> Result<(), ModelError> {
        self.node_mut(id)?.name = name.into();
        Ok(())
    }

    /// Remove a node. Its children stay in the model, detached.
    pub fn remove_node(&mut self, id: &NodeId) -> Result<Node, ModelError> {
        let position = self
            .nodes
            .iter()
            .position(|n| &n.id == id)
            .ok_or_else(|| ModelError::UnknownNode(id.clone()))?;
        let node = self.nodes.remove(position);
        if let Some(parent) = &node.parent {
            if let Ok(parent) = self.node_mut(parent) {
                parent.children.retain(|c| c != id);
            }
        }
        for child in &node.children {
            if let Ok(child) = self.node_mut(child) {
                child.parent = None;
            }
        }
        if self.root.as_ref() == Some(id) {
            self.root = None;
        }
        self.refresh_priorities();
        Ok(node)
    }

    pub fn set_root(&mut self, id: &NodeId) -> Result<(), ModelError> {
        let node = self
            .node(id)
            .ok_or_else(|| ModelError::UnknownNode(id.clone()))?;
        if node.parent.is_some() {
            return Err(ModelError::RootHasParent(id.clone()));
        }
        self.root = Some(id.clone());
        self.refresh_priorities();
        Ok(())
    }

    fn is_ancestor(&self, ancestor: &NodeId, of: &NodeId) -> bool {
        let mut current = self.node(of).and_then(|n| n.parent.clone());
        while let Some(id) = current {
            if &id == ancestor {
                return true;
            }
            current = self.node(&id).and_then(|n| n.parent.clone());
        }
        false
    }

    /// Append `child` to `parent`'s children.
    pub fn connect(&mut self, parent: &NodeId, child: &NodeId) -> Result<(), ModelError> {
        let parent_node = self
            .node(parent)
            .ok_or_else(|| ModelError::UnknownNode(parent.clone()))?;
        if !parent_node.kind.is_flow() {
            return Err(ModelError::NotComposite(parent.clone()));
        }
        let child_node = self
            .node(child)
            .ok_or_else(|| ModelError::UnknownNode(child.clone()))?;
        if child_node.parent.is_some() {
            return Err(ModelError::AlreadyParented(child.clone()));
        }
        if self.root.as_ref() == Some(child) {
            return Err(ModelError::RootHasParent(child.clone()));
        }
        if parent == child || self.is_ancestor(child, parent) {
            return Err(ModelError::WouldCreateCycle {
                parent: parent.clone(),
                child: child.clone(),
            });
        }

        self.node_mut(parent)?.children.push(child.clone());
        self.node_mut(child)?.parent = Some(parent.clone());
        self.refresh_priorities();
        Ok(())
    }

    pub fn disconnect(&mut self, parent: &NodeId, child: &NodeId) -> Result<(), ModelError> {
        let parent_node = self.node_mut(parent)?;
        let before = parent_node.children.len();
        parent_node.children.retain(|c| c != child);
        if parent_node.children.len() == before {
            return Err(ModelError::NotAChild {
                parent: parent.clone(),
                child: child.clone(),
            });
        }
        self.node_mut(child)?.parent = None;
        self.refresh_priorities();
        Ok(())
    }

    /// Move `child` to `position` among its siblings.
    pub fn reorder(
        &mut self,
        parent: &NodeId,
        child: &NodeId,
        position: usize,
    ) -> Result<(), ModelError> {
        let parent_node = self.node_mut(parent)?;
        let current = parent_node
            .children
            .iter()
            .position(|c| c == child)
            .ok_or_else(|| ModelError::NotAChild {
                parent: parent.clone(),
                child: child.clone(),
            })?;
        if position >= parent_node.children.len() {
            return Err(ModelError::PositionOutOfRange {
                node: parent.clone(),
                position,
            });
        }
        let moved = parent_node.children.remove(current);
        parent_node.children.insert(position, moved);
        self.refresh_priorities();
        Ok(())
    }

    pub fn add_decorator(&mut self, node: &NodeId, decorator: Decorator) -> Result<usize, ModelError> {
        let node = self.node_mut(node)?;
        node.decorators.push(decorator);
        Ok(node.decorators.len() - 1)
    }

    pub fn remove_decorator(&mut self, node: &NodeId, index: usize) -> Result<Decorator, ModelError> {
        let target = self.node_mut(node)?;
        if index >= target.decorators.len() {
            return Err(ModelError::PositionOutOfRange {
                node: node.clone(),
                position: index,
            });
        }
        Ok(target.decorators.remove(index))
    }

    /// Attach (or with `None`, clear) the node's modifier; returns the old one.
    pub fn set_modifier(
        &mut self,
        node: &NodeId,
        modifier: Option<ModifierKind>,
    ) -> Result<Option<ModifierKind>, ModelError> {
        let node = self.node_mut(node)?;
        Ok(std::mem::replace(&mut node.modifier, modifier))
    }

    fn refresh_priorities(&mut self) {
        for node in &mut self.nodes {
            node.priority = 0;
        }
        let Some(root) = self.root.clone() else {
            return;
        };

        let mut rank = 0u32;
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.iter_mut().find(|n| n.id == id) else {
                continue;
            };
            // Malformed (e.g. deserialized) graphs may revisit nodes; the compiler reports those.
            if node.priority != 0 {
                continue;
            }
            rank += 1;
            node.priority = rank;
            stack.extend(node.children.iter().rev().cloned());
        }
    }
}
