use thiserror::Error;

use schema_core::BlackboardError;

use crate::{BehaviorId, NodeId};

/// Which registry table a behavior id was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorRole {
    Action,
    Conditional,
    Modifier,
}

impl core::fmt::Display for BehaviorRole {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            BehaviorRole::Action => "action",
            BehaviorRole::Conditional => "conditional",
            BehaviorRole::Modifier => "modifier",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    #[error("duplicate node id {0}")]
    DuplicateId(NodeId),

    #[error("node {0} is a leaf and cannot have children")]
    NotComposite(NodeId),

    #[error("node {0} already has a parent")]
    AlreadyParented(NodeId),

    #[error("root node {0} cannot have a parent")]
    RootHasParent(NodeId),

    #[error("connecting {child} under {parent} would create a cycle")]
    WouldCreateCycle { parent: NodeId, child: NodeId },

    #[error("{child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("position {position} is out of range on node {node}")]
    PositionOutOfRange { node: NodeId, position: usize },
}

/// A malformed node graph. Compilation produces no tree when this is returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("tree has no root node")]
    EmptyTree,

    #[error("cycle through node {0}")]
    Cycle(NodeId),

    #[error("duplicate node id {0}")]
    DuplicateId(NodeId),

    #[error("node {0} is reachable from more than one parent")]
    SharedNode(NodeId),

    #[error("node {child} references missing node {missing}")]
    UnknownNode { child: NodeId, missing: NodeId },

    #[error("leaf node {0} has children")]
    LeafWithChildren(NodeId),

    #[error("node {node} uses unregistered {role} {behavior}")]
    UnknownBehavior {
        node: NodeId,
        role: BehaviorRole,
        behavior: BehaviorId,
    },

    #[error("node {0} aborts lower priority but has no parent composite")]
    InvalidAbort(NodeId),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuntimeError {
    #[error("agent {0} is not bound to this tree")]
    UnboundAgent(u64),

    #[error("agent {0} is already bound to this tree")]
    AlreadyBound(u64),

    #[error("unknown tree handle {0}")]
    UnknownTree(usize),

    #[error(transparent)]
    Blackboard(#[from] BlackboardError),
}
