//! Behavior tree runtime built on `schema-core`.
//!
//! Authoring goes through a mutable [`TreeModel`]; [`compile`] flattens a
//! snapshot of it into a pre-order [`ExecutableTree`] that any number of
//! agents tick concurrently through a [`Session`]. Each agent keeps its own
//! cursor, per-node memory and blackboard slots; decorators with an
//! [`AbortsType`] re-check their condition while a branch is suspended and
//! redirect the cursor when it flips.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod behavior;
pub mod compiler;
pub mod config;
pub mod context;
mod engine;
pub mod error;
mod interrupt;
pub mod memory;
pub mod model;
pub mod modifier;
pub mod nodes;
pub mod session;
pub mod status;

pub use behavior::{Action, BehaviorRegistry, Conditional, Modifier, NodeContext};
pub use compiler::{compile, ExecutableKind, ExecutableNode, ExecutableTree};
pub use config::{RunMode, RuntimeConfig};
pub use context::ExecutionContext;
pub use error::{BehaviorRole, CompileError, ModelError, RuntimeError};
pub use memory::{MemoryArena, NodeMemory};
pub use model::{
    AbortsType, BehaviorId, Decorator, FlowKind, ModifierKind, Node, NodeId, NodeKind, TreeModel,
};
pub use modifier::Message;
pub use session::{Session, TreeHandle};
pub use status::NodeStatus;
