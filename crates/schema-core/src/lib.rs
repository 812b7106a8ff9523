//! Runtime primitives shared by the Schema behavior tree crates.
//!
//! Everything in here is engine-agnostic: agents are identified by a stable
//! numeric id, time is whatever the host feeds through [`TickContext`], and
//! the blackboard tiers are explicitly owned values rather than process-wide
//! singletons.

#![cfg_attr(docsrs, feature(doc_cfg))]
#![forbid(unsafe_code)]

pub mod agent;
pub mod blackboard;
pub mod error;
pub mod selector;
pub mod store;
pub mod tick;
pub mod world;

pub use agent::AgentId;
pub use blackboard::{
    Blackboard, BlackboardEntry, BlackboardType, EntryId, EntryKey, EntryScope, ObjectRef, Value,
    ValueType, Vec2, Vec3,
};
pub use error::BlackboardError;
pub use selector::{EntryFilter, EntrySelector, SelectorTarget};
pub use store::{BlackboardStore, BlackboardView, DynamicBinding, DynamicScope, GlobalBlackboard};
pub use tick::TickContext;
pub use world::{WorldMut, WorldView};
