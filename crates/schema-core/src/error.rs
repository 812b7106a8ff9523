use thiserror::Error;

use crate::{EntryId, ValueType};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlackboardError {
    #[error("unknown blackboard entry id={0}")]
    UnknownEntry(EntryId),

    #[error("blackboard type mismatch for entry id={entry}: expected {expected}, found {found}")]
    TypeMismatch {
        entry: EntryId,
        expected: ValueType,
        found: ValueType,
    },

    #[error("duplicate blackboard entry id={id} name={name:?}")]
    DuplicateEntry { id: EntryId, name: String },

    #[error("selector is not bound to a blackboard entry")]
    Unbound,

    #[error("entry id={0} is not allowed by the selector's filter")]
    FilteredOut(EntryId),

    #[error("dynamic variable {name:?} holds {expected}, cannot store {found}")]
    DynamicTypeMismatch {
        name: String,
        expected: ValueType,
        found: ValueType,
    },
}
