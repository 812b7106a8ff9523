use core::fmt;
use std::marker::PhantomData;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::BlackboardError;

/// Declared type of a blackboard entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ValueType {
    Bool,
    Int,
    Float,
    Text,
    Vec2,
    Vec3,
    Object,
}

impl ValueType {
    /// The value a fresh slot of this type starts with.
    pub fn zero(self) -> Value {
        match self {
            ValueType::Bool => Value::Bool(false),
            ValueType::Int => Value::Int(0),
            ValueType::Float => Value::Float(0.0),
            ValueType::Text => Value::Text(String::new()),
            ValueType::Vec2 => Value::Vec2(Vec2::ZERO),
            ValueType::Vec3 => Value::Vec3(Vec3::ZERO),
            ValueType::Object => Value::Object(ObjectRef::NULL),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueType::Bool => "bool",
            ValueType::Int => "int",
            ValueType::Float => "float",
            ValueType::Text => "text",
            ValueType::Vec2 => "vec2",
            ValueType::Vec3 => "vec3",
            ValueType::Object => "object",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Nullable handle to a host-side object (an entity, a component, ...).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ObjectRef(pub Option<u64>);

impl ObjectRef {
    pub const NULL: Self = Self(None);

    pub const fn new(handle: u64) -> Self {
        Self(Some(handle))
    }

    pub fn is_null(self) -> bool {
        self.0.is_none()
    }
}

/// A runtime blackboard value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f32),
    Text(String),
    Vec2(Vec2),
    Vec3(Vec3),
    Object(ObjectRef),
}

impl Value {
    pub fn ty(&self) -> ValueType {
        match self {
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Float(_) => ValueType::Float,
            Value::Text(_) => ValueType::Text,
            Value::Vec2(_) => ValueType::Vec2,
            Value::Vec3(_) => ValueType::Vec3,
            Value::Object(_) => ValueType::Object,
        }
    }

    /// Only object handles can be null; every other type always holds a value.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Object(obj) if obj.is_null())
    }
}

/// Rust types that can be read from / written to a blackboard slot.
pub trait BlackboardType: Clone + Default + Sized + 'static {
    const TYPE: ValueType;

    fn into_value(self) -> Value;

    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! blackboard_type {
    ($ty:ty, $variant:ident) => {
        impl BlackboardType for $ty {
            const TYPE: ValueType = ValueType::$variant;

            fn into_value(self) -> Value {
                Value::$variant(self)
            }

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }
        }

        impl From<$ty> for Value {
            fn from(value: $ty) -> Self {
                Value::$variant(value)
            }
        }
    };
}

blackboard_type!(bool, Bool);
blackboard_type!(i64, Int);
blackboard_type!(f32, Float);
blackboard_type!(String, Text);
blackboard_type!(Vec2, Vec2);
blackboard_type!(Vec3, Vec3);
blackboard_type!(ObjectRef, Object);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_owned())
    }
}

/// Stable id of a blackboard entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where the value of an entry lives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EntryScope {
    /// One slot per agent identity.
    #[default]
    Local,
    /// A single slot shared by every agent and every tree of a session.
    Global,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BlackboardEntry {
    pub id: EntryId,
    pub name: String,
    pub ty: ValueType,
    #[cfg_attr(feature = "serde", serde(default))]
    pub scope: EntryScope,
}

impl BlackboardEntry {
    pub fn local(id: u64, name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            id: EntryId(id),
            name: name.into(),
            ty,
            scope: EntryScope::Local,
        }
    }

    pub fn global(id: u64, name: impl Into<String>, ty: ValueType) -> Self {
        Self {
            id: EntryId(id),
            name: name.into(),
            ty,
            scope: EntryScope::Global,
        }
    }

    pub fn key<T: BlackboardType>(&self) -> Option<EntryKey<T>> {
        (self.ty == T::TYPE).then(|| EntryKey::new(self.id.0))
    }
}

/// Typed handle to a blackboard entry.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryKey<T: 'static> {
    id: u64,
    _phantom: PhantomData<fn() -> T>,
}

impl<T: 'static> Copy for EntryKey<T> {}

impl<T: 'static> Clone for EntryKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> EntryKey<T> {
    pub const fn new(id: u64) -> Self {
        Self {
            id,
            _phantom: PhantomData,
        }
    }

    pub fn id(self) -> EntryId {
        EntryId(self.id)
    }
}

/// The entry set of a tree asset.
///
/// `revision` changes whenever an entry is added or removed; selector filter
/// caches compare against it to know when to resolve again.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Blackboard {
    entries: Vec<BlackboardEntry>,
    #[cfg_attr(feature = "serde", serde(skip))]
    revision: u64,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entries(
        entries: impl IntoIterator<Item = BlackboardEntry>,
    ) -> Result<Self, BlackboardError> {
        let mut blackboard = Self::new();
        for entry in entries {
            blackboard.add_entry(entry)?;
        }
        Ok(blackboard)
    }

    pub fn add_entry(&mut self, entry: BlackboardEntry) -> Result<EntryId, BlackboardError> {
        if self
            .entries
            .iter()
            .any(|e| e.id == entry.id || e.name == entry.name)
        {
            return Err(BlackboardError::DuplicateEntry {
                id: entry.id,
                name: entry.name,
            });
        }
        let id = entry.id;
        self.entries.push(entry);
        self.revision = self.revision.wrapping_add(1);
        Ok(id)
    }

    pub fn remove_entry(&mut self, id: EntryId) -> Option<BlackboardEntry> {
        let slot = self.slot_of(id)?;
        self.revision = self.revision.wrapping_add(1);
        Some(self.entries.remove(slot))
    }

    pub fn entry(&self, id: EntryId) -> Option<&BlackboardEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn by_name(&self, name: &str) -> Option<&BlackboardEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Position of the entry in declaration order; local value slots use it.
    pub fn slot_of(&self, id: EntryId) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    pub fn entries(&self) -> &[BlackboardEntry] {
        &self.entries
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
