//! Blackboard storage tiers.
//!
//! - [`GlobalBlackboard`]: one slot per global entry, shared by every agent and
//!   every tree of a session. Explicitly owned by the session.
//! - [`BlackboardStore`]: per-tree storage for `Local` entries (one lazily
//!   grown slot list per agent) and for dynamic variables, whose visibility is
//!   bounded by the declaring node's `[index, index + breadth)` range.
//! - [`BlackboardView`]: what a leaf callback sees: the stores above narrowed
//!   to one agent and one cursor position.

use std::collections::BTreeMap;

use crate::{
    Blackboard, BlackboardEntry, BlackboardError, BlackboardType, EntryId, EntryKey, EntryScope,
    Value,
};

fn check_type(entry: &BlackboardEntry, value: &Value) -> Result<(), BlackboardError> {
    if entry.ty == value.ty() {
        Ok(())
    } else {
        Err(BlackboardError::TypeMismatch {
            entry: entry.id,
            expected: entry.ty,
            found: value.ty(),
        })
    }
}

/// Index range a dynamic variable is visible in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DynamicScope {
    pub start: usize,
    pub breadth: usize,
}

impl DynamicScope {
    pub fn new(start: usize, breadth: usize) -> Self {
        Self { start, breadth }
    }

    pub fn contains(self, index: usize) -> bool {
        index >= self.start && index < self.start + self.breadth
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DynamicBinding {
    pub scope: DynamicScope,
    pub value: Value,
}

/// The global tier: declarations of global entries and their shared values.
#[derive(Debug, Default)]
pub struct GlobalBlackboard {
    entries: Blackboard,
    values: BTreeMap<EntryId, Value>,
}

impl GlobalBlackboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, mut entry: BlackboardEntry) -> Result<EntryId, BlackboardError> {
        entry.scope = EntryScope::Global;
        self.entries.add_entry(entry)
    }

    pub fn entries(&self) -> &Blackboard {
        &self.entries
    }

    /// Current value of a global entry, zero-initialized on first access.
    pub fn get(&mut self, entry: &BlackboardEntry) -> Value {
        self.values
            .entry(entry.id)
            .or_insert_with(|| entry.ty.zero())
            .clone()
    }

    pub fn set(&mut self, entry: &BlackboardEntry, value: Value) -> Result<(), BlackboardError> {
        check_type(entry, &value)?;
        self.values.insert(entry.id, value);
        Ok(())
    }

    /// Lookup through this tier's own declarations.
    pub fn get_by_id(&mut self, id: EntryId) -> Result<Value, BlackboardError> {
        let ty = self
            .entries
            .entry(id)
            .map(|e| e.ty)
            .ok_or(BlackboardError::UnknownEntry(id))?;
        Ok(self.values.entry(id).or_insert_with(|| ty.zero()).clone())
    }

    pub fn set_by_id(&mut self, id: EntryId, value: Value) -> Result<(), BlackboardError> {
        let entry = self
            .entries
            .entry(id)
            .ok_or(BlackboardError::UnknownEntry(id))?;
        check_type(entry, &value)?;
        self.values.insert(id, value);
        Ok(())
    }

    /// Value without zero-initializing; `None` if the slot was never touched.
    pub fn peek(&self, id: EntryId) -> Option<&Value> {
        self.values.get(&id)
    }
}

/// Local and dynamic values of one tree, partitioned by agent.
#[derive(Debug, Default)]
pub struct BlackboardStore {
    locals: BTreeMap<u64, Vec<Value>>,
    dynamics: BTreeMap<u64, BTreeMap<String, DynamicBinding>>,
}

impl BlackboardStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `id` against the tree's entries first, then the global tier.
    pub fn get(
        &mut self,
        schema: &Blackboard,
        globals: &mut GlobalBlackboard,
        id: EntryId,
        agent: u64,
    ) -> Result<Value, BlackboardError> {
        if let Some(slot) = schema.slot_of(id) {
            let entry = &schema.entries()[slot];
            return Ok(match entry.scope {
                EntryScope::Local => self.local_slot(schema, slot, agent).clone(),
                EntryScope::Global => globals.get(entry),
            });
        }
        globals.get_by_id(id)
    }

    pub fn set(
        &mut self,
        schema: &Blackboard,
        globals: &mut GlobalBlackboard,
        id: EntryId,
        agent: u64,
        value: Value,
    ) -> Result<(), BlackboardError> {
        if let Some(slot) = schema.slot_of(id) {
            let entry = &schema.entries()[slot];
            check_type(entry, &value)?;
            match entry.scope {
                EntryScope::Local => *self.local_slot(schema, slot, agent) = value,
                EntryScope::Global => globals.set(entry, value)?,
            }
            return Ok(());
        }
        globals.set_by_id(id, value)
    }

    fn local_slot(&mut self, schema: &Blackboard, slot: usize, agent: u64) -> &mut Value {
        let slots = self.locals.entry(agent).or_default();
        if slots.len() <= slot {
            let start = slots.len();
            slots.extend(schema.entries()[start..=slot].iter().map(|e| e.ty.zero()));
        }
        &mut slots[slot]
    }

    /// Number of local slots materialized for `agent` so far.
    pub fn local_slot_count(&self, agent: u64) -> usize {
        self.locals.get(&agent).map_or(0, Vec::len)
    }

    /// Bind `name` for `agent` inside `scope`.
    ///
    /// A live binding keeps its scope and type; a binding whose scope no longer
    /// contains `cursor` is stale and gets replaced.
    pub fn set_dynamic(
        &mut self,
        agent: u64,
        name: &str,
        scope: DynamicScope,
        cursor: usize,
        value: Value,
    ) -> Result<(), BlackboardError> {
        let bindings = self.dynamics.entry(agent).or_default();
        let live = bindings
            .get(name)
            .filter(|b| b.scope.contains(cursor))
            .map(|b| b.value.ty());
        match live {
            Some(expected) if expected != value.ty() => {
                return Err(BlackboardError::DynamicTypeMismatch {
                    name: name.to_owned(),
                    expected,
                    found: value.ty(),
                });
            }
            Some(_) => {
                if let Some(binding) = bindings.get_mut(name) {
                    binding.value = value;
                }
            }
            None => {
                bindings.insert(name.to_owned(), DynamicBinding { scope, value });
            }
        }
        Ok(())
    }

    /// Value of `name` if `cursor` is still inside the declaring range.
    /// Out-of-range bindings are evicted.
    pub fn get_dynamic(&mut self, agent: u64, name: &str, cursor: usize) -> Option<Value> {
        let bindings = self.dynamics.get_mut(&agent)?;
        let in_scope = bindings.get(name)?.scope.contains(cursor);
        if !in_scope {
            bindings.remove(name);
            return None;
        }
        bindings.get(name).map(|b| b.value.clone())
    }

    /// Inspect a binding without scope checks or eviction.
    pub fn dynamic_binding(&self, agent: u64, name: &str) -> Option<&DynamicBinding> {
        self.dynamics.get(&agent)?.get(name)
    }

    pub fn release(&mut self, agent: u64) {
        self.locals.remove(&agent);
        self.dynamics.remove(&agent);
    }

    pub fn clear(&mut self) {
        self.locals.clear();
        self.dynamics.clear();
    }
}

/// Blackboard access for a single agent at a single cursor position.
pub struct BlackboardView<'a> {
    schema: &'a Blackboard,
    globals: &'a mut GlobalBlackboard,
    store: &'a mut BlackboardStore,
    agent: u64,
    cursor: usize,
    scope: DynamicScope,
}

impl<'a> BlackboardView<'a> {
    pub fn new(
        schema: &'a Blackboard,
        globals: &'a mut GlobalBlackboard,
        store: &'a mut BlackboardStore,
        agent: u64,
        cursor: usize,
        scope: DynamicScope,
    ) -> Self {
        Self {
            schema,
            globals,
            store,
            agent,
            cursor,
            scope,
        }
    }

    pub fn agent(&self) -> u64 {
        self.agent
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Range new dynamic variables are declared in.
    pub fn scope(&self) -> DynamicScope {
        self.scope
    }

    pub fn schema(&self) -> &Blackboard {
        self.schema
    }

    pub fn get_value(&mut self, id: EntryId) -> Result<Value, BlackboardError> {
        self.store.get(self.schema, self.globals, id, self.agent)
    }

    pub fn set_value(&mut self, id: EntryId, value: Value) -> Result<(), BlackboardError> {
        self.store
            .set(self.schema, self.globals, id, self.agent, value)
    }

    pub fn get<T: BlackboardType>(&mut self, key: EntryKey<T>) -> Result<T, BlackboardError> {
        let value = self.get_value(key.id())?;
        T::from_value(&value).ok_or(BlackboardError::TypeMismatch {
            entry: key.id(),
            expected: T::TYPE,
            found: value.ty(),
        })
    }

    pub fn set<T: BlackboardType>(
        &mut self,
        key: EntryKey<T>,
        value: T,
    ) -> Result<(), BlackboardError> {
        self.set_value(key.id(), value.into_value())
    }

    pub fn get_dynamic(&mut self, name: &str) -> Option<Value> {
        self.store.get_dynamic(self.agent, name, self.cursor)
    }

    pub fn get_dynamic_as<T: BlackboardType>(
        &mut self,
        name: &str,
    ) -> Result<Option<T>, BlackboardError> {
        let Some(value) = self.get_dynamic(name) else {
            return Ok(None);
        };
        T::from_value(&value)
            .map(Some)
            .ok_or(BlackboardError::DynamicTypeMismatch {
                name: name.to_owned(),
                expected: T::TYPE,
                found: value.ty(),
            })
    }

    pub fn set_dynamic(
        &mut self,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<(), BlackboardError> {
        self.store
            .set_dynamic(self.agent, name, self.scope, self.cursor, value.into())
    }
}
