//! Typed selectors: how a leaf's field names the data it reads or writes.

use crate::{
    Blackboard, BlackboardEntry, BlackboardError, BlackboardType, BlackboardView, EntryId,
    EntryKey, ValueType,
};

#[derive(Debug, Clone, PartialEq)]
pub enum SelectorTarget<T> {
    /// A constant authored on the node itself.
    Inline(T),
    Entry(EntryId),
    /// A dynamic variable looked up by name at the current cursor.
    Dynamic(String),
}

/// Restricts which entries a selector may bind to.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    types: Vec<ValueType>,
    predicate: Option<fn(&BlackboardEntry) -> bool>,
}

impl EntryFilter {
    pub fn any() -> Self {
        Self::default()
    }

    pub fn of_types(types: impl IntoIterator<Item = ValueType>) -> Self {
        Self {
            types: types.into_iter().collect(),
            predicate: None,
        }
    }

    pub fn with_predicate(mut self, predicate: fn(&BlackboardEntry) -> bool) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn allows(&self, entry: &BlackboardEntry) -> bool {
        (self.types.is_empty() || self.types.contains(&entry.ty))
            && self.predicate.map_or(true, |p| p(entry))
    }
}

#[derive(Debug, Clone)]
struct FilterCache {
    revision: u64,
    ids: Vec<EntryId>,
}

/// A field of a leaf node bound to an inline value, an entry or a dynamic
/// variable.
///
/// The filtered option list is resolved by [`EntrySelector::apply_filters`]
/// (call it when the owning node is enabled) and cached until the
/// blackboard's revision changes.
#[derive(Debug, Clone)]
pub struct EntrySelector<T: BlackboardType> {
    target: SelectorTarget<T>,
    filter: EntryFilter,
    cache: Option<FilterCache>,
}

impl<T: BlackboardType> Default for EntrySelector<T> {
    fn default() -> Self {
        Self::inline(T::default())
    }
}

impl<T: BlackboardType> EntrySelector<T> {
    pub fn inline(value: T) -> Self {
        Self {
            target: SelectorTarget::Inline(value),
            filter: EntryFilter::of_types([T::TYPE]),
            cache: None,
        }
    }

    pub fn entry(key: EntryKey<T>) -> Self {
        Self {
            target: SelectorTarget::Entry(key.id()),
            ..Self::default()
        }
    }

    pub fn dynamic(name: impl Into<String>) -> Self {
        Self {
            target: SelectorTarget::Dynamic(name.into()),
            ..Self::default()
        }
    }

    /// Narrow the type filter further with a custom predicate.
    pub fn with_predicate(mut self, predicate: fn(&BlackboardEntry) -> bool) -> Self {
        self.filter = self.filter.with_predicate(predicate);
        self.cache = None;
        self
    }

    pub fn target(&self) -> &SelectorTarget<T> {
        &self.target
    }

    pub fn is_dynamic(&self) -> bool {
        matches!(self.target, SelectorTarget::Dynamic(_))
    }

    pub fn is_stale(&self, blackboard: &Blackboard) -> bool {
        self.cache
            .as_ref()
            .map_or(true, |c| c.revision != blackboard.revision())
    }

    pub fn apply_filters(&mut self, blackboard: &Blackboard) -> &[EntryId] {
        if self.is_stale(blackboard) {
            let ids = blackboard
                .entries()
                .iter()
                .filter(|e| self.filter.allows(e))
                .map(|e| e.id)
                .collect();
            self.cache = Some(FilterCache {
                revision: blackboard.revision(),
                ids,
            });
        }
        self.options()
    }

    /// Entries allowed by the last resolved filter; empty before the first
    /// `apply_filters`.
    pub fn options(&self) -> &[EntryId] {
        match &self.cache {
            Some(cache) => cache.ids.as_slice(),
            None => &[],
        }
    }

    pub fn bind(&mut self, blackboard: &Blackboard, id: EntryId) -> Result<(), BlackboardError> {
        let entry = blackboard
            .entry(id)
            .ok_or(BlackboardError::UnknownEntry(id))?;
        if entry.ty != T::TYPE {
            return Err(BlackboardError::TypeMismatch {
                entry: id,
                expected: T::TYPE,
                found: entry.ty,
            });
        }
        if !self.apply_filters(blackboard).contains(&id) {
            return Err(BlackboardError::FilteredOut(id));
        }
        self.target = SelectorTarget::Entry(id);
        Ok(())
    }

    /// Read through the view. An absent dynamic variable reads as the type's
    /// zero value.
    pub fn get(&self, view: &mut BlackboardView<'_>) -> Result<T, BlackboardError> {
        match &self.target {
            SelectorTarget::Inline(value) => Ok(value.clone()),
            SelectorTarget::Entry(id) => view.get(EntryKey::<T>::new(id.0)),
            SelectorTarget::Dynamic(name) => Ok(view.get_dynamic_as::<T>(name)?.unwrap_or_default()),
        }
    }

    pub fn set(&self, view: &mut BlackboardView<'_>, value: T) -> Result<(), BlackboardError> {
        match &self.target {
            SelectorTarget::Inline(_) => Err(BlackboardError::Unbound),
            SelectorTarget::Entry(id) => view.set(EntryKey::<T>::new(id.0), value),
            SelectorTarget::Dynamic(name) => view.set_dynamic(name, value.into_value()),
        }
    }
}
