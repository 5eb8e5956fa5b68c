use indexmap::IndexMap;

use crate::class::ClassSchema;
use crate::value::Attribute;

/// State of one property of one instance.
#[derive(Debug, Clone, PartialEq)]
enum Slot {
    /// Nothing known; the next read loads every unloaded slot.
    Unloaded,
    /// Supplied when the instance was built. Not a change, but still written
    /// by the next save.
    Baseline(Attribute),
    /// Read from the store and unchanged since.
    Loaded(Attribute),
    /// Assigned. `original` is the stored value, if it was ever loaded.
    Dirty {
        current: Attribute,
        original: Option<Attribute>,
    },
}

/// Per-instance attribute storage with dirty tracking.
///
/// The cache never talks to the store: the owner asks `needs_load` before a
/// read, runs one batched query when it returns true, and hands the decoded
/// values to `fill`.
#[derive(Debug, Clone)]
pub struct AttributeCache {
    slots: IndexMap<String, Slot>,
}

impl AttributeCache {
    /// Creates a cache with every declared property unloaded.
    pub fn new(class: &ClassSchema) -> Self {
        AttributeCache {
            slots: class
                .properties()
                .map(|p| (p.name().to_string(), Slot::Unloaded))
                .collect(),
        }
    }

    /// True if reading `name` requires a store round trip.
    pub fn needs_load(&self, name: &str) -> bool {
        matches!(self.slots.get(name), Some(Slot::Unloaded))
    }

    /// Applies values loaded from the store.
    ///
    /// Unloaded slots become `Loaded`; dirty slots that never saw the store
    /// learn their original; baseline slots keep the constructor value.
    pub fn fill(&mut self, mut loaded: IndexMap<String, Attribute>) {
        for (name, slot) in self.slots.iter_mut() {
            let Some(value) = loaded.swap_remove(name) else {
                continue;
            };
            match slot {
                Slot::Unloaded => *slot = Slot::Loaded(value),
                Slot::Dirty { original, .. } if original.is_none() => *original = Some(value),
                _ => {}
            }
        }
    }

    /// The in-memory value of a slot, or `None` if it is unloaded.
    pub fn get(&self, name: &str) -> Option<&Attribute> {
        match self.slots.get(name)? {
            Slot::Unloaded => None,
            Slot::Baseline(value) | Slot::Loaded(value) => Some(value),
            Slot::Dirty { current, .. } => Some(current),
        }
    }

    /// Records an assignment. Always marks the slot dirty.
    pub fn set(&mut self, name: &str, value: Attribute) {
        let Some(slot) = self.slots.get_mut(name) else {
            return;
        };
        let original = match std::mem::replace(slot, Slot::Unloaded) {
            Slot::Loaded(original) => Some(original),
            Slot::Dirty { original, .. } => original,
            Slot::Unloaded | Slot::Baseline(_) => None,
        };
        *slot = Slot::Dirty {
            current: value,
            original,
        };
    }

    /// Records a constructor-supplied value.
    pub fn set_baseline(&mut self, name: &str, value: Attribute) {
        if let Some(slot) = self.slots.get_mut(name) {
            *slot = Slot::Baseline(value);
        }
    }

    /// With no name: true if any slot has been assigned.
    ///
    /// With a name: true if the slot has been assigned and either its stored
    /// value was never loaded or the assigned value differs from it. Names
    /// the class does not declare are never dirty.
    pub fn is_dirty(&self, name: Option<&str>) -> bool {
        match name {
            None => self.slots.values().any(|s| matches!(s, Slot::Dirty { .. })),
            Some(name) => match self.slots.get(name) {
                Some(Slot::Dirty { current, original }) => original.as_ref() != Some(current),
                _ => false,
            },
        }
    }

    /// Names of the slots reported dirty, in declaration order.
    pub fn changed(&self) -> Vec<&str> {
        self.slots
            .keys()
            .filter(|name| self.is_dirty(Some(name.as_str())))
            .map(String::as_str)
            .collect()
    }

    /// True if a save has to write this slot.
    pub fn needs_write(&self, name: &str) -> bool {
        matches!(self.slots.get(name), Some(Slot::Baseline(_))) || self.is_dirty(Some(name))
    }

    /// Marks a written slot as loaded with its current value as the original.
    pub fn mark_saved(&mut self, name: &str) {
        let Some(slot) = self.slots.get_mut(name) else {
            return;
        };
        match std::mem::replace(slot, Slot::Unloaded) {
            Slot::Baseline(value) | Slot::Dirty { current: value, .. } | Slot::Loaded(value) => {
                *slot = Slot::Loaded(value)
            }
            Slot::Unloaded => {}
        }
    }

    /// Turns a slot assigned its own stored value back into `Loaded`.
    ///
    /// Such a slot has nothing to write, so a save settles it instead.
    pub fn settle(&mut self, name: &str) {
        let Some(slot) = self.slots.get_mut(name) else {
            return;
        };
        if let Slot::Dirty {
            current,
            original: Some(original),
        } = slot
            && current == original
        {
            *slot = Slot::Loaded(original.clone());
        }
    }

    /// Drops every slot back to unloaded, discarding unsaved values.
    pub fn reset(&mut self) {
        for slot in self.slots.values_mut() {
            *slot = Slot::Unloaded;
        }
    }
}
