use crate::profiling::profile_function;
use std::{
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
    num::NonZeroU64,
};

/// A typed generational index into a [`HandleTable`].
///
/// The generation lives in the upper 32 bits and `index + 1` in the lower 32
/// bits, so `Option<Handle<T>>` costs nothing over `Handle<T>`.
pub struct Handle<T> {
    raw: NonZeroU64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub fn new(generation: u32, index: u32) -> Self {
        let packed = ((generation as u64) << 32) | (index as u64 + 1);
        // The low half is at least one, so the packed value is never zero.
        let raw = NonZeroU64::new(packed).unwrap_or(NonZeroU64::MIN);
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    pub fn generation(&self) -> u32 {
        (self.raw.get() >> 32) as u32
    }

    pub fn index(&self) -> u32 {
        (self.raw.get() & u32::MAX as u64) as u32 - 1
    }

    /// The packed 64-bit representation, handy for logging.
    pub fn to_bits(&self) -> u64 {
        self.raw.get()
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}v{})", self.index(), self.generation())
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Dense table of reusable slots addressed by [`Handle`].
///
/// Removing an entry bumps the slot generation before the slot goes back on
/// the free list, so a handle held past its removal never resolves again,
/// even after the slot has been handed out to a new owner.
pub struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> HandleTable<T> {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free: Vec::new(),
            len: 0,
        }
    }

    pub fn insert(&mut self, value: T) -> Handle<T> {
        profile_function!();
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            Handle::new(slot.generation, index)
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                value: Some(value),
            });
            Handle::new(0, index)
        }
    }

    fn slot(&self, handle: Handle<T>) -> Option<&Slot<T>> {
        self.slots
            .get(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.slot(handle).and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.value.as_mut())
    }

    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_some()
    }

    /// Removes the entry and retires the handle.
    ///
    /// Returns `None` if the handle is stale or was never issued by this table.
    pub fn remove(&mut self, handle: Handle<T>) -> Option<T> {
        profile_function!();
        let index = handle.index();
        let slot = self
            .slots
            .get_mut(index as usize)
            .filter(|slot| slot.generation == handle.generation())?;
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(index);
        self.len -= 1;
        Some(value)
    }

    /// Removes every entry, retiring all outstanding handles.
    pub fn remove_all(&mut self) -> Vec<(Handle<T>, T)> {
        let mut removed = Vec::with_capacity(self.len);
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(value) = slot.value.take() {
                removed.push((Handle::new(slot.generation, index as u32), value));
                slot.generation = slot.generation.wrapping_add(1);
                self.free.push(index as u32);
            }
        }
        self.len = 0;
        removed
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.value
                .as_ref()
                .map(|value| (Handle::new(slot.generation, index as u32), value))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<T>, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(index, slot)| {
            let generation = slot.generation;
            slot.value
                .as_mut()
                .map(|value| (Handle::new(generation, index as u32), value))
        })
    }
}

impl<T> Default for HandleTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

static_assertions::assert_eq_size!(Handle<u8>, Option<Handle<u8>>);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_table_insert() {
        let mut table = HandleTable::<u8>::new();
        let handle = table.insert(15);
        assert_eq!(handle.generation(), 0);
        assert_eq!(handle.index(), 0);
        assert_eq!(table.get(handle), Some(&15));
    }

    #[test]
    fn test_handle_table_stale_generation() {
        let mut table = HandleTable::<u8>::new();
        let _ = table.insert(15);
        let forged = Handle::new(1, 0);
        assert!(table.get(forged).is_none());
    }

    #[test]
    fn test_handle_table_recycles_slot_with_new_generation() {
        let mut table = HandleTable::<u8>::new();
        let old = table.insert(15);
        assert_eq!(table.remove(old), Some(15));
        let new = table.insert(45);
        assert_eq!(old.index(), new.index());
        assert_ne!(old.generation(), new.generation());
        assert!(table.get(old).is_none());
        assert_eq!(table.get(new), Some(&45));
    }

    #[test]
    fn test_handle_table_double_remove() {
        let mut table = HandleTable::<u8>::new();
        let handle = table.insert(1);
        assert!(table.remove(handle).is_some());
        assert!(table.remove(handle).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn test_handle_table_iter_skips_free_slots() {
        let mut table = HandleTable::<u8>::new();
        let handles: Vec<_> = (0..100).map(|i| table.insert(i)).collect();
        table.remove(handles[0]);
        table.remove(handles[1]);
        let values: Vec<_> = table.iter().map(|(_, v)| *v).collect();
        assert_eq!(values.len(), 98);
        assert_eq!(values[0], 2);
        assert_eq!(table.len(), 98);
    }

    #[test]
    fn test_handle_table_remove_all() {
        let mut table = HandleTable::<u8>::new();
        let a = table.insert(1);
        let b = table.insert(2);
        let removed = table.remove_all();
        assert_eq!(removed.len(), 2);
        assert!(table.get(a).is_none());
        assert!(table.get(b).is_none());
        assert!(table.is_empty());
    }
}
