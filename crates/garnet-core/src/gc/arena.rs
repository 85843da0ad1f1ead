//! Slot arena backing one kind of heap allocation

use super::header::GcHeader;
use super::trace::Trace;

struct Slot<T> {
    header: GcHeader,
    value: Option<T>,
}

/// Indexed slot storage with a free list
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }
}

impl<T: Trace> Arena<T> {
    /// Create an empty arena
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` in a free slot and return its index
    pub fn insert(&mut self, value: T) -> u32 {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.header = GcHeader::new();
            slot.value = Some(value);
            return index;
        }
        self.slots.push(Slot {
            header: GcHeader::new(),
            value: Some(value),
        });
        (self.slots.len() - 1) as u32
    }

    /// Borrow the value at `index`, if the slot is occupied
    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).and_then(|slot| slot.value.as_ref())
    }

    /// Mutably borrow the value at `index`, if the slot is occupied
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index).and_then(|slot| slot.value.as_mut())
    }

    /// Header of an occupied slot
    pub fn header(&self, index: usize) -> Option<&GcHeader> {
        self.slots
            .get(index)
            .filter(|slot| slot.value.is_some())
            .map(|slot| &slot.header)
    }

    /// Number of occupied slots
    pub fn len(&self) -> usize {
        self.live
    }

    /// Whether no slot is occupied
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Total slots including free ones
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of free slots below the high-water mark
    pub fn fragmentation(&self) -> usize {
        self.free.len()
    }

    /// Mark an occupied slot; returns true only the first time
    pub(crate) fn mark(&mut self, index: usize) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) if slot.value.is_some() && !slot.header.is_marked() => {
                slot.header.mark();
                true
            }
            _ => false,
        }
    }

    /// Free every unmarked slot and clear marks on survivors
    pub(crate) fn sweep(&mut self) -> usize {
        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.value.is_none() {
                continue;
            }
            if slot.header.is_marked() {
                slot.header.unmark();
            } else {
                slot.value = None;
                self.free.push(index as u32);
                freed += 1;
            }
        }
        self.live -= freed;
        freed
    }

    /// Slide occupied slots to the front
    ///
    /// Returns the forwarding table indexed by old slot index.
    pub(crate) fn compact(&mut self) -> Vec<Option<u32>> {
        let mut forward = vec![None; self.slots.len()];
        let mut packed = Vec::with_capacity(self.live);
        for (old, slot) in std::mem::take(&mut self.slots).into_iter().enumerate() {
            if slot.value.is_some() {
                forward[old] = Some(packed.len() as u32);
                packed.push(slot);
            }
        }
        self.slots = packed;
        self.free.clear();
        forward
    }

    /// Iterate over occupied values mutably
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        self.slots.iter_mut().filter_map(|slot| slot.value.as_mut())
    }
}
