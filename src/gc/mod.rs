//! The heap: a handle-indirected store of generator-allocated values, plus
//! the statistics the interpreter consults to decide when to run a
//! collection cycle.
//!
//! Unlike a byte-precise implementation, a [`Handle`] owns a `StackValue`
//! directly rather than a raw byte block — [`crate::value`]'s composite
//! values already give deep-copy-on-clone semantics, so the heap's job
//! reduces to bookkeeping (status bits, busy/free lists, occupancy) rather
//! than byte-level allocation.

pub mod colour;
pub mod compact;
pub mod generator;

use crate::moid::MoidId;
use crate::value::{HandleId, StackValue};

/// Status bits carried per handle: ALLOCATED, COLOUR, COOKIE, NO_SWEEP.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandleStatus(pub u8);

impl HandleStatus {
    pub const ALLOCATED: u8 = 1 << 0;
    pub const COLOUR: u8 = 1 << 1;
    pub const COOKIE: u8 = 1 << 2;
    pub const NO_SWEEP: u8 = 1 << 3;

    pub fn has(&self, bit: u8) -> bool {
        self.0 & bit != 0
    }
    pub fn set(&mut self, bit: u8) {
        self.0 |= bit;
    }
    pub fn clear(&mut self, bit: u8) {
        self.0 &= !bit;
    }
}

/// One heap block: a value plus the bookkeeping the collector needs.
#[derive(Debug, Clone)]
pub struct Handle {
    pub status: HandleStatus,
    pub value: StackValue,
    pub mode: MoidId,
    pub size: usize,
}

/// Heap-exhaustion error, reported by [`Heap::allocate`] when even a
/// collection pass didn't free enough room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutOfCore;

/// Handle table plus occupancy counters. `busy` is kept in heap-offset
/// order throughout, matching before and after compaction; since this
/// implementation has no literal byte offsets, "heap order" is simply
/// allocation order, preserved by appending to `busy` and letting
/// [`compact`] rebuild it.
#[derive(Debug)]
pub struct Heap {
    slots: Vec<Option<Handle>>,
    free: Vec<HandleId>,
    busy: Vec<HandleId>,
    capacity: usize,
    used: usize,
    pub collections: usize,
}

impl Heap {
    pub fn new(capacity: usize) -> Self {
        Heap {
            slots: Vec::new(),
            free: Vec::new(),
            busy: Vec::new(),
            capacity,
            used: 0,
            collections: 0,
        }
    }

    pub fn occupancy(&self) -> usize {
        self.used
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn busy_handles(&self) -> &[HandleId] {
        &self.busy
    }

    pub fn get(&self, id: HandleId) -> &Handle {
        self.slots[id.0 as usize].as_ref().expect("dangling handle")
    }

    pub fn get_mut(&mut self, id: HandleId) -> &mut Handle {
        self.slots[id.0 as usize].as_mut().expect("dangling handle")
    }

    /// Reserves `size` bytes of heap accounting and stores `value`, taking
    /// a slot from `free` if one is available and linking it onto `busy`.
    /// Returns `Err(OutOfCore)` if `size` would exceed `capacity` even with
    /// the slot reused.
    pub fn try_allocate(&mut self, mode: MoidId, value: StackValue, size: usize) -> Result<HandleId, OutOfCore> {
        if self.used + size > self.capacity {
            return Err(OutOfCore);
        }
        let handle = Handle {
            status: HandleStatus(HandleStatus::ALLOCATED),
            value,
            mode,
            size,
        };
        let id = match self.free.pop() {
            Some(id) => {
                self.slots[id.0 as usize] = Some(handle);
                id
            }
            None => {
                let id = HandleId(self.slots.len() as u32);
                self.slots.push(Some(handle));
                id
            }
        };
        self.busy.push(id);
        self.used += size;
        Ok(id)
    }

    /// Frees a handle outside of a collection cycle (used when a value's
    /// owner is dropped explicitly, e.g. a file close). Collection cycles
    /// call [`Heap::free_public`]/[`Heap::set_busy_order`] directly through
    /// [`compact::sweep`] instead of going through the `busy` list scan this
    /// does.
    fn free_handle(&mut self, id: HandleId) {
        if let Some(handle) = self.slots[id.0 as usize].take() {
            self.used -= handle.size;
            self.free.push(id);
        }
        self.busy.retain(|&b| b != id);
    }

    /// Frees a handle already known to be off the busy list (the caller,
    /// [`compact::sweep`], is mid-rebuild of it).
    pub(crate) fn free_public(&mut self, id: HandleId) {
        if let Some(handle) = self.slots[id.0 as usize].take() {
            self.used -= handle.size;
            self.free.push(id);
        }
    }

    /// Replaces the busy list wholesale, used by [`compact::sweep`] after it
    /// has decided which handles survived.
    pub(crate) fn set_busy_order(&mut self, busy: Vec<HandleId>) {
        self.busy = busy;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moid::MoidId;

    #[test]
    fn allocate_tracks_occupancy_and_busy_order() {
        let mut heap = Heap::new(1024);
        let a = heap.try_allocate(MoidId(0), StackValue::Int(1), 8).unwrap();
        let b = heap.try_allocate(MoidId(0), StackValue::Int(2), 8).unwrap();
        assert_eq!(heap.occupancy(), 16);
        assert_eq!(heap.busy_handles(), &[a, b]);
    }

    #[test]
    fn allocation_past_capacity_is_out_of_core() {
        let mut heap = Heap::new(8);
        heap.try_allocate(MoidId(0), StackValue::Int(1), 8).unwrap();
        assert_eq!(heap.try_allocate(MoidId(0), StackValue::Int(2), 8), Err(OutOfCore));
    }

    #[test]
    fn freeing_a_handle_reclaims_its_slot() {
        let mut heap = Heap::new(16);
        let a = heap.try_allocate(MoidId(0), StackValue::Int(1), 8).unwrap();
        heap.free_handle(a);
        assert_eq!(heap.occupancy(), 0);
        let b = heap.try_allocate(MoidId(0), StackValue::Int(2), 8).unwrap();
        assert_eq!(a, b);
    }
}
