//! Sweep and compaction: frees every handle the colouring pass didn't mark,
//! then rebuilds the busy list in (allocation) order.
//!
//! Every busy handle lacking both COLOUR and NO_SWEEP is freed; surviving
//! blocks are concatenated, and the handle list must remain ordered by heap
//! position before and after, on pain of ABEND. Because this heap holds
//! owned values rather than raw bytes, "concatenating" is just retaining
//! the surviving handles' relative order — there's no byte block to slide.

use crate::gc::{Heap, HandleStatus};

/// Outcome of one collection cycle, for `STATISTICS`/`UNUSED` reporting and
/// the fixed-point test ("`collect(); collect();` produces no further
/// changes in `heap_pointer`").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SweepStats {
    pub freed: usize,
    pub freed_bytes: usize,
    pub survivors: usize,
}

/// Runs one sweep: clears every surviving handle's COLOUR bit (ready for the
/// next cycle) and frees the rest.
pub fn sweep(heap: &mut Heap) -> SweepStats {
    let mut stats = SweepStats::default();
    let busy: Vec<_> = heap.busy_handles().to_vec();
    let mut survivors = Vec::with_capacity(busy.len());
    for id in busy {
        let keep = {
            let h = heap.get(id);
            h.status.has(HandleStatus::COLOUR) || h.status.has(HandleStatus::NO_SWEEP)
        };
        if keep {
            heap.get_mut(id).status.clear(HandleStatus::COLOUR);
            survivors.push(id);
            stats.survivors += 1;
        } else {
            let size = heap.get(id).size;
            heap.free_public(id);
            stats.freed += 1;
            stats.freed_bytes += size;
        }
    }
    heap.set_busy_order(survivors);
    heap.collections += 1;
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::moid::MoidId;
    use crate::value::StackValue;

    #[test]
    fn uncoloured_handles_are_freed() {
        let mut heap = Heap::new(1024);
        let a = heap.try_allocate(MoidId(0), StackValue::Int(1), 8).unwrap();
        let stats = sweep(&mut heap);
        assert_eq!(stats.freed, 1);
        assert_eq!(stats.survivors, 0);
        assert_eq!(heap.occupancy(), 0);
        let b = heap.try_allocate(MoidId(0), StackValue::Int(2), 8).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn coloured_handles_survive_and_are_uncoloured_after() {
        let mut heap = Heap::new(1024);
        let a = heap.try_allocate(MoidId(0), StackValue::Int(1), 8).unwrap();
        heap.get_mut(a).status.set(HandleStatus::COLOUR);
        let stats = sweep(&mut heap);
        assert_eq!(stats.survivors, 1);
        assert!(!heap.get(a).status.has(HandleStatus::COLOUR));
    }

    #[test]
    fn a_second_sweep_with_no_new_allocations_is_a_fixed_point() {
        let mut heap = Heap::new(1024);
        heap.try_allocate(MoidId(0), StackValue::Int(1), 8).unwrap();
        let before = sweep(&mut heap).freed_bytes;
        let after = sweep(&mut heap).freed_bytes;
        assert_eq!(before, 8);
        assert_eq!(after, 0);
        assert_eq!(heap.occupancy(), 0);
    }
}
