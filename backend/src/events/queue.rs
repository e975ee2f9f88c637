//! Event priority queue
//!
//! Binary min-heap of pending [`Event`]s stored in a growable array.
//! `insert` sifts up, `extract_min` moves the last leaf to the root and sifts
//! down. Storage doubles when full (first growth to 16 slots) and never
//! shrinks.
//!
//! Events with equal `time` come out in insertion order: every entry carries
//! a sequence number that breaks ties, so a run is replayable bit for bit.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::models::{Event, QueueError};

/// Smallest non-zero capacity reached by growth
const MIN_GROWTH_CAPACITY: usize = 16;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Entry {
    event: Event,
    seq: u64,
}

impl Entry {
    fn precedes(&self, other: &Entry) -> bool {
        self.event
            .time()
            .total_cmp(&other.event.time())
            .then(self.seq.cmp(&other.seq))
            == Ordering::Less
    }
}

/// Min-heap of scheduled events ordered by `(time, insertion sequence)`
///
/// # Example
/// ```
/// use tandem_simulator_core_rs::events::EventQueue;
/// use tandem_simulator_core_rs::models::Event;
///
/// let mut queue = EventQueue::new();
/// queue.insert(Event::arrival(3.0, 1)).unwrap();
/// queue.insert(Event::complete(1.5, 0, 0)).unwrap();
///
/// assert_eq!(queue.extract_min().unwrap().time(), 1.5);
/// assert_eq!(queue.extract_min().unwrap().time(), 3.0);
/// assert!(queue.extract_min().is_err());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventQueue {
    heap: Vec<Entry>,

    /// Sequence number handed to the next inserted event
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Allocated slots in the backing array
    pub fn capacity(&self) -> usize {
        self.heap.capacity()
    }

    /// Earliest pending event without removing it
    pub fn peek_min(&self) -> Option<&Event> {
        self.heap.first().map(|entry| &entry.event)
    }

    /// Schedule `event`
    ///
    /// # Errors
    /// `AllocationFailed` if the backing array could not grow.
    pub fn insert(&mut self, event: Event) -> Result<(), QueueError> {
        if self.heap.len() == self.heap.capacity() {
            self.grow()?;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Entry { event, seq });
        self.sift_up(self.heap.len() - 1);
        Ok(())
    }

    /// Remove and return the earliest event
    ///
    /// # Errors
    /// `Empty` if nothing is scheduled.
    pub fn extract_min(&mut self) -> Result<Event, QueueError> {
        if self.heap.is_empty() {
            return Err(QueueError::Empty);
        }

        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        let min = self.heap.pop().ok_or(QueueError::Empty)?;
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
        Ok(min.event)
    }

    /// Pending events in heap order (not sorted)
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.heap.iter().map(|entry| &entry.event)
    }

    /// Check the heap-order invariant over the whole array
    pub fn is_valid_heap(&self) -> bool {
        (1..self.heap.len()).all(|i| !self.heap[i].precedes(&self.heap[(i - 1) / 2]))
    }

    fn grow(&mut self) -> Result<(), QueueError> {
        let target = MIN_GROWTH_CAPACITY.max(self.heap.capacity() * 2);
        self.heap
            .try_reserve_exact(target - self.heap.len())
            .map_err(|_| QueueError::AllocationFailed { requested: target })?;
        tracing::debug!(capacity = target, "event queue grew");
        Ok(())
    }

    fn sift_up(&mut self, mut index: usize) {
        while index > 0 {
            let parent = (index - 1) / 2;
            if !self.heap[index].precedes(&self.heap[parent]) {
                break;
            }
            self.heap.swap(index, parent);
            index = parent;
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * index + 1;
            let right = left + 1;
            let mut smallest = index;

            if left < len && self.heap[left].precedes(&self.heap[smallest]) {
                smallest = left;
            }
            if right < len && self.heap[right].precedes(&self.heap[smallest]) {
                smallest = right;
            }
            if smallest == index {
                break;
            }
            self.heap.swap(index, smallest);
            index = smallest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_times_pop_in_insertion_order() {
        let mut queue = EventQueue::new();
        for job in 0..5 {
            queue.insert(Event::complete(2.0, job, 0)).unwrap();
        }

        let jobs: Vec<_> = (0..5)
            .map(|_| queue.extract_min().unwrap().job_id())
            .collect();
        assert_eq!(jobs, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_growth_doubles_from_minimum() {
        let mut queue = EventQueue::new();
        assert_eq!(queue.capacity(), 0);

        let mut capacities = Vec::new();
        for i in 0..33u64 {
            queue.insert(Event::arrival(i as f64, i)).unwrap();
            if matches!(i, 0 | 15 | 16 | 31 | 32) {
                capacities.push(queue.capacity());
            }
        }

        assert_eq!(capacities, vec![MIN_GROWTH_CAPACITY, 16, 32, 32, 64]);
    }

    #[test]
    fn test_capacity_never_shrinks() {
        let mut queue = EventQueue::new();
        for i in 0..40 {
            queue.insert(Event::arrival(i as f64, i)).unwrap();
        }
        let grown = queue.capacity();
        while !queue.is_empty() {
            queue.extract_min().unwrap();
        }
        assert_eq!(queue.capacity(), grown);
    }

    #[test]
    fn test_heap_stays_valid() {
        let mut queue = EventQueue::new();
        let times = [5.0, 1.0, 4.0, 1.0, 9.0, 0.5, 3.0, 7.0, 2.0];
        for (i, t) in times.iter().enumerate() {
            queue.insert(Event::arrival(*t, i as u64)).unwrap();
            assert!(queue.is_valid_heap());
        }
        queue.extract_min().unwrap();
        assert!(queue.is_valid_heap());
    }
}
