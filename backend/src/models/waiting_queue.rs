//! Stage waiting queue
//!
//! FIFO of job identifiers waiting for a stage's server, backed by a circular
//! buffer with explicit capacity management:
//!
//! - starts with zero capacity;
//! - on overflow grows to `max(16, 2 * capacity)`;
//! - after a pop that leaves `len < capacity / 4`, shrinks to `capacity / 4`.
//!
//! Every resize copies the live jobs, in order, to the start of a fresh
//! buffer. The growth and shrink thresholds are observable through
//! [`WaitingQueue::capacity`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::JobId;

/// Smallest non-zero capacity reached by growth
pub const MIN_GROWTH_CAPACITY: usize = 16;

/// Errors raised by the simulation's queues
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("Queue is empty")]
    Empty,

    #[error("Failed to allocate queue storage for {requested} entries")]
    AllocationFailed { requested: usize },

    #[error("Queue snapshot holds {len} jobs but capacity is only {capacity}")]
    InvalidSnapshot { len: usize, capacity: usize },
}

/// FIFO of waiting job identifiers
///
/// # Example
/// ```
/// use tandem_simulator_core_rs::models::WaitingQueue;
///
/// let mut queue = WaitingQueue::new();
/// assert_eq!(queue.capacity(), 0);
///
/// queue.add(7).unwrap();
/// queue.add(8).unwrap();
/// assert_eq!(queue.capacity(), 16);
///
/// assert_eq!(queue.pop(), Ok(7));
/// assert_eq!(queue.pop(), Ok(8));
/// assert!(queue.pop().is_err());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "QueueSnapshot", into = "QueueSnapshot")]
pub struct WaitingQueue {
    /// Ring storage; its length is the queue's capacity
    buffer: Vec<JobId>,
    start: usize,
    len: usize,
}

/// Serialized form: capacity plus jobs in service order
#[derive(Debug, Clone, Serialize, Deserialize)]
struct QueueSnapshot {
    capacity: usize,
    jobs: Vec<JobId>,
}

impl WaitingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Job at the head of the queue, if any
    pub fn front(&self) -> Option<JobId> {
        if self.is_empty() {
            None
        } else {
            Some(self.buffer[self.start])
        }
    }

    /// Append `job_id` at the tail
    ///
    /// # Errors
    /// `AllocationFailed` if the buffer could not grow.
    pub fn add(&mut self, job_id: JobId) -> Result<(), QueueError> {
        if self.len == self.capacity() {
            let grown = MIN_GROWTH_CAPACITY.max(self.capacity() * 2);
            self.resize(grown)?;
        }

        if self.is_empty() {
            self.start = 0;
        }

        let index = (self.start + self.len) % self.capacity();
        self.buffer[index] = job_id;
        self.len += 1;
        Ok(())
    }

    /// Remove and return the job at the head
    ///
    /// # Errors
    /// `Empty` if no job is waiting.
    pub fn pop(&mut self) -> Result<JobId, QueueError> {
        if self.is_empty() {
            return Err(QueueError::Empty);
        }

        let job_id = self.buffer[self.start];
        self.start = (self.start + 1) % self.capacity();
        self.len -= 1;

        let quarter = self.capacity() / 4;
        if self.len < quarter {
            self.resize(quarter)?;
        }

        Ok(job_id)
    }

    /// Jobs in service order, head first
    pub fn iter(&self) -> impl Iterator<Item = JobId> + '_ {
        let capacity = self.capacity();
        (0..self.len).map(move |i| self.buffer[(self.start + i) % capacity])
    }

    pub fn to_vec(&self) -> Vec<JobId> {
        self.iter().collect()
    }

    /// Move the live jobs into a fresh buffer of `capacity` slots at offset 0
    fn resize(&mut self, capacity: usize) -> Result<(), QueueError> {
        debug_assert!(capacity >= self.len);

        let mut buffer = Vec::new();
        buffer
            .try_reserve_exact(capacity)
            .map_err(|_| QueueError::AllocationFailed {
                requested: capacity,
            })?;
        buffer.extend(self.iter());
        buffer.resize(capacity, 0);

        tracing::debug!(
            old_capacity = self.capacity(),
            new_capacity = capacity,
            len = self.len,
            "waiting queue resized"
        );

        self.buffer = buffer;
        self.start = 0;
        Ok(())
    }
}

impl PartialEq for WaitingQueue {
    /// Queues are equal when they hold the same jobs in the same order with
    /// the same capacity, regardless of ring offset
    fn eq(&self, other: &Self) -> bool {
        self.capacity() == other.capacity() && self.iter().eq(other.iter())
    }
}

impl From<WaitingQueue> for QueueSnapshot {
    fn from(queue: WaitingQueue) -> Self {
        QueueSnapshot {
            capacity: queue.capacity(),
            jobs: queue.to_vec(),
        }
    }
}

impl TryFrom<QueueSnapshot> for WaitingQueue {
    type Error = QueueError;

    fn try_from(snapshot: QueueSnapshot) -> Result<Self, Self::Error> {
        let QueueSnapshot { capacity, mut jobs } = snapshot;
        if jobs.len() > capacity {
            return Err(QueueError::InvalidSnapshot {
                len: jobs.len(),
                capacity,
            });
        }

        let len = jobs.len();
        jobs.resize(capacity, 0);
        Ok(Self {
            buffer: jobs,
            start: 0,
            len,
        })
    }
}
