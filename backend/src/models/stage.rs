//! Per-stage server record
//!
//! A stage is a single server plus its waiting queue. The server is busy
//! exactly when it holds a job; at most one job is ever in service.

use serde::{Deserialize, Serialize};

use super::waiting_queue::{QueueError, WaitingQueue};
use super::JobId;

/// One single-server station in the tandem line
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    /// Job currently being served, if the server is busy
    in_service: Option<JobId>,

    /// Jobs waiting for the server, in service order
    queue: WaitingQueue,
}

impl Stage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a stage from checkpointed parts
    pub fn from_parts(in_service: Option<JobId>, queue: WaitingQueue) -> Self {
        Self { in_service, queue }
    }

    pub fn is_busy(&self) -> bool {
        self.in_service.is_some()
    }

    pub fn in_service(&self) -> Option<JobId> {
        self.in_service
    }

    pub fn queue(&self) -> &WaitingQueue {
        &self.queue
    }

    /// Jobs present at the stage: waiting plus in service
    pub fn occupancy(&self) -> usize {
        self.queue.len() + usize::from(self.is_busy())
    }

    /// Put `job_id` on the server
    ///
    /// # Panics
    /// Panics if the server is already busy.
    pub fn start_service(&mut self, job_id: JobId) {
        assert!(self.in_service.is_none(), "server already busy");
        self.in_service = Some(job_id);
    }

    /// Release the server, returning the job it held
    pub fn finish_service(&mut self) -> Option<JobId> {
        self.in_service.take()
    }

    /// Append `job_id` to the waiting queue
    pub fn enqueue(&mut self, job_id: JobId) -> Result<(), QueueError> {
        self.queue.add(job_id)
    }

    /// Take the head of the waiting queue, if anyone is waiting
    pub fn next_waiting(&mut self) -> Result<Option<JobId>, QueueError> {
        if self.queue.is_empty() {
            Ok(None)
        } else {
            self.queue.pop().map(Some)
        }
    }
}
