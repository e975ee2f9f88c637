//! Network state
//!
//! Holds the per-stage records and the job counters of one tandem network.
//! The stage list is sized at construction and never changes during a run.

use serde::{Deserialize, Serialize};

use super::stage::Stage;
use super::JobId;

/// Mutable state of the tandem network
///
/// # Invariants
/// - `jobs_in_system() == stages.iter().map(Stage::occupancy).sum()`
/// - job ids are handed out in strictly increasing order, starting at 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkState {
    stages: Vec<Stage>,

    /// Jobs admitted so far; also the next job id
    total_jobs: u64,

    /// Jobs that finished the last stage
    departed_jobs: u64,
}

impl NetworkState {
    /// Create an empty network of `stage_count` idle stages
    pub fn new(stage_count: usize) -> Self {
        Self {
            stages: (0..stage_count).map(|_| Stage::new()).collect(),
            total_jobs: 0,
            departed_jobs: 0,
        }
    }

    /// Rebuild from checkpointed parts
    pub fn from_parts(stages: Vec<Stage>, total_jobs: u64, departed_jobs: u64) -> Self {
        Self {
            stages,
            total_jobs,
            departed_jobs,
        }
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage(&self, index: usize) -> Option<&Stage> {
        self.stages.get(index)
    }

    pub fn stage_mut(&mut self, index: usize) -> Option<&mut Stage> {
        self.stages.get_mut(index)
    }

    pub fn total_jobs(&self) -> u64 {
        self.total_jobs
    }

    pub fn departed_jobs(&self) -> u64 {
        self.departed_jobs
    }

    /// Id the next admitted job will receive
    pub fn next_job_id(&self) -> JobId {
        self.total_jobs
    }

    /// Assign an id to a newly arrived job
    pub fn admit_job(&mut self) -> JobId {
        let job_id = self.total_jobs;
        self.total_jobs += 1;
        job_id
    }

    /// Record that a job left the last stage
    pub fn record_departure(&mut self) {
        debug_assert!(self.departed_jobs < self.total_jobs);
        self.departed_jobs += 1;
    }

    /// Aggregate occupancy maintained from the job counters
    pub fn jobs_in_system(&self) -> usize {
        (self.total_jobs - self.departed_jobs) as usize
    }

    /// Occupancy of each stage, in stage order
    pub fn stage_occupancy(&self) -> Vec<usize> {
        self.stages.iter().map(Stage::occupancy).collect()
    }

    /// Aggregate occupancy derived by summing the stages
    pub fn summed_occupancy(&self) -> usize {
        self.stages.iter().map(Stage::occupancy).sum()
    }
}
