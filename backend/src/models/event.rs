//! Simulation events and the event trace.
//!
//! An [`Event`] is a scheduled future occurrence: either the next job arrival
//! at stage 0 or the end of a service period at some stage. Events are
//! immutable once created and are consumed when popped from the
//! [`EventQueue`](crate::events::EventQueue).
//!
//! The [`EventLog`] optionally records every processed event together with
//! the occupancy levels that were in force up to it. Events enable:
//! - Deterministic replay comparison (two runs, same draws, same trace)
//! - Debugging (understand what happened and when)
//! - Re-deriving statistics independently of the live accumulators
//!
//! # Example
//!
//! ```rust
//! use tandem_simulator_core_rs::models::{Event, EventKind};
//!
//! let event = Event::complete(4.2, 17, 1);
//!
//! assert_eq!(event.kind(), EventKind::Complete { stage: 1 });
//! assert_eq!(event.stage(), Some(1));
//! assert_eq!(event.event_type(), "Complete");
//! ```

use serde::{Deserialize, Serialize};

use super::JobId;

/// What happens when an event fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A new job enters the network at stage 0
    Arrival,

    /// The job in service at `stage` finishes
    Complete { stage: usize },
}

/// A scheduled occurrence at a simulated instant
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    time: f64,
    job_id: JobId,
    kind: EventKind,
}

impl Event {
    /// Arrival of job `job_id` at `time`
    pub fn arrival(time: f64, job_id: JobId) -> Self {
        Self {
            time,
            job_id,
            kind: EventKind::Arrival,
        }
    }

    /// Service completion of job `job_id` at `stage`, firing at `time`
    pub fn complete(time: f64, job_id: JobId, stage: usize) -> Self {
        Self {
            time,
            job_id,
            kind: EventKind::Complete { stage },
        }
    }

    /// Simulated instant at which the event fires
    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Stage the event concerns (only meaningful for completions)
    pub fn stage(&self) -> Option<usize> {
        match self.kind {
            EventKind::Arrival => None,
            EventKind::Complete { stage } => Some(stage),
        }
    }

    /// Get a short description of the event type
    pub fn event_type(&self) -> &'static str {
        match self.kind {
            EventKind::Arrival => "Arrival",
            EventKind::Complete { .. } => "Complete",
        }
    }
}

/// One processed event, as seen by the driver loop
///
/// `stage_occupancy` and `in_system` are the levels that held during the
/// `elapsed` interval leading up to `time`, i.e. before the event was applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceRecord {
    pub time: f64,
    pub job_id: JobId,
    pub kind: EventKind,
    pub elapsed: f64,
    pub stage_occupancy: Vec<usize>,
    pub in_system: usize,
}

/// Append-only record of processed events
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    records: Vec<TraceRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn log(&mut self, record: TraceRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[TraceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records whose event concerned `stage` (completions only)
    pub fn completions_at(&self, stage: usize) -> impl Iterator<Item = &TraceRecord> {
        self.records
            .iter()
            .filter(move |r| r.kind == EventKind::Complete { stage })
    }

    /// Number of processed arrivals
    pub fn arrival_count(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.kind == EventKind::Arrival)
            .count()
    }
}
