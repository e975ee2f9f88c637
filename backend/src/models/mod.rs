//! Domain models for the tandem queueing simulator

pub mod event;
pub mod stage;
pub mod state;
pub mod waiting_queue;

/// Job identifier, assigned in increasing order at arrival
pub type JobId = u64;

// Re-exports
pub use event::{Event, EventKind, EventLog, TraceRecord};
pub use stage::Stage;
pub use state::NetworkState;
pub use waiting_queue::{QueueError, WaitingQueue};
