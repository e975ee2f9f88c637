//! Event scheduling
//!
//! Future events wait in a binary min-heap keyed by simulated time.

pub mod queue;

pub use queue::EventQueue;
