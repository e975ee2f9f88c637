//! Orchestrator Engine
//!
//! Driver loop and stage state machine of the tandem network:
//! - Job arrivals at stage 0 (Poisson stream)
//! - Service completions and hand-off to the next stage
//! - Backfill of an idle server from its own waiting queue
//! - Time-weighted occupancy accumulation, per stage and in aggregate
//!
//! # Architecture
//!
//! ```text
//! Until the clock reaches the horizon or no event is pending:
//! 1. Extract the earliest event
//! 2. Credit the elapsed interval to the current occupancy levels
//! 3. Advance the clock to the event time
//! 4. Apply the transition (which schedules zero or more new events)
//! ```
//!
//! # Example
//!
//! ```rust
//! use tandem_simulator_core_rs::orchestrator::{Simulation, SimulationConfig};
//!
//! let config = SimulationConfig {
//!     arrival_rate: 2.0,
//!     service_rates: vec![3.0, 5.0],
//!     duration_horizon: 100.0,
//!     record_trace: false,
//! };
//!
//! let mut sim = Simulation::with_seed(config, 12345).unwrap();
//! let report = sim.run().unwrap();
//!
//! assert_eq!(report.per_stage.len(), 2);
//! let total: f64 = report.aggregate.slots().iter().sum();
//! assert!((total - 1.0).abs() < 1e-9);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::instrument;

use crate::core::time::SimClock;
use crate::events::EventQueue;
use crate::models::{
    Event, EventKind, EventLog, JobId, NetworkState, QueueError, Stage, TraceRecord,
};
use crate::rng::{exponential, RngManager, UniformSource};
use crate::stats::{DistributionError, OccupancyDistribution};

// ============================================================================
// Configuration Types
// ============================================================================

/// Complete simulation configuration
///
/// The number of stages is the length of `service_rates`. Seeding is not
/// part of the configuration: callers hand a [`UniformSource`] to
/// [`Simulation::new`] or a seed to [`Simulation::with_seed`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Poisson arrival rate at stage 0
    pub arrival_rate: f64,

    /// Exponential service rate of each stage, in visiting order
    pub service_rates: Vec<f64>,

    /// Simulated time after which the run stops
    pub duration_horizon: f64,

    /// Keep an [`EventLog`] of every processed event
    #[serde(default)]
    pub record_trace: bool,
}

impl SimulationConfig {
    /// Parse a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, SimulationError> {
        serde_json::from_str(json).map_err(|e| {
            SimulationError::SerializationError(format!("Config parsing failed: {}", e))
        })
    }

    pub fn stage_count(&self) -> usize {
        self.service_rates.len()
    }

    /// Utilization `arrival_rate / service_rate` of each stage
    pub fn utilizations(&self) -> Vec<f64> {
        self.service_rates
            .iter()
            .map(|rate| self.arrival_rate / rate)
            .collect()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.service_rates.is_empty() {
            return Err(SimulationError::InvalidConfig(
                "Must have at least one stage".to_string(),
            ));
        }

        if !is_positive(self.arrival_rate) {
            return Err(SimulationError::InvalidConfig(format!(
                "arrival_rate must be finite and > 0, got {}",
                self.arrival_rate
            )));
        }

        for (stage, rate) in self.service_rates.iter().enumerate() {
            if !is_positive(*rate) {
                return Err(SimulationError::InvalidConfig(format!(
                    "service rate of stage {} must be finite and > 0, got {}",
                    stage, rate
                )));
            }
        }

        if !is_positive(self.duration_horizon) {
            return Err(SimulationError::InvalidConfig(format!(
                "duration_horizon must be finite and > 0, got {}",
                self.duration_horizon
            )));
        }

        Ok(())
    }
}

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

// ============================================================================
// Results and Errors
// ============================================================================

/// Outcome of processing a single event
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    /// The event that was processed
    pub event: Event,

    /// Simulated time credited to the previous occupancy levels
    pub elapsed: f64,

    /// Job id assigned, for arrivals
    pub admitted: Option<JobId>,
}

/// Final distributions and counters of a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Normalized occupancy distribution of each stage
    pub per_stage: Vec<OccupancyDistribution>,

    /// Normalized distribution of jobs in the whole network
    pub aggregate: OccupancyDistribution,

    /// Jobs admitted at stage 0
    pub total_jobs: u64,

    /// Jobs that completed the last stage
    pub departed_jobs: u64,

    /// Events popped and applied
    pub events_processed: u64,

    /// Clock value when the run stopped
    pub final_clock: f64,
}

/// Simulation error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulationError {
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Distribution error: {0}")]
    Distribution(#[from] DistributionError),

    #[error("Stage {stage} does not exist in a {stage_count}-stage network")]
    UnknownStage { stage: usize, stage_count: usize },

    #[error("Completion of job {job_id} at stage {stage}, but the server holds {in_service:?}")]
    ServiceMismatch {
        stage: usize,
        job_id: JobId,
        in_service: Option<JobId>,
    },

    #[error("Uniform source returned {value}, outside [0, 1)")]
    UniformOutOfRange { value: f64 },

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Config mismatch: checkpoint hash {expected}, config hash {actual}")]
    ConfigMismatch { expected: String, actual: String },

    #[error("Invalid state: {0}")]
    StateValidationError(String),
}

// ============================================================================
// Simulation
// ============================================================================

/// Simulation context plus driver loop for one run
///
/// Owns the clock, the network state, the pending events, the uniform source
/// and the occupancy accumulators. Nothing outside the run mutates it.
///
/// # Determinism
///
/// All randomness comes from the uniform source. Same configuration + same
/// sequence of draws = identical events and identical distributions.
#[derive(Debug)]
pub struct Simulation<R = RngManager> {
    pub(crate) config: SimulationConfig,
    pub(crate) clock: SimClock,
    pub(crate) state: NetworkState,
    pub(crate) events: EventQueue,
    pub(crate) rng: R,

    /// Raw time spent at each occupancy level, per stage
    pub(crate) stage_occupancy: Vec<OccupancyDistribution>,

    /// Raw time spent at each aggregate occupancy level
    pub(crate) aggregate: OccupancyDistribution,

    pub(crate) events_processed: u64,
    pub(crate) event_log: Option<EventLog>,
}

impl Simulation<RngManager> {
    /// Create a simulation driven by a seeded xorshift generator
    pub fn with_seed(config: SimulationConfig, seed: u64) -> Result<Self, SimulationError> {
        Self::new(config, RngManager::new(seed))
    }
}

impl<R: UniformSource> Simulation<R> {
    /// Create a new simulation and schedule the first arrival
    ///
    /// # Errors
    /// `InvalidConfig` if the configuration fails validation.
    pub fn new(config: SimulationConfig, rng: R) -> Result<Self, SimulationError> {
        config.validate()?;

        let stage_count = config.stage_count();
        let event_log = config.record_trace.then(EventLog::new);

        let mut sim = Self {
            state: NetworkState::new(stage_count),
            clock: SimClock::new(),
            events: EventQueue::new(),
            rng,
            stage_occupancy: vec![OccupancyDistribution::new(); stage_count],
            aggregate: OccupancyDistribution::new(),
            events_processed: 0,
            event_log,
            config,
        };

        sim.schedule_arrival()?;
        Ok(sim)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Current simulated time
    pub fn clock(&self) -> f64 {
        self.clock.now()
    }

    pub fn state(&self) -> &NetworkState {
        &self.state
    }

    /// Pending events
    pub fn events(&self) -> &EventQueue {
        &self.events
    }

    pub fn events_processed(&self) -> u64 {
        self.events_processed
    }

    /// Event trace, if `record_trace` was set
    pub fn event_log(&self) -> Option<&EventLog> {
        self.event_log.as_ref()
    }

    /// Raw (unnormalized) per-stage accumulators
    pub fn stage_accumulators(&self) -> &[OccupancyDistribution] {
        &self.stage_occupancy
    }

    /// Raw (unnormalized) aggregate accumulator
    pub fn aggregate_accumulator(&self) -> &OccupancyDistribution {
        &self.aggregate
    }

    /// Whether the run has stopped: horizon reached or nothing scheduled
    pub fn is_complete(&self) -> bool {
        self.clock.has_reached(self.config.duration_horizon) || self.events.is_empty()
    }

    // ========================================================================
    // Driver Loop
    // ========================================================================

    /// Process the earliest pending event
    ///
    /// # Returns
    ///
    /// * `Ok(Some(StepResult))` - one event was applied
    /// * `Ok(None)` - the run is complete, nothing was done
    /// * `Err(SimulationError)` - an invariant was violated; the run is unusable
    pub fn step(&mut self) -> Result<Option<StepResult>, SimulationError> {
        if self.is_complete() {
            return Ok(None);
        }

        let event = self.events.extract_min()?;
        let elapsed = event.time() - self.clock.now();

        self.accumulate(&event, elapsed)?;
        self.clock.advance_to(event.time());

        let admitted = match event.kind() {
            EventKind::Arrival => Some(self.handle_arrival(&event)?),
            EventKind::Complete { stage } => {
                self.handle_completion(stage, event.job_id())?;
                None
            }
        };

        self.events_processed += 1;
        tracing::trace!(
            time = event.time(),
            job_id = event.job_id(),
            event_type = event.event_type(),
            stage = ?event.stage(),
            "processed event"
        );

        Ok(Some(StepResult {
            event,
            elapsed,
            admitted,
        }))
    }

    /// Run to completion and return the normalized distributions
    #[instrument(skip(self))]
    pub fn run(&mut self) -> Result<RunReport, SimulationError> {
        tracing::info!(
            stages = self.config.stage_count(),
            arrival_rate = self.config.arrival_rate,
            service_rates = ?self.config.service_rates,
            horizon = self.config.duration_horizon,
            "starting run"
        );

        while self.step()?.is_some() {}

        tracing::info!(
            events = self.events_processed,
            total_jobs = self.state.total_jobs(),
            departed_jobs = self.state.departed_jobs(),
            clock = self.clock.now(),
            "run complete"
        );

        self.report()
    }

    /// Normalized distributions for the time simulated so far
    ///
    /// # Errors
    /// `Distribution(ZeroTotal)` if no simulated time has elapsed yet.
    pub fn report(&self) -> Result<RunReport, SimulationError> {
        let per_stage = self
            .stage_occupancy
            .iter()
            .map(OccupancyDistribution::normalized)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(RunReport {
            per_stage,
            aggregate: self.aggregate.normalized()?,
            total_jobs: self.state.total_jobs(),
            departed_jobs: self.state.departed_jobs(),
            events_processed: self.events_processed,
            final_clock: self.clock.now(),
        })
    }

    // ========================================================================
    // Statistics
    // ========================================================================

    /// Credit `elapsed` to the levels that held since the previous event
    fn accumulate(&mut self, event: &Event, elapsed: f64) -> Result<(), SimulationError> {
        let in_system = self.state.jobs_in_system();
        debug_assert_eq!(in_system, self.state.summed_occupancy());

        for (stage, dist) in self.state.stages().iter().zip(&mut self.stage_occupancy) {
            dist.add(stage.occupancy(), elapsed)?;
        }
        self.aggregate.add(in_system, elapsed)?;

        if let Some(log) = &mut self.event_log {
            log.log(TraceRecord {
                time: event.time(),
                job_id: event.job_id(),
                kind: event.kind(),
                elapsed,
                stage_occupancy: self.state.stage_occupancy(),
                in_system,
            });
        }

        Ok(())
    }

    // ========================================================================
    // Stage Transitions
    // ========================================================================

    /// Admit a new job at stage 0 and schedule the next arrival
    fn handle_arrival(&mut self, event: &Event) -> Result<JobId, SimulationError> {
        let job_id = self.state.admit_job();
        debug_assert_eq!(job_id, event.job_id());

        self.route_to(0, job_id)?;
        self.schedule_arrival()?;
        Ok(job_id)
    }

    /// Finish service at `stage`, hand the job forward, backfill the server
    fn handle_completion(&mut self, stage: usize, job_id: JobId) -> Result<(), SimulationError> {
        let stage_count = self.state.stage_count();
        match self.stage_mut(stage)?.finish_service() {
            Some(served) if served == job_id => {}
            in_service => {
                return Err(SimulationError::ServiceMismatch {
                    stage,
                    job_id,
                    in_service,
                })
            }
        }

        if stage + 1 < stage_count {
            self.route_to(stage + 1, job_id)?;
        } else {
            self.state.record_departure();
        }

        let waiting = self.stage_mut(stage)?.next_waiting()?;
        if let Some(next) = waiting {
            self.begin_service(stage, next)?;
        }

        Ok(())
    }

    /// Serve `job_id` at `stage` right away if the server is idle, else queue it
    fn route_to(&mut self, stage: usize, job_id: JobId) -> Result<(), SimulationError> {
        let server = self.stage_mut(stage)?;
        if server.is_busy() {
            server.enqueue(job_id)?;
            Ok(())
        } else {
            self.begin_service(stage, job_id)
        }
    }

    /// Occupy the idle server at `stage` and schedule its completion
    fn begin_service(&mut self, stage: usize, job_id: JobId) -> Result<(), SimulationError> {
        self.stage_mut(stage)?.start_service(job_id);

        let duration = self.draw_exponential(self.config.service_rates[stage])?;
        let event = Event::complete(self.clock.now() + duration, job_id, stage);
        self.events.insert(event)?;
        Ok(())
    }

    fn schedule_arrival(&mut self) -> Result<(), SimulationError> {
        let gap = self.draw_exponential(self.config.arrival_rate)?;
        let event = Event::arrival(self.clock.now() + gap, self.state.next_job_id());
        self.events.insert(event)?;
        Ok(())
    }

    /// Exponential duration from the next uniform draw
    fn draw_exponential(&mut self, rate: f64) -> Result<f64, SimulationError> {
        let u = self.rng.next_uniform();
        if !(0.0..1.0).contains(&u) {
            return Err(SimulationError::UniformOutOfRange { value: u });
        }
        Ok(exponential(rate, u))
    }

    fn stage_mut(&mut self, stage: usize) -> Result<&mut Stage, SimulationError> {
        let stage_count = self.state.stage_count();
        self.state
            .stage_mut(stage)
            .ok_or(SimulationError::UnknownStage { stage, stage_count })
    }
}

/// Run `config` to completion with the given uniform source
///
/// # Example
///
/// ```rust
/// use tandem_simulator_core_rs::orchestrator::{run, SimulationConfig};
/// use tandem_simulator_core_rs::RngManager;
///
/// let config = SimulationConfig {
///     arrival_rate: 1.0,
///     service_rates: vec![2.0],
///     duration_horizon: 50.0,
///     record_trace: false,
/// };
///
/// let report = run(config, RngManager::new(7)).unwrap();
/// assert!(report.final_clock >= 50.0);
/// ```
pub fn run<R: UniformSource>(
    config: SimulationConfig,
    rng: R,
) -> Result<RunReport, SimulationError> {
    Simulation::new(config, rng)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(service_rates: Vec<f64>) -> SimulationConfig {
        SimulationConfig {
            arrival_rate: 2.0,
            service_rates,
            duration_horizon: 10.0,
            record_trace: false,
        }
    }

    #[test]
    fn test_validate_rejects_empty_network() {
        let err = config(vec![]).validate().unwrap_err();
        assert!(matches!(err, SimulationError::InvalidConfig(_)));
    }

    #[test]
    fn test_validate_rejects_bad_rates() {
        assert!(config(vec![0.0]).validate().is_err());
        assert!(config(vec![f64::INFINITY]).validate().is_err());
        assert!(config(vec![-1.0]).validate().is_err());

        let mut bad_arrival = config(vec![1.0]);
        bad_arrival.arrival_rate = f64::NAN;
        assert!(bad_arrival.validate().is_err());

        let mut bad_horizon = config(vec![1.0]);
        bad_horizon.duration_horizon = 0.0;
        assert!(bad_horizon.validate().is_err());
    }

    #[test]
    fn test_new_schedules_first_arrival() {
        let sim = Simulation::with_seed(config(vec![3.0]), 1).unwrap();
        assert_eq!(sim.events().len(), 1);

        let first = sim.events().peek_min().unwrap();
        assert_eq!(first.kind(), EventKind::Arrival);
        assert_eq!(first.job_id(), 0);
        assert!(first.time() > 0.0);
    }

    #[test]
    fn test_completion_for_unknown_stage_is_fatal() {
        let mut sim = Simulation::with_seed(config(vec![3.0]), 1).unwrap();
        let err = sim.handle_completion(4, 0).unwrap_err();
        assert_eq!(
            err,
            SimulationError::UnknownStage {
                stage: 4,
                stage_count: 1
            }
        );
    }

    #[test]
    fn test_completion_on_idle_server_is_fatal() {
        let mut sim = Simulation::with_seed(config(vec![3.0]), 1).unwrap();
        let err = sim.handle_completion(0, 0).unwrap_err();
        assert!(matches!(
            err,
            SimulationError::ServiceMismatch {
                in_service: None,
                ..
            }
        ));
    }

    #[test]
    fn test_report_before_any_time_is_zero_total() {
        let sim = Simulation::with_seed(config(vec![3.0]), 1).unwrap();
        assert_eq!(
            sim.report().unwrap_err(),
            SimulationError::Distribution(DistributionError::ZeroTotal)
        );
    }

    #[test]
    fn test_config_from_json_defaults_trace_off() {
        let config = SimulationConfig::from_json(
            r#"{"arrival_rate": 2.0, "service_rates": [3.0, 5.0], "duration_horizon": 100.0}"#,
        )
        .unwrap();
        assert!(!config.record_trace);
        assert_eq!(config.stage_count(), 2);
        assert_eq!(config.utilizations(), vec![2.0 / 3.0, 0.4]);
    }
}
