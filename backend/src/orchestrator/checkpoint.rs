//! Checkpoint - Save/Load Simulation State
//!
//! Enables serialization and deserialization of a running simulation for
//! pause/resume.
//!
//! # Critical Invariants
//!
//! - **Determinism**: A restored run continues exactly like the original
//! - **Single Server**: A busy stage has exactly one pending completion
//! - **Job Conservation**: Jobs in the stages match admitted minus departed
//! - **Config Matching**: State can only be loaded with matching config
//! - **Monotone Clock**: No pending event is scheduled before the saved clock

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::engine::{Simulation, SimulationConfig, SimulationError};
use crate::core::time::SimClock;
use crate::events::EventQueue;
use crate::models::{EventKind, EventLog, JobId, NetworkState, Stage, WaitingQueue};
use crate::rng::RngManager;
use crate::stats::OccupancyDistribution;

// ============================================================================
// Snapshot Structures
// ============================================================================

/// Complete simulation state snapshot
///
/// The event trace is not part of the snapshot; a restored simulation with
/// `record_trace` set starts a fresh log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// Simulated time at the snapshot
    pub clock: f64,

    /// RNG state at time of snapshot (CRITICAL for determinism)
    pub rng_state: u64,

    /// Per-stage server and waiting-queue state
    pub stages: Vec<StageSnapshot>,

    /// Pending events, tie-break sequence included
    pub pending_events: EventQueue,

    pub total_jobs: u64,
    pub departed_jobs: u64,
    pub events_processed: u64,

    /// Raw per-stage accumulators
    pub stage_occupancy: Vec<OccupancyDistribution>,

    /// Raw aggregate accumulator
    pub aggregate: OccupancyDistribution,

    /// SHA256 hash of original config (for validation)
    pub config_hash: String,
}

/// Stage state snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageSnapshot {
    pub in_service: Option<JobId>,
    pub waiting: WaitingQueue,
}

impl From<&Stage> for StageSnapshot {
    fn from(stage: &Stage) -> Self {
        StageSnapshot {
            in_service: stage.in_service(),
            waiting: stage.queue().clone(),
        }
    }
}

impl From<StageSnapshot> for Stage {
    fn from(snapshot: StageSnapshot) -> Self {
        Stage::from_parts(snapshot.in_service, snapshot.waiting)
    }
}

// ============================================================================
// Save / Load
// ============================================================================

impl Simulation<RngManager> {
    /// Capture the full state of this simulation
    pub fn snapshot(&self) -> Result<StateSnapshot, SimulationError> {
        Ok(StateSnapshot {
            clock: self.clock.now(),
            rng_state: self.rng.get_state(),
            stages: self.state.stages().iter().map(StageSnapshot::from).collect(),
            pending_events: self.events.clone(),
            total_jobs: self.state.total_jobs(),
            departed_jobs: self.state.departed_jobs(),
            events_processed: self.events_processed,
            stage_occupancy: self.stage_occupancy.clone(),
            aggregate: self.aggregate.clone(),
            config_hash: compute_config_hash(&HashedConfig::from(&self.config))?,
        })
    }

    /// Serialize the current state to JSON
    pub fn save_state(&self) -> Result<String, SimulationError> {
        serde_json::to_string(&self.snapshot()?).map_err(|e| {
            SimulationError::SerializationError(format!("State serialization failed: {}", e))
        })
    }

    /// Restore a simulation from JSON produced by [`Simulation::save_state`]
    ///
    /// # Errors
    ///
    /// - `SerializationError` if the JSON cannot be parsed
    /// - `ConfigMismatch` if `config` is not the config the state was saved with
    /// - `StateValidationError` if the snapshot breaks a state invariant
    pub fn load_state(config: SimulationConfig, json: &str) -> Result<Self, SimulationError> {
        let snapshot: StateSnapshot = serde_json::from_str(json).map_err(|e| {
            SimulationError::SerializationError(format!("State parsing failed: {}", e))
        })?;
        Self::from_snapshot(config, snapshot)
    }

    /// Restore a simulation from an in-memory snapshot
    pub fn from_snapshot(
        config: SimulationConfig,
        snapshot: StateSnapshot,
    ) -> Result<Self, SimulationError> {
        config.validate()?;

        let actual = compute_config_hash(&HashedConfig::from(&config))?;
        if snapshot.config_hash != actual {
            return Err(SimulationError::ConfigMismatch {
                expected: snapshot.config_hash,
                actual,
            });
        }

        validate_snapshot(&snapshot, config.stage_count())?;

        let stages = snapshot.stages.into_iter().map(Stage::from).collect();
        let event_log = config.record_trace.then(EventLog::new);

        Ok(Self {
            clock: SimClock::at(snapshot.clock),
            state: NetworkState::from_parts(stages, snapshot.total_jobs, snapshot.departed_jobs),
            events: snapshot.pending_events,
            rng: RngManager::new(snapshot.rng_state),
            stage_occupancy: snapshot.stage_occupancy,
            aggregate: snapshot.aggregate,
            events_processed: snapshot.events_processed,
            event_log,
            config,
        })
    }
}

// ============================================================================
// Config Hashing
// ============================================================================

/// The part of a [`SimulationConfig`] that shapes simulation state
///
/// `record_trace` only decides whether an event log is kept, so a run may be
/// restored with tracing switched on or off.
#[derive(Serialize)]
struct HashedConfig<'a> {
    arrival_rate: f64,
    service_rates: &'a [f64],
    duration_horizon: f64,
}

impl<'a> From<&'a SimulationConfig> for HashedConfig<'a> {
    fn from(config: &'a SimulationConfig) -> Self {
        HashedConfig {
            arrival_rate: config.arrival_rate,
            service_rates: &config.service_rates,
            duration_horizon: config.duration_horizon,
        }
    }
}

/// Compute deterministic SHA256 hash of config
///
/// Uses canonical JSON serialization with sorted keys so the hash does not
/// depend on field order.
pub fn compute_config_hash<T: Serialize>(config: &T) -> Result<String, SimulationError> {
    use serde_json::Value;
    use std::collections::BTreeMap;

    let value = serde_json::to_value(config).map_err(|e| {
        SimulationError::SerializationError(format!("Config serialization failed: {}", e))
    })?;

    fn canonicalize(value: Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> =
                    map.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
                Value::Object(sorted.into_iter().collect())
            }
            Value::Array(arr) => Value::Array(arr.into_iter().map(canonicalize).collect()),
            other => other,
        }
    }

    let json = serde_json::to_string(&canonicalize(value)).map_err(|e| {
        SimulationError::SerializationError(format!("Config serialization failed: {}", e))
    })?;

    let mut hasher = Sha256::new();
    hasher.update(json.as_bytes());
    Ok(format!("{:x}", hasher.finalize()))
}

// ============================================================================
// Validation Functions
// ============================================================================

/// Validate state snapshot integrity
///
/// Checks critical invariants:
/// - Stage count and accumulator count match the config
/// - Job conservation (stage occupancy sums to admitted minus departed)
/// - Every busy stage has exactly one pending completion for its job
/// - No completion is pending for an idle stage
/// - Exactly one arrival is pending, carrying the next job id
/// - No pending event fires before the snapshot clock
/// - Accumulated times are finite and non-negative
/// - Job ids are unique and below the admitted count
pub fn validate_snapshot(
    snapshot: &StateSnapshot,
    stage_count: usize,
) -> Result<(), SimulationError> {
    let invalid = |msg: String| -> Result<(), SimulationError> {
        Err(SimulationError::StateValidationError(msg))
    };

    if !(snapshot.clock.is_finite() && snapshot.clock >= 0.0) {
        return invalid(format!("Clock {} is not a valid time", snapshot.clock));
    }

    if snapshot.stages.len() != stage_count || snapshot.stage_occupancy.len() != stage_count {
        return invalid(format!(
            "Expected {} stages, snapshot has {} stages and {} accumulators",
            stage_count,
            snapshot.stages.len(),
            snapshot.stage_occupancy.len()
        ));
    }

    // 1. Job conservation
    if snapshot.departed_jobs > snapshot.total_jobs {
        return invalid(format!(
            "{} departures exceed {} admitted jobs",
            snapshot.departed_jobs, snapshot.total_jobs
        ));
    }
    let present: u64 = snapshot
        .stages
        .iter()
        .map(|s| s.waiting.len() as u64 + u64::from(s.in_service.is_some()))
        .sum();
    if present != snapshot.total_jobs - snapshot.departed_jobs {
        return invalid(format!(
            "Stages hold {} jobs but {} are in the system",
            present,
            snapshot.total_jobs - snapshot.departed_jobs
        ));
    }

    // 2. Job uniqueness
    let mut seen = HashSet::new();
    for (index, stage) in snapshot.stages.iter().enumerate() {
        for job_id in stage.in_service.into_iter().chain(stage.waiting.iter()) {
            if job_id >= snapshot.total_jobs {
                return invalid(format!(
                    "Job {} at stage {} was never admitted",
                    job_id, index
                ));
            }
            if !seen.insert(job_id) {
                return invalid(format!("Job {} appears more than once", job_id));
            }
        }
    }

    // 3. Pending events agree with the servers
    let mut arrivals = 0;
    let mut completions = vec![None; stage_count];
    for event in snapshot.pending_events.iter() {
        if !(event.time().is_finite() && event.time() >= snapshot.clock) {
            return invalid(format!(
                "{} event for job {} at {} precedes clock {}",
                event.event_type(),
                event.job_id(),
                event.time(),
                snapshot.clock
            ));
        }
        match event.kind() {
            EventKind::Arrival => {
                if event.job_id() != snapshot.total_jobs {
                    return invalid(format!(
                        "Pending arrival carries job {} but {} jobs were admitted",
                        event.job_id(),
                        snapshot.total_jobs
                    ));
                }
                arrivals += 1;
            }
            EventKind::Complete { stage } => {
                let Some(slot) = completions.get_mut(stage) else {
                    return invalid(format!("Completion scheduled at missing stage {}", stage));
                };
                if slot.replace(event.job_id()).is_some() {
                    return invalid(format!("Stage {} has two pending completions", stage));
                }
            }
        }
    }
    if arrivals != 1 {
        return invalid(format!("Expected one pending arrival, found {}", arrivals));
    }
    for (index, (stage, pending)) in snapshot.stages.iter().zip(&completions).enumerate() {
        if stage.in_service != *pending {
            return invalid(format!(
                "Stage {} serves {:?} but has completion pending for {:?}",
                index, stage.in_service, pending
            ));
        }
    }

    // 4. Accumulators hold elapsed time only
    let accumulators = snapshot
        .stage_occupancy
        .iter()
        .chain(std::iter::once(&snapshot.aggregate));
    for dist in accumulators {
        if let Some((level, amount)) = dist
            .slots()
            .iter()
            .enumerate()
            .find(|(_, v)| !(v.is_finite() && **v >= 0.0))
        {
            return invalid(format!(
                "Accumulated time {} at level {} is not a valid duration",
                amount, level
            ));
        }
    }

    if !snapshot.pending_events.is_valid_heap() {
        return invalid("Pending events are not in heap order".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_config_hash_deterministic() {
        #[derive(Serialize)]
        struct TestConfig {
            value: i32,
            name: String,
        }

        let hash1 = compute_config_hash(&TestConfig {
            value: 42,
            name: "test".to_string(),
        })
        .unwrap();
        let hash2 = compute_config_hash(&TestConfig {
            value: 42,
            name: "test".to_string(),
        })
        .unwrap();

        assert_eq!(hash1, hash2, "Same config should produce same hash");
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_compute_config_hash_different_for_different_configs() {
        let config1 = SimulationConfig {
            arrival_rate: 2.0,
            service_rates: vec![3.0],
            duration_horizon: 10.0,
            record_trace: false,
        };
        let mut config2 = config1.clone();
        config2.service_rates = vec![3.0, 5.0];

        assert_ne!(
            compute_config_hash(&config1).unwrap(),
            compute_config_hash(&config2).unwrap(),
            "Different configs should produce different hashes"
        );
    }

    #[test]
    fn test_trace_flag_not_hashed() {
        let plain = SimulationConfig {
            arrival_rate: 2.0,
            service_rates: vec![3.0],
            duration_horizon: 10.0,
            record_trace: false,
        };
        let traced = SimulationConfig {
            record_trace: true,
            ..plain.clone()
        };

        assert_eq!(
            compute_config_hash(&HashedConfig::from(&plain)).unwrap(),
            compute_config_hash(&HashedConfig::from(&traced)).unwrap()
        );
    }
}
