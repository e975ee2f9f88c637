//! Simulation state machine tests
//!
//! Hand-traced runs with scripted service and interarrival durations, plus
//! invariant checks over long seeded runs.
//!
//! Critical invariants tested:
//! - Single server: a busy stage has exactly one pending completion for the
//!   job it serves, an idle stage has none
//! - Aggregate occupancy equals the per-stage sum at every event boundary
//! - Events are processed in non-decreasing time order
//! - Same draws produce the same run

use tandem_simulator_core_rs::models::EventKind;
use tandem_simulator_core_rs::rng::UniformSource;
use tandem_simulator_core_rs::{
    run, OccupancyDistribution, RngManager, Simulation, SimulationConfig, SimulationError,
};

// ============================================================================
// Test Helpers
// ============================================================================

/// Uniform source replaying draws that map to fixed durations at rate 1
struct ScriptedDurations {
    draws: Vec<f64>,
    next: usize,
}

impl ScriptedDurations {
    fn new(durations: &[f64]) -> Self {
        Self {
            draws: durations.iter().map(|d| 1.0 - (-d).exp()).collect(),
            next: 0,
        }
    }
}

impl UniformSource for ScriptedDurations {
    fn next_uniform(&mut self) -> f64 {
        let u = self.draws[self.next % self.draws.len()];
        self.next += 1;
        u
    }
}

/// Uniform source that always returns the same value
struct ConstantDraw(f64);

impl UniformSource for ConstantDraw {
    fn next_uniform(&mut self) -> f64 {
        self.0
    }
}

fn unit_rate_config(stages: usize, horizon: f64) -> SimulationConfig {
    SimulationConfig {
        arrival_rate: 1.0,
        service_rates: vec![1.0; stages],
        duration_horizon: horizon,
        record_trace: true,
    }
}

fn seeded_config(service_rates: Vec<f64>, horizon: f64) -> SimulationConfig {
    SimulationConfig {
        arrival_rate: 2.0,
        service_rates,
        duration_horizon: horizon,
        record_trace: true,
    }
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {}, got {}",
        expected,
        actual
    );
}

fn assert_invariants<R: UniformSource>(sim: &Simulation<R>) {
    let state = sim.state();
    assert_eq!(state.jobs_in_system(), state.summed_occupancy());

    let mut pending = vec![0usize; state.stage_count()];
    let mut arrivals = 0;
    for event in sim.events().iter() {
        match event.kind() {
            EventKind::Arrival => arrivals += 1,
            EventKind::Complete { stage } => {
                pending[stage] += 1;
                assert_eq!(
                    state.stage(stage).unwrap().in_service(),
                    Some(event.job_id()),
                    "completion pending for a job not in service at stage {}",
                    stage
                );
            }
        }
    }
    assert_eq!(arrivals, 1, "exactly one arrival must be pending");

    for (index, stage) in state.stages().iter().enumerate() {
        assert_eq!(
            pending[index],
            usize::from(stage.is_busy()),
            "stage {} has {} pending completions",
            index,
            pending[index]
        );
        assert!(stage.queue().len() <= stage.queue().capacity());
    }
}

// ============================================================================
// Hand-traced runs
// ============================================================================

#[test]
fn test_single_stage_trace() {
    let source = ScriptedDurations::new(&[1.0, 3.0, 1.0, 5.0, 0.5, 1.0, 1.0]);
    let mut sim = Simulation::new(unit_rate_config(1, 6.9), source).unwrap();

    // t=1: job 0 arrives to an idle server
    let step = sim.step().unwrap().unwrap();
    assert_eq!(step.admitted, Some(0));
    assert_close(step.elapsed, 1.0);
    assert_eq!(sim.state().stage(0).unwrap().in_service(), Some(0));

    // t=2: job 1 arrives and waits
    let step = sim.step().unwrap().unwrap();
    assert_eq!(step.admitted, Some(1));
    assert_eq!(sim.state().stage(0).unwrap().queue().to_vec(), vec![1]);

    // t=4: job 0 leaves, job 1 is backfilled
    let step = sim.step().unwrap().unwrap();
    assert_eq!(step.event.kind(), EventKind::Complete { stage: 0 });
    assert_eq!(step.event.job_id(), 0);
    assert_close(step.event.time(), 4.0);
    assert_eq!(sim.state().departed_jobs(), 1);
    assert_eq!(sim.state().stage(0).unwrap().in_service(), Some(1));
    assert!(sim.state().stage(0).unwrap().queue().is_empty());

    // t=4.5: job 1 leaves
    let step = sim.step().unwrap().unwrap();
    assert_eq!(step.event.job_id(), 1);
    assert_close(step.event.time(), 4.5);
    assert!(!sim.state().stage(0).unwrap().is_busy());

    // t=7: job 2 arrives past the horizon; the run stops after it
    let step = sim.step().unwrap().unwrap();
    assert_eq!(step.admitted, Some(2));
    assert!(sim.is_complete());
    assert!(sim.step().unwrap().is_none());

    let acc = &sim.stage_accumulators()[0];
    assert_close(acc.probability(0), 3.5);
    assert_close(acc.probability(1), 1.5);
    assert_close(acc.probability(2), 2.0);
    assert_eq!(sim.aggregate_accumulator(), acc);

    let report = sim.report().unwrap();
    assert_close(report.per_stage[0].probability(0), 0.5);
    assert_eq!(report.total_jobs, 3);
    assert_eq!(report.departed_jobs, 2);
    assert_eq!(report.events_processed, 5);
}

#[test]
fn test_two_stage_handoff_and_backfill() {
    let source = ScriptedDurations::new(&[1.0, 1.0, 0.5, 10.0, 2.0, 1.0, 1.0, 1.0, 1.0]);
    let mut sim = Simulation::new(unit_rate_config(2, 6.0), source).unwrap();

    sim.step().unwrap(); // t=1.0: job 0 starts at stage 0
    sim.step().unwrap(); // t=1.5: job 1 waits at stage 0

    // t=2: job 0 moves to idle stage 1 AND job 1 is backfilled at stage 0
    let step = sim.step().unwrap().unwrap();
    assert_eq!(step.event.kind(), EventKind::Complete { stage: 0 });
    let stages = sim.state().stages();
    assert_eq!(stages[0].in_service(), Some(1));
    assert!(stages[0].queue().is_empty());
    assert_eq!(stages[1].in_service(), Some(0));
    assert_invariants(&sim);

    // t=3: job 1 finds stage 1 busy and waits there; stage 0 goes idle
    let step = sim.step().unwrap().unwrap();
    assert_eq!(step.event.job_id(), 1);
    let stages = sim.state().stages();
    assert!(!stages[0].is_busy());
    assert_eq!(stages[1].in_service(), Some(0));
    assert_eq!(stages[1].queue().to_vec(), vec![1]);
    assert_invariants(&sim);

    // t=4: job 0 departs, job 1 backfilled at stage 1
    let step = sim.step().unwrap().unwrap();
    assert_eq!(step.event.kind(), EventKind::Complete { stage: 1 });
    assert_eq!(sim.state().departed_jobs(), 1);
    assert_eq!(sim.state().stages()[1].in_service(), Some(1));

    // t=5: job 1 departs
    sim.step().unwrap();
    assert_eq!(sim.state().departed_jobs(), 2);
    assert_eq!(sim.state().jobs_in_system(), 0);

    // t=11.5: next arrival, past the horizon
    let step = sim.step().unwrap().unwrap();
    assert_eq!(step.event.kind(), EventKind::Arrival);
    assert!(sim.step().unwrap().is_none());

    let acc = sim.stage_accumulators();
    assert_close(acc[0].probability(0), 9.5);
    assert_close(acc[0].probability(1), 1.5);
    assert_close(acc[0].probability(2), 0.5);
    assert_close(acc[1].probability(0), 8.5);
    assert_close(acc[1].probability(1), 2.0);
    assert_close(acc[1].probability(2), 1.0);

    let aggregate = sim.aggregate_accumulator();
    assert_close(aggregate.probability(0), 7.5);
    assert_close(aggregate.probability(1), 1.5);
    assert_close(aggregate.probability(2), 2.5);
    assert_close(aggregate.total(), 11.5);

    let log = sim.event_log().unwrap();
    let occupancy: Vec<Vec<usize>> = log
        .records()
        .iter()
        .map(|r| r.stage_occupancy.clone())
        .collect();
    assert_eq!(
        occupancy,
        vec![
            vec![0, 0],
            vec![1, 0],
            vec![2, 0],
            vec![1, 1],
            vec![0, 2],
            vec![0, 1],
            vec![0, 0],
        ]
    );
}

// ============================================================================
// Seeded runs
// ============================================================================

#[test]
fn test_invariants_hold_every_step() {
    let mut sim = Simulation::with_seed(seeded_config(vec![3.0, 2.5, 4.0], 500.0), 777).unwrap();
    let mut last_time = 0.0;

    assert_invariants(&sim);
    while let Some(step) = sim.step().unwrap() {
        assert!(step.event.time() >= last_time, "events out of order");
        assert!(step.elapsed >= 0.0);
        last_time = step.event.time();
        assert_invariants(&sim);
    }

    assert!(sim.state().total_jobs() > 500);
}

#[test]
fn test_aggregate_matches_per_stage_sum() {
    let mut sim = Simulation::with_seed(seeded_config(vec![3.0, 5.0, 2.5], 2_000.0), 99).unwrap();
    sim.run().unwrap();

    let log = sim.event_log().unwrap();
    let mut derived = OccupancyDistribution::new();
    let mut per_stage = vec![OccupancyDistribution::new(); 3];
    for record in log.records() {
        assert_eq!(record.in_system, record.stage_occupancy.iter().sum::<usize>());
        derived
            .add(record.stage_occupancy.iter().sum(), record.elapsed)
            .unwrap();
        for (dist, level) in per_stage.iter_mut().zip(&record.stage_occupancy) {
            dist.add(*level, record.elapsed).unwrap();
        }
    }

    assert_eq!(&derived, sim.aggregate_accumulator());
    assert_eq!(per_stage.as_slice(), sim.stage_accumulators());
}

#[test]
fn test_same_seed_same_run() {
    let config = seeded_config(vec![3.0, 5.0], 1_000.0);

    let mut sim1 = Simulation::with_seed(config.clone(), 2024).unwrap();
    let mut sim2 = Simulation::with_seed(config, 2024).unwrap();
    let report1 = sim1.run().unwrap();
    let report2 = sim2.run().unwrap();

    assert_eq!(sim1.event_log(), sim2.event_log());
    assert_eq!(report1, report2);
}

#[test]
fn test_different_seeds_diverge() {
    let config = seeded_config(vec![3.0], 200.0);
    let report1 = run(config.clone(), RngManager::new(1)).unwrap();
    let report2 = run(config, RngManager::new(2)).unwrap();

    assert_ne!(report1, report2);
}

#[test]
fn test_job_ids_increase_at_arrival() {
    let mut sim = Simulation::with_seed(seeded_config(vec![3.0, 5.0], 300.0), 5).unwrap();
    let mut expected = 0;

    while let Some(step) = sim.step().unwrap() {
        if let Some(job_id) = step.admitted {
            assert_eq!(job_id, expected);
            expected += 1;
        }
    }
    assert_eq!(expected, sim.state().total_jobs());
}

#[test]
fn test_jobs_visit_stages_in_order() {
    let mut sim = Simulation::with_seed(seeded_config(vec![4.0, 3.0, 5.0], 300.0), 11).unwrap();
    sim.run().unwrap();

    let log = sim.event_log().unwrap();
    let mut next_stage = std::collections::HashMap::new();
    for record in log.records() {
        match record.kind {
            EventKind::Arrival => {
                next_stage.insert(record.job_id, 0);
            }
            EventKind::Complete { stage } => {
                let expected = next_stage.get_mut(&record.job_id).unwrap();
                assert_eq!(stage, *expected, "job {} skipped a stage", record.job_id);
                *expected += 1;
            }
        }
    }

    // Single-server FIFO tandem: departures happen in arrival order
    let departures: Vec<_> = log.completions_at(2).map(|r| r.job_id).collect();
    assert!(departures.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_run_stops_at_horizon() {
    let mut sim = Simulation::with_seed(seeded_config(vec![3.0], 100.0), 3).unwrap();
    let report = sim.run().unwrap();

    assert!(report.final_clock >= 100.0);
    let records = sim.event_log().unwrap().records();
    let before_last = records[records.len() - 2].time;
    assert!(before_last < 100.0);
    assert_eq!(report.events_processed as usize, records.len());
}

#[test]
fn test_distributions_are_normalized() {
    let report = run(seeded_config(vec![3.0, 5.0, 4.0], 1_000.0), RngManager::new(8)).unwrap();

    for dist in report.per_stage.iter().chain(std::iter::once(&report.aggregate)) {
        let total: f64 = dist.slots().iter().sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert!(dist.slots().iter().all(|&p| p >= 0.0));
    }
}

#[test]
fn test_many_stage_network() {
    let rates = vec![3.0, 3.5, 4.0, 4.5, 5.0, 5.5, 6.0, 6.5, 7.0, 7.5];
    let report = run(seeded_config(rates, 500.0), RngManager::new(21)).unwrap();

    assert_eq!(report.per_stage.len(), 10);
    assert!(report.departed_jobs > 0);
    assert!(report.departed_jobs <= report.total_jobs);
}

#[test]
fn test_borrowed_source_keeps_state() {
    let mut rng = RngManager::new(64);
    let before = rng.get_state();

    run(seeded_config(vec![3.0], 50.0), &mut rng).unwrap();

    assert_ne!(rng.get_state(), before);
}

#[test]
fn test_invalid_config_rejected() {
    let config = SimulationConfig {
        arrival_rate: 2.0,
        service_rates: vec![3.0, 0.0],
        duration_horizon: 10.0,
        record_trace: false,
    };
    assert!(Simulation::with_seed(config, 1).is_err());
}

#[test]
fn test_trace_off_by_default_in_json() {
    let config = SimulationConfig::from_json(
        r#"{"arrival_rate": 1.0, "service_rates": [2.0], "duration_horizon": 10.0}"#,
    )
    .unwrap();
    let mut sim = Simulation::with_seed(config, 1).unwrap();
    sim.run().unwrap();

    assert!(sim.event_log().is_none());
}

#[test]
fn test_draw_of_one_is_an_error() {
    let err = Simulation::new(unit_rate_config(1, 10.0), ConstantDraw(1.0))
        .err()
        .unwrap();
    assert_eq!(err, SimulationError::UniformOutOfRange { value: 1.0 });
}

#[test]
fn test_bad_draw_mid_run_is_an_error() {
    let mut draws = ScriptedDurations::new(&[1.0]);
    draws.draws.push(-0.25);
    let mut sim = Simulation::new(unit_rate_config(1, 10.0), draws).unwrap();

    // Arrival at t=1 draws a service time from the negative value
    let err = sim.step().unwrap_err();
    assert_eq!(err, SimulationError::UniformOutOfRange { value: -0.25 });
}
