//! Statistical scenario tests
//!
//! Long seeded runs compared against the stationary laws of exponential
//! tandem networks: each stage is an M/M/1 queue with `rho = lambda / mu`,
//! and the stages are independent in steady state (product form).
//!
//! Tolerances allow for sampling noise at a horizon of 10,000 time units.

use tandem_simulator_core_rs::stats::geometric_pmf;
use tandem_simulator_core_rs::{run, RngManager, RunReport, SimulationConfig};

const LEVELS: usize = 10;

fn run_scenario(service_rates: Vec<f64>, seed: u64) -> RunReport {
    let config = SimulationConfig {
        arrival_rate: 2.0,
        service_rates,
        duration_horizon: 10_000.0,
        record_trace: false,
    };
    run(config, RngManager::new(seed)).expect("scenario run failed")
}

#[test]
fn test_scenario_a_single_stage_matches_mm1() {
    let report = run_scenario(vec![3.0], 12345);
    let rho = 2.0 / 3.0;
    let stage = &report.per_stage[0];

    let deviation = stage.max_deviation(|n| geometric_pmf(rho, n), LEVELS);
    assert!(deviation < 0.03, "max deviation {} from M/M/1 law", deviation);

    let mean = stage.mean().unwrap();
    assert!((mean - 2.0).abs() < 0.25, "mean occupancy {} far from 2", mean);

    // With one stage the aggregate is the stage
    assert_eq!(report.aggregate, *stage);
}

#[test]
fn test_scenario_b_two_stage_tandem() {
    let report = run_scenario(vec![3.0, 5.0], 12345);

    let first = &report.per_stage[0];
    let second = &report.per_stage[1];

    let dev1 = first.max_deviation(|n| (1.0 / 3.0) * (2.0f64 / 3.0).powi(n as i32), LEVELS);
    let dev2 = second.max_deviation(|n| (3.0 / 5.0) * (2.0f64 / 5.0).powi(n as i32), LEVELS);
    assert!(dev1 < 0.03, "stage 1 deviation {}", dev1);
    assert!(dev2 < 0.03, "stage 2 deviation {}", dev2);

    let mean2 = second.mean().unwrap();
    assert!((mean2 - 2.0 / 3.0).abs() < 0.1, "stage 2 mean {}", mean2);
}

#[test]
fn test_scenario_b_aggregate_product_form() {
    let report = run_scenario(vec![3.0, 5.0], 42);

    // P(empty network) = P(stage 1 empty) * P(stage 2 empty) = 1/3 * 3/5
    let empty = report.aggregate.probability(0);
    assert!((empty - 0.2).abs() < 0.02, "P(empty) = {}", empty);

    let mean = report.aggregate.mean().unwrap();
    assert!((mean - 8.0 / 3.0).abs() < 0.3, "aggregate mean {}", mean);
}

#[test]
fn test_four_stage_tandem_each_stage_mm1() {
    let rates = vec![3.0, 5.0, 4.0, 6.0];
    let report = run_scenario(rates.clone(), 2024);

    for (stage, (dist, mu)) in report.per_stage.iter().zip(&rates).enumerate() {
        let rho = 2.0 / mu;
        let deviation = dist.max_deviation(|n| geometric_pmf(rho, n), LEVELS);
        assert!(
            deviation < 0.03,
            "stage {} deviates {} from M/M/1 with rho {}",
            stage,
            deviation,
            rho
        );
    }
}

#[test]
fn test_overloaded_stage_keeps_growing() {
    let config = SimulationConfig {
        arrival_rate: 2.0,
        service_rates: vec![1.5],
        duration_horizon: 2_000.0,
        record_trace: false,
    };
    let report = run(config, RngManager::new(12345)).unwrap();

    let stage = &report.per_stage[0];
    assert!(stage.max_level().unwrap() > 200);
    assert!(stage.mean().unwrap() > 100.0);

    let total: f64 = stage.slots().iter().sum();
    assert!((total - 1.0).abs() < 1e-9);
}
