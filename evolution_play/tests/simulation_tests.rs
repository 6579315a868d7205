use approx::assert_relative_eq;
use evolution_play::replica::ReplicaRunner;
use evolution_play::{
    output, ConfigError, Metric, ModelConfig, NoiseSetting, Outcome, Simulation, Trait,
};

fn config(population: usize, iterations: usize) -> ModelConfig {
    let mut config = ModelConfig::baseline();
    config.population = population;
    config.iterations = iterations;
    config.sample_freq = 5;
    config.top_n = 5;
    config.noise = NoiseSetting::Probability(0.0);
    config
}

/// Every founder identical with all traits at `value`
fn clonal(mut config: ModelConfig, value: f64) -> ModelConfig {
    config.initial_trait_value = value;
    config.std_dev_initial_trait_value = 0.0;
    config
}

#[test]
fn test_two_cooperators_settle_down() {
    let mut config = clonal(config(2, 10), 0.9);
    config.deaths = 0.0;
    let mut sim = Simulation::new(&config, 1).unwrap();
    let summary = sim.run();

    let pop = sim.population();
    assert_eq!(pop.partner_of(0), Some(1));
    assert_relative_eq!(pop.get(0).payoff, 30.0);
    assert_relative_eq!(pop.get(1).payoff, 30.0);

    let mean = |m: Metric| summary.means.get(m).unwrap();
    assert_relative_eq!(mean(Metric::OutcomeShare(Outcome::Reward)), 1.0);
    assert_relative_eq!(mean(Metric::OutcomeShare(Outcome::Sucker)), 0.0);
    assert_relative_eq!(mean(Metric::Cooperations), 2.0);
    assert_relative_eq!(mean(Metric::Unattached), 0.0);
    // One courtship of 20 play rounds, at the first of two sample points
    assert_relative_eq!(mean(Metric::NewRelationships), 0.5);
    assert_relative_eq!(mean(Metric::PlayCount), 10.0);
    assert_relative_eq!(mean(Metric::PlayCountSquared), 200.0);
}

#[test]
fn test_forced_pair_single_round() {
    let mut config = clonal(config(2, 1), 0.9);
    config.sample_freq = 1;
    config.allowplay = false;
    config.allowdeceit = false;
    config.allowdivorce = false;
    config.emotions = false;
    config.deaths = 0.0;
    let mut sim = Simulation::new(&config, 77).unwrap();

    let report = sim.step().unwrap();

    assert_eq!(report.distinct, 1);
    assert_relative_eq!(sim.population().get(0).payoff, 3.0);
    assert_relative_eq!(sim.population().get(1).payoff, 3.0);
    assert_relative_eq!(sim.stats().get(0, Metric::OutcomeShare(Outcome::Reward)), 1.0);
    assert_relative_eq!(sim.stats().get(0, Metric::Payoff), 6.0);
}

#[test]
fn test_population_size_and_relationships_hold_every_iteration() {
    let config = config(60, 40);
    let mut sim = Simulation::new(&config, 99).unwrap();
    for _ in 0..config.iterations {
        sim.step();
        assert_eq!(sim.living().len(), 60);
        assert!(sim.population().relationships_are_symmetric());
    }
}

#[test]
fn test_offspring_stay_within_bounds() {
    let mut config = config(30, 30);
    config.mutation = 3.0;
    config.deaths = 0.5;
    let mut sim = Simulation::new(&config, 4).unwrap();
    sim.run();
    for agent in sim.population().agents() {
        assert!(agent
            .genotype
            .iter()
            .all(|(_, _, v)| (config.min_geno..=config.max_geno).contains(&v)));
    }
}

#[test]
fn test_no_deaths_keeps_strategy_counts() {
    let mut config = config(20, 30);
    config.deaths = 0.0;
    let mut sim = Simulation::new(&config, 6).unwrap();
    let first = sim.step().unwrap();
    while sim.iteration() < config.iterations {
        if let Some(report) = sim.step() {
            assert_eq!(report.modes, first.modes);
            assert_eq!(report.distinct, first.distinct);
        }
    }
}

#[test]
fn test_odd_population_keeps_its_leftover() {
    let mut config = config(5, 20);
    config.deaths = 0.2;
    let mut sim = Simulation::new(&config, 8).unwrap();
    for _ in 0..config.iterations {
        sim.step();
        assert_eq!(sim.living().len(), 5);
        assert!(sim.population().relationships_are_symmetric());
    }
}

#[test]
fn test_odd_population_legacy_drop() {
    let mut config = config(5, 20);
    config.deaths = 0.2;
    config.drop_unmatched_agent = true;
    let mut sim = Simulation::new(&config, 8).unwrap();
    sim.step();
    assert_eq!(sim.living().len(), 4);
    for _ in 1..config.iterations {
        sim.step();
        assert_eq!(sim.living().len(), 4);
    }
}

#[test]
fn test_same_seed_same_replica() {
    let config = config(40, 30);
    let mut a = Simulation::new(&config, 2024).unwrap();
    let mut b = Simulation::new(&config, 2024).unwrap();
    for _ in 0..config.iterations {
        assert_eq!(a.step(), b.step());
    }
    assert_eq!(a.summary(), b.summary());
}

#[test]
fn test_single_strategy_dominates_top_one() {
    let mut config = clonal(config(10, 20), 0.1);
    config.mutation = 0.0;
    config.top_n = 1;
    let mut sim = Simulation::new(&config, 3).unwrap();
    let summary = sim.run();

    assert_eq!(summary.modes.len(), 1);
    assert_eq!(summary.modes[0].frequency, 10 * config.num_samples());
    assert_eq!(sim.histogram().distinct(), 1);
    assert_eq!(summary.modes[0].strategy, sim.population().get(0).discretize(&config));
}

#[test]
fn test_defectors_always_divorce() {
    // Nobody plays, cooperates or stays attached
    let mut config = clonal(config(10, 10), -0.9);
    config.deaths = 0.0;
    let mut sim = Simulation::new(&config, 5).unwrap();
    let summary = sim.run();

    assert!(sim.population().agents().iter().all(|a| !a.is_partnered()));
    let mean = |m: Metric| summary.means.get(m).unwrap();
    assert_relative_eq!(mean(Metric::Unattached), 1.0);
    assert_relative_eq!(mean(Metric::OutcomeShare(Outcome::Punishment)), 1.0);
    assert_relative_eq!(mean(Metric::Cooperations), 0.0);
    assert_relative_eq!(mean(Metric::PlayCount), 0.0);
    assert!(mean(Metric::Payoff) < 0.0);
    // Divorce returns affect to BASE before the interaction is recorded
    assert_relative_eq!(mean(Metric::Phenotype(Trait::Attach)), -9.0, epsilon = 1e-9);
}

#[test]
fn test_baseline_config_file_loads() {
    let config = ModelConfig::load("configs/baseline.toml").unwrap();
    assert_eq!(config, ModelConfig::baseline());

    let missing = ModelConfig::load("configs/does_not_exist.toml");
    assert!(matches!(missing, Err(ConfigError::Read { .. })));
}

#[test]
fn test_runner_writes_outputs() {
    let mut config = config(16, 20);
    config.replicas = 3;
    config.base_seed = Some(11);
    let results = ReplicaRunner::new(config).unwrap().num_threads(2).run().unwrap();
    let records: Vec<_> = results.into_iter().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 3);

    let dir = tempfile::tempdir().unwrap();
    output::write_all(&records, dir.path()).unwrap();

    let jsonl = std::fs::read_to_string(dir.path().join("replicas.jsonl")).unwrap();
    assert_eq!(jsonl.lines().count(), 3);
    let first: serde_json::Value = serde_json::from_str(jsonl.lines().next().unwrap()).unwrap();
    assert_eq!(first["seed"], 11);
    assert_eq!(first["base_seed"], 11);
    assert!(first["p_R"].is_number());

    let mut rdr = csv::Reader::from_path(dir.path().join("summary.csv")).unwrap();
    assert_eq!(rdr.records().count(), 3);
}

#[test]
fn test_records_reach_disk_as_replicas_finish() {
    let mut config = config(16, 20);
    config.replicas = 4;
    config.base_seed = Some(5);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(output::RECORDS_FILE);
    let sink = output::record_sink(Some(dir.path())).unwrap();

    let seen = path.clone();
    ReplicaRunner::new(config)
        .unwrap()
        .num_threads(2)
        .on_record(sink)
        .progress(move |completed, _total| {
            let text = std::fs::read_to_string(&seen).unwrap();
            assert!(text.lines().count() >= completed);
        })
        .run()
        .unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let mut seeds: Vec<u64> = text
        .lines()
        .map(|line| {
            let value: serde_json::Value = serde_json::from_str(line).unwrap();
            value["seed"].as_u64().unwrap()
        })
        .collect();
    seeds.sort();
    assert_eq!(seeds, vec![5, 6, 7, 8]);
}

#[test]
fn test_loaded_config_is_validated_by_the_runner() {
    let text = std::fs::read_to_string("configs/baseline.toml")
        .unwrap()
        .replace("population = 500", "population = 1");
    let config = ModelConfig::from_toml_str(&text).unwrap();
    assert!(matches!(
        ReplicaRunner::new(config),
        Err(ConfigError::Invalid { field: "population", .. })
    ));
}
