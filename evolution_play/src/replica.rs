//! Parallel execution of independent replicas
//!
//! Each replica builds its own [`Simulation`] from the shared configuration
//! and a seed derived from the runner's base seed, so results are identical
//! regardless of thread count or scheduling order.
//!
//! # Example
//!
//! ```rust
//! use evolution_play::replica::{simple_progress_reporter, ReplicaRunner};
//! use evolution_play::ModelConfig;
//!
//! let mut config = ModelConfig::baseline();
//! config.population = 20;
//! config.iterations = 20;
//! config.sample_freq = 10;
//! config.replicas = 4;
//! config.base_seed = Some(42);
//!
//! let results = ReplicaRunner::new(config)
//!     .unwrap()
//!     .progress(simple_progress_reporter(2))
//!     .num_threads(2)
//!     .run()
//!     .unwrap();
//!
//! assert_eq!(results.len(), 4);
//! assert_eq!(results[3].as_ref().unwrap().seed, 45);
//! ```
//!
//! # Error Handling
//!
//! Panics in individual replicas are caught and returned as `Err(String)`.
//! The other replicas run to completion.

use crate::agent::Genotype;
use crate::config::{ConfigError, ModelConfig};
use crate::error::Error;
use crate::evolution::Simulation;
use crate::stats::{MetricMeans, ModeSlots};
use rand::Rng;
use rayon::prelude::*;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// One output row: the configuration merged with a replica's summary
#[derive(Debug, Clone, Serialize)]
pub struct ReplicaRecord {
    #[serde(flatten)]
    pub config: ModelConfig,
    #[serde(rename = "Replica")]
    pub replica: usize,
    pub seed: u64,
    #[serde(flatten)]
    pub means: MetricMeans,
    #[serde(flatten)]
    pub modes: ModeSlots,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agents: Option<Vec<Genotype>>,
    pub timestamp: String,
}

/// Runs `config.replicas` replicas on a rayon pool
pub struct ReplicaRunner {
    config: ModelConfig,
    base_seed: u64,
    num_threads: Option<usize>,
    progress_callback: Option<Arc<dyn Fn(usize, usize) + Send + Sync>>,
    record_sink: Option<Arc<dyn Fn(&ReplicaRecord) + Send + Sync>>,
}

impl ReplicaRunner {
    /// Validate the configuration and fix the base seed
    ///
    /// Without `base_seed` in the configuration a seed is drawn from the
    /// thread RNG; it is logged and written back into the configuration.
    pub fn new(mut config: ModelConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let base_seed = match config.base_seed {
            Some(seed) => seed,
            None => {
                let seed = rand::rng().random::<u64>();
                tracing::info!(base_seed = seed, "no base seed configured, drew one");
                seed
            }
        };
        config.base_seed = Some(base_seed);
        Ok(ReplicaRunner {
            config,
            base_seed,
            num_threads: None,
            progress_callback: None,
            record_sink: None,
        })
    }

    pub fn base_seed(&self) -> u64 {
        self.base_seed
    }

    pub fn seed_for(&self, replica: usize) -> u64 {
        self.base_seed.wrapping_add(replica as u64)
    }

    /// Set number of threads (defaults to rayon's global pool)
    pub fn num_threads(mut self, n: usize) -> Self {
        self.num_threads = Some(n);
        self
    }

    /// Set progress callback, called with `(completed, total)` after each replica
    pub fn progress<P>(mut self, callback: P) -> Self
    where
        P: Fn(usize, usize) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Arc::new(callback));
        self
    }

    /// Set a sink called with each successful record as soon as its replica
    /// finishes, in completion order
    pub fn on_record<S>(mut self, sink: S) -> Self
    where
        S: Fn(&ReplicaRecord) + Send + Sync + 'static,
    {
        self.record_sink = Some(Arc::new(sink));
        self
    }

    /// Execute every replica and return the results in replica order
    pub fn run(self) -> Result<Vec<Result<ReplicaRecord, String>>, Error> {
        let total = self.config.replicas;
        tracing::info!(
            replicas = total,
            population = self.config.population,
            iterations = self.config.iterations,
            base_seed = self.base_seed,
            "starting run"
        );
        let progress_counter = AtomicUsize::new(0);

        let pool = match self.num_threads {
            Some(n) => Some(rayon::ThreadPoolBuilder::new().num_threads(n).build()?),
            None => None,
        };

        let execute = || {
            (0..total)
                .into_par_iter()
                .map(|replica| {
                    let seed = self.seed_for(replica);
                    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                        run_replica(&self.config, replica, seed)
                    }));

                    if let (Some(sink), Ok(Ok(record))) = (&self.record_sink, &result) {
                        sink(record);
                    }

                    let completed = progress_counter.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(ref callback) = self.progress_callback {
                        callback(completed, total);
                    }

                    match result {
                        Ok(Ok(record)) => Ok(record),
                        Ok(Err(err)) => Err(err.to_string()),
                        Err(panic) => Err(panic_message(&*panic)),
                    }
                })
                .collect()
        };

        Ok(match pool {
            Some(pool) => pool.install(execute),
            None => execute(),
        })
    }
}

/// Run one replica to completion
pub fn run_replica(
    config: &ModelConfig,
    replica: usize,
    seed: u64,
) -> Result<ReplicaRecord, ConfigError> {
    let span = tracing::info_span!("replica", replica, seed);
    let _guard = span.enter();

    let mut simulation = Simulation::new(config, seed)?;
    let summary = simulation.run();
    tracing::info!(
        strategies = simulation.histogram().distinct(),
        "replica complete"
    );

    Ok(ReplicaRecord {
        config: config.clone(),
        replica,
        seed,
        means: summary.means,
        modes: ModeSlots(summary.modes),
        agents: summary.genotypes,
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Progress callback logging every `interval` completed replicas
pub fn simple_progress_reporter(interval: usize) -> impl Fn(usize, usize) + Send + Sync {
    let interval = interval.max(1);
    move |completed, total| {
        if completed % interval == 0 || completed == total {
            tracing::info!("Completed {}/{} replicas", completed, total);
        }
    }
}
