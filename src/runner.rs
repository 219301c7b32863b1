//! Evolutionary loop execution.
//!
//! [`GpRunner`] orchestrates a complete run: population creation →
//! evaluation → generate → statistics, repeated for the configured number
//! of generations, steady state or generational as the configuration says.

use crate::config::GpConfig;
use crate::individual::Individual;
use crate::node::Catalog;
use crate::population::Population;
use crate::rng::create_rng;
use crate::types::Problem;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One row of the generation report.
///
/// Captures generation index plus best, average and worst of the three
/// population measures. `Display` renders an aligned report row matching
/// [`GenerationStats::header`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GenerationStats {
    /// Generation index; 0 is the freshly created population.
    pub generation: usize,

    /// Standardized fitness of the best member.
    pub best_fitness: f64,

    /// Mean standardized fitness over all members.
    pub avg_fitness: f64,

    /// Standardized fitness of the worst member.
    pub worst_fitness: f64,

    /// Node count of the best member.
    pub best_length: usize,

    /// Mean node count over all members.
    pub avg_length: f64,

    /// Node count of the worst member.
    pub worst_length: usize,

    /// Tree depth of the best member.
    pub best_depth: usize,

    /// Mean tree depth over all members.
    pub avg_depth: f64,

    /// Tree depth of the worst member.
    pub worst_depth: usize,
}

impl GenerationStats {
    /// Reads one report row off a population.
    ///
    /// # Panics
    /// Panics if the population is empty.
    pub fn capture(generation: usize, population: &Population) -> Self {
        let best = population.best();
        let worst = population.worst();
        GenerationStats {
            generation,
            best_fitness: best.fitness(),
            avg_fitness: population.avg_fitness(),
            worst_fitness: worst.fitness(),
            best_length: best.length(),
            avg_length: population.avg_length(),
            worst_length: worst.length(),
            best_depth: best.depth(),
            avg_depth: population.avg_depth(),
            worst_depth: worst.depth(),
        }
    }

    /// Two legend lines aligned with the `Display` row.
    pub fn header() -> String {
        format!(
            "{:>4} {:^35} {:^22} {:^19}\n\
             {:>4} {:>11} {:>11} {:>11} {:>6} {:>8} {:>6} {:>5} {:>7} {:>5}",
            "", "fitness", "length", "depth",
            "gen", "best", "avg", "worst", "best", "avg", "worst", "best", "avg", "worst",
        )
    }
}

impl fmt::Display for GenerationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>4} {:>11.4} {:>11.4} {:>11.4} {:>6} {:>8.2} {:>6} {:>5} {:>7.2} {:>5}",
            self.generation,
            self.best_fitness,
            self.avg_fitness,
            self.worst_fitness,
            self.best_length,
            self.avg_length,
            self.worst_length,
            self.best_depth,
            self.avg_depth,
            self.worst_depth,
        )
    }
}

/// Result of a genetic programming run.
///
/// Contains the best program found, along with statistics about the
/// evolutionary process.
#[derive(Debug, Clone)]
pub struct GpResult {
    /// The best individual found during the entire run.
    pub best: Individual,

    /// Best standardized fitness (same as `best.fitness()`).
    pub best_fitness: f64,

    /// Total number of generations executed.
    pub generations: usize,

    /// Whether the run was cancelled externally.
    pub cancelled: bool,

    /// One report row per generation, starting with generation 0.
    pub history: Vec<GenerationStats>,
}

/// Executes the evolutionary loop.
///
/// # Usage
///
/// ```ignore
/// let catalog = build_catalog();
/// let config = GpConfig::default().with_seed(42);
/// let result = GpRunner::run(&problem, &catalog, &config);
/// println!("Best fitness: {}", result.best_fitness);
/// ```
pub struct GpRunner;

impl GpRunner {
    /// Runs the optimization.
    ///
    /// # Panics
    /// Panics if the configuration is invalid (call [`GpConfig::validate`]
    /// first to get a descriptive error) or if any node set in the catalog
    /// is incomplete.
    pub fn run<P: Problem>(problem: &P, catalog: &Catalog, config: &GpConfig) -> GpResult {
        Self::run_with_cancel(problem, catalog, config, None)
    }

    /// Runs the optimization with an optional cancellation token.
    ///
    /// If `cancel` is `Some` and the flag is set to `true`, the run stops
    /// before the next generation and returns the best solution found so
    /// far.
    pub fn run_with_cancel<P: Problem>(
        problem: &P,
        catalog: &Catalog,
        config: &GpConfig,
        cancel: Option<Arc<AtomicBool>>,
    ) -> GpResult {
        config.validate().expect("invalid GpConfig");

        let mut rng = match config.seed {
            Some(seed) => create_rng(seed),
            None => create_rng(rand::random()),
        };

        // 1. Create and evaluate the initial population
        let mut population = Population::new(config.clone());
        population.create(catalog, problem, &mut rng);

        // 2. Track best and start the report history
        let mut best = population.best().clone();
        let mut best_fitness = best.fitness();
        let mut history = Vec::with_capacity(config.number_of_generations + 1);
        let stats = GenerationStats::capture(0, &population);
        log::debug!("{}", stats);
        problem.on_generation(0, &stats);
        history.push(stats);

        let mut cancelled = false;

        // 3. Evolutionary loop
        for gen in 1..=config.number_of_generations {
            // Check cancellation
            if let Some(ref flag) = cancel {
                if flag.load(Ordering::Relaxed) {
                    cancelled = true;
                    break;
                }
            }

            if config.steady_state {
                population.generate(None, catalog, problem, &mut rng);
            } else {
                let mut next = Population::new(config.clone());
                population.generate(Some(&mut next), catalog, problem, &mut rng);
                population = next;
            }

            // Update best
            let gen_best = population.best();
            if gen_best.fitness() < best_fitness {
                best = gen_best.clone();
                best_fitness = best.fitness();
            }

            let stats = GenerationStats::capture(gen, &population);
            log::debug!("{}", stats);
            problem.on_generation(gen, &stats);
            history.push(stats);
        }

        GpResult {
            best,
            best_fitness,
            generations: if cancelled {
                history.len().saturating_sub(1)
            } else {
                config.number_of_generations
            },
            cancelled,
            history,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
