//! Core trait connecting the engine to a problem domain.
//!
//! The engine knows how to build, breed and replace tree individuals; what
//! it cannot know is what a tree *means*. A [`Problem`] supplies that
//! meaning: it scores individuals, may veto freshly created ones, and can
//! observe each generation.

use crate::individual::Individual;
use crate::node::Catalog;
use crate::population::Population;
use crate::runner::GenerationStats;

/// A user-defined problem the engine optimizes against.
///
/// Only [`evaluate`](Problem::evaluate) is required. Fitness is
/// *standardized*: lower is better and 0 is a perfect solution.
///
/// ```
/// use u_treegp::{Catalog, Individual, Problem};
///
/// /// Rewards small programs, whatever they compute.
/// struct Shortest;
///
/// impl Problem for Shortest {
///     fn evaluate(&self, individual: &Individual, _catalog: &Catalog) -> f64 {
///         individual.length() as f64
///     }
/// }
/// ```
pub trait Problem {
    /// Computes the standardized fitness of `individual`.
    ///
    /// Called for every member whose cached fitness is stale. The catalog
    /// maps node handles back to ids and names, which is how evaluators
    /// dispatch on the node a tree carries.
    fn evaluate(&self, individual: &Individual, catalog: &Catalog) -> f64;

    /// Decides whether a freshly created individual may enter the initial
    /// population. The default accepts only structural novelty, keeping
    /// early diversity up. Creation retries a bounded number of times and
    /// then keeps the last candidate regardless, so a strict predicate
    /// cannot hang a run.
    fn accept_creation(&self, candidate: &Individual, population: &Population) -> bool {
        population.is_structurally_unique(candidate)
    }

    /// Called once per generation with fresh statistics, including
    /// generation 0 right after the initial population is built.
    fn on_generation(&self, _generation: usize, _stats: &GenerationStats) {}
}
