//! Tree-based genetic programming engine.
//!
//! Evolves populations of expression trees against a user-defined
//! [`Problem`]:
//!
//! - **Node catalogs**: one typed vocabulary per tree role, functions and
//!   terminals separately samplable.
//! - **Multi-tree individuals**: a main tree plus any number of further
//!   branches, each drawing from its own node set.
//! - **Genetic operators**: ramped tree creation, depth-capped subtree
//!   crossover, swap and shrink mutation.
//! - **Selection**: tournament or fitness-proportional, over the whole
//!   population or demetic groups with migration.
//! - **Replacement**: steady state in place, or generational with the best
//!   member preserved at its index.
//! - **Persistence**: token-text save/load for every entity; loaded trees
//!   carry raw node ids until resolved against a catalog.
//!
//! # Example
//!
//! ```
//! use u_treegp::{
//!     Catalog, GpConfig, GpRunner, Individual, NodeDef, NodeSet, Problem,
//! };
//!
//! // Vocabulary: two binary functions, two terminals.
//! let mut set = NodeSet::new(4);
//! set.add(NodeDef::new(1, "+", 2));
//! set.add(NodeDef::new(2, "*", 2));
//! set.add(NodeDef::new(10, "x", 0));
//! set.add(NodeDef::new(11, "y", 0));
//! let mut catalog = Catalog::new(1);
//! catalog.set_role(0, set);
//!
//! // Standardized fitness: lower is better, here plain parsimony.
//! struct Shortest;
//!
//! impl Problem for Shortest {
//!     fn evaluate(&self, individual: &Individual, _catalog: &Catalog) -> f64 {
//!         individual.length() as f64
//!     }
//! }
//!
//! let config = GpConfig::default()
//!     .with_population_size(30)
//!     .with_number_of_generations(5)
//!     .with_seed(42);
//! let result = GpRunner::run(&Shortest, &catalog, &config);
//!
//! assert_eq!(result.generations, 5);
//! assert_eq!(result.history.len(), 6);
//! assert!(result.best.fitness_valid());
//! assert!(result.best_fitness >= 1.0);
//! assert!(result.best_fitness <= result.history[0].best_fitness);
//! println!("{}", result.best.display(&catalog));
//! ```
//!
//! # Architecture
//!
//! [`Catalog`] and [`NodeSet`] define the vocabulary, [`Tree`] and
//! [`Individual`] the genome, [`Population`] the breeding pool.
//! [`GpRunner`] drives the cycle: per offspring either create a fresh
//! member, cross two selected parents, or reproduce one, then apply
//! mutation and place the result steady-state or into a successor
//! population. All randomness flows through one seedable RNG, so a fixed
//! seed reproduces a run exactly.
//!
//! # References
//!
//! - Koza (1992), *Genetic Programming: On the Programming of Computers by
//!   Means of Natural Selection*
//! - Koza (1994), *Genetic Programming II: Automatic Discovery of Reusable
//!   Programs*
//! - Banzhaf et al. (1998), *Genetic Programming: An Introduction*

mod config;
mod generation;
mod individual;
mod node;
mod persist;
mod population;
mod rng;
mod runner;
mod selection;
mod slots;
mod tree;
mod types;

pub use config::{CreationType, GpConfig};
pub use individual::{Individual, IndividualDisplay};
pub use node::{Catalog, NodeDef, NodeSet, MAX_NAME_LEN};
pub use persist::PersistError;
pub use population::Population;
pub use rng::{create_rng, random_percent};
pub use runner::{GenerationStats, GpResult, GpRunner};
pub use selection::{SelectionRange, SelectionType};
pub use slots::Slots;
pub use tree::{NodeRef, Tree, TreeDisplay};
pub use types::Problem;
