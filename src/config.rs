//! Run configuration.
//!
//! [`GpConfig`] holds every parameter that controls creation, breeding and
//! replacement. Probabilities use a 0..=100 percent scale.

use crate::selection::SelectionType;
use std::fmt;

/// How initial trees are built.
///
/// The ramped variants cycle the depth budget from 2 up to
/// `max_depth_for_creation` across the population, which spreads tree
/// sizes; the plain variants use the full budget for every individual.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CreationType {
    /// Each child is a function or terminal with equal probability.
    Variable,
    /// Children are functions until the depth budget forces terminals,
    /// producing full trees of exactly the budgeted depth.
    Grow,
    /// Ramped depths; alternate individuals use grow and variable.
    RampedHalf,
    /// Ramped depths, all individuals use the variable method.
    RampedVariable,
    /// Ramped depths, all individuals use the grow method.
    RampedGrow,
}

impl CreationType {
    /// Numeric code used by the text persistence format.
    pub fn code(self) -> u8 {
        match self {
            CreationType::Variable => 0,
            CreationType::Grow => 1,
            CreationType::RampedHalf => 2,
            CreationType::RampedVariable => 3,
            CreationType::RampedGrow => 4,
        }
    }

    /// Inverse of [`code`](Self::code).
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(CreationType::Variable),
            1 => Some(CreationType::Grow),
            2 => Some(CreationType::RampedHalf),
            3 => Some(CreationType::RampedVariable),
            4 => Some(CreationType::RampedGrow),
            _ => None,
        }
    }
}

impl Default for CreationType {
    fn default() -> Self {
        CreationType::RampedHalf
    }
}

impl fmt::Display for CreationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CreationType::Variable => "variable",
            CreationType::Grow => "grow",
            CreationType::RampedHalf => "ramped half and half",
            CreationType::RampedVariable => "ramped variable",
            CreationType::RampedGrow => "ramped grow",
        };
        f.write_str(name)
    }
}

/// Configuration for a genetic programming run.
///
/// # Defaults
///
/// ```
/// use u_treegp::GpConfig;
///
/// let config = GpConfig::default();
/// assert_eq!(config.population_size, 100);
/// assert_eq!(config.number_of_generations, 20);
/// assert!(config.steady_state);
/// ```
///
/// # Builder Pattern
///
/// ```
/// use u_treegp::{CreationType, GpConfig, SelectionType};
///
/// let config = GpConfig::default()
///     .with_population_size(500)
///     .with_creation_type(CreationType::RampedHalf)
///     .with_selection_type(SelectionType::Tournament)
///     .with_tournament_size(7)
///     .with_seed(42);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GpConfig {
    /// Number of individuals in the population.
    pub population_size: usize,

    /// Number of generations a run executes.
    pub number_of_generations: usize,

    /// Probability (percent) that a breeding step performs crossover.
    /// When neither creation nor crossover fires, a member is reproduced
    /// unchanged.
    pub crossover_probability: f64,

    /// Probability (percent) that a breeding step creates a brand-new
    /// individual instead of selecting parents.
    pub creation_probability: f64,

    /// How initial trees are built.
    pub creation_type: CreationType,

    /// Depth budget for tree creation.
    pub max_depth_for_creation: usize,

    /// Depth cap enforced during crossover. Must not be below
    /// [`max_depth_for_creation`](Self::max_depth_for_creation).
    pub max_depth_for_crossover: usize,

    /// How members are selected for breeding and replacement.
    pub selection_type: SelectionType,

    /// Entrants per tournament when tournament selection is used.
    pub tournament_size: usize,

    /// Whether the population is split into demes that evolve apart.
    pub demetic_grouping: bool,

    /// Members per deme. Must divide the population size evenly.
    pub deme_size: usize,

    /// Probability (percent) that two adjacent demes exchange members
    /// after a generation.
    pub demetic_migration_probability: f64,

    /// Probability (percent) of swap mutation per new member.
    pub swap_mutation_probability: f64,

    /// Probability (percent) of shrink mutation per new member.
    pub shrink_mutation_probability: f64,

    /// Whether generational replacement copies the best member into the
    /// new population at its old index.
    pub add_best_to_new_population: bool,

    /// Steady state: new members overwrite the worst members of the
    /// current population instead of filling a separate new one.
    pub steady_state: bool,

    /// Random seed for reproducibility. `None` draws one from the OS.
    /// Not part of the persisted configuration.
    pub seed: Option<u64>,
}

impl Default for GpConfig {
    fn default() -> Self {
        Self {
            population_size: 100,
            number_of_generations: 20,
            crossover_probability: 95.0,
            creation_probability: 2.0,
            creation_type: CreationType::default(),
            max_depth_for_creation: 6,
            max_depth_for_crossover: 17,
            selection_type: SelectionType::default(),
            tournament_size: 10,
            demetic_grouping: false,
            deme_size: 100,
            demetic_migration_probability: 100.0,
            swap_mutation_probability: 0.0,
            shrink_mutation_probability: 0.0,
            add_best_to_new_population: true,
            steady_state: true,
            seed: None,
        }
    }
}

impl GpConfig {
    /// Sets the population size.
    pub fn with_population_size(mut self, n: usize) -> Self {
        self.population_size = n;
        self
    }

    /// Sets the number of generations.
    pub fn with_number_of_generations(mut self, n: usize) -> Self {
        self.number_of_generations = n;
        self
    }

    /// Sets the crossover probability (percent, clamped to 0..=100).
    pub fn with_crossover_probability(mut self, percent: f64) -> Self {
        self.crossover_probability = percent.clamp(0.0, 100.0);
        self
    }

    /// Sets the creation probability (percent, clamped to 0..=100).
    pub fn with_creation_probability(mut self, percent: f64) -> Self {
        self.creation_probability = percent.clamp(0.0, 100.0);
        self
    }

    /// Sets the creation type.
    pub fn with_creation_type(mut self, ctype: CreationType) -> Self {
        self.creation_type = ctype;
        self
    }

    /// Sets the depth budget for creation.
    pub fn with_max_depth_for_creation(mut self, depth: usize) -> Self {
        self.max_depth_for_creation = depth;
        self
    }

    /// Sets the depth cap for crossover.
    pub fn with_max_depth_for_crossover(mut self, depth: usize) -> Self {
        self.max_depth_for_crossover = depth;
        self
    }

    /// Sets the selection strategy.
    pub fn with_selection_type(mut self, stype: SelectionType) -> Self {
        self.selection_type = stype;
        self
    }

    /// Sets the tournament size.
    pub fn with_tournament_size(mut self, size: usize) -> Self {
        self.tournament_size = size;
        self
    }

    /// Enables or disables demetic grouping.
    pub fn with_demetic_grouping(mut self, on: bool) -> Self {
        self.demetic_grouping = on;
        self
    }

    /// Sets the deme size.
    pub fn with_deme_size(mut self, size: usize) -> Self {
        self.deme_size = size;
        self
    }

    /// Sets the demetic migration probability (percent, clamped to 0..=100).
    pub fn with_demetic_migration_probability(mut self, percent: f64) -> Self {
        self.demetic_migration_probability = percent.clamp(0.0, 100.0);
        self
    }

    /// Sets the swap mutation probability (percent, clamped to 0..=100).
    pub fn with_swap_mutation_probability(mut self, percent: f64) -> Self {
        self.swap_mutation_probability = percent.clamp(0.0, 100.0);
        self
    }

    /// Sets the shrink mutation probability (percent, clamped to 0..=100).
    pub fn with_shrink_mutation_probability(mut self, percent: f64) -> Self {
        self.shrink_mutation_probability = percent.clamp(0.0, 100.0);
        self
    }

    /// Enables or disables copying the best member into the new population.
    pub fn with_add_best_to_new_population(mut self, on: bool) -> Self {
        self.add_best_to_new_population = on;
        self
    }

    /// Switches between steady-state and generational replacement.
    pub fn with_steady_state(mut self, on: bool) -> Self {
        self.steady_state = on;
        self
    }

    /// Sets the random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Validates the configuration.
    ///
    /// Returns `Err` with a description if any parameter is invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.population_size == 0 {
            return Err("population_size must be at least 1".into());
        }
        if self.number_of_generations == 0 {
            return Err("number_of_generations must be at least 1".into());
        }
        if self.max_depth_for_creation == 0 {
            return Err("max_depth_for_creation must be at least 1".into());
        }
        if self.max_depth_for_crossover < self.max_depth_for_creation {
            return Err(
                "max_depth_for_crossover must not be below max_depth_for_creation".into(),
            );
        }
        for (name, value) in [
            ("crossover_probability", self.crossover_probability),
            ("creation_probability", self.creation_probability),
            (
                "demetic_migration_probability",
                self.demetic_migration_probability,
            ),
            ("swap_mutation_probability", self.swap_mutation_probability),
            (
                "shrink_mutation_probability",
                self.shrink_mutation_probability,
            ),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(format!("{} must be between 0 and 100", name));
            }
        }
        if self.selection_type == SelectionType::Tournament && self.tournament_size < 2 {
            return Err("tournament_size must be at least 2".into());
        }
        if self.demetic_grouping {
            if self.deme_size < 2 {
                return Err("deme_size must be at least 2".into());
            }
            if self.deme_size > self.population_size {
                return Err("deme_size must not exceed population_size".into());
            }
            if self.population_size % self.deme_size != 0 {
                return Err("deme_size must divide population_size evenly".into());
            }
        }
        Ok(())
    }
}

impl fmt::Display for GpConfig {
    /// Renders an aligned `name = value` block, one parameter per line.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<29} = {}", "population_size", self.population_size)?;
        writeln!(
            f,
            "{:<29} = {}",
            "number_of_generations", self.number_of_generations
        )?;
        writeln!(
            f,
            "{:<29} = {}",
            "crossover_probability", self.crossover_probability
        )?;
        writeln!(
            f,
            "{:<29} = {}",
            "creation_probability", self.creation_probability
        )?;
        writeln!(f, "{:<29} = {}", "creation_type", self.creation_type)?;
        writeln!(
            f,
            "{:<29} = {}",
            "max_depth_for_creation", self.max_depth_for_creation
        )?;
        writeln!(
            f,
            "{:<29} = {}",
            "max_depth_for_crossover", self.max_depth_for_crossover
        )?;
        writeln!(f, "{:<29} = {}", "selection_type", self.selection_type)?;
        writeln!(f, "{:<29} = {}", "tournament_size", self.tournament_size)?;
        writeln!(f, "{:<29} = {}", "demetic_grouping", self.demetic_grouping)?;
        writeln!(f, "{:<29} = {}", "deme_size", self.deme_size)?;
        writeln!(
            f,
            "{:<29} = {}",
            "demetic_migration_probability", self.demetic_migration_probability
        )?;
        writeln!(
            f,
            "{:<29} = {}",
            "swap_mutation_probability", self.swap_mutation_probability
        )?;
        writeln!(
            f,
            "{:<29} = {}",
            "shrink_mutation_probability", self.shrink_mutation_probability
        )?;
        writeln!(
            f,
            "{:<29} = {}",
            "add_best_to_new_population", self.add_best_to_new_population
        )?;
        writeln!(f, "{:<29} = {}", "steady_state", self.steady_state)?;
        match self.seed {
            Some(seed) => writeln!(f, "{:<29} = {}", "seed", seed),
            None => writeln!(f, "{:<29} = none", "seed"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
