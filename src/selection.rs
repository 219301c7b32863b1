//! Selection of population members.
//!
//! Both schemes pick member indices from a half-open range of the
//! population, so demes select among themselves without copying. Fitness
//! is standardized: lower is better, and "worst" means highest.

use crate::individual::Individual;
use crate::population::Population;
use crate::slots::Slots;
use rand::Rng;
use std::fmt;

/// How parents and replacement victims are picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SelectionType {
    /// Roulette wheel over fitness, Koza style. Selecting for best weighs
    /// members by inverse standardized fitness, selecting for worst by the
    /// raw value.
    ///
    /// # Complexity
    /// O(range) per draw.
    Probabilistic,
    /// Draws `tournament_size` entrants uniformly with replacement and
    /// keeps the one or two most extreme.
    ///
    /// # Complexity
    /// O(tournament_size) per draw.
    Tournament,
}

impl SelectionType {
    /// Numeric code used by the text persistence format.
    pub fn code(self) -> u8 {
        match self {
            SelectionType::Probabilistic => 0,
            SelectionType::Tournament => 1,
        }
    }

    /// Inverse of [`code`](Self::code).
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(SelectionType::Probabilistic),
            1 => Some(SelectionType::Tournament),
            _ => None,
        }
    }
}

impl Default for SelectionType {
    fn default() -> Self {
        SelectionType::Tournament
    }
}

impl fmt::Display for SelectionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SelectionType::Probabilistic => "probabilistic",
            SelectionType::Tournament => "tournament",
        };
        f.write_str(name)
    }
}

/// A half-open index range `start..end` to select from, usually one deme.
///
/// The range carries the fitness sums the probabilistic scheme needs, so
/// they are computed once per deme and generation. Create a fresh range
/// whenever the fitnesses behind it may have changed.
#[derive(Debug, Clone)]
pub struct SelectionRange {
    pub start: usize,
    pub end: usize,
    pub(crate) first_selection: bool,
    pub(crate) sum_fitness: f64,
    pub(crate) inv_sum_fitness: f64,
}

impl SelectionRange {
    pub fn new(start: usize, end: usize) -> Self {
        SelectionRange {
            start,
            end,
            first_selection: true,
            sum_fitness: 0.0,
            inv_sum_fitness: 0.0,
        }
    }
}

// Inverse with a guard against division by (almost) zero. A perfect
// standardized fitness of 0.0 becomes the weight 1e10.
fn inverse(x: f64) -> f64 {
    if x < 1e-10 {
        1e10
    } else {
        1.0 / x
    }
}

// Resolution of the roulette wheel.
const HIGH_VALUE: u64 = 300_000;

impl Population {
    /// Picks `count` member indices from `range`, best ones when `best`
    /// holds, worst ones otherwise, using the configured scheme.
    pub fn select_indices<R: Rng + ?Sized>(
        &self,
        count: usize,
        best: bool,
        range: &mut SelectionRange,
        rng: &mut R,
    ) -> Vec<usize> {
        match self.config().selection_type {
            SelectionType::Tournament => self.tournament_selection(count, best, range, rng),
            SelectionType::Probabilistic => self.probabilistic_selection(count, best, range, rng),
        }
    }

    /// Selects the `count` best members of `range` and returns clones of
    /// them in a container.
    pub fn select<R: Rng + ?Sized>(
        &self,
        count: usize,
        range: &mut SelectionRange,
        rng: &mut R,
    ) -> Slots<Individual> {
        let picks = self.select_indices(count, true, range, rng);
        let mut chosen = Slots::with_capacity(count);
        for (n, &ix) in picks.iter().enumerate() {
            chosen.put(n, self.member(ix).clone());
        }
        chosen
    }

    /// Selects two parents for crossover.
    pub fn select_parents<R: Rng + ?Sized>(
        &self,
        range: &mut SelectionRange,
        rng: &mut R,
    ) -> Slots<Individual> {
        self.select(2, range, rng)
    }

    fn member(&self, ix: usize) -> &Individual {
        self.individuals.get(ix).expect("empty population slot")
    }

    fn member_fitness(&self, ix: usize) -> f64 {
        self.member(ix).fitness()
    }

    // Draws tournament_size entrants with replacement and tracks the two
    // most extreme. Tracking more would need sorting, so the tournament
    // serves at most two picks.
    fn tournament_selection<R: Rng + ?Sized>(
        &self,
        count: usize,
        best: bool,
        range: &SelectionRange,
        rng: &mut R,
    ) -> Vec<usize> {
        assert!(count == 1 || count == 2, "tournament selects one or two members");
        assert!(
            self.config().tournament_size >= 2,
            "tournament size must be at least 2"
        );
        assert!(range.end > range.start, "range to select from is empty");

        let size = self.config().tournament_size;
        let mut tourn = Vec::with_capacity(size);
        for _ in 0..size {
            tourn.push(rng.random_range(range.start..range.end));
        }

        let beats = |a: f64, b: f64| if best { a < b } else { a > b };
        let mut first = 0;
        let mut second = 1;
        if beats(
            self.member_fitness(tourn[1]),
            self.member_fitness(tourn[0]),
        ) {
            first = 1;
            second = 0;
        }
        for i in 2..size {
            let fitness = self.member_fitness(tourn[i]);
            if beats(fitness, self.member_fitness(tourn[first])) {
                second = first;
                first = i;
            } else if beats(fitness, self.member_fitness(tourn[second])) {
                second = i;
            }
        }

        let mut picks = vec![tourn[first]];
        if count == 2 {
            picks.push(tourn[second]);
        }
        picks
    }

    // Roulette wheel over the range. The first call on a fresh range sums
    // the fitnesses and their inverses; later calls reuse the sums.
    fn probabilistic_selection<R: Rng + ?Sized>(
        &self,
        count: usize,
        best: bool,
        range: &mut SelectionRange,
        rng: &mut R,
    ) -> Vec<usize> {
        assert!(count >= 1, "must select at least one member");
        assert!(range.end > range.start, "range to select from is empty");

        if range.first_selection {
            range.first_selection = false;
            range.sum_fitness = 0.0;
            range.inv_sum_fitness = 0.0;
            for ix in range.start..range.end {
                let fitness = self.member_fitness(ix);
                range.sum_fitness += fitness;
                range.inv_sum_fitness += inverse(fitness);
            }
        }

        let mut picks = Vec::with_capacity(count);
        for _ in 0..count {
            let roll = rng.random_range(0..HIGH_VALUE) as f64 / (HIGH_VALUE - 1) as f64;
            // Rounding could carry the accumulation past every member, so
            // the last one is the fallback.
            let mut chosen = range.end - 1;
            let mut acc = 0.0;
            if best {
                let target = roll * range.inv_sum_fitness;
                for ix in range.start..range.end {
                    acc += inverse(self.member_fitness(ix));
                    if acc >= target {
                        chosen = ix;
                        break;
                    }
                }
            } else {
                let target = roll * range.sum_fitness;
                for ix in range.start..range.end {
                    acc += self.member_fitness(ix);
                    if acc >= target {
                        chosen = ix;
                        break;
                    }
                }
            }
            picks.push(chosen);
        }
        picks
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GpConfig;
    use crate::rng::create_rng;
    use crate::tree::Tree;

    // A population whose member at index i has fitness fits[i]. Each
    // member is a lone terminal tree, enough for selection to work on.
    fn population_with(fits: &[f64], config: GpConfig) -> Population {
        let mut pop = Population::new(config);
        pop.individuals.reserve(fits.len());
        for (ix, &fitness) in fits.iter().enumerate() {
            let mut ind = Individual::new(1);
            ind.trees.put(0, Tree::new(0, 0));
            ind.calc_length();
            ind.calc_depth();
            ind.set_fitness(fitness);
            pop.individuals.put(ix, ind);
        }
        pop
    }

    #[test]
    fn test_selection_type_codes_roundtrip() {
        for stype in [SelectionType::Probabilistic, SelectionType::Tournament] {
            assert_eq!(SelectionType::from_code(stype.code()), Some(stype));
        }
        assert_eq!(SelectionType::from_code(9), None);
        assert_eq!(SelectionType::default(), SelectionType::Tournament);
        assert_eq!(SelectionType::Probabilistic.to_string(), "probabilistic");
    }

    #[test]
    fn test_tournament_prefers_low_fitness() {
        let config = GpConfig::default().with_tournament_size(5);
        let pop = population_with(&[9.0, 7.0, 0.5, 3.0, 8.0, 6.0], config);
        let mut rng = create_rng(7);
        let mut range = SelectionRange::new(0, 6);

        let mut hits = vec![0usize; 6];
        for _ in 0..400 {
            let picks = pop.select_indices(1, true, &mut range, &mut rng);
            hits[picks[0]] += 1;
        }
        let top = hits.iter().enumerate().max_by_key(|(_, &h)| h).unwrap().0;
        assert_eq!(top, 2, "hits {:?}", hits);
    }

    #[test]
    fn test_tournament_for_worst_prefers_high_fitness() {
        let config = GpConfig::default().with_tournament_size(5);
        let pop = population_with(&[9.0, 7.0, 0.5, 3.0, 8.0, 6.0], config);
        let mut rng = create_rng(11);
        let mut range = SelectionRange::new(0, 6);

        let mut hits = vec![0usize; 6];
        for _ in 0..400 {
            let picks = pop.select_indices(1, false, &mut range, &mut rng);
            hits[picks[0]] += 1;
        }
        let top = hits.iter().enumerate().max_by_key(|(_, &h)| h).unwrap().0;
        assert_eq!(top, 0, "hits {:?}", hits);
    }

    #[test]
    fn test_tournament_pair_is_ordered() {
        let config = GpConfig::default().with_tournament_size(8);
        let pop = population_with(&[5.0, 4.0, 3.0, 2.0, 1.0, 6.0, 7.0, 8.0], config);
        let mut rng = create_rng(13);
        let mut range = SelectionRange::new(0, 8);
        for _ in 0..100 {
            let picks = pop.select_indices(2, true, &mut range, &mut rng);
            assert_eq!(picks.len(), 2);
            assert!(
                pop.member_fitness(picks[0]) <= pop.member_fitness(picks[1]),
                "first pick must be at least as good"
            );
        }
    }

    #[test]
    fn test_tournament_honors_range() {
        let config = GpConfig::default().with_tournament_size(4);
        let pop = population_with(&[0.1, 0.2, 5.0, 6.0, 7.0, 8.0], config);
        let mut rng = create_rng(17);
        // Only the back half may be drawn, even though the front half has
        // far better fitness.
        let mut range = SelectionRange::new(3, 6);
        for _ in 0..200 {
            let picks = pop.select_indices(1, true, &mut range, &mut rng);
            assert!((3..6).contains(&picks[0]));
        }
    }

    #[test]
    #[should_panic(expected = "range to select from is empty")]
    fn test_tournament_empty_range_panics() {
        let config = GpConfig::default();
        let pop = population_with(&[1.0, 2.0], config);
        let mut rng = create_rng(19);
        let mut range = SelectionRange::new(1, 1);
        pop.select_indices(1, true, &mut range, &mut rng);
    }

    #[test]
    fn test_probabilistic_weights_by_inverse_fitness() {
        let config =
            GpConfig::default().with_selection_type(SelectionType::Probabilistic);
        // Member 0 carries weight 1/0.25 = 4, member 1 carries 1/4 = 0.25,
        // so member 0 should win roughly 16 times as often.
        let pop = population_with(&[0.25, 4.0], config);
        let mut rng = create_rng(23);
        let mut range = SelectionRange::new(0, 2);

        let mut zero = 0;
        let trials = 1000;
        for _ in 0..trials {
            let picks = pop.select_indices(1, true, &mut range, &mut rng);
            if picks[0] == 0 {
                zero += 1;
            }
        }
        let ratio = zero as f64 / trials as f64;
        assert!(ratio > 0.85, "ratio {} too low", ratio);
    }

    #[test]
    fn test_probabilistic_for_worst_weights_by_fitness() {
        let config =
            GpConfig::default().with_selection_type(SelectionType::Probabilistic);
        let pop = population_with(&[1.0, 9.0], config);
        let mut rng = create_rng(29);
        let mut range = SelectionRange::new(0, 2);

        let mut one = 0;
        let trials = 1000;
        for _ in 0..trials {
            let picks = pop.select_indices(1, false, &mut range, &mut rng);
            if picks[0] == 1 {
                one += 1;
            }
        }
        let ratio = one as f64 / trials as f64;
        assert!(ratio > 0.8, "ratio {} too low", ratio);
    }

    #[test]
    fn test_probabilistic_sums_cached_per_range() {
        let config =
            GpConfig::default().with_selection_type(SelectionType::Probabilistic);
        let pop = population_with(&[1.0, 2.0, 3.0], config);
        let mut rng = create_rng(31);
        let mut range = SelectionRange::new(0, 3);
        assert!(range.first_selection);
        pop.select_indices(1, true, &mut range, &mut rng);
        assert!(!range.first_selection);
        assert!((range.sum_fitness - 6.0).abs() < 1e-9);
        let expected_inv = 1.0 + 0.5 + 1.0 / 3.0;
        assert!((range.inv_sum_fitness - expected_inv).abs() < 1e-9);
    }

    #[test]
    fn test_select_clones_best_members() {
        let config = GpConfig::default().with_tournament_size(6);
        let pop = population_with(&[4.0, 0.5, 3.0, 2.0, 1.0, 5.0], config);
        let mut rng = create_rng(37);
        let mut range = SelectionRange::new(0, 6);
        let parents = pop.select_parents(&mut range, &mut rng);
        assert_eq!(parents.len(), 2);
        assert!(parents.get(0).is_some() && parents.get(1).is_some());
        // Clones, so the population keeps all its members.
        assert_eq!(pop.len(), 6);
    }

    #[test]
    fn test_perfect_fitness_dominates_roulette() {
        let config =
            GpConfig::default().with_selection_type(SelectionType::Probabilistic);
        let pop = population_with(&[0.0, 1.0, 1.0, 1.0], config);
        let mut rng = create_rng(41);
        let mut range = SelectionRange::new(0, 4);
        let mut zero = 0;
        for _ in 0..200 {
            let picks = pop.select_indices(1, true, &mut range, &mut rng);
            if picks[0] == 0 {
                zero += 1;
            }
        }
        // Weight 1e10 against 3.0 leaves the rest essentially no chance.
        assert!(zero >= 199, "zero picked {} times", zero);
    }
}
