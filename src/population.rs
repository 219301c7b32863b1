//! The population container, its creation and its statistics.

use crate::config::{CreationType, GpConfig};
use crate::individual::Individual;
use crate::node::Catalog;
use crate::slots::Slots;
use crate::types::Problem;
use rand::Rng;

// Number of trials to create an acceptable individual for one slot.
const CREATION_ATTEMPTS: usize = 50;

// Floor and reset value for the ramped depth counters.
pub(crate) const MIN_TREE_DEPTH: usize = 2;

/// A container of individuals plus the run configuration and the cached
/// statistics of the most recent [`calculate_statistics`] pass.
///
/// [`calculate_statistics`]: Population::calculate_statistics
#[derive(Debug, Clone)]
pub struct Population {
    pub(crate) individuals: Slots<Individual>,
    pub(crate) config: GpConfig,
    best: usize,
    worst: usize,
    avg_fitness: f64,
    avg_length: f64,
    avg_depth: f64,
    pub(crate) evolution_depth: usize,
}

impl Population {
    /// An empty population. [`create`](Population::create) sizes and
    /// fills it.
    pub fn new(config: GpConfig) -> Self {
        Population {
            individuals: Slots::new(),
            config,
            best: 0,
            worst: 0,
            avg_fitness: 0.0,
            avg_length: 0.0,
            avg_depth: 0.0,
            evolution_depth: MIN_TREE_DEPTH,
        }
    }

    /// Fills the population with `population_size` freshly created
    /// individuals, evaluates them and computes statistics.
    ///
    /// The ramped creation types cycle a working depth from 2 up to
    /// `max_depth_for_creation`, advancing one step per slot. Each
    /// candidate must pass [`Problem::accept_creation`]; after a quarter
    /// of the 50 attempts for a slot the working depth starts escalating
    /// to open up more shapes, and after 50 attempts the candidate is
    /// taken regardless.
    ///
    /// # Panics
    /// Panics if the catalog is incomplete or the population was already
    /// created.
    pub fn create<P, R>(&mut self, catalog: &Catalog, problem: &P, rng: &mut R)
    where
        P: Problem + ?Sized,
        R: Rng + ?Sized,
    {
        catalog.validate();

        let roles = catalog.role_count();
        let max_depth = self.config.max_depth_for_creation;
        let mut tree_depth = MIN_TREE_DEPTH;
        self.individuals.reserve(self.config.population_size);

        for i in 0..self.individuals.len() {
            let mut attempts = 0;
            loop {
                // A slot that keeps getting rejected is starved for
                // shapes at this depth, so widen the budget.
                if attempts >= CREATION_ATTEMPTS / 4 && tree_depth < max_depth {
                    tree_depth += 1;
                }

                let mut candidate = Individual::new(roles);
                match self.config.creation_type {
                    CreationType::RampedHalf => {
                        if i % 2 == 1 {
                            candidate.create(CreationType::Grow, tree_depth, catalog, rng);
                        } else {
                            candidate.create(CreationType::Variable, tree_depth, catalog, rng);
                        }
                    }
                    CreationType::RampedVariable => {
                        candidate.create(CreationType::Variable, tree_depth, catalog, rng);
                    }
                    CreationType::RampedGrow => {
                        candidate.create(CreationType::Grow, tree_depth, catalog, rng);
                    }
                    CreationType::Grow => {
                        candidate.create(CreationType::Grow, max_depth, catalog, rng);
                    }
                    CreationType::Variable => {
                        candidate.create(CreationType::Variable, max_depth, catalog, rng);
                    }
                }

                attempts += 1;
                if problem.accept_creation(&candidate, self) || attempts >= CREATION_ATTEMPTS {
                    self.individuals.put(i, candidate);
                    break;
                }
            }

            tree_depth += 1;
            if tree_depth > max_depth {
                tree_depth = MIN_TREE_DEPTH;
            }
        }

        self.evaluate(problem, catalog);
        self.calculate_statistics();
        log::debug!(
            "created {} individuals, avg fitness {:.4}, avg length {:.2}",
            self.individuals.len(),
            self.avg_fitness,
            self.avg_length
        );
    }

    /// Evaluates every individual whose fitness cache is stale.
    ///
    /// # Panics
    /// Panics on an empty slot.
    pub fn evaluate<P>(&mut self, problem: &P, catalog: &Catalog)
    where
        P: Problem + ?Sized,
    {
        for ix in 0..self.individuals.len() {
            let stale = !self
                .individuals
                .get(ix)
                .expect("empty population slot")
                .fitness_valid();
            if stale {
                let fitness = problem.evaluate(
                    self.individuals.get(ix).expect("empty population slot"),
                    catalog,
                );
                self.individuals
                    .get_mut(ix)
                    .expect("empty population slot")
                    .set_fitness(fitness);
            }
        }
    }

    /// Recomputes the averages and the best and worst indices.
    ///
    /// Ties on fitness break toward length: among equally fit members the
    /// shorter one is better and the longer one is worse.
    ///
    /// # Panics
    /// Panics on an empty slot.
    pub fn calculate_statistics(&mut self) {
        let count = self.individuals.len();
        self.avg_fitness = self.total_fitness() / count as f64;
        self.avg_length = self.total_length() as f64 / count as f64;
        self.avg_depth = self.total_depth() as f64 / count as f64;

        let mut best = 0;
        let mut worst = 0;
        for n in 0..count {
            let current = self.individuals.get(n).expect("empty population slot");
            if n == 0 {
                continue;
            }
            let worst_member = self.individuals.get(worst).expect("empty population slot");
            if worst_member.fitness() < current.fitness()
                || (worst_member.fitness() == current.fitness()
                    && worst_member.length() < current.length())
            {
                worst = n;
            }
            let best_member = self.individuals.get(best).expect("empty population slot");
            if best_member.fitness() > current.fitness()
                || (best_member.fitness() == current.fitness()
                    && best_member.length() > current.length())
            {
                best = n;
            }
        }
        self.best = best;
        self.worst = worst;
    }

    /// Summed standardized fitness over all present members.
    pub fn total_fitness(&self) -> f64 {
        self.individuals.iter().flatten().map(Individual::fitness).sum()
    }

    /// Summed node count over all present members.
    pub fn total_length(&self) -> usize {
        self.individuals.iter().flatten().map(Individual::length).sum()
    }

    /// Summed depth over all present members.
    pub fn total_depth(&self) -> usize {
        self.individuals.iter().flatten().map(Individual::depth).sum()
    }

    /// True when no present member is structurally equal to `candidate`.
    /// This is the default creation acceptance predicate.
    pub fn is_structurally_unique(&self, candidate: &Individual) -> bool {
        self.individuals
            .iter()
            .flatten()
            .all(|member| !member.structural_eq(candidate))
    }

    /// Resolves raw node ids in every member against the catalog. Must
    /// run once after a load, before anything touches the trees.
    pub fn resolve_nodes(&mut self, catalog: &Catalog) {
        for slot in self.individuals.iter_mut() {
            if let Some(member) = slot {
                member.resolve(catalog);
            }
        }
    }

    /// Number of slots, occupied or not.
    pub fn len(&self) -> usize {
        self.individuals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.individuals.is_empty()
    }

    /// Borrows the member at `ix`, if present.
    pub fn individual(&self, ix: usize) -> Option<&Individual> {
        self.individuals.get(ix)
    }

    /// Index of the best member per the last statistics pass.
    pub fn best_index(&self) -> usize {
        self.best
    }

    /// Index of the worst member per the last statistics pass.
    pub fn worst_index(&self) -> usize {
        self.worst
    }

    /// The best member per the last statistics pass.
    ///
    /// # Panics
    /// Panics if that slot is empty.
    pub fn best(&self) -> &Individual {
        self.individuals.get(self.best).expect("empty population slot")
    }

    /// The worst member per the last statistics pass.
    ///
    /// # Panics
    /// Panics if that slot is empty.
    pub fn worst(&self) -> &Individual {
        self.individuals.get(self.worst).expect("empty population slot")
    }

    pub fn avg_fitness(&self) -> f64 {
        self.avg_fitness
    }

    pub fn avg_length(&self) -> f64 {
        self.avg_length
    }

    pub fn avg_depth(&self) -> f64 {
        self.avg_depth
    }

    pub fn config(&self) -> &GpConfig {
        &self.config
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeDef, NodeSet};
    use crate::rng::create_rng;
    use crate::tree::Tree;
    use std::cell::Cell;

    struct Shortest;

    impl Problem for Shortest {
        fn evaluate(&self, individual: &Individual, _catalog: &Catalog) -> f64 {
            individual.length() as f64
        }
    }

    struct Counting {
        calls: Cell<usize>,
    }

    impl Problem for Counting {
        fn evaluate(&self, individual: &Individual, _catalog: &Catalog) -> f64 {
            self.calls.set(self.calls.get() + 1);
            individual.length() as f64
        }
    }

    struct RejectAll;

    impl Problem for RejectAll {
        fn evaluate(&self, _individual: &Individual, _catalog: &Catalog) -> f64 {
            0.0
        }

        fn accept_creation(&self, _candidate: &Individual, _population: &Population) -> bool {
            false
        }
    }

    fn arith_catalog() -> Catalog {
        let mut set = NodeSet::new(4);
        set.add(NodeDef::new(1, "+", 2));
        set.add(NodeDef::new(2, "*", 2));
        set.add(NodeDef::new(10, "x", 0));
        set.add(NodeDef::new(11, "y", 0));
        let mut catalog = Catalog::new(1);
        catalog.set_role(0, set);
        catalog
    }

    // An individual whose single tree is an arity-1 spine holding
    // `chain + 1` nodes.
    fn member_with(fitness: f64, chain: usize) -> Individual {
        let mut tree = Tree::new(1, 0);
        for _ in 0..chain {
            let mut parent = Tree::new(0, 1);
            parent.children.put(0, tree);
            tree = parent;
        }
        let mut ind = Individual::new(1);
        ind.trees.put(0, tree);
        ind.calc_length();
        ind.calc_depth();
        ind.set_fitness(fitness);
        ind
    }

    fn population_of(members: Vec<Individual>) -> Population {
        let mut pop = Population::new(GpConfig::default());
        pop.individuals.reserve(members.len());
        for (ix, member) in members.into_iter().enumerate() {
            pop.individuals.put(ix, member);
        }
        pop
    }

    #[test]
    fn test_create_fills_and_evaluates() {
        let catalog = arith_catalog();
        let config = GpConfig::default().with_population_size(30);
        let mut pop = Population::new(config);
        let mut rng = create_rng(5);
        pop.create(&catalog, &Shortest, &mut rng);

        assert_eq!(pop.len(), 30);
        for ix in 0..pop.len() {
            let member = pop.individual(ix).expect("slot must be filled");
            assert!(member.fitness_valid());
            assert!((member.fitness() - member.length() as f64).abs() < 1e-12);
            assert!(member.depth() <= 6);
            assert!(member.depth() >= 2, "roots are functions");
        }
        assert!(pop.avg_fitness() > 0.0);
        let fit = pop.best().fitness();
        for ix in 0..pop.len() {
            assert!(fit <= pop.individual(ix).unwrap().fitness());
        }
    }

    #[test]
    fn test_create_keeps_members_distinct() {
        let catalog = arith_catalog();
        let config = GpConfig::default().with_population_size(30);
        let mut pop = Population::new(config);
        let mut rng = create_rng(9);
        pop.create(&catalog, &Shortest, &mut rng);

        for a in 0..pop.len() {
            for b in a + 1..pop.len() {
                assert!(
                    !pop.individual(a)
                        .unwrap()
                        .structural_eq(pop.individual(b).unwrap()),
                    "members {} and {} are twins",
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn test_ramped_grow_spreads_depths() {
        let catalog = arith_catalog();
        let config = GpConfig::default()
            .with_population_size(10)
            .with_creation_type(CreationType::RampedGrow);
        let mut pop = Population::new(config);
        let mut rng = create_rng(13);
        pop.create(&catalog, &Shortest, &mut rng);

        // The working depth cycles 2..=6, and grow builds full trees, so
        // ten slots cover every depth in the cycle.
        let mut depths: Vec<usize> = (0..10).map(|ix| pop.individual(ix).unwrap().depth()).collect();
        depths.sort_unstable();
        depths.dedup();
        assert_eq!(depths, vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_create_terminates_when_everything_is_rejected() {
        let catalog = arith_catalog();
        let config = GpConfig::default().with_population_size(5);
        let mut pop = Population::new(config);
        let mut rng = create_rng(17);
        pop.create(&catalog, &RejectAll, &mut rng);
        assert_eq!(pop.len(), 5);
        for ix in 0..5 {
            assert!(pop.individual(ix).is_some());
        }
    }

    #[test]
    fn test_evaluate_skips_valid_caches() {
        let catalog = arith_catalog();
        let problem = Counting { calls: Cell::new(0) };
        let config = GpConfig::default().with_population_size(10);
        let mut pop = Population::new(config);
        let mut rng = create_rng(21);
        pop.create(&catalog, &problem, &mut rng);
        assert_eq!(problem.calls.get(), 10, "one evaluation per member");

        pop.evaluate(&problem, &catalog);
        assert_eq!(problem.calls.get(), 10, "valid caches are skipped");

        pop.individuals.get_mut(3).unwrap().invalidate_fitness();
        pop.evaluate(&problem, &catalog);
        assert_eq!(problem.calls.get(), 11);
    }

    #[test]
    fn test_statistics_averages() {
        let mut pop = population_of(vec![
            member_with(1.0, 0),
            member_with(2.0, 1),
            member_with(3.0, 2),
        ]);
        pop.calculate_statistics();
        assert!((pop.avg_fitness() - 2.0).abs() < 1e-12);
        assert!((pop.avg_length() - 2.0).abs() < 1e-12);
        assert!((pop.avg_depth() - 2.0).abs() < 1e-12);
        assert_eq!(pop.total_length(), 6);
        assert_eq!(pop.total_depth(), 6);
    }

    #[test]
    fn test_statistics_find_best_and_worst() {
        let mut pop = population_of(vec![
            member_with(5.0, 0),
            member_with(1.0, 3),
            member_with(2.0, 1),
            member_with(9.0, 0),
        ]);
        pop.calculate_statistics();
        assert_eq!(pop.best_index(), 1);
        assert_eq!(pop.worst_index(), 3);
        assert!((pop.best().fitness() - 1.0).abs() < 1e-12);
        assert!((pop.worst().fitness() - 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_statistics_ties_break_on_length() {
        let mut pop = population_of(vec![
            member_with(2.0, 0),
            member_with(1.0, 4),
            member_with(1.0, 2),
            member_with(3.0, 1),
            member_with(3.0, 3),
        ]);
        pop.calculate_statistics();
        // Equal best fitness: the shorter member wins.
        assert_eq!(pop.best_index(), 2);
        // Equal worst fitness: the longer member loses.
        assert_eq!(pop.worst_index(), 4);
    }

    #[test]
    fn test_is_structurally_unique() {
        let pop = population_of(vec![member_with(1.0, 1), member_with(1.0, 2)]);
        assert!(!pop.is_structurally_unique(&member_with(7.0, 1)), "fitness is ignored");
        assert!(pop.is_structurally_unique(&member_with(1.0, 3)));
        assert!(pop.is_structurally_unique(&member_with(1.0, 0)));
    }
}
