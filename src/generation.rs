//! Breeding: evolution steps, replacement and demetic migration.
//!
//! One [`generate`](Population::generate) call turns the current
//! generation into the next. Steady state overwrites selected victims in
//! place; generational mode fills a caller-provided target population,
//! optionally seeding it with the current best at its old index.

use crate::config::CreationType;
use crate::individual::Individual;
use crate::node::Catalog;
use crate::population::{Population, MIN_TREE_DEPTH};
use crate::rng::random_percent;
use crate::selection::SelectionRange;
use crate::slots::Slots;
use crate::types::Problem;
use rand::Rng;

impl Population {
    /// One evolutionary event. Returns the container of candidates it
    /// produced: a single brand-new individual (creation gate), two
    /// crossed parents (crossover gate) or one reproduced copy.
    ///
    /// Creation uses the variable method with a depth budget that ramps
    /// from 2 to `max_depth_for_creation` across calls.
    pub fn evolution<R: Rng + ?Sized>(
        &mut self,
        range: &mut SelectionRange,
        catalog: &Catalog,
        rng: &mut R,
    ) -> Slots<Individual> {
        if random_percent(rng, self.config.creation_probability) {
            let mut candidate = Individual::new(catalog.role_count());
            candidate.create(CreationType::Variable, self.evolution_depth, catalog, rng);
            self.evolution_depth += 1;
            if self.evolution_depth > self.config.max_depth_for_creation {
                self.evolution_depth = MIN_TREE_DEPTH;
            }
            let mut offspring = Slots::with_capacity(1);
            offspring.put(0, candidate);
            offspring
        } else if random_percent(rng, self.config.crossover_probability) {
            let mut parents = self.select_parents(range, rng);
            let mut dad = parents.take(0).expect("selected parent is missing");
            let mut mum = parents.take(1).expect("selected parent is missing");
            Individual::cross(
                &mut dad,
                &mut mum,
                self.config.max_depth_for_crossover,
                rng,
            );
            parents.put(0, dad);
            parents.put(1, mum);
            parents
        } else {
            self.select(1, range, rng)
        }
    }

    /// Builds the next generation out of the current one.
    ///
    /// Steady state (`target` is `None`): candidates replace
    /// worst-selected members of this population and are evaluated on
    /// insertion. Generational (`target` is the empty successor): the
    /// best member is first copied to its old index when
    /// `add_best_to_new_population` holds, candidates fill the remaining
    /// slots deme by deme, and the whole target is evaluated afterwards.
    /// Either way the receiving population gets a fresh statistics pass,
    /// and candidates are mutated on their way in.
    ///
    /// # Panics
    /// Panics when `max_depth_for_crossover` is below
    /// `max_depth_for_creation`, when `target` disagrees with the
    /// `steady_state` setting, or when demetic grouping is on and the
    /// deme size is below 2, larger than the population or not a divisor
    /// of it.
    pub fn generate<P, R>(
        &mut self,
        mut target: Option<&mut Population>,
        catalog: &Catalog,
        problem: &P,
        rng: &mut R,
    ) where
        P: Problem + ?Sized,
        R: Rng + ?Sized,
    {
        // A creation budget above the crossover cap would make the
        // crossover retry loop spin forever.
        assert!(
            self.config.max_depth_for_crossover >= self.config.max_depth_for_creation,
            "crossover depth cap must not be below the creation cap"
        );
        assert_eq!(
            self.config.steady_state,
            target.is_none(),
            "steady state generates in place, generational mode needs a target"
        );

        let len = self.individuals.len();
        let deme_size = if self.config.demetic_grouping {
            let deme_size = self.config.deme_size;
            assert!(deme_size >= 2, "demetic group size is smaller than 2");
            assert!(deme_size <= len, "deme size exceeds the population");
            assert!(len % deme_size == 0, "deme size does not divide the population");
            deme_size
        } else {
            len
        };

        if let Some(new_pop) = target.as_deref_mut() {
            new_pop.individuals.reserve(len);
            // Keeping the best at its old index makes the best-so-far
            // trivial to track; the filling loop below must skip it.
            if self.config.add_best_to_new_population {
                new_pop
                    .individuals
                    .put(self.best_index(), self.best().clone());
            }
        }

        let mut deme_start = 0;
        while deme_start < len {
            let mut range = SelectionRange::new(deme_start, deme_start + deme_size);

            let mut n = 0;
            while n < deme_size {
                let mut offspring = self.evolution(&mut range, catalog, rng);

                // Steady state: pick a victim per candidate up front, so
                // the picks share the range's cached fitness sums.
                let victims = if self.config.steady_state && !offspring.is_empty() {
                    self.select_indices(offspring.len(), false, &mut range, rng)
                } else {
                    Vec::new()
                };

                for j in 0..offspring.len() {
                    if let Some(new_pop) = target.as_deref_mut() {
                        if n < deme_size
                            && new_pop.individuals.get(deme_start + n).is_some()
                        {
                            n += 1;
                        }
                    }
                    if n >= deme_size {
                        // Deme full: leftover candidates are dropped.
                        continue;
                    }
                    if let Some(mut candidate) = offspring.take(j) {
                        candidate.mutate(&self.config, catalog, rng);
                        if self.config.steady_state {
                            if !candidate.fitness_valid() {
                                let fitness = problem.evaluate(&candidate, catalog);
                                candidate.set_fitness(fitness);
                            }
                            self.individuals.put(victims[j], candidate);
                        } else {
                            let new_pop =
                                target.as_deref_mut().expect("generational target is missing");
                            new_pop.individuals.put(deme_start + n, candidate);
                        }
                        n += 1;
                    }
                }
            }

            deme_start += deme_size;
        }

        if let Some(new_pop) = target.as_deref_mut() {
            new_pop.evaluate(problem, catalog);
        }
        if self.config.demetic_grouping {
            match target.as_deref_mut() {
                Some(new_pop) => new_pop.demetic_migration(rng),
                None => self.demetic_migration(rng),
            }
        }
        match target.as_deref_mut() {
            Some(new_pop) => {
                new_pop.calculate_statistics();
                // The creation depth ramp continues in the successor.
                new_pop.evolution_depth = self.evolution_depth;
            }
            None => self.calculate_statistics(),
        }
    }

    // Exchanges a selected member of each deme with one of the next
    // deme. Geometry was already checked by generate.
    fn demetic_migration<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let deme_size = self.config.deme_size;
        let mut deme_start = 0;
        while deme_start + deme_size < self.individuals.len() {
            if random_percent(rng, self.config.demetic_migration_probability) {
                let mut own = SelectionRange::new(deme_start, deme_start + deme_size);
                let mut next =
                    SelectionRange::new(deme_start + deme_size, deme_start + 2 * deme_size);
                let wanderer = self.select_indices(1, true, &mut own, rng)[0];
                let guest = self.select_indices(1, true, &mut next, rng)[0];
                self.individuals.swap(wanderer, guest);
            }
            deme_start += deme_size;
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
