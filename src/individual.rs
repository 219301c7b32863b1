//! Individuals: multi-tree programs with cached scores.
//!
//! An [`Individual`] owns one [`Tree`] per catalog role, a standardized
//! fitness (lower is better) behind a validity flag, and cached totals for
//! length and depth. The genetic operators live here: creation, subtree
//! crossover, swap mutation and shrink mutation. Every operator that can
//! change a tree keeps the caches honest: fitness is invalidated whenever
//! structure actually changed, length and depth are recalculated on the
//! spot.

use crate::config::{CreationType, GpConfig};
use crate::node::Catalog;
use crate::rng::random_percent;
use crate::slots::Slots;
use crate::tree::{NodeRef, Tree};
use rand::Rng;
use std::fmt;
use std::mem;

/// One candidate program: a tree per role plus cached statistics.
#[derive(Debug, Clone)]
pub struct Individual {
    pub(crate) trees: Slots<Tree>,
    pub(crate) fitness: f64,
    pub(crate) fitness_valid: bool,
    pub(crate) length: usize,
    pub(crate) depth: usize,
}

impl Individual {
    /// Creates an individual with `roles` empty tree slots.
    ///
    /// # Panics
    /// Panics if `roles` is zero.
    pub fn new(roles: usize) -> Self {
        assert!(roles >= 1, "an individual needs at least one tree");
        Individual {
            trees: Slots::with_capacity(roles),
            fitness: 0.0,
            fitness_valid: false,
            length: 0,
            depth: 0,
        }
    }

    /// Builds all trees. Each root is a function drawn from its role's
    /// set; the root level consumes one level of `depth_budget`, the rest
    /// grows per `mode`.
    ///
    /// # Panics
    /// Panics unless `mode` is [`CreationType::Grow`] or
    /// [`CreationType::Variable`] (the ramped variants are resolved by the
    /// population creation loop) or if `depth_budget` is zero.
    pub fn create<R: Rng + ?Sized>(
        &mut self,
        mode: CreationType,
        depth_budget: usize,
        catalog: &Catalog,
        rng: &mut R,
    ) {
        assert!(
            matches!(mode, CreationType::Grow | CreationType::Variable),
            "create takes the grow or variable method"
        );
        assert!(depth_budget >= 1, "depth budget must be at least 1");
        let allowable = depth_budget - 1;
        for role in 0..self.trees.len() {
            let set = catalog.role(role);
            let handle = set.choose_function(rng);
            let mut tree = Tree::new(handle, set.node(handle).arity());
            tree.create_children(mode, allowable, set, rng);
            self.trees.put(role, tree);
        }
        self.calc_length();
        self.calc_depth();
    }

    /// Number of tree roles.
    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    /// Borrows the tree for `role`.
    ///
    /// # Panics
    /// Panics if that slot is empty.
    pub fn tree(&self, role: usize) -> &Tree {
        self.trees.get(role).expect("individual tree is missing")
    }

    /// Cached standardized fitness. Meaningful only while
    /// [`fitness_valid`](Self::fitness_valid) holds.
    pub fn fitness(&self) -> f64 {
        self.fitness
    }

    /// Whether the cached fitness still reflects the trees.
    pub fn fitness_valid(&self) -> bool {
        self.fitness_valid
    }

    /// Stores a fitness and marks it valid.
    pub fn set_fitness(&mut self, fitness: f64) {
        self.fitness = fitness;
        self.fitness_valid = true;
    }

    /// Marks the cached fitness stale.
    pub fn invalidate_fitness(&mut self) {
        self.fitness_valid = false;
    }

    /// Cached total node count over all trees.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Cached maximum tree depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub(crate) fn calc_length(&mut self) {
        self.length = self.trees.iter().flatten().map(Tree::length).sum();
    }

    pub(crate) fn calc_depth(&mut self) {
        self.depth = self.trees.iter().flatten().map(Tree::depth).max().unwrap_or(0);
    }

    /// Subtree crossover between two parents, in place.
    ///
    /// One role is drawn at random; a point is chosen in each parent's
    /// tree for that role and the subtrees below the points are exchanged
    /// by ownership swap. If either modified tree ends up deeper than
    /// `max_depth` the exchange is undone and new points are drawn, until
    /// a legal pair is found. Both parents leave with stale fitness and
    /// fresh length and depth caches.
    ///
    /// # Panics
    /// Panics if the parents disagree on tree count or a chosen tree is
    /// missing.
    pub fn cross<R: Rng + ?Sized>(
        a: &mut Individual,
        b: &mut Individual,
        max_depth: usize,
        rng: &mut R,
    ) {
        assert_eq!(
            a.trees.len(),
            b.trees.len(),
            "parents must have the same number of trees"
        );
        let role = rng.random_range(0..a.trees.len());
        assert!(
            a.trees.get(role).is_some() && b.trees.get(role).is_some(),
            "crossover tree is missing"
        );
        loop {
            let path_a = a.tree(role).choose_path(rng);
            let path_b = b.tree(role).choose_path(rng);
            {
                let cut_a = Tree::slot_by_path(a.trees.slot_mut(role), &path_a);
                let cut_b = Tree::slot_by_path(b.trees.slot_mut(role), &path_b);
                mem::swap(cut_a, cut_b);
            }
            if a.tree(role).depth() <= max_depth && b.tree(role).depth() <= max_depth {
                break;
            }
            // Too deep: undo and draw new points. The paths address slots
            // above the cuts, so they are still valid after the swap.
            let cut_a = Tree::slot_by_path(a.trees.slot_mut(role), &path_a);
            let cut_b = Tree::slot_by_path(b.trees.slot_mut(role), &path_b);
            mem::swap(cut_a, cut_b);
        }
        a.invalidate_fitness();
        b.invalidate_fitness();
        a.calc_length();
        a.calc_depth();
        b.calc_length();
        b.calc_depth();
    }

    /// Applies the configured mutations, each behind its own probability
    /// gate. The fitness cache is invalidated only when a mutation
    /// actually changed a tree.
    pub fn mutate<R: Rng + ?Sized>(
        &mut self,
        config: &GpConfig,
        catalog: &Catalog,
        rng: &mut R,
    ) {
        if random_percent(rng, config.swap_mutation_probability) && self.swap_mutate(catalog, rng)
        {
            self.invalidate_fitness();
        }
        if random_percent(rng, config.shrink_mutation_probability) && self.shrink_mutate(rng) {
            self.invalidate_fitness();
        }
    }

    /// Swap mutation: rebinds one node to another node of the same arity
    /// from the same set, leaving the shape untouched. Picks the point
    /// with the crossover bias, then tries a few draws for a node with a
    /// different id. Returns whether a node was replaced.
    pub fn swap_mutate<R: Rng + ?Sized>(&mut self, catalog: &Catalog, rng: &mut R) -> bool {
        assert!(!self.trees.is_empty(), "individual contains no trees");
        let role = rng.random_range(0..self.trees.len());
        if self.trees.get(role).is_none() {
            return false;
        }
        let set = catalog.role(role);
        let path = self.tree(role).choose_path(rng);
        let (old_handle, arity) = {
            let target = self.tree(role).subtree(&path);
            (target.handle(), target.arity())
        };
        for _ in 0..5 {
            match set.choose_with_arity(rng, arity) {
                Some(handle) if handle != old_handle => {
                    let slot = Tree::slot_by_path(self.trees.slot_mut(role), &path);
                    slot.as_mut().expect("path leads to empty slot").node =
                        NodeRef::Bound(handle);
                    return true;
                }
                Some(_) => {}
                None => break,
            }
        }
        false
    }

    /// Shrink mutation: a uniformly chosen function node is replaced by
    /// one of its children, discarding the rest of its subtree. Returns
    /// whether the tree shrank; a tree without function nodes is left
    /// alone.
    pub fn shrink_mutate<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        assert!(!self.trees.is_empty(), "individual contains no trees");
        let role = rng.random_range(0..self.trees.len());
        if self.trees.get(role).is_none() {
            return false;
        }
        let path = match self.tree(role).choose_function_path(rng) {
            Some(path) => path,
            None => return false,
        };
        let slot = Tree::slot_by_path(self.trees.slot_mut(role), &path);
        let mut parent = slot.take().expect("path leads to empty slot");
        let pick = rng.random_range(0..parent.children.len());
        let child = parent
            .children
            .take(pick)
            .expect("function child is missing");
        *slot = Some(child);
        self.calc_length();
        self.calc_depth();
        true
    }

    /// True when both individuals carry node-for-node identical trees.
    ///
    /// # Panics
    /// Panics if the individuals disagree on tree count.
    pub fn structural_eq(&self, other: &Individual) -> bool {
        assert_eq!(
            self.trees.len(),
            other.trees.len(),
            "compared individuals must have the same number of trees"
        );
        self.trees == other.trees
    }

    /// Resolves every tree against the catalog after a load.
    ///
    /// # Panics
    /// Panics if the catalog's role count differs from the individual's
    /// tree count, or a node id cannot be resolved.
    pub fn resolve(&mut self, catalog: &Catalog) {
        assert_eq!(
            self.trees.len(),
            catalog.role_count(),
            "catalog role count does not match the individual"
        );
        for role in 0..self.trees.len() {
            if let Some(tree) = self.trees.get_mut(role) {
                tree.resolve(catalog.role(role));
            }
        }
    }

    /// Renders all trees, one line per role: `main:` for role 0, `adf0:`,
    /// `adf1:` and so on for the rest.
    pub fn display<'a>(&'a self, catalog: &'a Catalog) -> IndividualDisplay<'a> {
        IndividualDisplay {
            individual: self,
            catalog,
        }
    }
}

/// Borrowing display adapter returned by [`Individual::display`].
pub struct IndividualDisplay<'a> {
    individual: &'a Individual,
    catalog: &'a Catalog,
}

impl fmt::Display for IndividualDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (role, slot) in self.individual.trees.iter().enumerate() {
            if role == 0 {
                f.write_str("main: ")?;
            } else {
                write!(f, "adf{}: ", role - 1)?;
            }
            match slot {
                Some(tree) => writeln!(f, "{}", tree.display(self.catalog.role(role)))?,
                None => writeln!(f, "?")?,
            }
        }
        Ok(())
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

    fn one_role_catalog() -> Catalog {
        let mut set = NodeSet::new(4);
        set.add(NodeDef::new(1, "+", 2));
        set.add(NodeDef::new(2, "*", 2));
        set.add(NodeDef::new(10, "x", 0));
        set.add(NodeDef::new(11, "y", 0));
        let mut catalog = Catalog::new(1);
        catalog.set_role(0, set);
        catalog
    }

    fn created(mode: CreationType, budget: usize, seed: u64) -> Individual {
        let catalog = one_role_catalog();
        let mut rng = create_rng(seed);
        let mut ind = Individual::new(1);
        ind.create(mode, budget, &catalog, &mut rng);
        ind
    }

    #[test]
    fn test_create_roots_are_functions_within_budget() {
        for seed in 0..20 {
            let ind = created(CreationType::Variable, 6, seed);
            let catalog = one_role_catalog();
            let root = ind.tree(0);
            assert!(catalog.role(0).node(root.handle()).is_function());
            assert!(ind.depth() <= 6, "depth {} exceeds budget", ind.depth());
            assert_eq!(ind.length(), root.length());
            assert!(!ind.fitness_valid());
        }
    }

    #[test]
    fn test_grow_create_fills_budget() {
        let ind = created(CreationType::Grow, 4, 3);
        assert_eq!(ind.depth(), 4);
    }

    #[test]
    fn test_fitness_cache_flags() {
        let mut ind = created(CreationType::Variable, 4, 1);
        ind.set_fitness(2.5);
        assert!(ind.fitness_valid());
        assert!((ind.fitness() - 2.5).abs() < 1e-12);
        ind.invalidate_fitness();
        assert!(!ind.fitness_valid());
        assert!((ind.fitness() - 2.5).abs() < 1e-12, "value survives the flag");
    }

    #[test]
    fn test_cross_conserves_nodes_and_invalidates() {
        let mut rng = create_rng(17);
        for seed in 0..20 {
            let mut a = created(CreationType::Variable, 6, seed);
            let mut b = created(CreationType::Grow, 5, seed + 100);
            a.set_fitness(1.0);
            b.set_fitness(2.0);
            let total = a.length() + b.length();

            Individual::cross(&mut a, &mut b, 17, &mut rng);

            assert_eq!(a.length() + b.length(), total, "crossover moves nodes, never drops them");
            assert!(!a.fitness_valid());
            assert!(!b.fitness_valid());
            assert!(a.depth() <= 17 && b.depth() <= 17);
            assert_eq!(a.length(), a.tree(0).length(), "length cache stays fresh");
            assert_eq!(b.depth(), b.tree(0).depth(), "depth cache stays fresh");
        }
    }

    #[test]
    fn test_cross_respects_depth_cap() {
        let mut rng = create_rng(23);
        for seed in 0..20 {
            let mut a = created(CreationType::Grow, 6, seed);
            let mut b = created(CreationType::Grow, 6, seed + 500);
            Individual::cross(&mut a, &mut b, 6, &mut rng);
            assert!(a.depth() <= 6, "depth {} breaks the cap", a.depth());
            assert!(b.depth() <= 6, "depth {} breaks the cap", b.depth());
        }
    }

    #[test]
    fn test_cross_changes_structure_between_disjoint_parents() {
        // Parents built from non-overlapping symbols: any exchanged
        // subtree leaves a foreign node behind, so both must change.
        let mut rng = create_rng(31);

        // a = (+ x x) using handles 0 and 3, b = (* y y) using 1 and 2
        let mut a = Individual::new(1);
        let mut root_a = Tree::new(0, 2);
        root_a.children.put(0, Tree::new(3, 0));
        root_a.children.put(1, Tree::new(3, 0));
        a.trees.put(0, root_a);
        a.calc_length();
        a.calc_depth();
        let mut b = Individual::new(1);
        let mut root_b = Tree::new(1, 2);
        root_b.children.put(0, Tree::new(2, 0));
        root_b.children.put(1, Tree::new(2, 0));
        b.trees.put(0, root_b);
        b.calc_length();
        b.calc_depth();

        let before_a = a.clone();
        let before_b = b.clone();
        Individual::cross(&mut a, &mut b, 17, &mut rng);

        assert!(!a.structural_eq(&before_a));
        assert!(!b.structural_eq(&before_b));
    }

    #[test]
    fn test_swap_mutate_keeps_shape() {
        let catalog = one_role_catalog();
        let mut rng = create_rng(41);
        let mut changed = 0;
        for seed in 0..50 {
            let mut ind = created(CreationType::Variable, 5, seed);
            let before = ind.clone();
            if ind.swap_mutate(&catalog, &mut rng) {
                changed += 1;
                assert!(!ind.structural_eq(&before), "a swap must rebind a node");
            }
            assert_eq!(ind.length(), before.length(), "swap never changes length");
            assert_eq!(ind.depth(), before.depth(), "swap never changes depth");
        }
        assert!(changed > 0, "with two nodes per arity some swaps must land");
    }

    #[test]
    fn test_shrink_mutate_reduces_length() {
        let mut rng = create_rng(43);
        for seed in 0..30 {
            let mut ind = created(CreationType::Grow, 5, seed);
            let before = ind.length();
            assert!(ind.shrink_mutate(&mut rng), "grown trees have functions");
            assert!(ind.length() < before, "{} not below {}", ind.length(), before);
            assert_eq!(ind.length(), ind.tree(0).length());
        }
    }

    #[test]
    fn test_shrink_mutate_skips_lone_terminals() {
        let mut rng = create_rng(47);
        let mut ind = Individual::new(1);
        ind.trees.put(0, Tree::new(3, 0));
        ind.calc_length();
        ind.calc_depth();
        assert!(!ind.shrink_mutate(&mut rng));
        assert_eq!(ind.length(), 1);
    }

    #[test]
    fn test_mutate_invalidates_only_on_change() {
        let catalog = one_role_catalog();
        let mut rng = create_rng(53);
        // Zero probabilities: gates never fire, fitness stays valid.
        let config = GpConfig::default();
        let mut ind = created(CreationType::Variable, 5, 2);
        ind.set_fitness(1.0);
        for _ in 0..50 {
            ind.mutate(&config, &catalog, &mut rng);
        }
        assert!(ind.fitness_valid());

        // Certain shrink on a shrinkable tree: must invalidate.
        let config = GpConfig::default().with_shrink_mutation_probability(100.0);
        let mut ind = created(CreationType::Grow, 5, 3);
        ind.set_fitness(1.0);
        ind.mutate(&config, &catalog, &mut rng);
        assert!(!ind.fitness_valid());

        // Certain shrink on a lone terminal: no change, cache survives.
        let mut ind = Individual::new(1);
        ind.trees.put(0, Tree::new(3, 0));
        ind.calc_length();
        ind.calc_depth();
        ind.set_fitness(1.0);
        ind.mutate(&config, &catalog, &mut rng);
        assert!(ind.fitness_valid());
    }

    #[test]
    fn test_display_labels_roles() {
        let mut set = NodeSet::new(2);
        set.add(NodeDef::new(1, "inc", 1));
        set.add(NodeDef::new(10, "x", 0));
        let mut catalog = Catalog::new(2);
        catalog.set_role(0, set.clone());
        catalog.set_role(1, set);

        let mut ind = Individual::new(2);
        let mut main = Tree::new(0, 1);
        main.children.put(0, Tree::new(1, 0));
        ind.trees.put(0, main);
        ind.trees.put(1, Tree::new(1, 0));

        let text = ind.display(&catalog).to_string();
        assert_eq!(text, "main: (inc x)\nadf0: x\n");
    }
}
