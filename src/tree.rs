//! Expression trees.
//!
//! A [`Tree`] is one node plus an owned child slot per argument. Nodes are
//! referenced by handle into the [`NodeSet`](crate::node::NodeSet) of the
//! tree's role; a freshly loaded tree carries raw numeric ids instead and
//! must be [resolved](Tree::resolve) before use.
//!
//! Structural operators never address nodes by pointer. A point in the tree
//! is a *path*: the sequence of child indices from the root. Paths are
//! chosen immutably, then a single mutable descent
//! ([`Tree::slot_by_path`]) yields the slot owning the subtree, which is
//! how crossover swaps and shrink mutation splice without copying.

use crate::config::CreationType;
use crate::node::NodeSet;
use crate::slots::Slots;
use rand::Rng;
use std::fmt;

/// How a tree node refers to its symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRef {
    /// Slot index into the node set of this tree's role.
    Bound(usize),
    /// Numeric node id read from a stream, not yet resolved.
    Raw(i32),
}

/// One node and its owned children.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    pub(crate) node: NodeRef,
    pub(crate) children: Slots<Tree>,
}

impl Tree {
    /// Creates a node bound to `handle` with `arity` empty child slots.
    pub fn new(handle: usize, arity: usize) -> Self {
        Tree {
            node: NodeRef::Bound(handle),
            children: Slots::with_capacity(arity),
        }
    }

    /// The node handle.
    ///
    /// # Panics
    /// Panics if the node is still an unresolved id.
    pub fn handle(&self) -> usize {
        match self.node {
            NodeRef::Bound(h) => h,
            NodeRef::Raw(id) => panic!("unresolved node id {}", id),
        }
    }

    /// Number of child slots.
    pub fn arity(&self) -> usize {
        self.children.len()
    }

    /// True if the node takes arguments. Decided by the child count, not
    /// the node set, so it works on unresolved trees too.
    pub fn is_function(&self) -> bool {
        !self.children.is_empty()
    }

    /// Borrows the child in slot `n`, if any.
    pub fn child(&self, n: usize) -> Option<&Tree> {
        self.children.get(n)
    }

    /// Total number of nodes in this subtree.
    pub fn length(&self) -> usize {
        1 + self
            .children
            .iter()
            .flatten()
            .map(Tree::length)
            .sum::<usize>()
    }

    /// Depth of this subtree. A single node has depth 1.
    pub fn depth(&self) -> usize {
        self.depth_from(1)
    }

    fn depth_from(&self, depth_so_far: usize) -> usize {
        let mut max = depth_so_far;
        for child in self.children.iter().flatten() {
            max = max.max(child.depth_from(depth_so_far + 1));
        }
        max
    }

    /// Number of function nodes in this subtree.
    pub fn count_functions(&self) -> usize {
        if !self.is_function() {
            return 0;
        }
        1 + self
            .children
            .iter()
            .flatten()
            .map(Tree::count_functions)
            .sum::<usize>()
    }

    /// Fills the child slots recursively.
    ///
    /// `Grow` always picks functions until the depth budget runs out, which
    /// yields full trees of exactly the allowed depth. `Variable` flips a
    /// coin per child. Either way a child at the last allowed level is a
    /// terminal. `allowable_depth` counts the levels below this node that
    /// may still carry functions.
    pub(crate) fn create_children<R: Rng + ?Sized>(
        &mut self,
        mode: CreationType,
        allowable_depth: usize,
        set: &NodeSet,
        rng: &mut R,
    ) {
        for n in 0..self.children.len() {
            let pick_terminal = allowable_depth <= 1
                || (mode != CreationType::Grow && rng.random_bool(0.5));
            let child = if pick_terminal {
                Tree::new(set.choose_terminal(rng), 0)
            } else {
                let handle = set.choose_function(rng);
                let mut child = Tree::new(handle, set.node(handle).arity());
                child.create_children(mode, allowable_depth - 1, set, rng);
                child
            };
            self.children.put(n, child);
        }
    }

    /// Walks the subtree in pre-order, decrementing `countdown` at every
    /// node (or every function node when `functions_only`). When the
    /// counter hits zero the walk stops and `path` holds the child indices
    /// leading to that node from `self`. Returns whether the countdown was
    /// exhausted.
    pub(crate) fn locate(
        &self,
        countdown: &mut usize,
        functions_only: bool,
        path: &mut Vec<usize>,
    ) -> bool {
        if !functions_only || self.is_function() {
            *countdown -= 1;
            if *countdown == 0 {
                return true;
            }
        }
        for n in 0..self.children.len() {
            if let Some(child) = self.children.get(n) {
                path.push(n);
                if child.locate(countdown, functions_only, path) {
                    return true;
                }
                path.pop();
            }
        }
        false
    }

    /// Borrows the subtree at `path`.
    ///
    /// # Panics
    /// Panics if the path leads through an empty slot.
    pub(crate) fn subtree(&self, path: &[usize]) -> &Tree {
        let mut cur = self;
        for &n in path {
            cur = cur.children.get(n).expect("path leads to empty slot");
        }
        cur
    }

    /// Descends from a root slot to the slot owning the subtree at `path`.
    /// An empty path yields the root slot itself.
    ///
    /// # Panics
    /// Panics if the path leads through an empty slot.
    pub(crate) fn slot_by_path<'a>(
        root: &'a mut Option<Tree>,
        path: &[usize],
    ) -> &'a mut Option<Tree> {
        let mut cur = root;
        for &n in path {
            cur = cur
                .as_mut()
                .expect("path leads to empty slot")
                .children
                .slot_mut(n);
        }
        cur
    }

    /// Picks a crossover point: samples nodes uniformly, up to ten times,
    /// and keeps the first function hit. If all ten samples land on
    /// terminals the last one is used, so leaf swaps stay possible but
    /// interior swaps dominate.
    pub(crate) fn choose_path<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<usize> {
        let total = self.length();
        let mut path = Vec::new();
        for _ in 0..10 {
            path.clear();
            let mut countdown = rng.random_range(0..total) + 1;
            let found = self.locate(&mut countdown, false, &mut path);
            debug_assert!(found, "node countdown left unexhausted");
            if self.subtree(&path).is_function() {
                break;
            }
        }
        path
    }

    /// Picks a function node uniformly, or `None` if the tree is a lone
    /// terminal.
    pub(crate) fn choose_function_path<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Option<Vec<usize>> {
        let total = self.count_functions();
        if total == 0 {
            return None;
        }
        let mut countdown = rng.random_range(0..total) + 1;
        let mut path = Vec::new();
        let found = self.locate(&mut countdown, true, &mut path);
        debug_assert!(found, "function countdown left unexhausted");
        Some(path)
    }

    /// Rebinds raw node ids to handles into `set` and re-checks bound
    /// handles. Must be called once after loading, before the tree takes
    /// part in any genetic operation.
    ///
    /// # Panics
    /// Panics if an id is not in the set or a node's arity does not match
    /// the stored child count.
    pub fn resolve(&mut self, set: &NodeSet) {
        let handle = match self.node {
            NodeRef::Raw(id) => match set.find(id) {
                Some(h) => h,
                None => panic!("node id {} not in node set", id),
            },
            NodeRef::Bound(h) => h,
        };
        let def = set.node(handle);
        assert_eq!(
            self.children.len(),
            def.arity(),
            "node {} has arity {} but {} stored children",
            def.id(),
            def.arity(),
            self.children.len()
        );
        self.node = NodeRef::Bound(handle);
        for child in self.children.iter_mut().flatten() {
            child.resolve(set);
        }
    }

    /// Renders the tree against its node set, functions in prefix list
    /// notation: `(+ x (* y y))`.
    pub fn display<'a>(&'a self, set: &'a NodeSet) -> TreeDisplay<'a> {
        TreeDisplay { tree: self, set }
    }

    fn fmt_with(&self, set: &NodeSet, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_function() {
            f.write_str("(")?;
        }
        match self.node {
            NodeRef::Bound(h) => f.write_str(set.node(h).name())?,
            NodeRef::Raw(id) => write!(f, "#{}", id)?,
        }
        for child in self.children.iter() {
            f.write_str(" ")?;
            match child {
                Some(c) => c.fmt_with(set, f)?,
                None => f.write_str("?")?,
            }
        }
        if self.is_function() {
            f.write_str(")")?;
        }
        Ok(())
    }
}

/// Borrowing display adapter returned by [`Tree::display`].
pub struct TreeDisplay<'a> {
    tree: &'a Tree,
    set: &'a NodeSet,
}

impl fmt::Display for TreeDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.tree.fmt_with(self.set, f)
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
    use proptest::prelude::*;

    fn arithmetic_set() -> NodeSet {
        let mut set = NodeSet::new(4);
        set.add(NodeDef::new(1, "+", 2));
        set.add(NodeDef::new(2, "*", 2));
        set.add(NodeDef::new(10, "x", 0));
        set.add(NodeDef::new(11, "y", 0));
        set
    }

    // Builds (+ x (* y y)) by hand against arithmetic_set handles:
    // 0 = "+", 1 = "*", 2 = "y", 3 = "x".
    fn sample_tree() -> Tree {
        let mut inner = Tree::new(1, 2);
        inner.children.put(0, Tree::new(2, 0));
        inner.children.put(1, Tree::new(2, 0));
        let mut root = Tree::new(0, 2);
        root.children.put(0, Tree::new(3, 0));
        root.children.put(1, inner);
        root
    }

    #[test]
    fn test_length_depth_and_function_count() {
        let tree = sample_tree();
        assert_eq!(tree.length(), 5);
        assert_eq!(tree.depth(), 3);
        assert_eq!(tree.count_functions(), 2);
        assert_eq!(Tree::new(3, 0).depth(), 1);
        assert_eq!(Tree::new(3, 0).count_functions(), 0);
    }

    #[test]
    fn test_display_prefix_notation() {
        let set = arithmetic_set();
        let tree = sample_tree();
        assert_eq!(tree.display(&set).to_string(), "(+ x (* y y))");
        assert_eq!(Tree::new(2, 0).display(&set).to_string(), "y");
    }

    #[test]
    fn test_locate_visits_preorder() {
        let tree = sample_tree();
        // Pre-order of (+ x (* y y)): +, x, *, y, y
        let expected: [&[usize]; 5] = [&[], &[0], &[1], &[1, 0], &[1, 1]];
        for (nth, want) in expected.iter().enumerate() {
            let mut countdown = nth + 1;
            let mut path = Vec::new();
            assert!(tree.locate(&mut countdown, false, &mut path));
            assert_eq!(&path[..], *want, "node {} of pre-order", nth);
        }
        // Functions only: +, *
        let mut countdown = 2;
        let mut path = Vec::new();
        assert!(tree.locate(&mut countdown, true, &mut path));
        assert_eq!(path, vec![1]);
    }

    #[test]
    fn test_choose_path_prefers_functions() {
        let set = arithmetic_set();
        let tree = sample_tree();
        let mut rng = create_rng(11);
        let mut function_hits = 0;
        for _ in 0..500 {
            let path = tree.choose_path(&mut rng);
            let node = tree.subtree(&path);
            let _ = set.node(node.handle());
            if node.is_function() {
                function_hits += 1;
            }
        }
        // 2 of 5 nodes are functions; ten biased samples should hit one
        // almost always.
        assert!(
            function_hits > 400,
            "expected a strong function bias, got {}/500",
            function_hits
        );
    }

    #[test]
    fn test_choose_function_path_only_returns_functions() {
        let tree = sample_tree();
        let mut rng = create_rng(5);
        for _ in 0..100 {
            let path = tree.choose_function_path(&mut rng).expect("two functions");
            assert!(tree.subtree(&path).is_function());
        }
        assert!(Tree::new(2, 0).choose_function_path(&mut rng).is_none());
    }

    #[test]
    fn test_slot_by_path_swaps_subtrees() {
        let set = arithmetic_set();
        let mut a = Some(sample_tree());
        let mut b = Some(Tree::new(2, 0));
        // Swap (* y y) of a with the whole of b.
        let slot_a = Tree::slot_by_path(&mut a, &[1]);
        let slot_b = Tree::slot_by_path(&mut b, &[]);
        std::mem::swap(slot_a, slot_b);
        assert_eq!(a.unwrap().display(&set).to_string(), "(+ x y)");
        assert_eq!(b.unwrap().display(&set).to_string(), "(* y y)");
    }

    #[test]
    fn test_grow_creation_builds_full_trees() {
        let set = arithmetic_set();
        let mut rng = create_rng(21);
        for allowable in 1..6 {
            let handle = set.choose_function(&mut rng);
            let mut tree = Tree::new(handle, set.node(handle).arity());
            tree.create_children(CreationType::Grow, allowable, &set, &mut rng);
            assert_eq!(
                tree.depth(),
                allowable + 1,
                "grow should fill the whole depth budget"
            );
        }
    }

    #[test]
    fn test_resolve_rebinds_raw_ids() {
        let set = arithmetic_set();
        let mut tree = Tree {
            node: NodeRef::Raw(1),
            children: Slots::with_capacity(2),
        };
        tree.children.put(
            0,
            Tree {
                node: NodeRef::Raw(10),
                children: Slots::new(),
            },
        );
        tree.children.put(
            1,
            Tree {
                node: NodeRef::Raw(11),
                children: Slots::new(),
            },
        );
        tree.resolve(&set);
        assert_eq!(tree.node, NodeRef::Bound(0));
        assert_eq!(tree.display(&set).to_string(), "(+ x y)");
    }

    #[test]
    #[should_panic(expected = "node id 99 not in node set")]
    fn test_resolve_unknown_id_panics() {
        let set = arithmetic_set();
        let mut tree = Tree {
            node: NodeRef::Raw(99),
            children: Slots::new(),
        };
        tree.resolve(&set);
    }

    proptest! {
        #[test]
        fn prop_created_trees_respect_depth_budget(
            seed in 0u64..1000,
            allowable in 1usize..7,
            grow in proptest::bool::ANY,
        ) {
            let set = arithmetic_set();
            let mut rng = create_rng(seed);
            let mode = if grow { CreationType::Grow } else { CreationType::Variable };
            let handle = set.choose_function(&mut rng);
            let mut tree = Tree::new(handle, set.node(handle).arity());
            tree.create_children(mode, allowable, &set, &mut rng);
            prop_assert!(tree.depth() <= allowable + 1);
            prop_assert!(tree.depth() <= tree.length());
            // every node reachable by countdown, and the full count is exact
            let mut countdown = tree.length();
            let mut path = Vec::new();
            prop_assert!(tree.locate(&mut countdown, false, &mut path));
        }
    }
}
