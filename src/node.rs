//! Node definitions, node sets and the catalog.
//!
//! A [`NodeDef`] describes one symbol a tree may carry: a numeric id (used
//! by persistence), a printable name and an arity. Nodes with arity > 0 are
//! functions, nodes with arity 0 are terminals. A [`NodeSet`] holds the
//! symbols allowed in one tree role, functions packed at the front and
//! terminals at the back so either class can be sampled directly. A
//! [`Catalog`] holds one set per tree role of an individual: role 0 is the
//! result-producing tree, the remaining roles are its subtrees.
//!
//! Trees refer to nodes by slot index (a handle) into their role's set, so
//! the same set instance must stay alive for the whole run.

use crate::slots::Slots;
use rand::Rng;
use std::fmt;

/// One symbol of the primitive vocabulary.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDef {
    pub(crate) id: i32,
    pub(crate) name: String,
    pub(crate) arity: usize,
}

/// The longest node name persistence will accept, in bytes.
pub const MAX_NAME_LEN: usize = 400;

impl NodeDef {
    /// Creates a node definition.
    ///
    /// # Panics
    /// Panics if the name is empty, longer than [`MAX_NAME_LEN`] bytes, or
    /// contains a `"` (the quote delimits names in the text format).
    pub fn new(id: i32, name: impl Into<String>, arity: usize) -> Self {
        let name = name.into();
        assert!(!name.is_empty(), "node name must not be empty");
        assert!(
            name.len() <= MAX_NAME_LEN,
            "node name longer than {} bytes",
            MAX_NAME_LEN
        );
        assert!(!name.contains('"'), "node name must not contain a quote");
        NodeDef { id, name, arity }
    }

    /// Numeric id, unique within a node set.
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Printable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of children a tree node carrying this symbol has.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// True if the node takes arguments.
    pub fn is_function(&self) -> bool {
        self.arity != 0
    }

    /// True if the node takes no arguments.
    pub fn is_terminal(&self) -> bool {
        self.arity == 0
    }
}

impl fmt::Display for NodeDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// The symbols allowed in one tree role.
///
/// Functions occupy the slot prefix `0..num_functions`, terminals the slot
/// suffix, so [`choose_function`](Self::choose_function) and
/// [`choose_terminal`](Self::choose_terminal) are single uniform draws.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSet {
    pub(crate) nodes: Slots<NodeDef>,
    pub(crate) num_functions: usize,
    pub(crate) num_terminals: usize,
}

impl NodeSet {
    /// Creates a set with room for `capacity` nodes.
    pub fn new(capacity: usize) -> Self {
        NodeSet {
            nodes: Slots::with_capacity(capacity),
            num_functions: 0,
            num_terminals: 0,
        }
    }

    /// Adds a node, keeping functions at the front and terminals at the back.
    ///
    /// # Panics
    /// Panics if the set is full or a node with the same id is already in it.
    pub fn add(&mut self, node: NodeDef) {
        assert!(
            self.num_functions + self.num_terminals < self.nodes.len(),
            "node set is full"
        );
        assert!(
            self.find(node.id).is_none(),
            "duplicate node id {} in node set",
            node.id
        );
        if node.is_function() {
            self.nodes.put(self.num_functions, node);
            self.num_functions += 1;
        } else {
            self.num_terminals += 1;
            self.nodes.put(self.nodes.len() - self.num_terminals, node);
        }
    }

    /// Total number of slots in the set.
    pub fn capacity(&self) -> usize {
        self.nodes.len()
    }

    /// Number of functions added so far.
    pub fn num_functions(&self) -> usize {
        self.num_functions
    }

    /// Number of terminals added so far.
    pub fn num_terminals(&self) -> usize {
        self.num_terminals
    }

    /// True when every slot is filled.
    pub fn is_complete(&self) -> bool {
        !self.nodes.is_empty()
            && self.num_functions + self.num_terminals == self.nodes.len()
    }

    /// Borrows the node at `handle`.
    ///
    /// # Panics
    /// Panics if the slot is empty.
    pub fn node(&self, handle: usize) -> &NodeDef {
        self.nodes.get(handle).expect("no node at slot")
    }

    /// Handle of the node with the given id, if present.
    pub fn find(&self, id: i32) -> Option<usize> {
        (0..self.nodes.len()).find(|&ix| {
            self.nodes.get(ix).map(|n| n.id) == Some(id)
        })
    }

    /// Draws a function handle uniformly.
    ///
    /// # Panics
    /// Panics if the set has no functions.
    pub fn choose_function<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        assert!(self.num_functions > 0, "no function to choose from");
        rng.random_range(0..self.num_functions)
    }

    /// Draws a terminal handle uniformly.
    ///
    /// # Panics
    /// Panics if the set has no terminals.
    pub fn choose_terminal<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        assert!(self.num_terminals > 0, "no terminal to choose from");
        self.nodes.len() - self.num_terminals + rng.random_range(0..self.num_terminals)
    }

    /// Draws a handle uniformly among nodes with the given arity, or `None`
    /// if the set has no such node.
    pub fn choose_with_arity<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        arity: usize,
    ) -> Option<usize> {
        let count = self.nodes.iter().flatten().filter(|n| n.arity == arity).count();
        if count == 0 {
            return None;
        }
        let k = rng.random_range(0..count);
        let mut seen = 0;
        for ix in 0..self.nodes.len() {
            if let Some(n) = self.nodes.get(ix) {
                if n.arity == arity {
                    if seen == k {
                        return Some(ix);
                    }
                    seen += 1;
                }
            }
        }
        unreachable!("counted node vanished from set")
    }
}

impl fmt::Display for NodeSet {
    /// Lists the nodes in slot order; functions render as `name(arity)`,
    /// empty slots print as `NoNode`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (ix, slot) in self.nodes.iter().enumerate() {
            if ix > 0 {
                f.write_str(" ")?;
            }
            match slot {
                Some(n) if n.is_function() => write!(f, "{}({})", n.name, n.arity)?,
                Some(n) => f.write_str(&n.name)?,
                None => f.write_str("NoNode")?,
            }
        }
        Ok(())
    }
}

/// One node set per tree role of an individual.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub(crate) sets: Slots<NodeSet>,
}

impl Catalog {
    /// Creates a catalog with `roles` empty slots.
    ///
    /// # Panics
    /// Panics if `roles` is zero.
    pub fn new(roles: usize) -> Self {
        assert!(roles >= 1, "catalog needs at least one tree role");
        Catalog {
            sets: Slots::with_capacity(roles),
        }
    }

    /// Installs the node set for `role`, replacing any previous one.
    pub fn set_role(&mut self, role: usize, set: NodeSet) {
        self.sets.put(role, set);
    }

    /// Number of tree roles.
    pub fn role_count(&self) -> usize {
        self.sets.len()
    }

    /// Borrows the node set for `role`.
    ///
    /// # Panics
    /// Panics if no set has been installed for that role.
    pub fn role(&self, role: usize) -> &NodeSet {
        self.sets.get(role).expect("no node set for role")
    }

    /// Checks that every role has a complete node set.
    ///
    /// # Panics
    /// Panics with the offending role on the first hole found.
    pub(crate) fn validate(&self) {
        assert!(self.sets.len() >= 1, "catalog needs at least one tree role");
        for role in 0..self.sets.len() {
            let set = self
                .sets
                .get(role)
                .unwrap_or_else(|| panic!("catalog has no node set for role {}", role));
            assert!(
                set.capacity() > 0,
                "node set for role {} is empty",
                role
            );
            assert!(
                set.is_complete(),
                "node set for role {} has unfilled slots",
                role
            );
        }
    }
}

impl fmt::Display for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (role, slot) in self.sets.iter().enumerate() {
            match slot {
                Some(set) => writeln!(f, "role {}: {}", role, set)?,
                None => writeln!(f, "role {}: <missing>", role)?,
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
