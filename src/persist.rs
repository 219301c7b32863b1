//! Token-text persistence.
//!
//! Every persistent entity writes whitespace-delimited tokens. An entity
//! that owns slots writes a container part: a newline, its type tag, the
//! slot count, then per slot either `n` (absent) or `y` glued to the
//! element's type tag followed by the element payload. Numbers use plain
//! `Display`, so floats round-trip exactly; node names are written raw
//! between double quotes and survive embedded spaces.
//!
//! Loading is symmetric and strict: an unexpected tag, presence flag or
//! enum code is a [`PersistError`], never a silent default. Trees come
//! back with raw node ids; `resolve_nodes` rebinds them against a catalog
//! before the trees are used. Entities saved back to back into one stream
//! load back to back from one reader.

use crate::config::{CreationType, GpConfig};
use crate::individual::Individual;
use crate::node::{Catalog, NodeDef, NodeSet, MAX_NAME_LEN};
use crate::population::Population;
use crate::selection::SelectionType;
use crate::slots::Slots;
use crate::tree::{NodeRef, Tree};
use std::io::{self, BufRead, Write};
use thiserror::Error;

/// Errors produced while loading persisted entities.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("malformed token `{token}`")]
    Malformed { token: String },
    #[error("expected type tag {expected}, found {found}")]
    TagMismatch { expected: u8, found: u8 },
    #[error("expected presence flag `y` or `n`, found `{found}`")]
    BadFlag { found: char },
    #[error("missing {0} quote around a node name")]
    MissingQuote(&'static str),
    #[error("node name is empty")]
    EmptyName,
    #[error("node name exceeds {} bytes", MAX_NAME_LEN)]
    NameTooLong,
    #[error("node set layout is inconsistent")]
    InvalidNodeSet,
    #[error("unknown {what} code {code}")]
    BadCode { what: &'static str, code: u8 },
    #[error(transparent)]
    Io(#[from] io::Error),
}

// Type tags, one per persistent entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Node = 3,
    NodeSet = 4,
    Catalog = 5,
    Config = 6,
    Tree = 7,
    Individual = 8,
    Population = 9,
}

// Pull-parser over a byte stream: single-byte pushback, whitespace
// tokenization, raw quoted scanning. A reader that stops at an entity
// boundary holds no pushback, so the next entity can be loaded from the
// same underlying stream with a fresh TokenReader.
struct TokenReader<R> {
    inner: R,
    peeked: Option<u8>,
}

impl<R: BufRead> TokenReader<R> {
    fn new(inner: R) -> Self {
        TokenReader { inner, peeked: None }
    }

    fn next_byte(&mut self) -> Result<Option<u8>, PersistError> {
        if let Some(byte) = self.peeked.take() {
            return Ok(Some(byte));
        }
        let mut buf = [0u8; 1];
        loop {
            match self.inner.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(_) => return Ok(Some(buf[0])),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn skip_ws(&mut self) -> Result<(), PersistError> {
        while let Some(byte) = self.next_byte()? {
            if !byte.is_ascii_whitespace() {
                self.peeked = Some(byte);
                break;
            }
        }
        Ok(())
    }

    fn token(&mut self) -> Result<String, PersistError> {
        self.skip_ws()?;
        let mut raw = Vec::new();
        while let Some(byte) = self.next_byte()? {
            if byte.is_ascii_whitespace() {
                break;
            }
            raw.push(byte);
        }
        if raw.is_empty() {
            return Err(PersistError::UnexpectedEof);
        }
        match String::from_utf8(raw) {
            Ok(token) => Ok(token),
            Err(e) => Err(PersistError::Malformed {
                token: String::from_utf8_lossy(e.as_bytes()).into_owned(),
            }),
        }
    }

    fn parse<T: std::str::FromStr>(&mut self) -> Result<T, PersistError> {
        let token = self.token()?;
        token.parse().map_err(|_| PersistError::Malformed { token })
    }

    // One non-whitespace byte, used for the container presence flags.
    fn flag(&mut self) -> Result<u8, PersistError> {
        self.skip_ws()?;
        self.next_byte()?.ok_or(PersistError::UnexpectedEof)
    }

    // Raw bytes between the next pair of double quotes.
    fn quoted(&mut self) -> Result<String, PersistError> {
        loop {
            match self.next_byte()? {
                None => return Err(PersistError::MissingQuote("opening")),
                Some(b'"') => break,
                Some(_) => {}
            }
        }
        let mut raw = Vec::new();
        loop {
            match self.next_byte()? {
                None => return Err(PersistError::MissingQuote("closing")),
                Some(b'"') => break,
                Some(byte) => {
                    raw.push(byte);
                    if raw.len() > MAX_NAME_LEN {
                        return Err(PersistError::NameTooLong);
                    }
                }
            }
        }
        match String::from_utf8(raw) {
            Ok(name) => Ok(name),
            Err(e) => Err(PersistError::Malformed {
                token: String::from_utf8_lossy(e.as_bytes()).into_owned(),
            }),
        }
    }

    fn expect_tag(&mut self, expected: Tag) -> Result<(), PersistError> {
        let found: u8 = self.parse()?;
        if found != expected as u8 {
            return Err(PersistError::TagMismatch {
                expected: expected as u8,
                found,
            });
        }
        Ok(())
    }
}

// Writes the container part of an entity with uniformly typed elements.
fn save_slots<T, W: Write>(
    w: &mut W,
    owner: Tag,
    element: Tag,
    slots: &Slots<T>,
    mut save: impl FnMut(&mut W, &T) -> io::Result<()>,
) -> io::Result<()> {
    write!(w, "\n{} {} ", owner as u8, slots.len())?;
    for slot in slots.iter() {
        match slot {
            None => w.write_all(b"n")?,
            Some(value) => {
                write!(w, "y{} ", element as u8)?;
                save(w, value)?;
            }
        }
    }
    Ok(())
}

// Reads the container part written by save_slots.
fn load_slots<T, R: BufRead>(
    r: &mut TokenReader<R>,
    owner: Tag,
    element: Tag,
    mut load: impl FnMut(&mut TokenReader<R>) -> Result<T, PersistError>,
) -> Result<Slots<T>, PersistError> {
    r.expect_tag(owner)?;
    let count: usize = r.parse()?;
    let mut slots = Slots::with_capacity(count);
    for ix in 0..count {
        match r.flag()? {
            b'n' => {}
            b'y' => {
                r.expect_tag(element)?;
                slots.put(ix, load(r)?);
            }
            other => return Err(PersistError::BadFlag { found: other as char }),
        }
    }
    Ok(slots)
}

impl NodeDef {
    /// Writes `id arity "name"`.
    pub fn save<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write!(w, "{} {} \"{}\" ", self.id, self.arity, self.name)
    }

    pub fn load<R: BufRead>(r: &mut R) -> Result<Self, PersistError> {
        Self::load_from(&mut TokenReader::new(r))
    }

    fn load_from<R: BufRead>(r: &mut TokenReader<R>) -> Result<Self, PersistError> {
        let id: i32 = r.parse()?;
        let arity: usize = r.parse()?;
        let name = r.quoted()?;
        if name.is_empty() {
            return Err(PersistError::EmptyName);
        }
        Ok(NodeDef { id, name, arity })
    }
}

impl NodeSet {
    /// Writes the function and terminal counts, then the node slots.
    pub fn save<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write!(w, "{} {} ", self.num_functions, self.num_terminals)?;
        save_slots(w, Tag::NodeSet, Tag::Node, &self.nodes, |w, node| node.save(w))
    }

    pub fn load<R: BufRead>(r: &mut R) -> Result<Self, PersistError> {
        Self::load_from(&mut TokenReader::new(r))
    }

    fn load_from<R: BufRead>(r: &mut TokenReader<R>) -> Result<Self, PersistError> {
        let num_functions: usize = r.parse()?;
        let num_terminals: usize = r.parse()?;
        let nodes = load_slots(r, Tag::NodeSet, Tag::Node, NodeDef::load_from)?;
        let set = NodeSet {
            nodes,
            num_functions,
            num_terminals,
        };
        set.verify_layout()?;
        Ok(set)
    }

    // The prefix/suffix placement is an invariant of the whole crate, so
    // a loaded set must prove it before anyone draws from it.
    fn verify_layout(&self) -> Result<(), PersistError> {
        if self.num_functions + self.num_terminals > self.nodes.len() {
            return Err(PersistError::InvalidNodeSet);
        }
        let first_terminal = self.nodes.len() - self.num_terminals;
        for ix in 0..self.nodes.len() {
            let node = self.nodes.get(ix);
            if ix < self.num_functions {
                match node {
                    Some(node) if node.is_function() => {}
                    _ => return Err(PersistError::InvalidNodeSet),
                }
            } else if ix >= first_terminal {
                match node {
                    Some(node) if node.is_terminal() => {}
                    _ => return Err(PersistError::InvalidNodeSet),
                }
            } else if node.is_some() {
                return Err(PersistError::InvalidNodeSet);
            }
        }
        Ok(())
    }
}

impl Catalog {
    pub fn save<W: Write>(&self, w: &mut W) -> io::Result<()> {
        save_slots(w, Tag::Catalog, Tag::NodeSet, &self.sets, |w, set| set.save(w))
    }

    pub fn load<R: BufRead>(r: &mut R) -> Result<Self, PersistError> {
        Self::load_from(&mut TokenReader::new(r))
    }

    fn load_from<R: BufRead>(r: &mut TokenReader<R>) -> Result<Self, PersistError> {
        let sets = load_slots(r, Tag::Catalog, Tag::NodeSet, NodeSet::load_from)?;
        Ok(Catalog { sets })
    }
}

impl GpConfig {
    /// Writes the sixteen run parameters. The ambient `seed` is per-run
    /// state and is not persisted.
    pub fn save<W: Write>(&self, w: &mut W) -> io::Result<()> {
        write!(w, "\n{} ", Tag::Config as u8)?;
        write!(w, "{} ", self.population_size)?;
        write!(w, "{} ", self.number_of_generations)?;
        write!(w, "{} ", self.crossover_probability)?;
        write!(w, "{} ", self.creation_probability)?;
        write!(w, "{} ", self.creation_type.code())?;
        write!(w, "{} ", self.max_depth_for_creation)?;
        write!(w, "{} ", self.max_depth_for_crossover)?;
        write!(w, "{} ", self.selection_type.code())?;
        write!(w, "{} ", self.tournament_size)?;
        write!(w, "{} ", self.demetic_grouping as u8)?;
        write!(w, "{} ", self.deme_size)?;
        write!(w, "{} ", self.demetic_migration_probability)?;
        write!(w, "{} ", self.swap_mutation_probability)?;
        write!(w, "{} ", self.shrink_mutation_probability)?;
        write!(w, "{} ", self.add_best_to_new_population as u8)?;
        write!(w, "{} ", self.steady_state as u8)
    }

    pub fn load<R: BufRead>(r: &mut R) -> Result<Self, PersistError> {
        Self::load_from(&mut TokenReader::new(r))
    }

    fn load_from<R: BufRead>(r: &mut TokenReader<R>) -> Result<Self, PersistError> {
        r.expect_tag(Tag::Config)?;
        let population_size = r.parse()?;
        let number_of_generations = r.parse()?;
        let crossover_probability = r.parse()?;
        let creation_probability = r.parse()?;
        let creation_code: u8 = r.parse()?;
        let creation_type =
            CreationType::from_code(creation_code).ok_or(PersistError::BadCode {
                what: "creation type",
                code: creation_code,
            })?;
        let max_depth_for_creation = r.parse()?;
        let max_depth_for_crossover = r.parse()?;
        let selection_code: u8 = r.parse()?;
        let selection_type =
            SelectionType::from_code(selection_code).ok_or(PersistError::BadCode {
                what: "selection type",
                code: selection_code,
            })?;
        let tournament_size = r.parse()?;
        let demetic_grouping = r.parse::<u8>()? != 0;
        let deme_size = r.parse()?;
        let demetic_migration_probability = r.parse()?;
        let swap_mutation_probability = r.parse()?;
        let shrink_mutation_probability = r.parse()?;
        let add_best_to_new_population = r.parse::<u8>()? != 0;
        let steady_state = r.parse::<u8>()? != 0;
        Ok(GpConfig {
            population_size,
            number_of_generations,
            crossover_probability,
            creation_probability,
            creation_type,
            max_depth_for_creation,
            max_depth_for_crossover,
            selection_type,
            tournament_size,
            demetic_grouping,
            deme_size,
            demetic_migration_probability,
            swap_mutation_probability,
            shrink_mutation_probability,
            add_best_to_new_population,
            steady_state,
            seed: None,
        })
    }
}

impl Tree {
    /// Writes the node id (resolved through `set` when bound) and the
    /// child slots.
    pub fn save<W: Write>(&self, w: &mut W, set: &NodeSet) -> io::Result<()> {
        let id = match self.node {
            NodeRef::Bound(handle) => set.node(handle).id(),
            NodeRef::Raw(id) => id,
        };
        write!(w, "{} ", id)?;
        save_slots(w, Tag::Tree, Tag::Tree, &self.children, |w, child| {
            child.save(w, set)
        })
    }

    /// Loads a tree with raw node references. Call
    /// [`resolve`](Tree::resolve) before using it.
    pub fn load<R: BufRead>(r: &mut R) -> Result<Self, PersistError> {
        Self::load_from(&mut TokenReader::new(r))
    }

    fn load_from<R: BufRead>(r: &mut TokenReader<R>) -> Result<Self, PersistError> {
        let id: i32 = r.parse()?;
        let children = load_slots(r, Tag::Tree, Tag::Tree, Tree::load_from)?;
        Ok(Tree {
            node: NodeRef::Raw(id),
            children,
        })
    }
}

impl Individual {
    /// Writes the fitness cache and the tree slots. Each tree's ids are
    /// resolved through its role's node set.
    pub fn save<W: Write>(&self, w: &mut W, catalog: &Catalog) -> io::Result<()> {
        write!(w, "{} {} ", self.fitness_valid as u8, self.fitness)?;
        write!(w, "\n{} {} ", Tag::Individual as u8, self.trees.len())?;
        for (role, slot) in self.trees.iter().enumerate() {
            match slot {
                None => w.write_all(b"n")?,
                Some(tree) => {
                    write!(w, "y{} ", Tag::Tree as u8)?;
                    tree.save(w, catalog.role(role))?;
                }
            }
        }
        Ok(())
    }

    /// Loads an individual with raw node references and recomputed
    /// length and depth caches. Call [`resolve`](Individual::resolve)
    /// before using the trees.
    pub fn load<R: BufRead>(r: &mut R) -> Result<Self, PersistError> {
        Self::load_from(&mut TokenReader::new(r))
    }

    fn load_from<R: BufRead>(r: &mut TokenReader<R>) -> Result<Self, PersistError> {
        let fitness_valid = r.parse::<u8>()? != 0;
        let fitness: f64 = r.parse()?;
        let trees = load_slots(r, Tag::Individual, Tag::Tree, Tree::load_from)?;
        let mut individual = Individual {
            trees,
            fitness,
            fitness_valid,
            length: 0,
            depth: 0,
        };
        individual.calc_length();
        individual.calc_depth();
        Ok(individual)
    }
}

impl Population {
    /// Writes the configuration and the member slots.
    pub fn save<W: Write>(&self, w: &mut W, catalog: &Catalog) -> io::Result<()> {
        self.config.save(w)?;
        save_slots(
            w,
            Tag::Population,
            Tag::Individual,
            &self.individuals,
            |w, member| member.save(w, catalog),
        )
    }

    /// Loads a population and runs a statistics pass over it. Members
    /// carry raw node references; call
    /// [`resolve_nodes`](Population::resolve_nodes) before evolving.
    /// The persisted configuration always loads with `seed: None`.
    ///
    /// # Panics
    /// Panics during the statistics pass if a member slot is absent.
    pub fn load<R: BufRead>(r: &mut R) -> Result<Self, PersistError> {
        Self::load_from(&mut TokenReader::new(r))
    }

    fn load_from<R: BufRead>(r: &mut TokenReader<R>) -> Result<Self, PersistError> {
        let config = GpConfig::load_from(r)?;
        let individuals = load_slots(
            r,
            Tag::Population,
            Tag::Individual,
            Individual::load_from,
        )?;
        let mut population = Population::new(config);
        population.individuals = individuals;
        population.calculate_statistics();
        Ok(population)
    }
}

// ============================================================================
// Tests
// ============================================================================
