//! Fixed-capacity ownership container.
//!
//! Every aggregate in the engine (children of a tree node, trees of an
//! individual, members of a population, node sets of a catalog) is a
//! [`Slots`]: a numbered sequence of slots, each either empty or owning one
//! value. Capacity is fixed once by [`Slots::reserve`]; values then move in
//! and out of slots without the container reallocating, so indices stay
//! stable across swaps and replacements.

/// A sequence of numbered slots, each empty or owning one `T`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Slots<T> {
    slots: Vec<Option<T>>,
}

impl<T> Slots<T> {
    /// Creates an empty, unsized container. Call [`reserve`](Self::reserve)
    /// before putting anything in.
    pub fn new() -> Self {
        Slots { slots: Vec::new() }
    }

    /// Creates a container with `n` empty slots.
    pub fn with_capacity(n: usize) -> Self {
        let mut slots = Slots::new();
        slots.reserve(n);
        slots
    }

    /// Sizes the container to `n` empty slots.
    ///
    /// # Panics
    /// Panics if the container has already been sized.
    pub fn reserve(&mut self, n: usize) {
        assert!(self.slots.is_empty(), "container already sized");
        self.slots.resize_with(n, || None);
    }

    /// Number of slots, empty or not.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True if the container has no slots at all.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn check(&self, n: usize) {
        assert!(
            n < self.slots.len(),
            "slot index {} out of range (len {})",
            n,
            self.slots.len()
        );
    }

    /// Borrows the value in slot `n`, if any.
    pub fn get(&self, n: usize) -> Option<&T> {
        self.check(n);
        self.slots[n].as_ref()
    }

    /// Mutably borrows the value in slot `n`, if any.
    pub fn get_mut(&mut self, n: usize) -> Option<&mut T> {
        self.check(n);
        self.slots[n].as_mut()
    }

    /// Mutably borrows slot `n` itself.
    pub fn slot_mut(&mut self, n: usize) -> &mut Option<T> {
        self.check(n);
        &mut self.slots[n]
    }

    /// Puts `value` into slot `n`, dropping any previous occupant.
    pub fn put(&mut self, n: usize, value: T) {
        self.check(n);
        self.slots[n] = Some(value);
    }

    /// Moves the value out of slot `n`, leaving the slot empty.
    pub fn take(&mut self, n: usize) -> Option<T> {
        self.check(n);
        self.slots[n].take()
    }

    /// Exchanges the contents of slots `a` and `b`.
    pub fn swap(&mut self, a: usize, b: usize) {
        self.check(a);
        self.check(b);
        self.slots.swap(a, b);
    }

    /// Iterates over all slots in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Option<T>> {
        self.slots.iter()
    }

    /// Iterates mutably over all slots in order.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Option<T>> {
        self.slots.iter_mut()
    }
}

// ============================================================================
// Tests
// ============================================================================
