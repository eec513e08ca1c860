//! # Entity Registry
//!
//! A dense arena mapping integer handles to live backend entities. Handles
//! are positions in a contiguous `Vec`: adding appends (handle = previous
//! length) and removing erases and shifts, so every handle above a removed
//! one drops by one. Callers must not hold handles across a removal of a
//! lower-indexed entity of the same kind.

use std::ops::{Index, IndexMut};
use std::sync::Arc;

/// An entity that was built from a shared description.
pub trait Described {
    type Description;

    fn description(&self) -> &Arc<Self::Description>;
}

/// Contiguous storage for one kind of entity.
#[derive(Debug, Clone)]
pub struct Registry<E> {
    entries: Vec<E>,
}

impl<E> Registry<E> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Append an entity and return its handle.
    pub fn push(&mut self, entry: E) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    /// Remove the entity at `index`, shifting later handles down by one.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of range.
    pub fn remove(&mut self, index: usize) -> E {
        self.entries.remove(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut E> {
        self.entries.iter_mut()
    }
}

impl<E: Described> Registry<E> {
    /// Handle of the entity built from exactly this description instance.
    ///
    /// Lookup is by identity: an equal but distinct description is not found.
    pub fn find(&self, description: &E::Description) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| std::ptr::eq(Arc::as_ptr(entry.description()), description))
    }
}

impl<E> Default for Registry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Index<usize> for Registry<E> {
    type Output = E;

    fn index(&self, index: usize) -> &E {
        &self.entries[index]
    }
}

impl<E> IndexMut<usize> for Registry<E> {
    fn index_mut(&mut self, index: usize) -> &mut E {
        &mut self.entries[index]
    }
}
