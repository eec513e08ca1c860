//! # State Snapshots
//!
//! [`SnapshotSlot`] holds at most one captured world state. Saving replaces
//! whatever was held; a capture that fails is logged and leaves the slot
//! empty, so a later restore does nothing. Backends decide what a snapshot
//! contains.

use std::fmt;

/// Why a world state could not be captured.
#[derive(Debug)]
pub enum SnapshotError {
    /// The live world could not be serialized.
    Encode(String),
    /// The serialized buffer could not be parsed back.
    Decode(String),
}

impl fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode(msg) => write!(f, "failed to encode world state: {msg}"),
            Self::Decode(msg) => write!(f, "failed to decode world state: {msg}"),
        }
    }
}

impl std::error::Error for SnapshotError {}

/// Single-entry holder for a backend snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotSlot<S> {
    held: Option<S>,
}

impl<S> SnapshotSlot<S> {
    pub fn new() -> Self {
        Self { held: None }
    }

    /// Store the result of a capture, discarding any previous snapshot.
    ///
    /// A failed capture is absorbed: it is logged and the slot ends up empty.
    pub fn store(&mut self, capture: Result<S, SnapshotError>) {
        self.held = match capture {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                log::warn!("snapshot discarded: {err}");
                None
            }
        };
    }

    pub fn get(&self) -> Option<&S> {
        self.held.as_ref()
    }

    pub fn is_held(&self) -> bool {
        self.held.is_some()
    }
}

impl<S> Default for SnapshotSlot<S> {
    fn default() -> Self {
        Self::new()
    }
}
