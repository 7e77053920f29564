use crate::dom::{Document, RangeKey};
use crate::error::{Error, Result};
use crate::position::Boundaries;

/// Storage for a range's boundary pair.
///
/// The range algorithms only ever read and write whole boundary pairs through
/// this trait, so they run unchanged over boundaries that the document keeps
/// current ([`Tracked`]) and over boundaries captured at one point in time
/// ([`Snapshot`]).
pub trait RangeBackend: Sized {
    /// Start storing `boundaries`.
    fn create(doc: &mut Document, boundaries: Boundaries) -> Self;

    /// Current boundaries. Fails with `InvalidState` once released.
    fn load(&self, doc: &Document) -> Result<Boundaries>;

    /// Replace the boundaries. Fails with `InvalidState` once released.
    fn store(&mut self, doc: &mut Document, boundaries: Boundaries) -> Result<()>;

    /// Stop storing; every later `load` or `store` fails.
    fn release(&mut self, doc: &mut Document);

    fn is_released(&self) -> bool;

    /// Revision counter for change detection, when the storage keeps one.
    fn revision(&self, _doc: &Document) -> Option<u64> {
        None
    }
}

fn released() -> Error {
    Error::invalid_state("range has been detached")
}

/// Boundaries held in the document's live range registry and rewritten by
/// every mutation of the tree.
#[derive(Debug, PartialEq, Eq)]
pub struct Tracked {
    key: Option<RangeKey>,
}

impl RangeBackend for Tracked {
    fn create(doc: &mut Document, boundaries: Boundaries) -> Self {
        Self {
            key: Some(doc.track(boundaries)),
        }
    }

    fn load(&self, doc: &Document) -> Result<Boundaries> {
        self.key.and_then(|k| doc.tracked(k)).ok_or_else(released)
    }

    fn store(&mut self, doc: &mut Document, boundaries: Boundaries) -> Result<()> {
        match self.key {
            Some(key) if doc.set_tracked(key, boundaries) => Ok(()),
            _ => Err(released()),
        }
    }

    fn release(&mut self, doc: &mut Document) {
        if let Some(key) = self.key.take() {
            doc.untrack(key);
        }
    }

    fn is_released(&self) -> bool {
        self.key.is_none()
    }

    fn revision(&self, doc: &Document) -> Option<u64> {
        self.key.and_then(|k| doc.tracked_revision(k))
    }
}

/// Boundaries captured by value. Mutations of the tree do not rewrite them,
/// so they go stale (and fail validation) when the tree changes underneath.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    boundaries: Option<Boundaries>,
}

impl RangeBackend for Snapshot {
    fn create(_doc: &mut Document, boundaries: Boundaries) -> Self {
        Self {
            boundaries: Some(boundaries),
        }
    }

    fn load(&self, _doc: &Document) -> Result<Boundaries> {
        self.boundaries.ok_or_else(released)
    }

    fn store(&mut self, _doc: &mut Document, boundaries: Boundaries) -> Result<()> {
        match &mut self.boundaries {
            Some(current) => {
                *current = boundaries;
                Ok(())
            }
            None => Err(released()),
        }
    }

    fn release(&mut self, _doc: &mut Document) {
        self.boundaries = None;
    }

    fn is_released(&self) -> bool {
        self.boundaries.is_none()
    }
}

impl Snapshot {
    /// Capture boundaries without touching the document.
    pub fn capture(boundaries: Boundaries) -> Self {
        Self {
            boundaries: Some(boundaries),
        }
    }
}
