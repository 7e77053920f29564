use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::dom::Document;
use crate::position::{Boundaries, Position, compare};

/// What a selection backend can do, decided when the backend is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BackendCapabilities {
    /// Holds more than one range at a time.
    pub multi_range: bool,
    /// Accepts and reports ranges directly. Without it the selection is
    /// driven through `collapse`/`extend` and read back from anchor and focus.
    pub native_range: bool,
    /// Supports `extend`, and with it backwards selections.
    pub extend: bool,
}

impl BackendCapabilities {
    pub const FULL: Self = Self {
        multi_range: true,
        native_range: true,
        extend: true,
    };

    pub const SINGLE_RANGE: Self = Self {
        multi_range: false,
        native_range: true,
        extend: true,
    };

    /// Anchor and focus only.
    pub const CARET: Self = Self {
        multi_range: false,
        native_range: false,
        extend: true,
    };
}

impl Default for BackendCapabilities {
    fn default() -> Self {
        Self::FULL
    }
}

/// The host's native selection, as seen by a
/// [`SelectionSet`](super::SelectionSet).
///
/// Backends hold plain boundaries; the selection set re-applies its own
/// ranges whenever document mutations move them. `revision` should change
/// whenever the backend's selection changes, whoever changed it. A backend
/// that misses a bump is still caught: the selection set also compares what
/// the backend reports with what it held at the last sync.
pub trait SelectionBackend {
    fn capabilities(&self) -> BackendCapabilities;

    fn revision(&self) -> u64;

    fn range_count(&self) -> usize;

    fn range_at(&self, index: usize) -> Option<Boundaries>;

    fn add_range(&mut self, boundaries: Boundaries);

    fn remove_all_ranges(&mut self);

    /// Anchor and focus of the most recent range.
    fn anchor_focus(&self) -> Option<(Position, Position)>;

    /// Replace the selection with a caret at `at`.
    fn collapse(&mut self, at: Position);

    /// Move the focus of the most recent range to `to`, keeping its anchor.
    fn extend(&mut self, doc: &Document, to: Position);
}

/// In-memory backend for hosts without a native selection, and for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    capabilities: BackendCapabilities,
    ranges: Vec<Boundaries>,
    /// Direction of the most recent range.
    backwards: bool,
    revision: u64,
}

impl MemoryBackend {
    pub fn new(capabilities: BackendCapabilities) -> Self {
        Self {
            capabilities,
            ..Self::default()
        }
    }

    pub fn ranges(&self) -> &[Boundaries] {
        &self.ranges
    }

    fn changed(&mut self) {
        self.revision += 1;
    }
}

impl SelectionBackend for MemoryBackend {
    fn capabilities(&self) -> BackendCapabilities {
        self.capabilities
    }

    fn revision(&self) -> u64 {
        self.revision
    }

    fn range_count(&self) -> usize {
        self.ranges.len()
    }

    fn range_at(&self, index: usize) -> Option<Boundaries> {
        self.ranges.get(index).copied()
    }

    fn add_range(&mut self, boundaries: Boundaries) {
        if !self.capabilities.multi_range && !self.ranges.is_empty() {
            log::debug!("single-range backend ignored an additional range");
            return;
        }
        self.ranges.push(boundaries);
        self.backwards = false;
        self.changed();
    }

    fn remove_all_ranges(&mut self) {
        if self.ranges.is_empty() {
            return;
        }
        self.ranges.clear();
        self.backwards = false;
        self.changed();
    }

    fn anchor_focus(&self) -> Option<(Position, Position)> {
        let last = self.ranges.last()?;
        Some(if self.backwards {
            (last.end, last.start)
        } else {
            (last.start, last.end)
        })
    }

    fn collapse(&mut self, at: Position) {
        self.ranges = vec![Boundaries::collapsed_at(at)];
        self.backwards = false;
        self.changed();
    }

    fn extend(&mut self, doc: &Document, to: Position) {
        if !self.capabilities.extend {
            log::debug!("backend cannot extend; ignoring");
            return;
        }
        let anchor = self.anchor_focus().map_or(to, |(anchor, _)| anchor);
        let (boundaries, backwards) = match compare(doc, anchor, to) {
            Ok(Ordering::Greater) => (Boundaries::new(to, anchor), true),
            Ok(_) => (Boundaries::new(anchor, to), false),
            Err(_) => (Boundaries::collapsed_at(to), false),
        };
        match self.ranges.last_mut() {
            Some(last) => *last = boundaries,
            None => self.ranges.push(boundaries),
        }
        self.backwards = backwards;
        self.changed();
    }
}
