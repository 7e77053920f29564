//! # Selections
//!
//! A [`SelectionSet`] keeps an ordered list of live ranges in step with a
//! host selection behind a [`SelectionBackend`].
//!
//! Two things can move a selection between calls. The host can change its
//! selection (the backend's revision moves, or it reports ranges other than
//! the ones it held at the last sync), in which case the backend wins and
//! the cached ranges are rebuilt from it. Or the document can be mutated,
//! moving the cached live ranges (their registry revisions move), in which
//! case the new boundaries are pushed to the backend. Every public operation
//! starts by reconciling both.

mod backend;

use std::cmp::Ordering;

use treerange_config::SelectionConfig;
use uuid::Uuid;

use crate::dom::{Document, NodeId};
use crate::error::{Error, Result};
use crate::position::{Boundaries, Position, compare};
use crate::range::{LiveRange, Range, RangeBackend, StaticRange, boundary_point};

pub use backend::{BackendCapabilities, MemoryBackend, SelectionBackend};

#[derive(Debug)]
pub struct SelectionSet<S: SelectionBackend = MemoryBackend> {
    backend: S,
    doc_id: Uuid,
    ranges: Vec<LiveRange>,
    /// Registry revision of each range when it was last pushed to the backend.
    synced: Vec<Option<u64>>,
    backend_revision: u64,
    /// What the backend held at the last sync.
    backend_seen: BackendView,
    backwards: bool,
    options: SelectionConfig,
    detached: bool,
}

/// The backend's ranges plus its anchor and focus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct BackendView {
    ranges: Vec<Boundaries>,
    anchor_focus: Option<(Position, Position)>,
}

impl BackendView {
    fn read(backend: &impl SelectionBackend) -> Self {
        Self {
            ranges: (0..backend.range_count())
                .filter_map(|i| backend.range_at(i))
                .collect(),
            anchor_focus: backend.anchor_focus(),
        }
    }
}

impl<S: SelectionBackend> SelectionSet<S> {
    /// A selection over `doc` that starts out mirroring whatever `backend`
    /// already holds.
    pub fn new(doc: &mut Document, backend: S, options: &SelectionConfig) -> Self {
        let mut selection = Self {
            backend,
            doc_id: doc.id(),
            ranges: Vec::new(),
            synced: Vec::new(),
            backend_revision: 0,
            backend_seen: BackendView::default(),
            backwards: false,
            options: *options,
            detached: false,
        };
        selection.rebuild(doc);
        selection
    }

    pub fn backend(&self) -> &S {
        &self.backend
    }

    /// Direct access to the backend, for hosts that change their selection
    /// outside this set. The change is picked up by the next operation.
    pub fn backend_mut(&mut self) -> &mut S {
        &mut self.backend
    }

    pub fn capabilities(&self) -> BackendCapabilities {
        self.backend.capabilities()
    }

    // ===== Reading =====

    pub fn range_count(&mut self, doc: &mut Document) -> Result<usize> {
        self.sync(doc)?;
        Ok(self.ranges.len())
    }

    /// Independent copies of every range, in selection order.
    pub fn get_all_ranges<C: RangeBackend>(&mut self, doc: &mut Document) -> Result<Vec<Range<C>>> {
        self.sync(doc)?;
        self.ranges.iter().map(|r| r.clone_as(doc)).collect()
    }

    pub fn get_range_at<C: RangeBackend>(&mut self, doc: &mut Document, index: usize) -> Result<Range<C>> {
        self.sync(doc)?;
        let range = self.ranges.get(index).ok_or(Error::IndexSize {
            offset: index,
            length: self.ranges.len(),
        })?;
        range.clone_as(doc)
    }

    /// True when there are no ranges or every range is collapsed.
    pub fn is_collapsed(&mut self, doc: &mut Document) -> Result<bool> {
        self.sync(doc)?;
        self.all_collapsed(doc)
    }

    /// True when the most recent range was made from its end towards its start.
    pub fn is_backwards(&mut self, doc: &mut Document) -> Result<bool> {
        self.sync(doc)?;
        Ok(self.backwards && !self.all_collapsed(doc)?)
    }

    pub fn anchor(&mut self, doc: &mut Document) -> Result<Option<Position>> {
        self.sync(doc)?;
        Ok(self.anchor_focus(doc)?.map(|(anchor, _)| anchor))
    }

    pub fn focus(&mut self, doc: &mut Document) -> Result<Option<Position>> {
        self.sync(doc)?;
        Ok(self.anchor_focus(doc)?.map(|(_, focus)| focus))
    }

    pub fn contains_node(&mut self, doc: &mut Document, node: NodeId, partial: bool) -> Result<bool> {
        self.sync(doc)?;
        doc.check(node)?;
        for range in &self.ranges {
            if range.contains_node(doc, node, partial)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// The text of every range, concatenated in selection order.
    pub fn to_text(&mut self, doc: &mut Document) -> Result<String> {
        self.sync(doc)?;
        let mut text = String::new();
        for range in &self.ranges {
            text.push_str(&range.to_text(doc)?);
        }
        Ok(text)
    }

    // ===== Changing the ranges =====

    pub fn add_range<B: RangeBackend>(
        &mut self,
        doc: &mut Document,
        range: &Range<B>,
        backwards: bool,
    ) -> Result<()> {
        self.sync(doc)?;
        let boundaries = range.boundaries(doc)?;
        self.add_boundaries(doc, boundaries, backwards)
    }

    /// Remove the first range equal to `range`. Returns false when none matched.
    pub fn remove_range<B: RangeBackend>(&mut self, doc: &mut Document, range: &Range<B>) -> Result<bool> {
        self.sync(doc)?;
        let target = range.boundaries(doc)?;
        let Some(index) = self
            .ranges
            .iter()
            .position(|r| r.boundaries(doc).is_ok_and(|b| b == target))
        else {
            return Ok(false);
        };

        let remaining: Vec<Boundaries> = self
            .ranges
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != index)
            .filter_map(|(_, r)| r.boundaries(doc).ok())
            .collect();
        self.clear(doc);
        for boundaries in remaining {
            self.add_boundaries(doc, boundaries, false)?;
        }
        Ok(true)
    }

    pub fn remove_all_ranges(&mut self, doc: &mut Document) -> Result<()> {
        self.sync(doc)?;
        self.clear(doc);
        Ok(())
    }

    /// Replace the selection with `ranges`. A single-range backend keeps the
    /// last one.
    pub fn set_ranges<B: RangeBackend>(&mut self, doc: &mut Document, ranges: &[Range<B>]) -> Result<()> {
        self.sync(doc)?;
        let all = ranges
            .iter()
            .map(|r| r.boundaries(doc))
            .collect::<Result<Vec<_>>>()?;
        self.clear(doc);
        for boundaries in all {
            self.add_boundaries(doc, boundaries, false)?;
        }
        Ok(())
    }

    pub fn set_single_range<B: RangeBackend>(
        &mut self,
        doc: &mut Document,
        range: &Range<B>,
        backwards: bool,
    ) -> Result<()> {
        self.sync(doc)?;
        let boundaries = range.boundaries(doc)?;
        self.clear(doc);
        self.add_boundaries(doc, boundaries, backwards)
    }

    /// Replace the selection with a caret at `(node, offset)`.
    pub fn collapse(&mut self, doc: &mut Document, node: NodeId, offset: usize) -> Result<()> {
        self.sync(doc)?;
        let point = boundary_point(doc, node, offset)?;
        self.clear(doc);
        self.add_boundaries(doc, Boundaries::collapsed_at(point), false)
    }

    pub fn collapse_to_start(&mut self, doc: &mut Document) -> Result<()> {
        self.sync(doc)?;
        let first = self
            .ranges
            .first()
            .ok_or_else(|| Error::invalid_state("selection has no ranges"))?;
        let start = first.start(doc)?;
        self.collapse(doc, start.node, start.offset)
    }

    pub fn collapse_to_end(&mut self, doc: &mut Document) -> Result<()> {
        self.sync(doc)?;
        let last = self
            .ranges
            .last()
            .ok_or_else(|| Error::invalid_state("selection has no ranges"))?;
        let end = last.end(doc)?;
        self.collapse(doc, end.node, end.offset)
    }

    /// Select the contents of `node` as the only range.
    pub fn select_all_children(&mut self, doc: &mut Document, node: NodeId) -> Result<()> {
        self.sync(doc)?;
        let range = StaticRange::of_contents(doc, node)?;
        self.set_single_range(doc, &range, false)
    }

    /// Delete the contents of every range, leaving a caret where the last
    /// one was.
    pub fn delete_from_document(&mut self, doc: &mut Document) -> Result<()> {
        self.sync(doc)?;
        if self.ranges.is_empty() {
            return Ok(());
        }
        let mut copies = self
            .ranges
            .iter()
            .map(|r| r.clone_range(doc))
            .collect::<Result<Vec<LiveRange>>>()?;
        self.clear(doc);

        let mut result = copies
            .iter_mut()
            .try_for_each(|copy| copy.delete_contents(doc));
        if result.is_ok()
            && let Some(last) = copies.last()
        {
            result = last
                .boundaries(doc)
                .and_then(|caret| self.add_boundaries(doc, caret, false));
        }
        for copy in &mut copies {
            copy.detach(doc);
        }
        result
    }

    /// Re-read the backend unconditionally. Returns whether the ranges changed.
    pub fn refresh(&mut self, doc: &mut Document) -> Result<bool> {
        self.ensure_usable(doc)?;
        let before = self.current_boundaries(doc);
        let backwards = self.backwards;
        self.rebuild(doc);
        Ok(before != self.current_boundaries(doc) || backwards != self.backwards)
    }

    /// Release every range. Later operations fail with `InvalidState`.
    pub fn detach(&mut self, doc: &mut Document) {
        if self.doc_id == doc.id() {
            self.release_ranges(doc);
        }
        self.detached = true;
    }

    // ===== Synchronization =====

    fn ensure_usable(&self, doc: &Document) -> Result<()> {
        if self.detached {
            return Err(Error::invalid_state("selection has been detached"));
        }
        if self.doc_id != doc.id() {
            return Err(Error::WrongDocument);
        }
        Ok(())
    }

    fn sync(&mut self, doc: &mut Document) -> Result<()> {
        self.ensure_usable(doc)?;
        if self.backend.revision() != self.backend_revision
            || BackendView::read(&self.backend) != self.backend_seen
        {
            log::debug!("selection changed outside the set; rebuilding from backend");
            self.rebuild(doc);
            return Ok(());
        }
        let moved = self
            .ranges
            .iter()
            .zip(&self.synced)
            .any(|(range, synced)| range.revision(doc) != *synced);
        if moved {
            log::debug!("document mutations moved the selection; updating backend");
            self.push_to_backend(doc);
        }
        Ok(())
    }

    /// Make the backend authoritative: replace the cache with its ranges.
    fn rebuild(&mut self, doc: &mut Document) {
        self.release_ranges(doc);
        let caps = self.backend.capabilities();
        let mut found = Vec::new();
        if caps.native_range {
            found.extend((0..self.backend.range_count()).filter_map(|i| self.backend.range_at(i)));
        } else if let Some((anchor, focus)) = self.backend.anchor_focus() {
            found.push(ordered(doc, anchor, focus).0);
        }

        for boundaries in found {
            match LiveRange::from_boundaries(doc, boundaries) {
                Ok(range) => self.ranges.push(range),
                Err(e) => log::warn!("skipping backend range that is not valid in the document: {e}"),
            }
        }
        self.backwards = !self.ranges.is_empty()
            && self
                .backend
                .anchor_focus()
                .is_some_and(|(anchor, focus)| ordered(doc, anchor, focus).1);
        self.mark_synced(doc);
    }

    /// Write the cached ranges back to the backend after they moved.
    fn push_to_backend(&mut self, doc: &mut Document) {
        let all = self.current_boundaries(doc);
        let caps = self.backend.capabilities();
        self.backend.remove_all_ranges();
        let mut backwards = false;
        if caps.native_range {
            let last = all.len().saturating_sub(1);
            for (i, boundaries) in all.into_iter().enumerate() {
                backwards = self.apply(doc, boundaries, i == last && self.backwards);
            }
        } else if let Some(&boundaries) = all.last() {
            backwards = self.apply(doc, boundaries, self.backwards);
        }
        self.backwards = backwards;
        self.mark_synced(doc);
    }

    fn add_boundaries(&mut self, doc: &mut Document, boundaries: Boundaries, backwards: bool) -> Result<()> {
        let caps = self.backend.capabilities();
        let previous = self.backend.range_count();
        let applied_backwards = self.apply(doc, boundaries, backwards);
        if applied_backwards || !caps.native_range {
            self.rebuild(doc);
            return Ok(());
        }

        let expected = if caps.multi_range { previous + 1 } else { 1 };
        let count = self.backend.range_count();
        if count != expected {
            log::debug!("backend holds {count} ranges after add, expected {expected}; rebuilding");
            self.rebuild(doc);
            return Ok(());
        }

        let mut stored = boundaries;
        if self.options.check_selection_ranges
            && let Some(actual) = self.backend.range_at(count - 1)
            && actual != boundaries
        {
            log::debug!("backend adjusted the added range; keeping its version");
            stored = actual;
        }
        if !caps.multi_range {
            self.release_ranges(doc);
        }
        match LiveRange::from_boundaries(doc, stored) {
            Ok(range) => self.ranges.push(range),
            Err(e) => {
                log::warn!("backend range is not valid in the document: {e}");
                self.rebuild(doc);
                return Ok(());
            }
        }
        self.backwards = false;
        self.mark_synced(doc);
        Ok(())
    }

    /// Hand `boundaries` to the backend. Returns true when the range went in
    /// backwards.
    fn apply(&mut self, doc: &Document, boundaries: Boundaries, backwards: bool) -> bool {
        let caps = self.backend.capabilities();
        if backwards && caps.extend && self.options.prefer_backwards_extend {
            if caps.native_range {
                if !caps.multi_range {
                    self.backend.remove_all_ranges();
                }
                self.backend.add_range(Boundaries::collapsed_at(boundaries.end));
            } else {
                self.backend.collapse(boundaries.end);
            }
            self.backend.extend(doc, boundaries.start);
            return true;
        }
        if !caps.native_range {
            self.backend.collapse(boundaries.start);
            if !boundaries.is_collapsed() && caps.extend {
                self.backend.extend(doc, boundaries.end);
            }
        } else {
            if !caps.multi_range {
                self.backend.remove_all_ranges();
            }
            self.backend.add_range(boundaries);
        }
        false
    }

    fn clear(&mut self, doc: &mut Document) {
        self.release_ranges(doc);
        self.backend.remove_all_ranges();
        self.backwards = false;
        self.mark_synced(doc);
    }

    fn release_ranges(&mut self, doc: &mut Document) {
        for mut range in std::mem::take(&mut self.ranges) {
            range.detach(doc);
        }
        self.synced.clear();
    }

    fn mark_synced(&mut self, doc: &Document) {
        self.synced = self.ranges.iter().map(|r| r.revision(doc)).collect();
        self.backend_revision = self.backend.revision();
        self.backend_seen = BackendView::read(&self.backend);
    }

    fn current_boundaries(&self, doc: &Document) -> Vec<Boundaries> {
        self.ranges
            .iter()
            .filter_map(|r| r.boundaries(doc).ok())
            .collect()
    }

    fn all_collapsed(&self, doc: &Document) -> Result<bool> {
        for range in &self.ranges {
            if !range.collapsed(doc)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn anchor_focus(&self, doc: &Document) -> Result<Option<(Position, Position)>> {
        let Some(last) = self.ranges.last() else {
            return Ok(None);
        };
        let b = last.boundaries(doc)?;
        Ok(Some(if self.backwards {
            (b.end, b.start)
        } else {
            (b.start, b.end)
        }))
    }
}

/// Order an anchor/focus pair. The flag is true when the focus comes first.
fn ordered(doc: &Document, anchor: Position, focus: Position) -> (Boundaries, bool) {
    match compare(doc, anchor, focus) {
        Ok(Ordering::Greater) => (Boundaries::new(focus, anchor), true),
        Ok(_) => (Boundaries::new(anchor, focus), false),
        Err(e) => {
            log::debug!("anchor and focus cannot be ordered ({e}); using the focus");
            (Boundaries::collapsed_at(focus), false)
        }
    }
}
