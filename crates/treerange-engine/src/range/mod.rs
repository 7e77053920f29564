//! # Ranges
//!
//! A [`Range`] is a pair of boundary points over one tree. The boundary pair
//! itself lives in a [`RangeBackend`]: [`LiveRange`] keeps it in the
//! document's live registry so every mutation rewrites it, [`StaticRange`]
//! keeps a plain copy that goes stale when the tree changes.
//!
//! Ranges do not borrow their document. Every operation takes the document
//! explicitly and starts by re-validating the stored boundaries; a detached
//! or invalid range fails with [`Error::InvalidState`], a document other
//! than the one the range was created for fails with [`Error::WrongDocument`].
//!
//! Setting one boundary past the other is not an error: the opposite
//! boundary collapses onto the new one, as it does when the new boundary
//! lies in a different tree.

mod algebra;
mod backend;
mod normalize;

use std::cmp::Ordering;

use uuid::Uuid;

use crate::dom::{Document, NodeId, NodeKind, RangeKey};
use crate::error::{Error, Result};
use crate::position::{Boundaries, Position, compare};

pub use backend::{RangeBackend, Snapshot, Tracked};

/// A range whose boundaries follow tree mutations.
pub type LiveRange = Range<Tracked>;

/// A range whose boundaries are captured by value.
pub type StaticRange = Range<Snapshot>;

/// Which boundary pair [`Range::compare_boundary_points`] compares.
///
/// Names follow the DOM: `StartToEnd` compares this range's end with the
/// other range's start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum How {
    StartToStart,
    StartToEnd,
    EndToEnd,
    EndToStart,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range<B: RangeBackend = Tracked> {
    doc_id: Uuid,
    backend: B,
}

impl<B: RangeBackend> Range<B> {
    /// A range collapsed at the start of the document node.
    pub fn new(doc: &mut Document) -> Self {
        let start = Position::new(doc.root(), 0);
        Self::from_parts(doc, Boundaries::collapsed_at(start))
    }

    /// A range over already ordered boundaries.
    pub fn from_boundaries(doc: &mut Document, boundaries: Boundaries) -> Result<Self> {
        boundaries.validate(doc)?;
        Ok(Self::from_parts(doc, boundaries))
    }

    /// A range covering the contents of `node`.
    pub fn of_contents(doc: &mut Document, node: NodeId) -> Result<Self> {
        let boundaries = contents_of(doc, node)?;
        Ok(Self::from_parts(doc, boundaries))
    }

    pub(crate) fn from_parts(doc: &mut Document, boundaries: Boundaries) -> Self {
        Self {
            doc_id: doc.id(),
            backend: B::create(doc, boundaries),
        }
    }

    pub fn document_id(&self) -> Uuid {
        self.doc_id
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Revision of the stored boundaries, for backends that keep one.
    pub fn revision(&self, doc: &Document) -> Option<u64> {
        self.backend.revision(doc)
    }

    // ===== Boundary state =====

    /// The current boundaries after checking that the range is usable.
    pub fn boundaries(&self, doc: &Document) -> Result<Boundaries> {
        if self.backend.is_released() {
            return Err(Error::invalid_state("range has been detached"));
        }
        if self.doc_id != doc.id() {
            return Err(Error::WrongDocument);
        }
        let boundaries = self.backend.load(doc)?;
        if let Err(e) = boundaries.validate(doc) {
            log::debug!("range validation failed: {e}");
            return Err(e);
        }
        Ok(boundaries)
    }

    pub fn start(&self, doc: &Document) -> Result<Position> {
        Ok(self.boundaries(doc)?.start)
    }

    pub fn end(&self, doc: &Document) -> Result<Position> {
        Ok(self.boundaries(doc)?.end)
    }

    pub fn start_container(&self, doc: &Document) -> Result<NodeId> {
        Ok(self.start(doc)?.node)
    }

    pub fn start_offset(&self, doc: &Document) -> Result<usize> {
        Ok(self.start(doc)?.offset)
    }

    pub fn end_container(&self, doc: &Document) -> Result<NodeId> {
        Ok(self.end(doc)?.node)
    }

    pub fn end_offset(&self, doc: &Document) -> Result<usize> {
        Ok(self.end(doc)?.offset)
    }

    pub fn collapsed(&self, doc: &Document) -> Result<bool> {
        Ok(self.boundaries(doc)?.is_collapsed())
    }

    /// Deepest node containing both boundaries.
    pub fn common_ancestor(&self, doc: &Document) -> Result<NodeId> {
        self.boundaries(doc)?
            .common_ancestor(doc)
            .ok_or(Error::WrongDocument)
    }

    pub fn is_valid(&self, doc: &Document) -> bool {
        self.boundaries(doc).is_ok()
    }

    pub fn is_detached(&self) -> bool {
        self.backend.is_released()
    }

    /// Release the boundaries. Every later operation fails with `InvalidState`.
    ///
    /// Live ranges hold an entry in the document's registry until detached.
    pub fn detach(&mut self, doc: &mut Document) {
        if self.doc_id == doc.id() {
            self.backend.release(doc);
        }
    }

    pub(crate) fn update(&mut self, doc: &mut Document, boundaries: Boundaries) -> Result<()> {
        log::trace!(
            "range boundaries -> {:?}:{} .. {:?}:{}",
            boundaries.start.node,
            boundaries.start.offset,
            boundaries.end.node,
            boundaries.end.offset
        );
        self.backend.store(doc, boundaries)
    }

    /// Run `f` with the boundaries in the live registry, then store whatever
    /// the mutations made of them.
    pub(crate) fn with_tracked<R>(
        &mut self,
        doc: &mut Document,
        f: impl FnOnce(&mut Document, RangeKey) -> Result<R>,
    ) -> Result<R> {
        let boundaries = self.boundaries(doc)?;
        let key = doc.track(boundaries);
        let result = f(doc, key);
        let after = doc
            .untrack(key)
            .ok_or_else(|| Error::invalid_state("tracked boundaries disappeared"))?;
        self.update(doc, after)?;
        result
    }

    // ===== Setting boundaries =====

    pub fn set_start(&mut self, doc: &mut Document, node: NodeId, offset: usize) -> Result<()> {
        let current = self.boundaries(doc)?;
        let start = boundary_point(doc, node, offset)?;
        let end = if doc.root_of(node) != doc.root_of(current.end.node)
            || compare(doc, start, current.end)? == Ordering::Greater
        {
            start
        } else {
            current.end
        };
        self.update(doc, Boundaries::new(start, end))
    }

    pub fn set_end(&mut self, doc: &mut Document, node: NodeId, offset: usize) -> Result<()> {
        let current = self.boundaries(doc)?;
        let end = boundary_point(doc, node, offset)?;
        let start = if doc.root_of(node) != doc.root_of(current.start.node)
            || compare(doc, end, current.start)? == Ordering::Less
        {
            end
        } else {
            current.start
        };
        self.update(doc, Boundaries::new(start, end))
    }

    pub fn set_start_before(&mut self, doc: &mut Document, node: NodeId) -> Result<()> {
        let pos = Position::before(doc, node)?;
        self.set_start(doc, pos.node, pos.offset)
    }

    pub fn set_start_after(&mut self, doc: &mut Document, node: NodeId) -> Result<()> {
        let pos = Position::after(doc, node)?;
        self.set_start(doc, pos.node, pos.offset)
    }

    pub fn set_end_before(&mut self, doc: &mut Document, node: NodeId) -> Result<()> {
        let pos = Position::before(doc, node)?;
        self.set_end(doc, pos.node, pos.offset)
    }

    pub fn set_end_after(&mut self, doc: &mut Document, node: NodeId) -> Result<()> {
        let pos = Position::after(doc, node)?;
        self.set_end(doc, pos.node, pos.offset)
    }

    /// Set both boundaries at once. An end preceding the start, or lying in
    /// another tree, collapses the range at the end.
    pub fn set_start_and_end(
        &mut self,
        doc: &mut Document,
        start: Position,
        end: Position,
    ) -> Result<()> {
        self.boundaries(doc)?;
        let start = boundary_point(doc, start.node, start.offset)?;
        let end = boundary_point(doc, end.node, end.offset)?;
        let boundaries = if doc.root_of(start.node) != doc.root_of(end.node)
            || compare(doc, start, end)? == Ordering::Greater
        {
            Boundaries::collapsed_at(end)
        } else {
            Boundaries::new(start, end)
        };
        self.update(doc, boundaries)
    }

    pub fn select_node(&mut self, doc: &mut Document, node: NodeId) -> Result<()> {
        self.boundaries(doc)?;
        let start = Position::before(doc, node)?;
        let end = Position::after(doc, node)?;
        ensure_attached(doc, start.node)?;
        self.update(doc, Boundaries::new(start, end))
    }

    pub fn select_node_contents(&mut self, doc: &mut Document, node: NodeId) -> Result<()> {
        self.boundaries(doc)?;
        let boundaries = contents_of(doc, node)?;
        self.update(doc, boundaries)
    }

    pub fn collapse(&mut self, doc: &mut Document, to_start: bool) -> Result<()> {
        let current = self.boundaries(doc)?;
        let point = if to_start { current.start } else { current.end };
        self.update(doc, Boundaries::collapsed_at(point))
    }

    pub fn collapse_to_point(&mut self, doc: &mut Document, node: NodeId, offset: usize) -> Result<()> {
        self.boundaries(doc)?;
        let point = boundary_point(doc, node, offset)?;
        self.update(doc, Boundaries::collapsed_at(point))
    }

    // ===== Copies and comparison =====

    /// An independent range with the same boundaries and backend kind.
    pub fn clone_range(&self, doc: &mut Document) -> Result<Self> {
        self.clone_as(doc)
    }

    /// An independent range with the same boundaries in another backend.
    pub fn clone_as<C: RangeBackend>(&self, doc: &mut Document) -> Result<Range<C>> {
        let boundaries = self.boundaries(doc)?;
        Ok(Range::from_parts(doc, boundaries))
    }

    /// A by-value copy of the current boundaries.
    pub fn to_static(&self, doc: &Document) -> Result<StaticRange> {
        Ok(Range {
            doc_id: self.doc_id,
            backend: Snapshot::capture(self.boundaries(doc)?),
        })
    }

    /// True when both ranges are valid and share their boundaries.
    pub fn equals<C: RangeBackend>(&self, doc: &Document, other: &Range<C>) -> Result<bool> {
        Ok(self.boundaries(doc)? == other.boundaries(doc)?)
    }

    pub fn compare_boundary_points<C: RangeBackend>(
        &self,
        doc: &Document,
        how: How,
        other: &Range<C>,
    ) -> Result<Ordering> {
        let this = self.boundaries(doc)?;
        let that = other.boundaries(doc)?;
        if doc.root_of(this.start.node) != doc.root_of(that.start.node) {
            return Err(Error::WrongDocument);
        }
        let a = match how {
            How::StartToStart | How::EndToStart => this.start,
            How::StartToEnd | How::EndToEnd => this.end,
        };
        let b = match how {
            How::StartToStart | How::StartToEnd => that.start,
            How::EndToEnd | How::EndToStart => that.end,
        };
        compare(doc, a, b)
    }

    /// The selected text: covered data of Text and CDATA nodes, in order.
    pub fn to_text(&self, doc: &Document) -> Result<String> {
        let b = self.boundaries(doc)?;
        if b.start.node == b.end.node && doc.is_character_data(b.start.node) {
            return Ok(if doc.kind(b.start.node).is_textual() {
                doc.data(b.start.node)[b.start.offset..b.end.offset].to_string()
            } else {
                String::new()
            });
        }
        let mut text = String::new();
        for node in self.get_nodes(doc, |doc, n| doc.kind(n).is_textual())? {
            let data = doc.data(node);
            let from = if node == b.start.node { b.start.offset } else { 0 };
            let to = if node == b.end.node { b.end.offset } else { data.len() };
            text.push_str(&data[from..to]);
        }
        Ok(text)
    }
}

/// Check that `(node, offset)` may become a boundary of an existing range.
pub(crate) fn boundary_point(doc: &Document, node: NodeId, offset: usize) -> Result<Position> {
    let pos = Position::new(node, offset);
    pos.validate(doc)?;
    ensure_attached(doc, node)?;
    Ok(pos)
}

fn contents_of(doc: &Document, node: NodeId) -> Result<Boundaries> {
    doc.check(node)?;
    let end = boundary_point(doc, node, doc.node_length(node))?;
    Ok(Boundaries::new(Position::new(node, 0), end))
}

fn ensure_attached(doc: &Document, node: NodeId) -> Result<()> {
    if doc.is_attached(node) {
        Ok(())
    } else {
        Err(Error::node_type(format!(
            "{} is not inside a document or fragment",
            doc.kind(node).name()
        )))
    }
}

/// True when a node kind may not appear anywhere in range content.
pub(crate) fn is_doctype(kind: &NodeKind) -> bool {
    matches!(kind, NodeKind::DocumentType { .. })
}
