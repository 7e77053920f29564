//! Cloning, extracting, deleting, inserting and surrounding range content.
//!
//! Content operations return new content as a detached fragment node. Before
//! touching the tree they scan the whole range and refuse content holding a
//! document type node, so a failed call leaves the tree as it was.

use std::cmp::Ordering;
use std::ops::{ControlFlow, Range as Span};

use crate::dom::{Document, NodeId, NodeKind};
use crate::error::{Error, Result};
use crate::iterator::{SubtreeIterator, iterate_subtree};
use crate::position::{Boundaries, Position, compare};
use crate::range::{Range, RangeBackend, is_doctype};

impl<B: RangeBackend> Range<B> {
    /// A fragment holding a copy of the range's content.
    pub fn clone_contents(&self, doc: &mut Document) -> Result<NodeId> {
        let boundaries = self.boundaries(doc)?;
        ensure_no_doctype(doc, boundaries)?;
        let fragment = doc.create_fragment();
        let mut it = SubtreeIterator::new(doc, boundaries)?;
        clone_subtree(doc, &mut it, fragment)?;
        Ok(fragment)
    }

    /// Move the range's content into a new fragment, splitting off the
    /// covered parts of boundary character data and of partially selected
    /// elements. The range collapses where the content was.
    pub fn extract_contents(&mut self, doc: &mut Document) -> Result<NodeId> {
        let boundaries = self.boundaries(doc)?;
        ensure_no_doctype(doc, boundaries)?;
        let collapse_at = point_after_removal(doc, boundaries)?;
        let fragment = doc.create_fragment();
        let mut it = SubtreeIterator::new(doc, boundaries)?;
        extract_subtree(doc, &mut it, fragment)?;
        log::debug!("extracted {} node(s)", doc.child_count(fragment));
        self.update(doc, Boundaries::collapsed_at(collapse_at))?;
        Ok(fragment)
    }

    /// Remove the range's content and collapse the range where it was.
    pub fn delete_contents(&mut self, doc: &mut Document) -> Result<()> {
        let boundaries = self.boundaries(doc)?;
        ensure_no_doctype(doc, boundaries)?;
        let collapse_at = point_after_removal(doc, boundaries)?;
        let mut it = SubtreeIterator::new(doc, boundaries)?;
        delete_subtree(doc, &mut it)?;
        self.update(doc, Boundaries::collapsed_at(collapse_at))
    }

    /// Insert `node` at the start of the range, splitting character data
    /// when the start lies inside it. The start moves before the inserted
    /// node; a fragment inserts its children.
    pub fn insert_node(&mut self, doc: &mut Document, node: NodeId) -> Result<()> {
        let start = self.start(doc)?;
        doc.check(node)?;
        if matches!(
            doc.kind(start.node),
            NodeKind::Comment | NodeKind::ProcessingInstruction { .. }
        ) {
            return Err(Error::hierarchy(format!(
                "cannot insert into {}",
                doc.kind(start.node).name()
            )));
        }
        if doc.is_inclusive_ancestor(node, start.node) {
            return Err(Error::hierarchy(
                "inserted node contains the range start",
            ));
        }
        let first = if matches!(doc.kind(node), NodeKind::DocumentFragment) {
            doc.first_child(node)
        } else {
            Some(node)
        };

        self.with_tracked(doc, |doc, key| {
            insert_at(doc, node, start)?;
            let (Some(first), Some(mut b)) = (first, doc.tracked(key)) else {
                return Ok(());
            };
            b.start = Position::before(doc, first)?;
            if compare(doc, b.end, b.start)? == Ordering::Less {
                b.end = b.start;
            }
            doc.set_tracked(key, b);
            Ok(())
        })
    }

    /// False when the range partially selects a node other than character
    /// data at either edge; such content cannot be wrapped in one element.
    pub fn can_surround_contents(&self, doc: &Document) -> Result<bool> {
        let boundaries = self.boundaries(doc)?;
        let it = SubtreeIterator::new(doc, boundaries)?;
        let partial = |n: Option<NodeId>| n.is_some_and(|n| it.is_partially_selected(doc, n));
        Ok(!partial(it.first()) && !partial(it.last()))
    }

    /// Wrap the range's content in `node` and select it. Existing children
    /// of `node` are discarded.
    pub fn surround_contents(&mut self, doc: &mut Document, node: NodeId) -> Result<()> {
        self.boundaries(doc)?;
        doc.check(node)?;
        if matches!(
            doc.kind(node),
            NodeKind::Document | NodeKind::DocumentType { .. } | NodeKind::DocumentFragment
        ) {
            return Err(Error::node_type(format!(
                "cannot surround content with {}",
                doc.kind(node).name()
            )));
        }
        if !self.can_surround_contents(doc)? {
            return Err(Error::BadBoundaryPoints(
                "range partially selects a non-text node".to_string(),
            ));
        }
        let start = self.start(doc)?;
        if doc.is_inclusive_ancestor(node, start.node) {
            return Err(Error::hierarchy(
                "surrounding node contains the range start",
            ));
        }

        let content = self.extract_contents(doc)?;
        while let Some(child) = doc.last_child(node) {
            doc.remove(child);
        }
        let at = self.start(doc)?;
        insert_at(doc, node, at)?;
        doc.append_child(node, content)?;
        self.select_node(doc, node)
    }
}

/// Fail with `HierarchyRequest` when the range content holds a doctype.
fn ensure_no_doctype(doc: &Document, boundaries: Boundaries) -> Result<()> {
    let mut it = SubtreeIterator::new(doc, boundaries)?;
    let found = iterate_subtree(doc, &mut it, &mut |doc, item| {
        if is_doctype(doc.kind(item.node)) {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    })?;
    if found.is_break() {
        log::warn!("refusing range content holding a document type node");
        return Err(Error::hierarchy(
            "range content contains a document type node",
        ));
    }
    Ok(())
}

/// Where the range collapses after its content is removed: just after the
/// top-level node holding the start, or the start itself when the start
/// container is the common ancestor.
fn point_after_removal(doc: &Document, boundaries: Boundaries) -> Result<Position> {
    let root = boundaries
        .common_ancestor(doc)
        .ok_or(Error::WrongDocument)?;
    if boundaries.start.node == root {
        return Ok(boundaries.start);
    }
    let top = doc
        .closest_ancestor_in(boundaries.start.node, root, true)
        .ok_or_else(|| Error::invalid_state("start is not below the common ancestor"))?;
    Position::after(doc, top)
}

/// A detached copy of `node` holding only the `span` of its data.
fn clipped_copy(doc: &mut Document, node: NodeId, span: Span<usize>) -> Result<NodeId> {
    let copy = doc.clone_node(node, false);
    let length = doc.node_length(copy);
    doc.delete_data(copy, span.end, length - span.end)?;
    doc.delete_data(copy, 0, span.start)?;
    Ok(copy)
}

fn clone_subtree(doc: &mut Document, it: &mut SubtreeIterator, parent: NodeId) -> Result<()> {
    while let Some(item) = it.next(doc)? {
        let copy = if item.partially_selected {
            let shallow = doc.clone_node(item.node, false);
            let mut sub = it.sub_iterator(doc)?;
            clone_subtree(doc, &mut sub, shallow)?;
            shallow
        } else if let Some(span) = item.clip {
            clipped_copy(doc, item.node, span)?
        } else {
            doc.clone_node(item.node, true)
        };
        doc.append_child(parent, copy)?;
    }
    Ok(())
}

fn extract_subtree(doc: &mut Document, it: &mut SubtreeIterator, parent: NodeId) -> Result<()> {
    while let Some(item) = it.next(doc)? {
        let moved = if item.partially_selected {
            let shallow = doc.clone_node(item.node, false);
            let mut sub = it.sub_iterator(doc)?;
            extract_subtree(doc, &mut sub, shallow)?;
            shallow
        } else if let Some(span) = item.clip {
            let copy = clipped_copy(doc, item.node, span)?;
            it.remove(doc)?;
            copy
        } else {
            it.remove(doc)?;
            item.node
        };
        doc.append_child(parent, moved)?;
    }
    Ok(())
}

fn delete_subtree(doc: &mut Document, it: &mut SubtreeIterator) -> Result<()> {
    while let Some(item) = it.next(doc)? {
        if item.partially_selected {
            let mut sub = it.sub_iterator(doc)?;
            delete_subtree(doc, &mut sub)?;
        } else {
            it.remove(doc)?;
        }
    }
    Ok(())
}

/// Insert `node` at `pos`. Character data is split when `pos` lies inside it.
fn insert_at(doc: &mut Document, node: NodeId, pos: Position) -> Result<()> {
    if !doc.is_character_data(pos.node) {
        let reference = doc.child_at(pos.node, pos.offset);
        return doc.insert_before(pos.node, node, reference);
    }
    let parent = doc
        .parent(pos.node)
        .ok_or_else(|| Error::hierarchy("character data has no parent"))?;
    doc.ensure_insertable(parent, node, None)?;
    let reference = if pos.offset == doc.node_length(pos.node) {
        doc.next_sibling(pos.node)
    } else if pos.offset == 0 {
        Some(pos.node)
    } else {
        Some(doc.split_data(pos.node, pos.offset)?)
    };
    doc.insert_before(parent, node, reference)
}
