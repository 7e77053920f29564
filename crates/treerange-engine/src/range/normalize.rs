//! Splitting and re-merging character data at range boundaries.
//!
//! Both operations restructure the tree, so they run with the range's
//! boundaries in the live registry and read the rewritten result back; a
//! static range comes out of them exactly as a live one would.

use crate::dom::{Document, NodeId, RangeKey};
use crate::error::{Error, Result};
use crate::position::{Boundaries, Position};

use super::{Range, RangeBackend};

impl<B: RangeBackend> Range<B> {
    /// Split character data so that neither boundary lies strictly inside a
    /// node. The end is split first; the start then moves to the beginning
    /// of the second half of its node.
    pub fn split_boundaries(&mut self, doc: &mut Document) -> Result<()> {
        self.with_tracked(doc, |doc, key| {
            let end = tracked(doc, key)?.end;
            if end.is_inside_character_data(doc) {
                doc.split_data(end.node, end.offset)?;
            }
            let start = tracked(doc, key)?.start;
            if start.is_inside_character_data(doc) {
                let second = doc.split_data(start.node, start.offset)?;
                let mut boundaries = tracked(doc, key)?;
                boundaries.start = Position::new(second, 0);
                doc.set_tracked(key, boundaries);
            }
            Ok(())
        })
    }

    /// Merge same-kind character data siblings that meet at a boundary.
    ///
    /// Boundaries end up at the junctions of the merged nodes, and a
    /// collapsed range stays collapsed. Other live ranges over the merged
    /// nodes are rewritten by the same joins.
    pub fn normalize_boundaries(&mut self, doc: &mut Document) -> Result<()> {
        let collapsed = self.collapsed(doc)?;
        self.with_tracked(doc, |doc, key| {
            let end = tracked(doc, key)?.end;
            let mut normalize_start = true;
            if doc.is_character_data(end.node) {
                if end.offset == doc.node_length(end.node) {
                    merge_next(doc, end.node)?;
                } else if end.offset == 0
                    && let Some(previous) = same_kind_sibling(doc, end.node, false)
                {
                    normalize_start = tracked(doc, key)?.start.node != end.node;
                    doc.join_data(previous, end.node)?;
                }
            } else {
                if let Some(child) = end.offset.checked_sub(1).and_then(|i| doc.child_at(end.node, i))
                    && doc.is_character_data(child)
                {
                    merge_next(doc, child)?;
                }
                normalize_start = !collapsed;
            }

            if normalize_start {
                let start = tracked(doc, key)?.start;
                if doc.is_character_data(start.node) {
                    if start.offset == 0 {
                        merge_previous(doc, start.node)?;
                    } else if start.offset == doc.node_length(start.node) {
                        merge_next(doc, start.node)?;
                    }
                } else if let Some(child) = doc.child_at(start.node, start.offset)
                    && doc.is_character_data(child)
                {
                    merge_previous(doc, child)?;
                }
            }
            Ok(())
        })
    }
}

fn tracked(doc: &Document, key: RangeKey) -> Result<Boundaries> {
    doc.tracked(key)
        .ok_or_else(|| Error::invalid_state("tracked boundaries disappeared"))
}

fn same_kind_sibling(doc: &Document, node: NodeId, next: bool) -> Option<NodeId> {
    let sibling = if next {
        doc.next_sibling(node)
    } else {
        doc.previous_sibling(node)
    }?;
    doc.kind(sibling)
        .same_kind(doc.kind(node))
        .then_some(sibling)
}

/// Append the next sibling's data to `node` when the kinds match.
fn merge_next(doc: &mut Document, node: NodeId) -> Result<()> {
    if let Some(next) = same_kind_sibling(doc, node, true) {
        doc.join_data(node, next)?;
    }
    Ok(())
}

/// Prepend the previous sibling's data to `node` when the kinds match.
fn merge_previous(doc: &mut Document, node: NodeId) -> Result<()> {
    if let Some(previous) = same_kind_sibling(doc, node, false) {
        doc.join_data(node, previous)?;
    }
    Ok(())
}
