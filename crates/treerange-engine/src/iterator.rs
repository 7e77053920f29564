//! # Subtree iteration
//!
//! A [`SubtreeIterator`] walks the top-level nodes a range spans at the level
//! of its common ancestor, from `first` to `last`. Each step yields an
//! [`Item`] classifying the node:
//!
//! - **partially selected**: a non character data node holding the start or
//!   end container. Callers descend into it with [`SubtreeIterator::sub_iterator`].
//! - **boundary character data**: the start or end container itself, with the
//!   covered byte span in [`Item::clip`].
//! - otherwise the whole node lies inside the range.
//!
//! The iterator does not borrow the document, so destructive walks can
//! interleave [`SubtreeIterator::remove`] with `next`. Each step checks that
//! the boundary containers are still attached to one tree and aborts with
//! [`Error::InvalidState`] otherwise.

use std::ops::{ControlFlow, Range as Span};

use crate::dom::{Document, NodeId};
use crate::error::{Error, Result};
use crate::position::{Boundaries, Position};
use crate::range::{Range, RangeBackend};

/// A node reached by a [`SubtreeIterator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub node: NodeId,
    /// Covered byte span of a character data node holding a boundary.
    pub clip: Option<Span<usize>>,
    pub partially_selected: bool,
}

#[derive(Debug, Clone)]
pub struct SubtreeIterator {
    boundaries: Boundaries,
    single_character_data: bool,
    first: Option<NodeId>,
    last: Option<NodeId>,
    current: Option<NodeId>,
    next: Option<NodeId>,
}

impl SubtreeIterator {
    /// Iterate over validated boundaries.
    pub fn new(doc: &Document, boundaries: Boundaries) -> Result<Self> {
        boundaries.validate(doc)?;
        Self::build(doc, boundaries)
    }

    pub fn for_range<B: RangeBackend>(doc: &Document, range: &Range<B>) -> Result<Self> {
        Self::build(doc, range.boundaries(doc)?)
    }

    fn build(doc: &Document, boundaries: Boundaries) -> Result<Self> {
        let mut it = Self {
            boundaries,
            single_character_data: false,
            first: None,
            last: None,
            current: None,
            next: None,
        };
        if boundaries.is_collapsed() {
            return Ok(it);
        }

        let Boundaries { start, end } = boundaries;
        if start.node == end.node && doc.is_character_data(start.node) {
            it.single_character_data = true;
            it.first = Some(start.node);
            it.last = Some(start.node);
        } else {
            let root = boundaries.common_ancestor(doc).ok_or(Error::WrongDocument)?;
            it.first = if start.node == root && !doc.is_character_data(root) {
                doc.child_at(root, start.offset)
            } else {
                doc.closest_ancestor_in(start.node, root, true)
            };
            it.last = if end.node == root && !doc.is_character_data(root) {
                end.offset.checked_sub(1).and_then(|i| doc.child_at(root, i))
            } else {
                doc.closest_ancestor_in(end.node, root, true)
            };
        }
        it.next = it.first;
        Ok(it)
    }

    pub fn boundaries(&self) -> Boundaries {
        self.boundaries
    }

    pub fn first(&self) -> Option<NodeId> {
        self.first
    }

    pub fn last(&self) -> Option<NodeId> {
        self.last
    }

    pub fn current(&self) -> Option<NodeId> {
        self.current
    }

    /// True when both boundaries lie in one character data node; that node
    /// is then the only item.
    pub fn is_single_character_data(&self) -> bool {
        self.single_character_data
    }

    fn ensure_attached(&self, doc: &Document) -> Result<()> {
        let (sc, ec) = (self.boundaries.start.node, self.boundaries.end.node);
        if !doc.is_attached(sc) || !doc.is_attached(ec) || doc.root_of(sc) != doc.root_of(ec) {
            log::warn!("range boundaries detached during traversal");
            return Err(Error::invalid_state(
                "range boundaries detached during traversal",
            ));
        }
        Ok(())
    }

    pub fn next(&mut self, doc: &Document) -> Result<Option<Item>> {
        self.ensure_attached(doc)?;
        self.current = self.next;
        let Some(current) = self.current else {
            return Ok(None);
        };
        self.next = if Some(current) == self.last {
            None
        } else {
            doc.next_sibling(current)
        };
        Ok(Some(Item {
            node: current,
            clip: self.clip(doc, current),
            partially_selected: self.is_partially_selected(doc, current),
        }))
    }

    /// A non character data node containing a boundary container.
    pub fn is_partially_selected(&self, doc: &Document, node: NodeId) -> bool {
        doc.contains(node)
            && !doc.is_character_data(node)
            && (doc.is_inclusive_ancestor(node, self.boundaries.start.node)
                || doc.is_inclusive_ancestor(node, self.boundaries.end.node))
    }

    fn clip(&self, doc: &Document, node: NodeId) -> Option<Span<usize>> {
        let Boundaries { start, end } = self.boundaries;
        if !doc.is_character_data(node) || (node != start.node && node != end.node) {
            return None;
        }
        let from = if node == start.node { start.offset } else { 0 };
        let to = if node == end.node {
            end.offset
        } else {
            doc.node_length(node)
        };
        Some(from..to)
    }

    fn current_node(&self) -> Result<NodeId> {
        self.current
            .ok_or_else(|| Error::invalid_state("iterator has no current node"))
    }

    /// Iterator over the part of the current node that lies in the range.
    pub fn sub_iterator(&self, doc: &Document) -> Result<SubtreeIterator> {
        self.ensure_attached(doc)?;
        let current = self.current_node()?;
        let Boundaries { start, end } = self.boundaries;
        let narrowed = if self.single_character_data {
            Boundaries::collapsed_at(end)
        } else {
            let from = if doc.is_inclusive_ancestor(current, start.node) {
                start
            } else {
                Position::new(current, 0)
            };
            let to = if doc.is_inclusive_ancestor(current, end.node) {
                end
            } else {
                Position::new(current, doc.node_length(current))
            };
            Boundaries::new(from, to)
        };
        Self::build(doc, narrowed)
    }

    /// Remove the current node's covered content: the clipped span of
    /// boundary character data, or the whole node otherwise.
    pub fn remove(&mut self, doc: &mut Document) -> Result<()> {
        self.ensure_attached(doc)?;
        let current = self.current_node()?;
        match self.clip(doc, current) {
            Some(span) if span.start < span.end => {
                doc.delete_data(current, span.start, span.end - span.start)?
            }
            Some(_) => {}
            None => doc.remove(current),
        }
        Ok(())
    }
}

/// Visit every node in the iterator's range in document order.
///
/// Partially selected nodes are visited and then descended into; fully
/// selected nodes are visited along with their whole subtree. Returning
/// `ControlFlow::Break` from `visit` stops the walk.
pub fn iterate_subtree(
    doc: &Document,
    it: &mut SubtreeIterator,
    visit: &mut impl FnMut(&Document, &Item) -> ControlFlow<()>,
) -> Result<ControlFlow<()>> {
    while let Some(item) = it.next(doc)? {
        if item.partially_selected {
            if visit(doc, &item).is_break() {
                return Ok(ControlFlow::Break(()));
            }
            let mut sub = it.sub_iterator(doc)?;
            if iterate_subtree(doc, &mut sub, visit)?.is_break() {
                return Ok(ControlFlow::Break(()));
            }
        } else {
            if visit(doc, &item).is_break() {
                return Ok(ControlFlow::Break(()));
            }
            for node in doc.descendants(item.node).skip(1) {
                let nested = Item {
                    node,
                    clip: None,
                    partially_selected: false,
                };
                if visit(doc, &nested).is_break() {
                    return Ok(ControlFlow::Break(()));
                }
            }
        }
    }
    Ok(ControlFlow::Continue(()))
}

impl<B: RangeBackend> Range<B> {
    /// Nodes spanned by the range that pass `filter`, in document order.
    ///
    /// A start container entered at its very end, or an end container left
    /// at offset 0, contributes nothing and is skipped.
    pub fn get_nodes(
        &self,
        doc: &Document,
        mut filter: impl FnMut(&Document, NodeId) -> bool,
    ) -> Result<Vec<NodeId>> {
        let Boundaries { start, end } = self.boundaries(doc)?;
        let mut it = SubtreeIterator::build(doc, Boundaries::new(start, end))?;
        let mut nodes = Vec::new();
        iterate_subtree(doc, &mut it, &mut |doc, item| {
            let node = item.node;
            let empty_start = node == start.node
                && doc.is_character_data(node)
                && start.offset == doc.node_length(node);
            let empty_end = node == end.node && doc.is_character_data(node) && end.offset == 0;
            if !empty_start && !empty_end && filter(doc, node) {
                nodes.push(node);
            }
            ControlFlow::Continue(())
        })?;
        Ok(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::fixtures::sample;
    use crate::range::{LiveRange, StaticRange};
    use pretty_assertions::assert_eq;

    fn spanning(doc: &Document, hello: NodeId, bang: NodeId) -> Boundaries {
        let b = Boundaries::new(Position::new(hello, 3), Position::new(bang, 1));
        b.validate(doc).unwrap();
        b
    }

    fn collect(doc: &Document, mut it: SubtreeIterator) -> Vec<Item> {
        let mut items = Vec::new();
        while let Some(item) = it.next(doc).unwrap() {
            items.push(item);
        }
        items
    }

    #[test]
    fn classifies_items_at_common_ancestor() {
        let s = sample();
        let it = SubtreeIterator::new(&s.doc, spanning(&s.doc, s.hello, s.bang)).unwrap();
        assert_eq!(it.first(), Some(s.hello));
        assert_eq!(it.last(), Some(s.bang));
        assert!(!it.is_single_character_data());

        assert_eq!(
            collect(&s.doc, it),
            vec![
                Item {
                    node: s.hello,
                    clip: Some(3..6),
                    partially_selected: false,
                },
                Item {
                    node: s.b,
                    clip: None,
                    partially_selected: false,
                },
                Item {
                    node: s.bang,
                    clip: Some(0..1),
                    partially_selected: false,
                },
            ]
        );
    }

    #[test]
    fn element_holding_a_boundary_is_partial() {
        let s = sample();
        let b = Boundaries::new(Position::new(s.hello, 1), Position::new(s.world, 2));
        let mut it = SubtreeIterator::new(&s.doc, b).unwrap();
        it.next(&s.doc).unwrap();
        let item = it.next(&s.doc).unwrap().unwrap();
        assert_eq!(item.node, s.b);
        assert!(item.partially_selected);

        let sub = it.sub_iterator(&s.doc).unwrap();
        assert_eq!(
            sub.boundaries(),
            Boundaries::new(Position::new(s.b, 0), Position::new(s.world, 2))
        );
        let items = collect(&s.doc, sub);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].clip, Some(0..2));
        assert!(it.next(&s.doc).unwrap().is_none());
    }

    #[test]
    fn single_character_data_node() {
        let s = sample();
        let b = Boundaries::new(Position::new(s.world, 1), Position::new(s.world, 4));
        let mut it = SubtreeIterator::new(&s.doc, b).unwrap();
        assert!(it.is_single_character_data());
        assert_eq!((it.first(), it.last()), (Some(s.world), Some(s.world)));
        let item = it.next(&s.doc).unwrap().unwrap();
        assert_eq!(item.clip, Some(1..4));
        assert!(it.sub_iterator(&s.doc).unwrap().boundaries().is_collapsed());
        assert!(it.next(&s.doc).unwrap().is_none());
    }

    #[test]
    fn collapsed_range_yields_nothing() {
        let s = sample();
        let b = Boundaries::collapsed_at(Position::new(s.p, 1));
        let mut it = SubtreeIterator::new(&s.doc, b).unwrap();
        assert!(it.next(&s.doc).unwrap().is_none());
        assert!(it.first().is_none());
    }

    #[test]
    fn container_boundaries_pick_children() {
        let s = sample();
        let b = Boundaries::new(Position::new(s.p, 1), Position::new(s.p, 3));
        let it = SubtreeIterator::new(&s.doc, b).unwrap();
        assert_eq!((it.first(), it.last()), (Some(s.b), Some(s.bang)));
        let nodes: Vec<_> = collect(&s.doc, it).into_iter().map(|i| i.node).collect();
        assert_eq!(nodes, vec![s.b, s.bang]);
    }

    #[test]
    fn iterate_subtree_walks_in_document_order() {
        let mut s = sample();
        let range = LiveRange::of_contents(&mut s.doc, s.p).unwrap();
        let mut it = SubtreeIterator::for_range(&s.doc, &range).unwrap();
        let mut seen = Vec::new();
        let flow = iterate_subtree(&s.doc, &mut it, &mut |_, item| {
            seen.push(item.node);
            ControlFlow::Continue(())
        })
        .unwrap();
        assert!(flow.is_continue());
        assert_eq!(seen, vec![s.hello, s.b, s.world, s.bang]);
    }

    #[test]
    fn iterate_subtree_stops_on_break() {
        let s = sample();
        let b = Boundaries::new(Position::new(s.hello, 1), Position::new(s.bang, 1));
        let mut it = SubtreeIterator::new(&s.doc, b).unwrap();
        let mut seen = Vec::new();
        let flow = iterate_subtree(&s.doc, &mut it, &mut |_, item| {
            seen.push(item.node);
            if item.node == s.world {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        })
        .unwrap();
        assert!(flow.is_break());
        assert_eq!(seen, vec![s.hello, s.b, s.world]);
    }

    #[test]
    fn clipped_spans_concatenate_to_text() {
        let mut s = sample();
        let range = StaticRange::from_boundaries(
            &mut s.doc,
            Boundaries::new(Position::new(s.hello, 3), Position::new(s.bang, 1)),
        )
        .unwrap();
        let mut it = SubtreeIterator::for_range(&s.doc, &range).unwrap();
        let mut text = String::new();
        iterate_subtree(&s.doc, &mut it, &mut |doc, item| {
            if doc.kind(item.node).is_textual() {
                let data = doc.data(item.node);
                let span = item.clip.clone().unwrap_or(0..data.len());
                text.push_str(&data[span]);
            }
            ControlFlow::Continue(())
        })
        .unwrap();
        assert_eq!(text, range.to_text(&s.doc).unwrap());
        assert_eq!(text, "lo World!");
    }

    #[test]
    fn remove_deletes_clipped_span_or_node() {
        let s = sample();
        let mut doc = s.doc;
        let b = spanning(&doc, s.hello, s.bang);
        let mut it = SubtreeIterator::new(&doc, b).unwrap();
        while it.next(&doc).unwrap().is_some() {
            it.remove(&mut doc).unwrap();
        }
        assert_eq!(doc.to_markup(s.p), "<p>Hel</p>");
        assert_eq!(doc.child_count(s.p), 2);
        assert!(doc.parent(s.b).is_none());
    }

    #[test]
    fn traversal_aborts_when_boundary_detached() {
        let s = sample();
        let mut doc = s.doc;
        let b = Boundaries::new(Position::new(s.hello, 1), Position::new(s.world, 2));
        let mut it = SubtreeIterator::new(&doc, b).unwrap();
        it.next(&doc).unwrap();
        doc.remove(s.b);
        assert!(matches!(it.next(&doc), Err(Error::InvalidState(_))));
    }

    #[test]
    fn get_nodes_skips_empty_boundary_nodes() {
        let mut s = sample();
        let range = StaticRange::from_boundaries(
            &mut s.doc,
            Boundaries::new(Position::new(s.hello, 6), Position::new(s.bang, 0)),
        )
        .unwrap();
        let all = range.get_nodes(&s.doc, |_, _| true).unwrap();
        assert_eq!(all, vec![s.b, s.world]);
        let texts = range
            .get_nodes(&s.doc, |doc, n| doc.kind(n).is_textual())
            .unwrap();
        assert_eq!(texts, vec![s.world]);
    }
}
