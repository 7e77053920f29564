//! Boundary points and their ordering.
//!
//! A [`Position`] is a `(node, offset)` pair. For character data the offset
//! counts bytes into the node's data; for containers it counts children, and
//! the position sits between `child[offset - 1]` and `child[offset]`.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::dom::{Document, NodeId, NodeKind};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub node: NodeId,
    pub offset: usize,
}

impl Position {
    pub fn new(node: NodeId, offset: usize) -> Self {
        Self { node, offset }
    }

    /// The point immediately before `node` in its parent.
    pub fn before(doc: &Document, node: NodeId) -> Result<Self> {
        doc.check(node)?;
        let parent = doc
            .parent(node)
            .ok_or_else(|| Error::node_type("node has no parent"))?;
        Ok(Self::new(parent, doc.index(node)))
    }

    /// The point immediately after `node` in its parent.
    pub fn after(doc: &Document, node: NodeId) -> Result<Self> {
        doc.check(node)?;
        let parent = doc
            .parent(node)
            .ok_or_else(|| Error::node_type("node has no parent"))?;
        Ok(Self::new(parent, doc.index(node) + 1))
    }

    /// Check that this position may serve as a range boundary in `doc`.
    pub fn validate(&self, doc: &Document) -> Result<()> {
        if !doc.contains(self.node) {
            return Err(Error::WrongDocument);
        }
        if matches!(doc.kind(self.node), NodeKind::DocumentType { .. }) {
            return Err(Error::node_type("document type nodes cannot hold a boundary"));
        }
        doc.ensure_offset(self.node, self.offset)
    }

    pub fn is_valid(&self, doc: &Document) -> bool {
        self.validate(doc).is_ok()
    }

    /// True when the offset lies strictly inside character data.
    pub(crate) fn is_inside_character_data(&self, doc: &Document) -> bool {
        doc.is_character_data(self.node)
            && self.offset > 0
            && self.offset < doc.node_length(self.node)
    }
}

/// Order two positions of the same tree.
///
/// Returns [`Error::WrongDocument`] when either node belongs to another
/// document or the positions share no ancestor.
pub fn compare(doc: &Document, a: Position, b: Position) -> Result<Ordering> {
    doc.check(a.node)?;
    doc.check(b.node)?;
    if a.node == b.node {
        return Ok(a.offset.cmp(&b.offset));
    }

    // b lies inside one of a's children
    if let Some(child) = doc.closest_ancestor_in(b.node, a.node, true) {
        return Ok(if a.offset <= doc.index(child) {
            Ordering::Less
        } else {
            Ordering::Greater
        });
    }

    // a lies inside one of b's children
    if let Some(child) = doc.closest_ancestor_in(a.node, b.node, true) {
        return Ok(if doc.index(child) < b.offset {
            Ordering::Less
        } else {
            Ordering::Greater
        });
    }

    let root = doc
        .common_ancestor(a.node, b.node)
        .ok_or(Error::WrongDocument)?;
    let child_a = if a.node == root {
        Some(root)
    } else {
        doc.closest_ancestor_in(a.node, root, true)
    };
    let child_b = if b.node == root {
        Some(root)
    } else {
        doc.closest_ancestor_in(b.node, root, true)
    };
    let (Some(child_a), Some(child_b)) = (child_a, child_b) else {
        return Err(Error::invalid_state("positions have no distinct ancestors"));
    };
    if child_a == child_b {
        return Err(Error::invalid_state(
            "comparison reached sibling scan with identical children",
        ));
    }

    for &child in doc.children(root) {
        if child == child_a {
            return Ok(Ordering::Less);
        }
        if child == child_b {
            return Ok(Ordering::Greater);
        }
    }
    Err(Error::invalid_state("common ancestor does not hold either child"))
}

/// A start and end position, in that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Boundaries {
    pub start: Position,
    pub end: Position,
}

impl Boundaries {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn collapsed_at(pos: Position) -> Self {
        Self::new(pos, pos)
    }

    pub fn is_collapsed(&self) -> bool {
        self.start == self.end
    }

    /// Deepest node containing both boundaries.
    pub fn common_ancestor(&self, doc: &Document) -> Option<NodeId> {
        doc.common_ancestor(self.start.node, self.end.node)
    }

    /// Check both boundaries, that they share one attached tree, and that
    /// start does not follow end.
    pub fn validate(&self, doc: &Document) -> Result<()> {
        for pos in [self.start, self.end] {
            pos.validate(doc).map_err(|e| match e {
                Error::WrongDocument => e,
                e => Error::invalid_state(format!("boundary is no longer valid: {e}")),
            })?;
        }
        if !doc.is_attached(self.start.node) || !doc.is_attached(self.end.node) {
            return Err(Error::invalid_state("boundary node is detached from its tree"));
        }
        if doc.root_of(self.start.node) != doc.root_of(self.end.node) {
            return Err(Error::invalid_state("boundaries lie in different trees"));
        }
        if compare(doc, self.start, self.end)? == Ordering::Greater {
            return Err(Error::invalid_state("range start follows its end"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    /// `<div><p>ab<i>cd</i></p><p>ef</p></div>`
    struct Fixture {
        doc: Document,
        div: NodeId,
        p1: NodeId,
        ab: NodeId,
        i: NodeId,
        cd: NodeId,
        p2: NodeId,
        ef: NodeId,
    }

    fn fixture() -> Fixture {
        let mut doc = Document::new();
        let root = doc.root();
        let div = doc.append_element(root, "div").unwrap();
        let p1 = doc.append_element(div, "p").unwrap();
        let ab = doc.append_text(p1, "ab").unwrap();
        let i = doc.append_element(p1, "i").unwrap();
        let cd = doc.append_text(i, "cd").unwrap();
        let p2 = doc.append_element(div, "p").unwrap();
        let ef = doc.append_text(p2, "ef").unwrap();
        Fixture {
            doc,
            div,
            p1,
            ab,
            i,
            cd,
            p2,
            ef,
        }
    }

    /// Every position of the fixture, in document order.
    fn all_positions(f: &Fixture) -> Vec<Position> {
        vec![
            Position::new(f.div, 0),
            Position::new(f.p1, 0),
            Position::new(f.ab, 0),
            Position::new(f.ab, 1),
            Position::new(f.ab, 2),
            Position::new(f.p1, 1),
            Position::new(f.i, 0),
            Position::new(f.cd, 0),
            Position::new(f.cd, 2),
            Position::new(f.i, 1),
            Position::new(f.p1, 2),
            Position::new(f.div, 1),
            Position::new(f.p2, 0),
            Position::new(f.ef, 1),
            Position::new(f.p2, 1),
            Position::new(f.div, 2),
        ]
    }

    #[test]
    fn ordering_is_total_and_antisymmetric() {
        let f = fixture();
        let positions = all_positions(&f);
        for (i, &a) in positions.iter().enumerate() {
            for (j, &b) in positions.iter().enumerate() {
                let ab = compare(&f.doc, a, b).unwrap();
                let ba = compare(&f.doc, b, a).unwrap();
                assert_eq!(ab, i.cmp(&j), "compare({a:?}, {b:?})");
                assert_eq!(ab, ba.reverse());
            }
        }
    }

    #[rstest]
    #[case::same_node(4, 2, Ordering::Greater)]
    #[case::ancestor_first(1, 6, Ordering::Less)]
    #[case::descendant_first(8, 5, Ordering::Greater)]
    #[case::siblings(4, 13, Ordering::Less)]
    fn each_case_orders_correctly(
        #[case] a: usize,
        #[case] b: usize,
        #[case] expected: Ordering,
    ) {
        let f = fixture();
        let positions = all_positions(&f);
        assert_eq!(
            compare(&f.doc, positions[a], positions[b]).unwrap(),
            expected
        );
    }

    #[test]
    fn before_and_after_a_node() {
        let f = fixture();
        assert_eq!(Position::before(&f.doc, f.i).unwrap(), Position::new(f.p1, 1));
        assert_eq!(Position::after(&f.doc, f.i).unwrap(), Position::new(f.p1, 2));
        let root = f.doc.root();
        assert!(matches!(
            Position::before(&f.doc, root),
            Err(Error::InvalidNodeType(_))
        ));
    }

    #[test]
    fn positions_in_different_trees_do_not_compare() {
        let mut f = fixture();
        let orphan = f.doc.create_element("span");
        assert_eq!(
            compare(&f.doc, Position::new(orphan, 0), Position::new(f.ef, 0)),
            Err(Error::WrongDocument)
        );
    }

    #[test]
    fn validate_rejects_out_of_range_offsets() {
        let f = fixture();
        assert!(Position::new(f.cd, 2).is_valid(&f.doc));
        assert_eq!(
            Position::new(f.cd, 3).validate(&f.doc),
            Err(Error::IndexSize {
                offset: 3,
                length: 2
            })
        );
        assert!(Position::new(f.div, 2).is_valid(&f.doc));
        assert!(!Position::new(f.div, 3).is_valid(&f.doc));
    }

    #[test]
    fn boundaries_validate_order_and_attachment() {
        let mut f = fixture();
        let good = Boundaries::new(Position::new(f.ab, 1), Position::new(f.ef, 1));
        assert!(good.validate(&f.doc).is_ok());
        assert_eq!(good.common_ancestor(&f.doc), Some(f.div));

        let reversed = Boundaries::new(good.end, good.start);
        assert!(matches!(
            reversed.validate(&f.doc),
            Err(Error::InvalidState(_))
        ));

        f.doc.remove(f.p2);
        assert!(matches!(good.validate(&f.doc), Err(Error::InvalidState(_))));
    }

    #[test]
    fn positions_of_another_document_are_rejected() {
        let f = fixture();
        let other = fixture();
        // same arena slot as f.ab
        let foreign = Position::new(other.ab, 1);

        assert!(!foreign.is_valid(&f.doc));
        assert_eq!(foreign.validate(&f.doc), Err(Error::WrongDocument));
        assert_eq!(
            compare(&f.doc, Position::new(f.ab, 0), foreign),
            Err(Error::WrongDocument)
        );
        assert_eq!(Position::before(&f.doc, other.i), Err(Error::WrongDocument));
        assert_eq!(
            Boundaries::new(Position::new(f.ab, 0), foreign).validate(&f.doc),
            Err(Error::WrongDocument)
        );
        assert_eq!(
            Boundaries::new(Position::new(f.ab, 0), foreign).common_ancestor(&f.doc),
            None
        );
    }
}
