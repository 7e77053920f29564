//! Point and range containment, intersection and union.

use std::cmp::Ordering;

use crate::dom::{Document, NodeId};
use crate::error::{Error, Result};
use crate::position::{Boundaries, Position, compare};

use super::{Range, RangeBackend};

impl<B: RangeBackend> Range<B> {
    /// Where `(node, offset)` lies relative to the range: `Less` before the
    /// start, `Greater` after the end, `Equal` inside (boundaries included).
    pub fn compare_point(&self, doc: &Document, node: NodeId, offset: usize) -> Result<Ordering> {
        let b = self.boundaries(doc)?;
        let point = Position::new(node, offset);
        point.validate(doc)?;
        if doc.root_of(node) != doc.root_of(b.start.node) {
            return Err(Error::WrongDocument);
        }
        if compare(doc, point, b.start)? == Ordering::Less {
            Ok(Ordering::Less)
        } else if compare(doc, point, b.end)? == Ordering::Greater {
            Ok(Ordering::Greater)
        } else {
            Ok(Ordering::Equal)
        }
    }

    /// False for points in other trees rather than an error.
    pub fn is_point_in_range(&self, doc: &Document, node: NodeId, offset: usize) -> Result<bool> {
        let b = self.boundaries(doc)?;
        doc.check(node)?;
        if doc.root_of(node) != doc.root_of(b.start.node) {
            return Ok(false);
        }
        Ok(self.compare_point(doc, node, offset)? == Ordering::Equal)
    }

    /// True when any part of `node` lies in the range. With `touching`, a
    /// node that merely meets a boundary counts.
    pub fn intersects_node(&self, doc: &Document, node: NodeId, touching: bool) -> Result<bool> {
        let b = self.boundaries(doc)?;
        doc.check(node)?;
        if doc.root_of(node) != doc.root_of(b.start.node) {
            return Ok(false);
        }
        let (Ok(before), Ok(after)) = (Position::before(doc, node), Position::after(doc, node)) else {
            // the tree root intersects every range in its tree
            return Ok(true);
        };
        let starts = compare(doc, before, b.end)?;
        let ends = compare(doc, after, b.start)?;
        Ok(if touching {
            starts != Ordering::Greater && ends != Ordering::Less
        } else {
            starts == Ordering::Less && ends == Ordering::Greater
        })
    }

    /// With `partial`, any overlap counts; otherwise the whole node must lie
    /// within the range.
    pub fn contains_node(&self, doc: &Document, node: NodeId, partial: bool) -> Result<bool> {
        if partial {
            return self.intersects_node(doc, node, false);
        }
        let before = Position::before(doc, node)?;
        let after = Position::after(doc, node)?;
        Ok(self.compare_point(doc, before.node, before.offset)? == Ordering::Equal
            && self.compare_point(doc, after.node, after.offset)? == Ordering::Equal)
    }

    pub fn contains_node_contents(&self, doc: &Document, node: NodeId) -> Result<bool> {
        Ok(self.compare_point(doc, node, 0)? != Ordering::Less
            && self.compare_point(doc, node, doc.node_length(node))? != Ordering::Greater)
    }

    /// True when the ranges overlap. With `touching`, ranges that share only
    /// a boundary point count as well.
    pub fn intersects_range<C: RangeBackend>(
        &self,
        doc: &Document,
        other: &Range<C>,
        touching: bool,
    ) -> Result<bool> {
        let (this, that) = self.paired(doc, other)?;
        let starts = compare(doc, this.start, that.end)?;
        let ends = compare(doc, this.end, that.start)?;
        Ok(if touching {
            starts != Ordering::Greater && ends != Ordering::Less
        } else {
            starts == Ordering::Less && ends == Ordering::Greater
        })
    }

    /// The overlap of two ranges, or `None` when they do not overlap.
    pub fn intersection<C: RangeBackend>(
        &self,
        doc: &mut Document,
        other: &Range<C>,
    ) -> Result<Option<Self>> {
        match self.intersection_boundaries(doc, other)? {
            Some(b) => Ok(Some(Self::from_parts(doc, b))),
            None => Ok(None),
        }
    }

    /// The smallest range covering both ranges. They must overlap or touch.
    pub fn union<C: RangeBackend>(&self, doc: &mut Document, other: &Range<C>) -> Result<Self> {
        if !self.intersects_range(doc, other, true)? {
            return Err(Error::BadBoundaryPoints(
                "ranges neither intersect nor touch".to_string(),
            ));
        }
        let (this, that) = self.paired(doc, other)?;
        let start = if compare(doc, that.start, this.start)? == Ordering::Less {
            that.start
        } else {
            this.start
        };
        let end = if compare(doc, that.end, this.end)? == Ordering::Greater {
            that.end
        } else {
            this.end
        };
        Ok(Self::from_parts(doc, Boundaries::new(start, end)))
    }

    /// True when `other` lies entirely within this range.
    pub fn contains_range<C: RangeBackend>(&self, doc: &Document, other: &Range<C>) -> Result<bool> {
        Ok(self.intersection_boundaries(doc, other)? == Some(other.boundaries(doc)?))
    }

    fn intersection_boundaries<C: RangeBackend>(
        &self,
        doc: &Document,
        other: &Range<C>,
    ) -> Result<Option<Boundaries>> {
        if !self.intersects_range(doc, other, false)? {
            return Ok(None);
        }
        let (mut b, that) = self.paired(doc, other)?;
        if compare(doc, b.start, that.start)? == Ordering::Less {
            b.start = that.start;
        }
        if compare(doc, b.end, that.end)? == Ordering::Greater {
            b.end = that.end;
        }
        Ok(Some(b))
    }

    /// Boundaries of both ranges, which must share a tree.
    fn paired<C: RangeBackend>(
        &self,
        doc: &Document,
        other: &Range<C>,
    ) -> Result<(Boundaries, Boundaries)> {
        let this = self.boundaries(doc)?;
        let that = other.boundaries(doc)?;
        if doc.root_of(this.start.node) != doc.root_of(that.start.node) {
            return Err(Error::WrongDocument);
        }
        Ok((this, that))
    }
}
