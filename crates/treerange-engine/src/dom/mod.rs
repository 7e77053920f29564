//! # Document tree
//!
//! An ordered, rooted tree stored in a [`slotmap`] arena. Nodes are addressed
//! by [`NodeId`] and are never freed: removing a node detaches it from its
//! parent, after which it (and its subtree) may be re-inserted elsewhere.
//!
//! Handles are tagged with the document that allocated them. Fallible entry
//! points reject a foreign handle with [`Error::WrongDocument`]; the plain
//! navigation accessors (`kind`, `parent`, `children`, ...) panic on one.
//!
//! ## Live boundaries
//!
//! The document owns the registry of tracked boundary pairs used by live
//! ranges. Every mutation below rewrites the tracked positions that reference
//! the nodes it touches:
//!
//! - **remove**: positions inside the removed subtree move to the point where
//!   the node was; later offsets in the parent shift down by one.
//! - **insert**: later offsets in the parent shift up by the inserted count.
//! - **data replacement**: offsets inside the replaced span collapse to its
//!   start; offsets after it shift by the length difference.
//! - **split**: offsets past the split point move into the new node.
//! - **join**: positions in the absorbed node move into the kept node.
//!
//! Callers therefore never have to fix up other ranges after a structural
//! edit; only boundaries held outside the registry go stale.

mod live;
mod markup;
mod node;

use std::borrow::Cow;
use std::sync::atomic::{AtomicU64, Ordering};

use slotmap::SlotMap;
use uuid::Uuid;
use xi_rope::{Rope, delta::Builder};

use crate::error::{Error, Result};
use crate::position::{Boundaries, Position};

pub use live::RangeKey;
pub(crate) use live::LiveRanges;
pub use node::{NodeId, NodeKind};
pub(crate) use node::{NodeData, NodeKey};

static NEXT_TAG: AtomicU64 = AtomicU64::new(1);

/// A document tree together with the live boundaries that reference it.
#[derive(Debug, Clone)]
pub struct Document {
    id: Uuid,
    /// Stamped into every [`NodeId`] this document allocates.
    tag: u64,
    root: NodeId,
    nodes: SlotMap<NodeKey, NodeData>,
    live: LiveRanges,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document holding only its `Document` root node.
    pub fn new() -> Self {
        let tag = NEXT_TAG.fetch_add(1, Ordering::Relaxed);
        let mut nodes = SlotMap::with_key();
        let root = NodeId {
            key: nodes.insert(NodeData::new(NodeKind::Document, "")),
            doc: tag,
        };
        Self {
            id: Uuid::new_v4(),
            tag,
            root,
            nodes,
            live: LiveRanges::default(),
        }
    }

    /// Identity used to reject ranges and positions from other documents.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The first element child of the document node, if any.
    pub fn document_element(&self) -> Option<NodeId> {
        self.children(self.root)
            .iter()
            .copied()
            .find(|&c| matches!(self.kind(c), NodeKind::Element { .. }))
    }

    /// True when `id` was allocated by this document.
    pub fn contains(&self, id: NodeId) -> bool {
        id.doc == self.tag && self.nodes.contains_key(id.key)
    }

    /// Reject a node allocated by another document.
    pub fn check(&self, id: NodeId) -> Result<()> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(Error::WrongDocument)
        }
    }

    // ===== Construction =====

    fn alloc(&mut self, data: NodeData) -> NodeId {
        NodeId {
            key: self.nodes.insert(data),
            doc: self.tag,
        }
    }

    fn create(&mut self, kind: NodeKind, data: &str) -> NodeId {
        self.alloc(NodeData::new(kind, data))
    }

    pub fn create_element(&mut self, tag: impl Into<String>) -> NodeId {
        self.create(NodeKind::element(tag), "")
    }

    pub fn create_text(&mut self, data: &str) -> NodeId {
        self.create(NodeKind::Text, data)
    }

    pub fn create_cdata(&mut self, data: &str) -> NodeId {
        self.create(NodeKind::CData, data)
    }

    pub fn create_comment(&mut self, data: &str) -> NodeId {
        self.create(NodeKind::Comment, data)
    }

    pub fn create_processing_instruction(&mut self, target: &str, data: &str) -> NodeId {
        self.create(
            NodeKind::ProcessingInstruction {
                target: target.to_string(),
            },
            data,
        )
    }

    pub fn create_doctype(&mut self, name: &str) -> NodeId {
        self.create(
            NodeKind::DocumentType {
                name: name.to_string(),
            },
            "",
        )
    }

    pub fn create_fragment(&mut self) -> NodeId {
        self.create(NodeKind::DocumentFragment, "")
    }

    /// Create an element and append it to `parent`.
    pub fn append_element(&mut self, parent: NodeId, tag: &str) -> Result<NodeId> {
        let el = self.create_element(tag);
        self.append_child(parent, el)?;
        Ok(el)
    }

    /// Create a text node and append it to `parent`.
    pub fn append_text(&mut self, parent: NodeId, data: &str) -> Result<NodeId> {
        let text = self.create_text(data);
        self.append_child(parent, text)?;
        Ok(text)
    }

    pub fn set_attribute(&mut self, element: NodeId, name: &str, value: &str) -> Result<()> {
        self.check(element)?;
        match &mut self.node_mut(element).kind {
            NodeKind::Element { attributes, .. } => {
                match attributes.iter_mut().find(|(n, _)| n == name) {
                    Some((_, v)) => *v = value.to_string(),
                    None => attributes.push((name.to_string(), value.to_string())),
                }
                Ok(())
            }
            other => Err(Error::node_type(format!(
                "cannot set attribute on {}",
                other.name()
            ))),
        }
    }

    pub fn attribute(&self, element: NodeId, name: &str) -> Option<&str> {
        if !self.contains(element) {
            return None;
        }
        match &self.node(element).kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    // ===== Navigation =====

    /// # Panics
    ///
    /// Panics if `id` does not belong to this document.
    pub(crate) fn node(&self, id: NodeId) -> &NodeData {
        assert_eq!(id.doc, self.tag, "{id:?} belongs to another document");
        &self.nodes[id.key]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        assert_eq!(id.doc, self.tag, "{id:?} belongs to another document");
        &mut self.nodes[id.key]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn is_character_data(&self, id: NodeId) -> bool {
        self.kind(id).is_character_data()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn child_at(&self, id: NodeId, index: usize) -> Option<NodeId> {
        self.children(id).get(index).copied()
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        self.children(id).len()
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).first().copied()
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).last().copied()
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        self.child_at(parent, self.index(id) + 1)
    }

    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        self.index(id)
            .checked_sub(1)
            .and_then(|i| self.child_at(parent, i))
    }

    /// Index of `id` among its parent's children (0 for parentless nodes).
    pub fn index(&self, id: NodeId) -> usize {
        self.node(id)
            .parent
            .and_then(|p| self.children(p).iter().position(|&c| c == id))
            .unwrap_or(0)
    }

    /// DOM node length: data length for character data, child count otherwise.
    pub fn node_length(&self, id: NodeId) -> usize {
        self.node(id).length()
    }

    /// Character data of a node as text; empty for non character data.
    pub fn data(&self, id: NodeId) -> Cow<'_, str> {
        let data = &self.node(id).data;
        data.slice_to_cow(0..data.len())
    }

    /// Concatenated text and CDATA content of the subtree.
    pub fn text_content(&self, id: NodeId) -> String {
        self.descendants(id)
            .filter(|&n| self.kind(n).is_textual())
            .map(|n| self.data(n).into_owned())
            .collect()
    }

    /// The topmost inclusive ancestor of `id`.
    pub fn root_of(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// True when the node's tree is rooted at a document or a fragment.
    pub fn is_attached(&self, id: NodeId) -> bool {
        self.contains(id) && self.kind(self.root_of(id)).is_tree_root()
    }

    /// Inclusive ancestors, from `id` up to its root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(Some(id), move |&n| self.parent(n))
    }

    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        self.contains(ancestor)
            && self.contains(node)
            && is_inclusive_ancestor(&self.nodes, ancestor, node)
    }

    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        ancestor != node && self.is_inclusive_ancestor(ancestor, node)
    }

    /// The child of `ancestor` on the path up from `node`. With `self_ok` the
    /// node itself qualifies when it is a child of `ancestor`; otherwise the
    /// search starts at its parent.
    pub fn closest_ancestor_in(
        &self,
        node: NodeId,
        ancestor: NodeId,
        self_ok: bool,
    ) -> Option<NodeId> {
        if !self.contains(node) || !self.contains(ancestor) {
            return None;
        }
        let mut current = if self_ok { Some(node) } else { self.parent(node) };
        while let Some(n) = current {
            let parent = self.parent(n);
            if parent == Some(ancestor) {
                return Some(n);
            }
            current = parent;
        }
        None
    }

    /// The deepest node that is an inclusive ancestor of both `a` and `b`.
    pub fn common_ancestor(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        if !self.contains(a) || !self.contains(b) {
            return None;
        }
        let ancestors_of_a: Vec<NodeId> = self.ancestors(a).collect();
        self.ancestors(b).find(|n| ancestors_of_a.contains(n))
    }

    /// Pre-order walk of the subtree rooted at `id`, including `id`.
    pub fn descendants(&self, id: NodeId) -> Descendants<'_> {
        Descendants {
            doc: self,
            stack: vec![id],
        }
    }

    // ===== Tracked boundaries =====

    /// Register a boundary pair so that later mutations keep it up to date.
    pub fn track(&mut self, boundaries: Boundaries) -> RangeKey {
        self.live.track(boundaries)
    }

    pub fn untrack(&mut self, key: RangeKey) -> Option<Boundaries> {
        self.live.untrack(key)
    }

    pub fn tracked(&self, key: RangeKey) -> Option<Boundaries> {
        self.live.get(key)
    }

    /// Revision of a tracked pair; changes whenever its boundaries change.
    pub fn tracked_revision(&self, key: RangeKey) -> Option<u64> {
        self.live.revision(key)
    }

    pub(crate) fn set_tracked(&mut self, key: RangeKey, boundaries: Boundaries) -> bool {
        self.live.set(key, boundaries)
    }

    pub fn live_range_count(&self) -> usize {
        self.live.len()
    }

    // ===== Mutation =====

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.insert_before(parent, child, None)
    }

    /// Insert `child` into `parent` before `reference` (or at the end).
    ///
    /// A fragment inserts its children in order and is left empty. A node
    /// that already has a parent is removed from it first.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<()> {
        self.check(parent)?;
        self.check(child)?;
        if let Some(r) = reference {
            self.check(r)?;
        }
        self.ensure_insertable(parent, child, reference)?;

        let moving: Vec<NodeId> = if matches!(self.kind(child), NodeKind::DocumentFragment) {
            self.children(child).to_vec()
        } else {
            vec![child]
        };

        // Inserting a node before itself means inserting before its next sibling.
        let reference = match reference {
            Some(r) if r == child => self.next_sibling(r),
            other => other,
        };

        for &node in &moving {
            self.remove(node);
        }

        let index = match reference {
            Some(r) => self.index(r),
            None => self.child_count(parent),
        };
        let count = moving.len();
        self.live.rewrite(|pos| {
            if pos.node == parent && pos.offset > index {
                pos.offset += count;
            }
        });
        for (i, &node) in moving.iter().enumerate() {
            self.attach(parent, node, index + i);
        }
        log::trace!("inserted {count} node(s) into {parent:?} at {index}");
        Ok(())
    }

    pub(crate) fn ensure_insertable(
        &self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<()> {
        if !self.kind(parent).is_container() {
            return Err(Error::hierarchy(format!(
                "{} cannot have children",
                self.kind(parent).name()
            )));
        }
        if self.is_inclusive_ancestor(child, parent) {
            return Err(Error::hierarchy(
                "cannot insert a node into its own subtree",
            ));
        }
        if let Some(r) = reference
            && self.parent(r) != Some(parent)
        {
            return Err(Error::hierarchy(
                "reference node is not a child of the parent",
            ));
        }
        match self.kind(child) {
            NodeKind::Document => Err(Error::hierarchy("cannot insert a document node")),
            NodeKind::DocumentType { .. } if !matches!(self.kind(parent), NodeKind::Document) => {
                Err(Error::hierarchy("document type nodes belong under the document"))
            }
            NodeKind::Text | NodeKind::CData if matches!(self.kind(parent), NodeKind::Document) => {
                Err(Error::hierarchy("text cannot be a child of the document"))
            }
            _ => Ok(()),
        }
    }

    /// Detach `node` from its parent. Parentless and foreign nodes are left
    /// alone.
    pub fn remove(&mut self, node: NodeId) {
        if !self.contains(node) {
            return;
        }
        let Some(parent) = self.parent(node) else {
            return;
        };
        let index = self.index(node);
        let nodes = &self.nodes;
        self.live.rewrite(|pos| {
            if is_inclusive_ancestor(nodes, node, pos.node) {
                *pos = Position::new(parent, index);
            } else if pos.node == parent && pos.offset > index {
                pos.offset -= 1;
            }
        });
        self.detach(node);
        log::trace!("removed {node:?} from {parent:?} at {index}");
    }

    /// Replace `count` bytes at `offset` in a character data node with `data`.
    pub fn replace_data(
        &mut self,
        node: NodeId,
        offset: usize,
        count: usize,
        data: &str,
    ) -> Result<()> {
        self.ensure_character_data(node)?;
        let length = self.node_length(node);
        self.ensure_offset(node, offset)?;
        let end = offset.saturating_add(count).min(length);
        self.ensure_offset(node, end)?;
        let count = end - offset;

        let mut builder = Builder::new(length);
        builder.replace(offset..end, Rope::from(data));
        let delta = builder.build();
        let rope = delta.apply(&self.node(node).data);
        self.node_mut(node).data = rope;

        let inserted = data.len();
        self.live.rewrite(|pos| {
            if pos.node != node {
                return;
            }
            if pos.offset > offset && pos.offset <= offset + count {
                pos.offset = offset;
            } else if pos.offset > offset + count {
                pos.offset = pos.offset + inserted - count;
            }
        });
        Ok(())
    }

    pub fn insert_data(&mut self, node: NodeId, offset: usize, data: &str) -> Result<()> {
        self.replace_data(node, offset, 0, data)
    }

    pub fn delete_data(&mut self, node: NodeId, offset: usize, count: usize) -> Result<()> {
        self.replace_data(node, offset, count, "")
    }

    pub fn append_data(&mut self, node: NodeId, data: &str) -> Result<()> {
        self.check(node)?;
        let length = self.node_length(node);
        self.replace_data(node, length, 0, data)
    }

    /// Split a character data node at `offset`, returning the new second half.
    ///
    /// The new node is inserted after `node` when it has a parent. Positions
    /// past the split point follow the moved data.
    pub fn split_data(&mut self, node: NodeId, offset: usize) -> Result<NodeId> {
        self.ensure_character_data(node)?;
        self.ensure_offset(node, offset)?;
        let length = self.node_length(node);
        let tail = self.node(node).data.slice_to_cow(offset..length).into_owned();
        let kind = self.kind(node).clone();
        let new_node = self.create(kind, &tail);

        if let Some(parent) = self.parent(node) {
            let index = self.index(node);
            self.live.rewrite(|pos| {
                if pos.node == parent && pos.offset > index + 1 {
                    pos.offset += 1;
                }
            });
            self.attach(parent, new_node, index + 1);
            self.live.rewrite(|pos| {
                if pos.node == node && pos.offset > offset {
                    *pos = Position::new(new_node, pos.offset - offset);
                } else if pos.node == parent && pos.offset == index + 1 {
                    pos.offset += 1;
                }
            });
        } else {
            self.live.rewrite(|pos| {
                if pos.node == node && pos.offset > offset {
                    *pos = Position::new(new_node, pos.offset - offset);
                }
            });
        }

        let mut builder = Builder::new(length);
        builder.delete(offset..length);
        let delta = builder.build();
        let rope = delta.apply(&self.node(node).data);
        self.node_mut(node).data = rope;
        log::trace!("split {node:?} at {offset} into {new_node:?}");
        Ok(new_node)
    }

    /// Merge the adjacent sibling `absorb` into `keep` and remove `absorb`.
    ///
    /// Both must be character data of the same kind sharing a parent, with
    /// `absorb` immediately before or after `keep`.
    pub fn join_data(&mut self, keep: NodeId, absorb: NodeId) -> Result<()> {
        self.check(absorb)?;
        self.ensure_character_data(keep)?;
        if !self.kind(keep).same_kind(self.kind(absorb)) {
            return Err(Error::node_type("cannot join character data of different kinds"));
        }
        let parent = match (self.parent(keep), self.parent(absorb)) {
            (Some(a), Some(b)) if a == b => a,
            _ => return Err(Error::hierarchy("joined nodes must be siblings")),
        };
        let keep_index = self.index(keep);
        let absorb_index = self.index(absorb);
        let keep_len = self.node_length(keep);
        let absorb_len = self.node_length(absorb);
        let absorbed = self.data(absorb).into_owned();

        if absorb_index == keep_index + 1 {
            let mut builder = Builder::new(keep_len);
            builder.replace(keep_len..keep_len, Rope::from(absorbed.as_str()));
            let rope = builder.build().apply(&self.node(keep).data);
            self.node_mut(keep).data = rope;
            self.live.rewrite(|pos| {
                if pos.node == absorb {
                    *pos = Position::new(keep, keep_len + pos.offset);
                } else if pos.node == parent && pos.offset == absorb_index {
                    *pos = Position::new(keep, keep_len);
                }
            });
        } else if absorb_index + 1 == keep_index {
            let mut builder = Builder::new(keep_len);
            builder.replace(0..0, Rope::from(absorbed.as_str()));
            let rope = builder.build().apply(&self.node(keep).data);
            self.node_mut(keep).data = rope;
            self.live.rewrite(|pos| {
                if pos.node == keep {
                    pos.offset += absorb_len;
                } else if pos.node == absorb {
                    pos.node = keep;
                } else if pos.node == parent && pos.offset == keep_index {
                    *pos = Position::new(keep, absorb_len);
                }
            });
        } else {
            return Err(Error::hierarchy("joined nodes must be adjacent"));
        }

        self.remove(absorb);
        log::trace!("joined {absorb:?} into {keep:?}");
        Ok(())
    }

    /// Copy a node (and with `deep`, its subtree) into a new parentless node.
    pub fn clone_node(&mut self, id: NodeId, deep: bool) -> NodeId {
        let data = {
            let source = self.node(id);
            NodeData {
                kind: source.kind.clone(),
                data: source.data.clone(),
                parent: None,
                children: Vec::new(),
            }
        };
        let copy = self.alloc(data);
        if deep {
            let children = self.children(id).to_vec();
            for (i, child) in children.into_iter().enumerate() {
                let child_copy = self.clone_node(child, true);
                self.attach(copy, child_copy, i);
            }
        }
        copy
    }

    fn attach(&mut self, parent: NodeId, child: NodeId, index: usize) {
        self.node_mut(parent).children.insert(index, child);
        self.node_mut(child).parent = Some(parent);
    }

    fn detach(&mut self, child: NodeId) {
        if let Some(parent) = self.node_mut(child).parent.take() {
            self.node_mut(parent).children.retain(|&c| c != child);
        }
    }

    fn ensure_character_data(&self, node: NodeId) -> Result<()> {
        self.check(node)?;
        if self.is_character_data(node) {
            Ok(())
        } else {
            Err(Error::node_type(format!(
                "{} is not character data",
                self.kind(node).name()
            )))
        }
    }

    /// Offsets into character data must land on a code point boundary.
    pub(crate) fn ensure_offset(&self, node: NodeId, offset: usize) -> Result<()> {
        let length = self.node_length(node);
        let on_boundary = !self.is_character_data(node)
            || offset >= length
            || self.data(node).is_char_boundary(offset);
        if offset > length || !on_boundary {
            return Err(Error::IndexSize { offset, length });
        }
        Ok(())
    }
}

fn is_inclusive_ancestor(nodes: &SlotMap<NodeKey, NodeData>, ancestor: NodeId, node: NodeId) -> bool {
    let mut current = Some(node);
    while let Some(n) = current {
        if n == ancestor {
            return true;
        }
        current = nodes.get(n.key).and_then(|d| d.parent);
    }
    false
}

/// Pre-order iterator over a subtree.
pub struct Descendants<'a> {
    doc: &'a Document,
    stack: Vec<NodeId>,
}

impl Iterator for Descendants<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let node = self.stack.pop()?;
        self.stack
            .extend(self.doc.children(node).iter().rev().copied());
        Some(node)
    }
}
