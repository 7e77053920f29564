use serde::{Deserialize, Serialize};
use xi_rope::Rope;

slotmap::new_key_type! {
    pub(crate) struct NodeKey;
}

/// Handle to a node in a [`Document`](super::Document) arena.
///
/// A handle carries the tag of the document that allocated it. Arena slots of
/// two documents overlap, so the tag is what tells a foreign node apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId {
    pub(crate) key: NodeKey,
    pub(crate) doc: u64,
}

/// The kind of a tree node.
///
/// Containers hold ordered children, character data holds a text buffer, and
/// a document type node is indivisible: it can neither hold a boundary nor be
/// part of range content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Document,
    DocumentFragment,
    DocumentType {
        name: String,
    },
    Element {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    Text,
    CData,
    Comment,
    ProcessingInstruction {
        target: String,
    },
}

impl NodeKind {
    pub fn element(tag: impl Into<String>) -> Self {
        NodeKind::Element {
            tag: tag.into(),
            attributes: Vec::new(),
        }
    }

    pub fn is_character_data(&self) -> bool {
        matches!(
            self,
            NodeKind::Text | NodeKind::CData | NodeKind::Comment | NodeKind::ProcessingInstruction { .. }
        )
    }

    pub fn is_container(&self) -> bool {
        matches!(
            self,
            NodeKind::Document | NodeKind::DocumentFragment | NodeKind::Element { .. }
        )
    }

    /// Text-bearing kinds whose data contributes to a range's text.
    pub fn is_textual(&self) -> bool {
        matches!(self, NodeKind::Text | NodeKind::CData)
    }

    /// Roots that count as a tree a range may live in.
    pub fn is_tree_root(&self) -> bool {
        matches!(self, NodeKind::Document | NodeKind::DocumentFragment)
    }

    /// True when both kinds share a variant, ignoring payload.
    pub fn same_kind(&self, other: &NodeKind) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }

    /// Node name in the DOM sense (`#text`, `P`, ...), used in checksums and diagnostics.
    pub fn name(&self) -> String {
        match self {
            NodeKind::Document => "#document".to_string(),
            NodeKind::DocumentFragment => "#document-fragment".to_string(),
            NodeKind::DocumentType { name } => name.clone(),
            NodeKind::Element { tag, .. } => tag.to_ascii_uppercase(),
            NodeKind::Text => "#text".to_string(),
            NodeKind::CData => "#cdata-section".to_string(),
            NodeKind::Comment => "#comment".to_string(),
            NodeKind::ProcessingInstruction { target } => target.clone(),
        }
    }

    /// Numeric node type as used by the DOM (1 = element, 3 = text, ...).
    pub fn type_code(&self) -> u8 {
        match self {
            NodeKind::Element { .. } => 1,
            NodeKind::Text => 3,
            NodeKind::CData => 4,
            NodeKind::ProcessingInstruction { .. } => 7,
            NodeKind::Comment => 8,
            NodeKind::Document => 9,
            NodeKind::DocumentType { .. } => 10,
            NodeKind::DocumentFragment => 11,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct NodeData {
    pub(crate) kind: NodeKind,
    /// Character data buffer; empty for every other kind.
    pub(crate) data: Rope,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl NodeData {
    pub(crate) fn new(kind: NodeKind, data: &str) -> Self {
        Self {
            kind,
            data: Rope::from(data),
            parent: None,
            children: Vec::new(),
        }
    }

    pub(crate) fn length(&self) -> usize {
        if self.kind.is_character_data() {
            self.data.len()
        } else if self.kind.is_container() {
            self.children.len()
        } else {
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn character_data_kinds() {
        assert!(NodeKind::Text.is_character_data());
        assert!(NodeKind::Comment.is_character_data());
        assert!(
            NodeKind::ProcessingInstruction {
                target: "xml".into()
            }
            .is_character_data()
        );
        assert!(!NodeKind::element("p").is_character_data());
        assert!(
            !NodeKind::DocumentType {
                name: "html".into()
            }
            .is_container()
        );
    }

    #[test]
    fn same_kind_ignores_payload() {
        assert!(NodeKind::element("p").same_kind(&NodeKind::element("b")));
        assert!(!NodeKind::Text.same_kind(&NodeKind::Comment));
    }

    #[test]
    fn length_depends_on_kind() {
        let text = NodeData::new(NodeKind::Text, "hello");
        assert_eq!(text.length(), 5);

        let doctype = NodeData::new(
            NodeKind::DocumentType {
                name: "html".into(),
            },
            "",
        );
        assert_eq!(doctype.length(), 0);
    }
}
