//! Debug markup for diagnostics and assertions.
//!
//! This is not a rendering layer: output is HTML-ish, escaped with
//! `html-escape`, and stable enough to compare trees in tests and logs.

use super::{Document, NodeId, NodeKind};

impl Document {
    /// Markup for a node and its subtree. Documents and fragments render
    /// their children only.
    pub fn to_markup(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_markup(id, &mut out);
        out
    }

    fn write_markup(&self, id: NodeId, out: &mut String) {
        match self.kind(id) {
            NodeKind::Document | NodeKind::DocumentFragment => self.write_children(id, out),
            NodeKind::Element { tag, attributes } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attributes {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&html_escape::encode_double_quoted_attribute(value));
                    out.push('"');
                }
                out.push('>');
                self.write_children(id, out);
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            NodeKind::Text => out.push_str(&html_escape::encode_text(&self.data(id))),
            NodeKind::CData => {
                out.push_str("<![CDATA[");
                out.push_str(&self.data(id));
                out.push_str("]]>");
            }
            NodeKind::Comment => {
                out.push_str("<!--");
                out.push_str(&self.data(id));
                out.push_str("-->");
            }
            NodeKind::ProcessingInstruction { target } => {
                out.push_str("<?");
                out.push_str(target);
                out.push(' ');
                out.push_str(&self.data(id));
                out.push_str("?>");
            }
            NodeKind::DocumentType { name } => {
                out.push_str("<!DOCTYPE ");
                out.push_str(name);
                out.push('>');
            }
        }
    }

    fn write_children(&self, id: NodeId, out: &mut String) {
        for &child in self.children(id) {
            self.write_markup(child, out);
        }
    }
}
