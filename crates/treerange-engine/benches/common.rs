// Benchmark helper functions - Rust's dead code analysis doesn't understand
// that these are used by benchmark files in the same directory
// See: https://users.rust-lang.org/t/cargo-rustc-benches-awarnings/110111/2
use treerange_engine::{Document, NodeId};

/// `sections` sibling `<section>`s under one `<body>`, each holding `depth`
/// nested `<div>`s with a paragraph of mixed text and inline markup at every
/// level.
#[allow(dead_code)]
pub fn generate_document(sections: usize, depth: usize) -> (Document, NodeId) {
    let mut doc = Document::new();
    let root = doc.root();
    let body = doc.append_element(root, "body").unwrap();
    for section in 0..sections {
        let mut parent = doc.append_element(body, "section").unwrap();
        for level in 0..depth {
            let p = doc.append_element(parent, "p").unwrap();
            doc.append_text(p, &format!("Section {section} level {level} ")).unwrap();
            let b = doc.append_element(p, "b").unwrap();
            doc.append_text(b, "bold").unwrap();
            doc.append_text(p, " tail text.").unwrap();
            parent = doc.append_element(parent, "div").unwrap();
        }
    }
    (doc, body)
}

/// The first and last text nodes under `root`.
#[allow(dead_code)]
pub fn text_extremes(doc: &Document, root: NodeId) -> (NodeId, NodeId) {
    let texts: Vec<NodeId> = doc
        .descendants(root)
        .filter(|&n| doc.kind(n).is_textual())
        .collect();
    (texts[0], texts[texts.len() - 1])
}
