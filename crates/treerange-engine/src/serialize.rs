//! Text form of ranges and selections, for saving and restoring them
//! across sessions over an unchanged tree.
//!
//! A position is the path of child indices from a root node down to its
//! container, then `:offset`: `"0/2:3"` is offset 3 in the third child of
//! the root's first child, and `":1"` is offset 1 in the root itself. A
//! range is `start,end`, optionally followed by `{checksum}`, a truncated
//! SHA-256 of the root subtree's shape. A selection is its ranges joined
//! with `|`.
//!
//! The root defaults to the document element, or the document node when
//! there is none.

use std::cmp::Ordering;
use std::fmt::Write as _;
use std::sync::OnceLock;

use regex::Regex;
use sha2::{Digest, Sha256};
use treerange_config::{MAX_CHECKSUM_LEN, SerializationConfig};

use crate::dom::{Document, NodeId};
use crate::error::{Error, Result};
use crate::position::{Boundaries, Position, compare};
use crate::range::{Range, RangeBackend};
use crate::selection::{SelectionBackend, SelectionSet};

const PATH_SEPARATOR: char = '/';
const OFFSET_SEPARATOR: char = ':';
const RANGE_SEPARATOR: char = '|';

fn range_regex() -> &'static Regex {
    static RANGE_REGEX: OnceLock<Regex> = OnceLock::new();
    RANGE_REGEX.get_or_init(|| {
        Regex::new(r"^([^,]+),([^,\{]+)(\{([^}]+)\})?$").expect("Invalid serialized range regex")
    })
}

fn root_or_default(doc: &Document, root: Option<NodeId>) -> Result<NodeId> {
    let root = root.or_else(|| doc.document_element()).unwrap_or(doc.root());
    doc.check(root)?;
    Ok(root)
}

// ===== Positions =====

pub fn serialize_position(doc: &Document, pos: Position, root: Option<NodeId>) -> Result<String> {
    let root = root_or_default(doc, root)?;
    doc.check(pos.node)?;
    let mut path = Vec::new();
    let mut node = pos.node;
    while node != root {
        let parent = doc.parent(node).ok_or_else(|| {
            Error::serialization(&doc.kind(pos.node).name(), "position is not inside the root")
        })?;
        path.push(doc.index(node).to_string());
        node = parent;
    }
    path.reverse();
    Ok(format!(
        "{}{OFFSET_SEPARATOR}{}",
        path.join(&PATH_SEPARATOR.to_string()),
        pos.offset
    ))
}

pub fn deserialize_position(doc: &Document, serialized: &str, root: Option<NodeId>) -> Result<Position> {
    let root = root_or_default(doc, root)?;
    let (path, offset) = serialized
        .split_once(OFFSET_SEPARATOR)
        .ok_or_else(|| Error::serialization(serialized, "missing offset"))?;

    let mut node = root;
    if !path.is_empty() {
        for part in path.split(PATH_SEPARATOR) {
            let index: usize = part
                .parse()
                .map_err(|_| Error::serialization(serialized, format!("bad child index {part:?}")))?;
            node = doc
                .child_at(node, index)
                .ok_or_else(|| Error::serialization(serialized, format!("no child at index {index}")))?;
        }
    }

    let offset: usize = offset
        .parse()
        .map_err(|_| Error::serialization(serialized, format!("bad offset {offset:?}")))?;
    let pos = Position::new(node, offset);
    pos.validate(doc)
        .map_err(|e| Error::serialization(serialized, e.to_string()))?;
    Ok(pos)
}

// ===== Checksums =====

/// Full hex SHA-256 of the shape of the subtree at `root`: kind, name and
/// length of every node in document order. Attributes and character data
/// content do not contribute, only character data lengths.
pub fn checksum(doc: &Document, root: NodeId) -> Result<String> {
    doc.check(root)?;
    let mut shape = String::new();
    for node in doc.descendants(root) {
        let kind = doc.kind(node);
        let _ = write!(shape, "{}:{}:{};", kind.type_code(), kind.name(), doc.node_length(node));
    }
    Ok(format!("{:x}", Sha256::digest(shape.as_bytes())))
}

fn verify_checksum(doc: &Document, root: NodeId, serialized: &str, expected: &str) -> Result<()> {
    if expected.is_empty() || expected.len() > MAX_CHECKSUM_LEN {
        return Err(Error::serialization(serialized, "checksum has the wrong length"));
    }
    let actual = checksum(doc, root)?;
    let actual = &actual[..expected.len()];
    if !actual.eq_ignore_ascii_case(expected) {
        log::debug!("checksum mismatch for {serialized:?}: {expected} vs {actual}");
        return Err(Error::ChecksumMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

// ===== Ranges =====

pub fn serialize_range<B: RangeBackend>(
    doc: &Document,
    range: &Range<B>,
    root: Option<NodeId>,
    options: &SerializationConfig,
) -> Result<String> {
    let root = root_or_default(doc, root)?;
    let b = range.boundaries(doc)?;
    let inside = b
        .common_ancestor(doc)
        .is_some_and(|ancestor| doc.is_inclusive_ancestor(root, ancestor));
    if !inside {
        return Err(Error::serialization(
            &format!("{b:?}"),
            "range is not inside the serialization root",
        ));
    }

    let mut out = format!(
        "{},{}",
        serialize_position(doc, b.start, Some(root))?,
        serialize_position(doc, b.end, Some(root))?
    );
    if options.include_checksum {
        let sum = checksum(doc, root)?;
        let len = options.checksum_len.clamp(1, MAX_CHECKSUM_LEN);
        let _ = write!(out, "{{{}}}", &sum[..len]);
    }
    Ok(out)
}

fn parse_range(doc: &Document, serialized: &str, root: Option<NodeId>) -> Result<Boundaries> {
    let root = root_or_default(doc, root)?;
    let caps = range_regex()
        .captures(serialized)
        .ok_or_else(|| Error::serialization(serialized, "expected start,end{checksum}"))?;
    if let Some(expected) = caps.get(4) {
        verify_checksum(doc, root, serialized, expected.as_str())?;
    }
    let start = deserialize_position(doc, &caps[1], Some(root))?;
    let end = deserialize_position(doc, &caps[2], Some(root))?;
    if compare(doc, start, end)? == Ordering::Greater {
        return Err(Error::serialization(serialized, "start is after end"));
    }
    Ok(Boundaries::new(start, end))
}

pub fn deserialize_range<B: RangeBackend>(
    doc: &mut Document,
    serialized: &str,
    root: Option<NodeId>,
) -> Result<Range<B>> {
    let boundaries = parse_range(doc, serialized, root)?;
    Range::from_boundaries(doc, boundaries)
}

/// True when `serialized` parses, its checksum (if any) matches and both
/// positions exist in the tree.
pub fn can_deserialize_range(doc: &Document, serialized: &str, root: Option<NodeId>) -> bool {
    parse_range(doc, serialized, root).is_ok()
}

// ===== Selections =====

pub fn serialize_selection<S: SelectionBackend>(
    doc: &mut Document,
    selection: &mut SelectionSet<S>,
    root: Option<NodeId>,
    options: &SerializationConfig,
) -> Result<String> {
    let ranges = selection.get_all_ranges::<crate::range::Snapshot>(doc)?;
    let parts = ranges
        .iter()
        .map(|r| serialize_range(doc, r, root, options))
        .collect::<Result<Vec<_>>>()?;
    Ok(parts.join(&RANGE_SEPARATOR.to_string()))
}

/// Replace the ranges of `selection` with the serialized ones. Nothing
/// changes unless every range deserializes; an empty string clears the
/// selection.
pub fn deserialize_selection<S: SelectionBackend>(
    doc: &mut Document,
    selection: &mut SelectionSet<S>,
    serialized: &str,
    root: Option<NodeId>,
) -> Result<()> {
    if serialized.is_empty() {
        return selection.remove_all_ranges(doc);
    }
    let all = serialized
        .split(RANGE_SEPARATOR)
        .map(|part| parse_range(doc, part, root))
        .collect::<Result<Vec<_>>>()?;
    let ranges = all
        .into_iter()
        .map(|b| crate::range::StaticRange::from_boundaries(doc, b))
        .collect::<Result<Vec<_>>>()?;
    selection.set_ranges(doc, &ranges)
}
