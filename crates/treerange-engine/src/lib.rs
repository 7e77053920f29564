pub mod content;
pub mod dom;
pub mod error;
pub mod iterator;
pub mod position;
pub mod range;
pub mod selection;
pub mod serialize;

// Re-export key types for easier usage
pub use dom::{Document, NodeId, NodeKind};
pub use error::{Error, Result};
pub use iterator::{Item, SubtreeIterator, iterate_subtree};
pub use position::{Boundaries, Position, compare};
pub use range::{How, LiveRange, Range, RangeBackend, Snapshot, StaticRange, Tracked};
pub use selection::{BackendCapabilities, MemoryBackend, SelectionBackend, SelectionSet};
pub use serialize::*;
pub use treerange_config::{Config, SelectionConfig, SerializationConfig};
