//! Registry of boundary pairs kept up to date across tree mutations.
//!
//! Every mutation performed through [`Document`](super::Document) walks this
//! registry and rewrites the positions that reference the mutated nodes, so
//! all live ranges (and the selection built on them) alias one tree.

use slotmap::SlotMap;

use crate::position::{Boundaries, Position};

slotmap::new_key_type! {
    /// Handle to a tracked boundary pair.
    pub struct RangeKey;
}

#[derive(Debug, Clone)]
struct Tracked {
    boundaries: Boundaries,
    /// Bumped whenever the boundaries change, by a setter or by a mutation.
    revision: u64,
}

#[derive(Debug, Default, Clone)]
pub(crate) struct LiveRanges {
    entries: SlotMap<RangeKey, Tracked>,
}

impl LiveRanges {
    pub(crate) fn track(&mut self, boundaries: Boundaries) -> RangeKey {
        self.entries.insert(Tracked {
            boundaries,
            revision: 0,
        })
    }

    pub(crate) fn untrack(&mut self, key: RangeKey) -> Option<Boundaries> {
        self.entries.remove(key).map(|t| t.boundaries)
    }

    pub(crate) fn get(&self, key: RangeKey) -> Option<Boundaries> {
        self.entries.get(key).map(|t| t.boundaries)
    }

    pub(crate) fn revision(&self, key: RangeKey) -> Option<u64> {
        self.entries.get(key).map(|t| t.revision)
    }

    /// Replace the boundaries of a tracked pair. Returns false for unknown keys.
    pub(crate) fn set(&mut self, key: RangeKey, boundaries: Boundaries) -> bool {
        match self.entries.get_mut(key) {
            Some(tracked) => {
                if tracked.boundaries != boundaries {
                    tracked.boundaries = boundaries;
                    tracked.revision += 1;
                }
                true
            }
            None => false,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Apply `f` to every tracked start and end position.
    pub(crate) fn rewrite(&mut self, mut f: impl FnMut(&mut Position)) {
        for tracked in self.entries.values_mut() {
            let before = tracked.boundaries;
            f(&mut tracked.boundaries.start);
            f(&mut tracked.boundaries.end);
            if tracked.boundaries != before {
                tracked.revision += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{NodeId, NodeKey};
    use slotmap::KeyData;

    fn node(n: u64) -> NodeId {
        NodeId {
            key: NodeKey::from(KeyData::from_ffi(n | (1 << 32))),
            doc: 0,
        }
    }

    fn pair(a: usize, b: usize) -> Boundaries {
        Boundaries::new(Position::new(node(1), a), Position::new(node(1), b))
    }

    #[test]
    fn set_bumps_revision_only_on_change() {
        let mut live = LiveRanges::default();
        let key = live.track(pair(0, 1));
        assert_eq!(live.revision(key), Some(0));

        assert!(live.set(key, pair(0, 1)));
        assert_eq!(live.revision(key), Some(0));

        assert!(live.set(key, pair(0, 2)));
        assert_eq!(live.revision(key), Some(1));
    }

    #[test]
    fn rewrite_touches_both_ends() {
        let mut live = LiveRanges::default();
        let key = live.track(pair(2, 4));
        live.rewrite(|pos| pos.offset += 1);

        assert_eq!(live.get(key), Some(pair(3, 5)));
        assert_eq!(live.revision(key), Some(1));
    }

    #[test]
    fn untrack_forgets_key() {
        let mut live = LiveRanges::default();
        let key = live.track(pair(0, 0));
        assert_eq!(live.untrack(key), Some(pair(0, 0)));
        assert!(live.get(key).is_none());
        assert!(!live.set(key, pair(1, 1)));
        assert_eq!(live.len(), 0);
    }
}
