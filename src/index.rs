//! Timestamp lookup used to keep the secondary track in sync with the primary.
//!
//! Matching is by exact string equality on the timestamp field. There is no
//! interpolation and no nearest-neighbour tolerance: a miss means the secondary
//! has no data for that instant.

use std::collections::HashMap;

use crate::Sample;

/// First sample whose timestamp equals `timestamp` exactly.
///
/// Linear scan; [`TimestampIndex`] gives the same answers in O(1).
pub fn find_match<'a>(samples: &'a [Sample], timestamp: &str) -> Option<(usize, &'a Sample)> {
    samples
        .iter()
        .enumerate()
        .find(|(_, s)| s.timestamp == timestamp)
}

/// Hash index from timestamp string to the position of its first occurrence.
#[derive(Debug, Clone, Default)]
pub struct TimestampIndex {
    positions: HashMap<String, usize>,
}

impl TimestampIndex {
    /// Build the index. Later duplicates of a timestamp are ignored.
    pub fn build(samples: &[Sample]) -> Self {
        let mut positions = HashMap::with_capacity(samples.len());
        for (i, sample) in samples.iter().enumerate() {
            positions.entry(sample.timestamp.clone()).or_insert(i);
        }
        Self { positions }
    }

    /// Position of the first sample with exactly this timestamp.
    pub fn position(&self, timestamp: &str) -> Option<usize> {
        self.positions.get(timestamp).copied()
    }

    /// Same as [`find_match`], using the index.
    pub fn find<'a>(&self, samples: &'a [Sample], timestamp: &str) -> Option<(usize, &'a Sample)> {
        let i = self.position(timestamp)?;
        samples.get(i).map(|s| (i, s))
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
