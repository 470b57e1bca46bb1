use serde::{Deserialize, Serialize};

/// Counts runs of consecutive missing sequence numbers.
///
/// Bucket `i` counts runs of `i + 1` missing packets. The last bucket also
/// catches every longer run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GapHistogram {
    bins: Vec<u32>,
}

impl GapHistogram {
    pub fn new(num_bins: usize) -> Self {
        Self {
            bins: vec![0; num_bins.max(1)],
        }
    }

    /// Records an in-order arrival that advanced the highest sequence number
    /// by `gap`. Gaps below 2 carry no missing packets.
    pub fn update(&mut self, gap: u64) {
        if gap < 2 || self.bins.is_empty() {
            return;
        }

        let missing = gap - 1;
        let last = self.bins.len() - 1;
        let idx = usize::try_from(missing - 1).map_or(last, |i| i.min(last));
        self.bins[idx] = self.bins[idx].saturating_add(1);
    }

    pub fn bins(&self) -> &[u32] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Adds `other` bucket by bucket, growing to the longer of the two.
    pub fn merge(&mut self, other: &GapHistogram) {
        if other.bins.len() > self.bins.len() {
            self.bins.resize(other.bins.len(), 0);
        }
        for (bin, count) in self.bins.iter_mut().zip(other.bins.iter()) {
            *bin = bin.saturating_add(*count);
        }
    }
}

impl From<Vec<u32>> for GapHistogram {
    fn from(bins: Vec<u32>) -> Self {
        Self { bins }
    }
}
