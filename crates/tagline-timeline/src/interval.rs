//! Interval index over one track's tags.
//!
//! Entries are sorted by start time and treated as an implicit balanced
//! binary search tree: the root of any range `[lo, hi)` is its midpoint.
//! Each node carries the maximum end time of its subtree, so a query can
//! prune whole subtrees that end before the query window or start after it.
//!
//! The index is immutable. A track that changes builds a new index and
//! swaps it in; a query never sees a partially built structure.

use smallvec::SmallVec;
use tracing::warn;

use crate::tag::Tag;

/// Tracks with fewer well-formed tags than this are scanned linearly.
pub const DEFAULT_LINEAR_THRESHOLD: usize = 32;

/// Positions (in the owning track's tag list) returned by a query.
pub type SlotList = SmallVec<[usize; 8]>;

#[derive(Debug, Clone, Copy)]
struct Entry {
    start: f64,
    end: f64,
    slot: usize,
}

#[derive(Debug, Clone, Default)]
pub struct IntervalIndex {
    entries: Vec<Entry>,
    /// `max_end[mid]` is the largest end time in the subtree rooted at `mid`.
    max_end: Vec<f64>,
    skipped: usize,
    linear: bool,
}

impl IntervalIndex {
    /// Build an index over `tags`. Tags with non-finite or inverted
    /// intervals are skipped and counted in [`skipped`](Self::skipped).
    pub fn build(tags: &[Tag], linear_threshold: usize) -> Self {
        let mut entries: Vec<Entry> = Vec::with_capacity(tags.len());
        let mut skipped = 0;
        for (slot, tag) in tags.iter().enumerate() {
            if tag.is_well_formed() {
                entries.push(Entry {
                    start: tag.start_time,
                    end: tag.end_time,
                    slot,
                });
            } else {
                skipped += 1;
            }
        }
        if skipped > 0 {
            warn!(skipped, total = tags.len(), "Skipped malformed tag intervals");
        }

        entries.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.slot.cmp(&b.slot)));

        let linear = entries.len() < linear_threshold;
        let mut max_end = Vec::new();
        if !linear {
            max_end = vec![f64::NEG_INFINITY; entries.len()];
            fill_max_end(&entries, &mut max_end, 0, entries.len());
        }

        Self {
            entries,
            max_end,
            skipped,
            linear,
        }
    }

    /// Slots of every tag whose `[start, end]` overlaps the closed window
    /// `[t0, t1]`. Order is unspecified; each slot appears once.
    pub fn query(&self, t0: f64, t1: f64) -> SlotList {
        let mut out = SlotList::new();
        if t0.is_nan() || t1.is_nan() {
            return out;
        }
        let (t0, t1) = if t0 <= t1 { (t0, t1) } else { (t1, t0) };
        if self.linear {
            out.extend(
                self.entries
                    .iter()
                    .filter(|e| e.start <= t1 && e.end >= t0)
                    .map(|e| e.slot),
            );
        } else {
            self.collect(0, self.entries.len(), t0, t1, &mut out);
        }
        out
    }

    /// Slots of every tag active at `t`.
    #[inline]
    pub fn query_point(&self, t: f64) -> SlotList {
        self.query(t, t)
    }

    fn collect(&self, lo: usize, hi: usize, t0: f64, t1: f64, out: &mut SlotList) {
        if lo >= hi {
            return;
        }
        let mid = lo + (hi - lo) / 2;
        if self.max_end[mid] < t0 {
            return;
        }
        self.collect(lo, mid, t0, t1, out);

        let entry = self.entries[mid];
        if entry.start > t1 {
            // Everything to the right starts even later.
            return;
        }
        if entry.end >= t0 {
            out.push(entry.slot);
        }
        self.collect(mid + 1, hi, t0, t1, out);
    }

    /// Number of indexed (well-formed) tags.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of tags left out of the index because their interval was
    /// malformed. They are still held by the store.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Whether queries use the linear fallback.
    pub fn is_linear(&self) -> bool {
        self.linear
    }
}

fn fill_max_end(entries: &[Entry], max_end: &mut [f64], lo: usize, hi: usize) -> f64 {
    if lo >= hi {
        return f64::NEG_INFINITY;
    }
    let mid = lo + (hi - lo) / 2;
    let left = fill_max_end(entries, max_end, lo, mid);
    let right = fill_max_end(entries, max_end, mid + 1, hi);
    let m = entries[mid].end.max(left).max(right);
    max_end[mid] = m;
    m
}
