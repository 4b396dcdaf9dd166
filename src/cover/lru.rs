//! In-memory cover LRU (component F, §4.6).
//!
//! A flat array of up to 20 slots. Lookup is a linear scan over
//! `filepath` — deliberately not a `HashMap`: the original scans an array
//! of the same small fixed size, and at n≤20 a linear scan is both
//! simpler and not meaningfully slower. Insertion picks the first empty
//! slot, or evicts the slot with the smallest `timestamp`.

use std::sync::Arc;

use super::CoverInfo;

pub const CAPACITY: usize = 20;

pub struct CoverLru {
    slots: Vec<Arc<CoverInfo>>,
    clock: i64,
}

impl Default for CoverLru {
    fn default() -> Self {
        Self::new()
    }
}

impl CoverLru {
    pub fn new() -> Self {
        Self {
            slots: Vec::with_capacity(CAPACITY),
            clock: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Look up by `filepath`; a hit refreshes its recency and returns the
    /// shared `CoverInfo`.
    pub fn get(&mut self, filepath: &str) -> Option<Arc<CoverInfo>> {
        let idx = self.slots.iter().position(|c| c.filepath == filepath)?;
        self.clock += 1;
        let refreshed = Arc::new(CoverInfo {
            timestamp: self.clock,
            ..(*self.slots[idx]).clone()
        });
        self.slots[idx] = refreshed.clone();
        Some(refreshed)
    }

    /// Insert a newly-resolved cover, stamping it with the current clock.
    /// Returns the stored, timestamped `CoverInfo`.
    pub fn insert(&mut self, mut info: CoverInfo) -> Arc<CoverInfo> {
        self.clock += 1;
        info.timestamp = self.clock;
        let info = Arc::new(info);

        if let Some(idx) = self.slots.iter().position(|c| c.filepath == info.filepath) {
            self.slots[idx] = info.clone();
            return info;
        }

        if self.slots.len() < CAPACITY {
            self.slots.push(info.clone());
            return info;
        }

        let victim = self
            .slots
            .iter()
            .enumerate()
            .min_by_key(|(_, c)| c.timestamp)
            .map(|(idx, _)| idx)
            .expect("capacity > 0");
        self.slots[victim] = info.clone();
        info
    }
}
