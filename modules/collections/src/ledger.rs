//! Keyed registry of coverage bitmaps sharing one coordinate layout.
//!
//! The window layer tracks loaded regions per annotation track over the same
//! sequence range. Bitmaps are allocated lazily: a track gets one the first
//! time a fetch for it completes, and an untouched track simply has nothing
//! covered yet.

use std::fmt::Debug;
use std::hash::Hash;

use ahash::HashMap;
use derive_getters::Dissolve;
use eyre::Result;

use seqcov_core::loc::Span;
use seqcov_core::num::PrimInt;

use crate::seq_bitmap::SeqBitmap;

/// Per-key coverage over the world range `[start, start + extent)`.
///
/// All bitmaps share the layout fixed at construction; keys are whatever the
/// caller uses to identify tracks. Dropping the ledger drops every bitmap.
#[derive(Debug, Clone, PartialEq, Eq, Dissolve)]
pub struct CoverageLedger<K: Eq + Hash, Idx: PrimInt> {
    /// All-clear bitmap with the shared layout; cloned for each new key and
    /// used to answer queries for keys that were never marked.
    template: SeqBitmap<Idx>,
    bitmaps: HashMap<K, SeqBitmap<Idx>>,
}

impl<K: Eq + Hash + Debug, Idx: PrimInt> CoverageLedger<K, Idx> {
    pub fn new(start: Idx, extent: Idx, bin_size: Idx) -> Result<Self> {
        Ok(Self {
            template: SeqBitmap::new(start, extent, bin_size)?,
            bitmaps: HashMap::default(),
        })
    }

    pub fn start(&self) -> Idx {
        self.template.start()
    }

    pub fn extent(&self) -> Idx {
        self.template.extent()
    }

    pub fn bin_size(&self) -> Idx {
        self.template.bin_size()
    }

    /// The whole tracked range as a closed span.
    pub fn span(&self) -> Span<Idx> {
        self.template.span()
    }

    /// Number of keys with an allocated bitmap.
    pub fn len(&self) -> usize {
        self.bitmaps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bitmaps.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.bitmaps.keys()
    }

    /// The key's bitmap, if any fetch was recorded for it.
    pub fn bitmap(&self, key: &K) -> Option<&SeqBitmap<Idx>> {
        self.bitmaps.get(key)
    }

    /// Drops the key's bitmap, forgetting its coverage.
    pub fn remove(&mut self, key: &K) -> Option<SeqBitmap<Idx>> {
        self.bitmaps.remove(key)
    }

    /// Records `[world1, world2]` (either order) as loaded for the key,
    /// allocating its bitmap on first touch.
    pub fn mark(&mut self, key: K, world1: Idx, world2: Idx) -> Result<()> {
        if !self.bitmaps.contains_key(&key) {
            log::debug!(
                "Allocating coverage bitmap for {key:?} ({} bins of {:?} units)",
                self.template.bin_count(),
                self.template.bin_size()
            );
        }
        let bitmap = self
            .bitmaps
            .entry(key)
            .or_insert_with(|| self.template.clone());
        bitmap.mark_region(world1, world2)
    }

    /// Answers whether `[world1, world2]` is fully covered for the key. An
    /// untouched key has nothing covered, but its coordinates are still
    /// validated against the shared layout.
    pub fn is_fully_marked(&self, key: &K, world1: Idx, world2: Idx) -> Result<bool> {
        self.bitmaps
            .get(key)
            .unwrap_or(&self.template)
            .is_region_fully_marked(world1, world2)
    }

    /// The uncovered sub-spans of `[world1, world2]` for the key; the whole
    /// query when the key was never marked.
    pub fn gaps(&self, key: &K, world1: Idx, world2: Idx) -> Result<Vec<Span<Idx>>> {
        let bitmap = self.bitmaps.get(key).unwrap_or(&self.template);
        Ok(bitmap.gaps(world1, world2)?.collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> CoverageLedger<&'static str, i64> {
        CoverageLedger::new(1000, 2000, 100).unwrap()
    }

    #[test]
    fn test_construct() {
        let ledger = ledger();
        assert_eq!(ledger.start(), 1000);
        assert_eq!(ledger.extent(), 2000);
        assert_eq!(ledger.bin_size(), 100);
        assert_eq!(ledger.span(), Span::new(1000, 2999));
        assert!(ledger.is_empty());

        assert!(CoverageLedger::<&str, i64>::new(0, 0, 100).is_err());
        assert!(CoverageLedger::<&str, i64>::new(0, 100, 0).is_err());
    }

    #[test]
    fn test_untouched_key_has_no_coverage() {
        let ledger = ledger();
        assert_eq!(ledger.is_fully_marked(&"est", 1000, 1099).unwrap(), false);
        assert_eq!(
            ledger.gaps(&"est", 1050, 1930).unwrap(),
            vec![Span::new(1050, 1930)]
        );
        assert!(ledger.bitmap(&"est").is_none());

        // Layout violations surface even before any bitmap exists.
        assert!(ledger.is_fully_marked(&"est", 900, 1099).is_err());
        assert!(ledger.gaps(&"est", 1000, 3000).is_err());
    }

    #[test]
    fn test_keys_are_independent() {
        let mut ledger = ledger();
        ledger.mark("est", 1000, 1499).unwrap();
        ledger.mark("repeats", 2000, 2499).unwrap();

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.is_fully_marked(&"est", 1000, 1499).unwrap(), true);
        assert_eq!(ledger.is_fully_marked(&"est", 2000, 2499).unwrap(), false);
        assert_eq!(
            ledger.is_fully_marked(&"repeats", 2000, 2499).unwrap(),
            true
        );
        assert_eq!(
            ledger.is_fully_marked(&"repeats", 1000, 1499).unwrap(),
            false
        );
    }

    #[test]
    fn test_marking_matches_a_standalone_bitmap() {
        let mut ledger = ledger();
        ledger.mark("est", 1050, 1150).unwrap();
        ledger.mark("est", 1600, 1650).unwrap();

        let mut standalone = SeqBitmap::new(1000i64, 2000, 100).unwrap();
        standalone.mark_region(1050, 1150).unwrap();
        standalone.mark_region(1600, 1650).unwrap();

        assert_eq!(ledger.bitmap(&"est"), Some(&standalone));
        assert_eq!(
            ledger.gaps(&"est", 1000, 2999).unwrap(),
            standalone.gaps(1000, 2999).unwrap().collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_remove_forgets_coverage() {
        let mut ledger = ledger();
        ledger.mark("est", 1000, 1499).unwrap();
        assert!(ledger.remove(&"est").is_some());

        assert!(ledger.is_empty());
        assert_eq!(ledger.is_fully_marked(&"est", 1000, 1499).unwrap(), false);
        assert!(ledger.remove(&"est").is_none());
    }

    #[test]
    fn test_failed_mark_on_a_fresh_key_still_allocates_nothing_marked() {
        let mut ledger = ledger();
        assert!(ledger.mark("est", 900, 1099).is_err());

        // The allocation happened, but no coverage was recorded.
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.is_fully_marked(&"est", 1000, 2999).unwrap(), false);
        assert_eq!(ledger.bitmap(&"est").unwrap().runs().count(), 1);
    }
}
