//! Coverage bitmap over a fixed genomic range.
//!
//! The tracked range is cut into fixed-size bins, one bit per bin. A bin is
//! flipped on once the fetch layer reports its whole underlying range as
//! loaded; bits are never cleared again. Queries answer whether a region can
//! be served without another round-trip to the data source.

use std::fmt::{self, Display};

use derive_getters::Dissolve;
use eyre::{eyre, Result};
use itertools::Itertools;

use seqcov_core::loc::Span;
use seqcov_core::num::PrimInt;

use super::runs::{Gaps, Runs};

const WORD_BITS: usize = u64::BITS as usize;

// Bit mask covering the inclusive bit range [lo, hi] of a single word.
#[inline]
fn word_mask(lo: usize, hi: usize) -> u64 {
    debug_assert!(lo <= hi && hi < WORD_BITS);
    let width = hi - lo + 1;
    if width == WORD_BITS {
        !0
    } else {
        ((1u64 << width) - 1) << lo
    }
}

/// Coverage bitmap for the world range `[start, start + extent)`.
///
/// The layout (`start`, `extent`, `bin_size`) is fixed at construction; the
/// only mutation is [`SeqBitmap::mark_region`], and marking is monotonic.
/// Dropping the value releases the storage, so a destroyed bitmap cannot be
/// touched again.
#[derive(Debug, Clone, PartialEq, Eq, Dissolve)]
pub struct SeqBitmap<Idx: PrimInt> {
    // First world coordinate tracked (inclusive).
    start: Idx,
    // Number of coordinate units tracked.
    extent: Idx,
    // Coordinate units per bin.
    bin_size: Idx,
    // ceil(extent / bin_size); the final bin may be clipped by the extent.
    bin_count: usize,
    // One bit per bin, packed LSB first.
    words: Vec<u64>,
}

impl<Idx: PrimInt> SeqBitmap<Idx> {
    /// Allocates an all-clear bitmap of `ceil(extent / bin_size)` bins.
    pub fn new(start: Idx, extent: Idx, bin_size: Idx) -> Result<Self> {
        Self::check_layout(extent, bin_size)?;

        let bins = (extent + bin_size - Idx::one()) / bin_size;
        let bin_count = bins
            .to_usize()
            .ok_or_else(|| eyre!("Bin count {:?} does not fit in usize", bins))?;

        Ok(Self {
            start,
            extent,
            bin_size,
            bin_count,
            words: vec![0; bin_count.div_ceil(WORD_BITS)],
        })
    }

    fn check_layout(extent: Idx, bin_size: Idx) -> Result<()> {
        if extent <= Idx::zero() {
            return Err(eyre!("Invalid extent: {:?} (must be positive)", extent));
        }
        if bin_size < Idx::one() {
            return Err(eyre!("Invalid bin size: {:?} (must be >= 1)", bin_size));
        }
        Ok(())
    }

    #[inline(always)]
    pub fn start(&self) -> Idx {
        self.start
    }

    #[inline(always)]
    pub fn extent(&self) -> Idx {
        self.extent
    }

    #[inline(always)]
    pub fn bin_size(&self) -> Idx {
        self.bin_size
    }

    #[inline(always)]
    pub fn bin_count(&self) -> usize {
        self.bin_count
    }

    /// The whole tracked range as a closed span.
    pub fn span(&self) -> Span<Idx> {
        Span::new(self.start, self.start + self.extent - Idx::one())
    }

    /// Records the closed region `[world1, world2]` (either order) as
    /// loaded. Every bin overlapped by the region is set whole, i.e. the
    /// region is rounded outward to bin boundaries. Marking an already
    /// covered region is a no-op.
    pub fn mark_region(&mut self, world1: Idx, world2: Idx) -> Result<()> {
        let region = Span::new(world1, world2);
        let first = self.bin_index(region.start())?;
        let last = self.bin_index(region.end())?;

        self.set_bins(first, last);
        Ok(())
    }

    /// Answers whether every bin overlapped by the closed region
    /// `[world1, world2]` (either order) is covered. Stops at the first
    /// clear bin.
    pub fn is_region_fully_marked(&self, world1: Idx, world2: Idx) -> Result<bool> {
        let region = Span::new(world1, world2);
        let first = self.bin_index(region.start())?;
        let last = self.bin_index(region.end())?;

        Ok(self.bins_all_marked(first, last))
    }

    /// Iterates maximal runs of equal coverage across the whole bitmap,
    /// yielding `(Span, bool)` in world coordinates. Runs are contiguous and
    /// tile the tracked range exactly.
    pub fn runs(&self) -> Runs<'_, Idx> {
        Runs::new(self)
    }

    /// Iterates the uncovered sub-spans of the closed query region, clipped
    /// to the query edges. The fetch layer can request exactly these spans
    /// and then mark them to make the query fully covered. Empty iff
    /// [`SeqBitmap::is_region_fully_marked`] answers true.
    pub fn gaps(&self, world1: Idx, world2: Idx) -> Result<Gaps<'_, Idx>> {
        let query = Span::new(world1, world2);
        let first = self.bin_index(query.start())?;
        let last = self.bin_index(query.end())?;

        // World coordinate where the first overlapped bin begins.
        let base = query.start() - (query.start() - self.start) % self.bin_size;
        Ok(Gaps::new(self, query, first, last, base))
    }

    // Maps a world coordinate to its bin. Coordinates outside the tracked
    // range are a caller error and are never clamped.
    fn bin_index(&self, world: Idx) -> Result<usize> {
        if world < self.start || world - self.start >= self.extent {
            return Err(eyre!(
                "Coordinate {:?} outside the tracked range [{:?}, {:?})",
                world,
                self.start,
                self.start + self.extent
            ));
        }

        let bin = (world - self.start) / self.bin_size;
        bin.to_usize()
            .ok_or_else(|| eyre!("Bin index {:?} does not fit in usize", bin))
    }

    pub(super) fn bin_marked(&self, bin: usize) -> bool {
        debug_assert!(bin < self.bin_count);
        self.words[bin / WORD_BITS] >> (bin % WORD_BITS) & 1 == 1
    }

    // Sets the inclusive bin range [first, last]: partial masks on the edge
    // words, whole words in between.
    fn set_bins(&mut self, first: usize, last: usize) {
        debug_assert!(first <= last && last < self.bin_count);
        let (first_word, last_word) = (first / WORD_BITS, last / WORD_BITS);

        if first_word == last_word {
            self.words[first_word] |= word_mask(first % WORD_BITS, last % WORD_BITS);
        } else {
            self.words[first_word] |= word_mask(first % WORD_BITS, WORD_BITS - 1);
            for word in &mut self.words[first_word + 1..last_word] {
                *word = !0;
            }
            self.words[last_word] |= word_mask(0, last % WORD_BITS);
        }
    }

    fn bins_all_marked(&self, first: usize, last: usize) -> bool {
        debug_assert!(first <= last && last < self.bin_count);
        let (first_word, last_word) = (first / WORD_BITS, last / WORD_BITS);

        if first_word == last_word {
            let mask = word_mask(first % WORD_BITS, last % WORD_BITS);
            return self.words[first_word] & mask == mask;
        }

        let head = word_mask(first % WORD_BITS, WORD_BITS - 1);
        if self.words[first_word] & head != head {
            return false;
        }
        for word in &self.words[first_word + 1..last_word] {
            if *word != !0 {
                return false;
            }
        }
        let tail = word_mask(0, last % WORD_BITS);
        self.words[last_word] & tail == tail
    }
}

impl<Idx: PrimInt + Display> Display for SeqBitmap<Idx> {
    /// One character per bin: `-` covered, `.` not.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}: {}",
            self.span(),
            self.bin_size,
            (0..self.bin_count)
                .map(|bin| if self.bin_marked(bin) { '-' } else { '.' })
                .join("")
        )
    }
}
