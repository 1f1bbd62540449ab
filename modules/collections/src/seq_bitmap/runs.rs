use seqcov_core::loc::Span;
use seqcov_core::num::PrimInt;

use super::seq_bitmap::SeqBitmap;

/// Iterator over maximal runs of equal coverage, produced by
/// [`SeqBitmap::runs`]. Yields `(span, covered)` pairs in world coordinates;
/// consecutive runs alternate flags and tile the tracked range.
pub struct Runs<'map, Idx: PrimInt> {
    bitmap: &'map SeqBitmap<Idx>,
    /// Next bin to consume.
    bin: usize,
    /// World coordinate where `bin` begins.
    world: Idx,
}

impl<'map, Idx: PrimInt> Runs<'map, Idx> {
    pub(super) fn new(bitmap: &'map SeqBitmap<Idx>) -> Self {
        Self {
            bitmap,
            bin: 0,
            world: bitmap.start(),
        }
    }
}

impl<'map, Idx: PrimInt> Iterator for Runs<'map, Idx> {
    type Item = (Span<Idx>, bool);

    fn next(&mut self) -> Option<Self::Item> {
        if self.bin >= self.bitmap.bin_count() {
            return None;
        }

        let covered = self.bitmap.bin_marked(self.bin);
        let lo = self.world;
        loop {
            self.bin += 1;
            self.world = self.world + self.bitmap.bin_size();
            if self.bin >= self.bitmap.bin_count() || self.bitmap.bin_marked(self.bin) != covered {
                break;
            }
        }

        // The final bin may reach past the extent; clip it.
        let hi = (self.world - Idx::one()).min(self.bitmap.span().end());
        Some((Span::new(lo, hi), covered))
    }
}

/// Iterator over the uncovered sub-spans of a query region, produced by
/// [`SeqBitmap::gaps`]. Spans are bin-aligned except at the query edges and
/// come out in ascending order.
pub struct Gaps<'map, Idx: PrimInt> {
    bitmap: &'map SeqBitmap<Idx>,
    query: Span<Idx>,
    /// Next bin to inspect.
    bin: usize,
    /// Last bin overlapped by the query (inclusive).
    last: usize,
    /// World coordinate where `bin` begins.
    world: Idx,
}

impl<'map, Idx: PrimInt> Gaps<'map, Idx> {
    pub(super) fn new(
        bitmap: &'map SeqBitmap<Idx>,
        query: Span<Idx>,
        first: usize,
        last: usize,
        base: Idx,
    ) -> Self {
        Self {
            bitmap,
            query,
            bin: first,
            last,
            world: base,
        }
    }

    #[inline]
    fn advance(&mut self) {
        self.bin += 1;
        self.world = self.world + self.bitmap.bin_size();
    }
}

impl<'map, Idx: PrimInt> Iterator for Gaps<'map, Idx> {
    type Item = Span<Idx>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.bin <= self.last && self.bitmap.bin_marked(self.bin) {
            self.advance();
        }
        if self.bin > self.last {
            return None;
        }

        let lo = self.world.max(self.query.start());
        while self.bin <= self.last && !self.bitmap.bin_marked(self.bin) {
            self.advance();
        }
        // The query end never exceeds the extent, so clipping to it covers
        // the partial final bin as well.
        let hi = (self.world - Idx::one()).min(self.query.end());

        Some(Span::new(lo, hi))
    }
}
