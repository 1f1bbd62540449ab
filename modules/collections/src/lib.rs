pub use ledger::CoverageLedger;
pub use seq_bitmap::{Gaps, Runs, SeqBitmap};

pub mod ledger;
pub mod seq_bitmap;
