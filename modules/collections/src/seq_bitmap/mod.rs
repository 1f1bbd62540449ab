pub use runs::{Gaps, Runs};
pub use seq_bitmap::SeqBitmap;

mod runs;
#[allow(clippy::module_inception)]
mod seq_bitmap;
