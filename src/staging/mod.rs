pub mod relocator;

pub use relocator::{RelocationSummary, TransferRelocator};
