pub mod merger;

pub use merger::{MergeSummary, ReportMerger};
