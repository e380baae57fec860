pub mod parser;

pub use parser::{Record, VcardParser};
