//! Query read input.

pub mod reads;

pub use reads::{load_reads, ReadRecord};
