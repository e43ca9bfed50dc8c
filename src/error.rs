//! Error types for graph ingest and the alignment pipeline.
//!
//! Ingest-time errors abort before any DP runs. DP-time errors abort the
//! affected batch; no partial output is emitted for it. `InvariantViolation`
//! signals an internal inconsistency (recomputed or replayed scores
//! disagreeing with the phase-1 result) and is always treated as fatal by
//! the binary.

use std::fmt;
use std::io;
use std::path::PathBuf;

#[derive(Debug)]
pub enum AlignError {
    /// Input file path not accessible
    InputNotFound(PathBuf),

    /// Cycle detected, CSR verification failed, or an edge references a
    /// nonexistent vertex
    InvalidGraph(String),

    /// Graph feature the DP engine cannot handle (bi-directed edge flags,
    /// nonzero overlap, multi-character vertex sequence)
    UnsupportedGraph(String),

    /// A DP cell would exceed the chosen score precision
    ScoreOverflow {
        precision_bits: u32,
        required: i64,
    },

    /// Recomputed or replayed score disagrees with the phase-1 result
    InvariantViolation(String),

    /// I/O error (file reading, record parsing)
    Io(io::Error),
}

impl fmt::Display for AlignError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlignError::InputNotFound(path) => {
                write!(f, "{} not accessible", path.display())
            }
            AlignError::InvalidGraph(msg) => write!(f, "invalid graph: {}", msg),
            AlignError::UnsupportedGraph(msg) => write!(f, "unsupported graph: {}", msg),
            AlignError::ScoreOverflow {
                precision_bits,
                required,
            } => write!(
                f,
                "score overflow: {}-bit precision cannot hold worst-case score {}",
                precision_bits, required
            ),
            AlignError::InvariantViolation(msg) => write!(f, "invariant violation: {}", msg),
            AlignError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for AlignError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AlignError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<io::Error> for AlignError {
    fn from(err: io::Error) -> Self {
        AlignError::Io(err)
    }
}
