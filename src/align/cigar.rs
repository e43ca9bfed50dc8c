//! CIGAR construction and validation.
//!
//! The traceback emits one op byte per step over {=, X, I, D}; this module
//! run-length encodes the sequence into `<count><op>` form and checks that
//! the transcript is consistent with the score the DP reported.

use std::fmt::Write;

use crate::config::Scoring;
use crate::error::AlignError;

/// Returns true if the op consumes a query character.
#[inline(always)]
pub const fn op_consumes_query(op: u8) -> bool {
    matches!(op, b'=' | b'X' | b'I')
}

/// Returns true if the op consumes a reference character.
#[inline(always)]
pub const fn op_consumes_ref(op: u8) -> bool {
    matches!(op, b'=' | b'X' | b'D')
}

/// Run-length encode an op sequence, e.g. `==X=` -> `2=1X1=`.
pub fn compact(ops: &[u8]) -> String {
    let mut out = String::new();
    let mut i = 0;
    while i < ops.len() {
        let op = ops[i];
        let mut run = 1;
        while i + run < ops.len() && ops[i + run] == op {
            run += 1;
        }
        write!(out, "{}{}", run, op as char).unwrap();
        i += run;
    }
    out
}

/// Score implied by an op sequence under the given costs.
pub fn replay_score(ops: &[u8], scoring: &Scoring) -> i32 {
    ops.iter()
        .map(|&op| match op {
            b'=' => scoring.match_score,
            b'X' => -scoring.mismatch,
            b'I' => -scoring.ins,
            b'D' => -scoring.del,
            other => unreachable!("unknown cigar op {}", other as char),
        })
        .sum()
}

/// Query characters consumed by an op sequence.
pub fn query_consumed(ops: &[u8]) -> usize {
    ops.iter().filter(|&&op| op_consumes_query(op)).count()
}

/// Reference characters consumed by an op sequence.
pub fn ref_consumed(ops: &[u8]) -> usize {
    ops.iter().filter(|&&op| op_consumes_ref(op)).count()
}

/// Compact the traceback's op sequence after checking it against the
/// reported best score and the query span the walk covered. Disagreement
/// means the two DP passes and the transcript are out of sync, which is a
/// bug, not bad input.
pub fn compact_and_validate(
    ops: &[u8],
    best_score: i32,
    query_span: usize,
    scoring: &Scoring,
) -> Result<String, AlignError> {
    let replayed = replay_score(ops, scoring);
    if replayed != best_score {
        return Err(AlignError::InvariantViolation(format!(
            "cigar replays to score {} but the DP reported {}",
            replayed, best_score
        )));
    }
    let consumed = query_consumed(ops);
    if consumed != query_span {
        return Err(AlignError::InvariantViolation(format!(
            "cigar consumes {} query characters but the traceback spanned {}",
            consumed, query_span
        )));
    }
    Ok(compact(ops))
}
