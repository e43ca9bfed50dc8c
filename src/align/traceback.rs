//! Phases 2-4: bounded slab recompute and the traceback walk.
//!
//! Phase 1 only yields the best score and its end cell. To recover an edit
//! transcript without materializing the full DP matrix, the slab between
//! the leftmost vertex the alignment can possibly reach and the end vertex
//! is recomputed, keeping one signed byte per cell: the vertical score
//! difference `cell(r, j) - cell(r-1, j)`, whose magnitude is bounded by
//! the largest single edit cost. The walk then reconstructs each row above
//! from the current row and the stored differences, re-evaluates the
//! recurrence branches and follows one optimum back to its begin cell.

use crate::config::Scoring;
use crate::error::AlignError;
use crate::graph::CsrGraph;

/// One reconstructed edit transcript, ops in begin-to-end order.
pub struct Traceback {
    pub ops: Vec<u8>,
    /// Query rows the walk consumed; the compacted CIGAR must account for
    /// exactly this many query characters.
    pub query_span: usize,
}

/// Reconstruct one optimum alignment ending at `(best_row, best_vid)` with
/// score `best_score`. `read` is the oriented (possibly reverse-complemented)
/// query the phase-1 scores were computed on.
pub fn traceback(
    graph: &CsrGraph,
    read: &[u8],
    best_vid: usize,
    best_row: usize,
    best_score: i32,
    scoring: &Scoring,
) -> Result<Traceback, AlignError> {
    // Phase 2: the alignment spends at least `del` per skipped reference
    // character, so its begin vertex lies within this many characters
    let max_distance = read.len()
        + (read.len() * scoring.match_score as usize).div_ceil(scoring.del as usize);
    let leftmost = graph.leftmost_reachable_vertex(best_vid, max_distance)?;

    // Phase 3: recompute the slab, logging vertical differences
    let j0 = graph.global_offset(leftmost);
    let width = graph.ref_length_between(leftmost, best_vid);
    let height = best_row + 1;

    let mut matrix = [vec![0i32; width], vec![0i32; width]];
    let mut diff_log = vec![vec![0i8; width]; height];
    let mut final_row = vec![0i32; width];

    for i in 0..height {
        let (cur, prev) = (i % 2, (i + 1) % 2);
        for j in 0..width {
            let vertex = leftmost + j;
            let cur_char = graph.label(vertex);

            // reads the zero-initialized previous row at i = 0, giving
            // -ins, which the max against 0 absorbs
            let from_insertion = matrix[prev][j] - scoring.ins;

            let match_score = if cur_char == read[i] {
                scoring.match_score
            } else {
                -scoring.mismatch
            };

            // also covers in-degree zero: the alignment may open here
            let mut from_match = match_score;
            for &p in graph.in_neighbors(vertex) {
                let p = p as usize;
                if p >= j0 {
                    from_match = from_match.max(matrix[prev][p - j0] + match_score);
                }
            }

            let mut from_deletion = -1;
            for &p in graph.in_neighbors(vertex) {
                let p = p as usize;
                if p >= j0 {
                    from_deletion = from_deletion.max(matrix[cur][p - j0] - scoring.del);
                }
            }

            let cell = from_insertion.max(from_match).max(from_deletion).max(0);
            let diff = cell - matrix[prev][j];
            debug_assert!(
                diff.unsigned_abs()
                    <= scoring
                        .match_score
                        .max(scoring.ins)
                        .max(scoring.del)
                        .max(scoring.mismatch) as u32
            );
            matrix[cur][j] = cell;
            diff_log[i][j] = diff as i8;
        }
        if i == height - 1 {
            final_row.copy_from_slice(&matrix[cur]);
        }
    }

    let recomputed = final_row.iter().copied().max().unwrap_or(0);
    let best_col = graph.global_offset(best_vid) - j0;
    if recomputed != best_score || final_row[best_col] != best_score {
        return Err(AlignError::InvariantViolation(format!(
            "slab recompute found score {} at column {} but phase 1 reported {}",
            recomputed, best_col, best_score
        )));
    }

    // Phase 4: walk from the end cell to the begin cell
    let mut current_row = final_row;
    let mut above_row = vec![0i32; width];
    let mut cur_vid = best_vid;
    let mut row = best_row as i64;
    let mut col = (cur_vid - j0) as i64;
    let mut ops: Vec<u8> = Vec::new();
    let mut opened_here = false;

    while col >= 0 && row >= 0 {
        if current_row[col as usize] <= 0 {
            break;
        }

        for j in 0..width {
            above_row[j] = current_row[j] - diff_log[row as usize][j] as i32;
        }

        let cur_char = graph.label(cur_vid);
        let from_insertion = above_row[col as usize] - scoring.ins;
        let match_score = if cur_char == read[row as usize] {
            scoring.match_score
        } else {
            -scoring.mismatch
        };

        let mut from_match = match_score;
        let mut from_match_pos = cur_vid;
        for &p in graph.in_neighbors(cur_vid) {
            let p = p as usize;
            if p >= j0 && from_match < above_row[p - j0] + match_score {
                from_match = above_row[p - j0] + match_score;
                from_match_pos = p;
            }
        }

        let mut from_deletion = -1;
        let mut from_deletion_pos = None;
        for &p in graph.in_neighbors(cur_vid) {
            let p = p as usize;
            if p >= j0 && from_deletion < current_row[p - j0] - scoring.del {
                from_deletion = current_row[p - j0] - scoring.del;
                from_deletion_pos = Some(p);
            }
        }

        let cell = current_row[col as usize];
        if cell == from_match {
            ops.push(if match_score == scoring.match_score {
                b'='
            } else {
                b'X'
            });

            // the alignment opens at this cell
            if from_match_pos == cur_vid {
                opened_here = true;
                break;
            }

            cur_vid = from_match_pos;
            row -= 1;
            std::mem::swap(&mut current_row, &mut above_row);
        } else if cell == from_deletion {
            ops.push(b'D');
            cur_vid = match from_deletion_pos {
                Some(p) => p,
                None => {
                    return Err(AlignError::InvariantViolation(
                        "deletion branch selected without a predecessor".to_string(),
                    ))
                }
            };
        } else {
            if cell != from_insertion {
                return Err(AlignError::InvariantViolation(format!(
                    "cell score {} matches no recurrence branch during traceback",
                    cell
                )));
            }
            ops.push(b'I');
            row -= 1;
            std::mem::swap(&mut current_row, &mut above_row);
        }

        col = cur_vid as i64 - j0 as i64;
    }

    ops.reverse();
    let query_span = (best_row as i64 - row) as usize + usize::from(opened_here);
    Ok(Traceback { ops, query_span })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::cigar;

    fn chain(labels: &[u8]) -> CsrGraph {
        let edges: Vec<(u32, u32)> = (0..labels.len() as u32 - 1).map(|i| (i, i + 1)).collect();
        CsrGraph::from_parts(labels.to_vec(), &edges).unwrap()
    }

    #[test]
    fn test_perfect_match_walk() {
        let graph = chain(b"ACGTA");
        let tb = traceback(&graph, b"ACGTA", 4, 4, 5, &Scoring::default()).unwrap();
        assert_eq!(tb.ops, b"=====".to_vec());
        assert_eq!(tb.query_span, 5);
    }

    #[test]
    fn test_deletion_walk() {
        // read skips the G of the chain; preference order keeps the two
        // flanking match runs
        let graph = chain(b"ACGTA");
        let tb = traceback(&graph, b"ACTA", 4, 3, 3, &Scoring::default()).unwrap();
        assert_eq!(cigar::replay_score(&tb.ops, &Scoring::default()), 3);
        assert_eq!(cigar::query_consumed(&tb.ops), 4);
        assert_eq!(tb.query_span, 4);
        assert!(tb.ops.contains(&b'D') || tb.ops.contains(&b'X'));
    }

    #[test]
    fn test_insertion_walk() {
        // read carries an extra character the chain lacks
        let graph = chain(b"ACTA");
        let tb = traceback(&graph, b"ACGTA", 3, 4, 3, &Scoring::default()).unwrap();
        assert_eq!(cigar::replay_score(&tb.ops, &Scoring::default()), 3);
        assert_eq!(cigar::query_consumed(&tb.ops), 5);
    }

    #[test]
    fn test_bubble_walk_takes_matching_branch() {
        // 0:A -> {1:C, 2:G} -> 3:T; "ACT" goes through vertex 1
        let graph =
            CsrGraph::from_parts(b"ACGT".to_vec(), &[(0, 1), (0, 2), (1, 3), (2, 3)]).unwrap();
        let tb = traceback(&graph, b"ACT", 3, 2, 3, &Scoring::default()).unwrap();
        assert_eq!(tb.ops, b"===".to_vec());
    }

    #[test]
    fn test_wrong_score_is_invariant_violation() {
        let graph = chain(b"ACGTA");
        assert!(matches!(
            traceback(&graph, b"ACGTA", 4, 4, 7, &Scoring::default()),
            Err(AlignError::InvariantViolation(_))
        ));
    }

    #[test]
    fn test_interior_alignment_stops_at_begin() {
        // read matches only the interior CGT; the walk must not run into
        // the flanking columns
        let graph = chain(b"AACGTT");
        let tb = traceback(&graph, b"CGT", 4, 2, 3, &Scoring::default()).unwrap();
        assert_eq!(tb.ops, b"===".to_vec());
        assert_eq!(tb.query_span, 3);
    }
}
