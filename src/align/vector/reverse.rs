//! Reverse phase-1 DP: begin position of each lane's optimum.
//!
//! The recurrence of the forward pass runs on the reversed graph (vertices
//! in descending order, successors in place of predecessors) and reversed
//! queries, so each alignment's begin position surfaces as an end position.
//! Because several cells may share the maximum score, the pass must report
//! the begin position belonging to the *same* optimum the forward pass
//! ended at. The cell-boost trick enforces this: the cell whose coordinates
//! map back to the forward endpoint is forced to `match + 1`, one more than
//! any score a local alignment can open with, so the reverse argmax is
//! pulled through that cell and every score downstream of it carries the
//! extra point. Callers subtract the point before comparing with the
//! forward score.
//!
//! Lanes whose forward score is zero pass target coordinates (-1, -1); no
//! cell matches, the boost never fires and the lane reports zero again.

use crate::align::batch::ReadBatcher;
use crate::align::vector::engine::{mask_set1_i32, SimdEngine};
use crate::align::vector::{DpBuffers, LaneResult, LongHopTable, MAX_LANES};
use crate::config::Scoring;
use crate::graph::CsrGraph;

/// Boost targets for one batch, in reverse-DP coordinates: lane i must hit
/// (rows[i], cols[i]). A negative row disables the lane.
pub struct BoostTargets {
    pub rows: [i32; MAX_LANES],
    pub cols: [i32; MAX_LANES],
}

pub fn reverse_pass_batch<E: SimdEngine>(
    graph: &CsrGraph,
    hops: &LongHopTable,
    batcher: &ReadBatcher,
    scoring: &Scoring,
    batch: usize,
    targets: &BoostTargets,
    bufs: &mut DpBuffers<E>,
) -> LaneResult {
    let n = graph.num_vertices();
    let w = bufs.block_width;
    let h = bufs.block_height;
    let w_mask = w - 1;

    let match_v = E::set1(scoring.match_score);
    let mismatch_v = E::set1(-scoring.mismatch);
    let del_v = E::set1(-scoring.del);
    let ins_v = E::set1(-scoring.ins);
    let boost_score = scoring.match_score + 1;

    let padded_len = batcher.padded_len(batch);

    // per-row index of pending boosts; at most one cell per lane fires
    let mut boost_by_row: Vec<Vec<(usize, i32)>> = vec![Vec::new(); padded_len];
    for lane in 0..E::LANES {
        let row = targets.rows[lane];
        if row >= 0 && (row as usize) < padded_len {
            boost_by_row[row as usize].push((lane, targets.cols[lane]));
        }
    }

    let mut best_scores = E::zero();
    let mut result = LaneResult::new();

    bufs.last_batch_row.fill(E::zero());

    for j in (0..padded_len).step_by(h) {
        let loop_j = j / h;
        let prev_slot = (loop_j.wrapping_sub(1) & 1) * n;
        let cur_slot = (loop_j & 1) * n;

        for l in 0..h {
            bufs.read_chars[l] = E::load_chars(batcher.row_chars(batch, j + l));
        }

        for k in (0..n).rev() {
            let label_v = E::set1(graph.label(k) as i32);
            let mut current = E::zero();

            for l in 0..h {
                let compare_char = E::cmpeq(bufs.read_chars[l], label_v);
                let sub = E::blend(compare_char, mismatch_v, match_v);

                current = E::max(E::zero(), sub);

                if l == 0 {
                    for &s in graph.out_neighbors(k) {
                        let s = s as usize;
                        let subst_edit = E::add(bufs.last_batch_row[prev_slot + s], sub);
                        current = E::max(current, subst_edit);

                        let succ_col = if s - k < w {
                            bufs.nearby[(s & w_mask) * h + l]
                        } else {
                            bufs.farther[hops.slot(s) * h + l]
                        };
                        current = E::max(current, E::add(succ_col, del_v));
                    }

                    let ins_edit = E::add(bufs.last_batch_row[prev_slot + k], ins_v);
                    current = E::max(current, ins_edit);
                } else {
                    for &s in graph.out_neighbors(k) {
                        let s = s as usize;
                        let (subst_src, del_src) = if s - k < w {
                            let base = (s & w_mask) * h;
                            (bufs.nearby[base + l - 1], bufs.nearby[base + l])
                        } else {
                            let base = hops.slot(s) * h;
                            (bufs.farther[base + l - 1], bufs.farther[base + l])
                        };
                        current = E::max(current, E::add(subst_src, sub));
                        current = E::max(current, E::add(del_src, del_v));
                    }

                    let ins_edit = E::add(bufs.nearby[(k & w_mask) * h + l - 1], ins_v);
                    current = E::max(current, ins_edit);
                }

                // force the forward endpoint's cell above every openable
                // score; applied before the best-score update so that a
                // single-cell optimum still reports through the boost
                let mut boost_mask = 0u64;
                for &(lane, col) in &boost_by_row[j + l] {
                    if col == k as i32 {
                        boost_mask |= 1 << lane;
                    }
                }
                if boost_mask != 0 {
                    current = E::mask_set1(current, boost_mask, boost_score);
                }

                best_scores = E::max(current, best_scores);
                let updated = E::cmpeq(current, best_scores);
                mask_set1_i32(&mut result.rows[..E::LANES], updated, (j + l) as i32);
                mask_set1_i32(&mut result.cols[..E::LANES], updated, k as i32);

                bufs.nearby[(k & w_mask) * h + l] = current;
                if hops.is_long(k) {
                    bufs.farther[hops.slot(k) * h + l] = current;
                }
            }

            bufs.last_batch_row[cur_slot + k] = current;
        }
    }

    for lane in 0..E::LANES {
        result.scores[lane] = E::extract(&best_scores, lane);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::vector::engine::Engine16;
    use crate::align::vector::forward::forward_pass_batch;

    fn chain(labels: &[u8]) -> CsrGraph {
        let edges: Vec<(u32, u32)> = (0..labels.len() as u32 - 1).map(|i| (i, i + 1)).collect();
        CsrGraph::from_parts(labels.to_vec(), &edges).unwrap()
    }

    /// Run forward then reverse for a single read and return
    /// (forward result, reverse result, read length).
    fn run_both(graph: &CsrGraph, read: &[u8]) -> (LaneResult, LaneResult, usize) {
        let reads = vec![read.to_vec()];
        let scoring = Scoring::default();
        let lanes = Engine16::LANES;

        let fwd_batcher = ReadBatcher::new(&reads, lanes, 16, false);
        let fwd_hops = LongHopTable::forward(graph, 8);
        let mut bufs = DpBuffers::<Engine16>::new(graph.num_vertices(), fwd_hops.count(), 8, 16);
        let fwd =
            forward_pass_batch::<Engine16>(graph, &fwd_hops, &fwd_batcher, &scoring, 0, &mut bufs);

        let mut targets = BoostTargets {
            rows: [-1; MAX_LANES],
            cols: [-1; MAX_LANES],
        };
        targets.rows[0] = read.len() as i32 - 1 - fwd.rows[0];
        targets.cols[0] = fwd.cols[0];

        let rev_batcher = ReadBatcher::new(&reads, lanes, 16, true);
        let rev_hops = LongHopTable::reverse(graph, 8);
        let mut rev_bufs =
            DpBuffers::<Engine16>::new(graph.num_vertices(), rev_hops.count(), 8, 16);
        let rev = reverse_pass_batch::<Engine16>(
            graph,
            &rev_hops,
            &rev_batcher,
            &scoring,
            0,
            &targets,
            &mut rev_bufs,
        );
        (fwd, rev, read.len())
    }

    #[test]
    fn test_reverse_score_is_forward_plus_boost() {
        let graph = chain(b"ACGTA");
        let (fwd, rev, _) = run_both(&graph, b"ACGTA");
        assert_eq!(fwd.scores[0], 5);
        assert_eq!(rev.scores[0], fwd.scores[0] + 1);
    }

    #[test]
    fn test_begin_position_full_match() {
        let graph = chain(b"ACGTA");
        let (_, rev, len) = run_both(&graph, b"ACGTA");
        // reverse coordinates map back to begin = vertex 0, query row 0
        assert_eq!(rev.cols[0], 0);
        assert_eq!(len as i32 - 1 - rev.rows[0], 0);
    }

    #[test]
    fn test_begin_position_interior_match() {
        // read matches the interior CGT of the chain
        let graph = chain(b"AACGTT");
        let (fwd, rev, len) = run_both(&graph, b"CGT");
        assert_eq!(fwd.scores[0], 3);
        assert_eq!(fwd.cols[0], 4);
        assert_eq!(rev.scores[0], 4);
        assert_eq!(rev.cols[0], 2);
        assert_eq!(len as i32 - 1 - rev.rows[0], 0);
    }

    #[test]
    fn test_single_cell_optimum_reports_through_boost() {
        // only one character can match; begin == end
        let graph = chain(b"GGGA");
        let (fwd, rev, len) = run_both(&graph, b"TTA");
        assert_eq!(fwd.scores[0], 1);
        assert_eq!(fwd.cols[0], 3);
        assert_eq!(rev.scores[0], 2);
        assert_eq!(rev.cols[0], 3);
        assert_eq!(len as i32 - 1 - rev.rows[0], 2);
    }

    #[test]
    fn test_zero_score_lane_skips_boost() {
        let graph = chain(b"AAAA");
        let reads = vec![b"TTT".to_vec()];
        let scoring = Scoring::default();
        let lanes = Engine16::LANES;

        let rev_batcher = ReadBatcher::new(&reads, lanes, 16, true);
        let rev_hops = LongHopTable::reverse(&graph, 8);
        let mut bufs = DpBuffers::<Engine16>::new(graph.num_vertices(), rev_hops.count(), 8, 16);
        let targets = BoostTargets {
            rows: [-1; MAX_LANES],
            cols: [-1; MAX_LANES],
        };
        let rev = reverse_pass_batch::<Engine16>(
            &graph,
            &rev_hops,
            &rev_batcher,
            &scoring,
            0,
            &targets,
            &mut bufs,
        );
        assert_eq!(rev.scores[0], 0);
    }
}
