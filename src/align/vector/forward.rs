//! Forward phase-1 DP: best local score and end position per lane.
//!
//! One call processes one batch of `E::LANES` reads. The traversal is a
//! doubly nested block loop: row blocks of `block_height` query characters
//! outside, vertices in topological order inside, and an innermost
//! `block_height`-step loop over the block's rows. For the cell at
//! (row r, vertex v) the recurrence is
//!
//! ```text
//! cell(r, v) = max(0, sub,
//!                  max over p in in(v) of cell(r-1, p) + sub,
//!                  max over p in in(v) of cell(r,   p) - del,
//!                  cell(r-1, v) - ins)
//! ```
//!
//! with `sub = +match` on a character match and `-mismatch` otherwise.
//! At the top row of a block (l = 0) the r-1 cells come from the previous
//! block's bottom row; deeper rows read the rolling window or the long-hop
//! side store depending on hop distance.

use crate::align::batch::ReadBatcher;
use crate::align::vector::engine::{mask_set1_i32, SimdEngine};
use crate::align::vector::{DpBuffers, LaneResult, LongHopTable};
use crate::config::Scoring;
use crate::graph::CsrGraph;

pub fn forward_pass_batch<E: SimdEngine>(
    graph: &CsrGraph,
    hops: &LongHopTable,
    batcher: &ReadBatcher,
    scoring: &Scoring,
    batch: usize,
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

    let mut best_scores = E::zero();
    let mut result = LaneResult::new();

    bufs.last_batch_row.fill(E::zero());

    let padded_len = batcher.padded_len(batch);
    for j in (0..padded_len).step_by(h) {
        let loop_j = j / h;
        let prev_slot = (loop_j.wrapping_sub(1) & 1) * n;
        let cur_slot = (loop_j & 1) * n;

        for l in 0..h {
            bufs.read_chars[l] = E::load_chars(batcher.row_chars(batch, j + l));
        }

        for k in 0..n {
            let label_v = E::set1(graph.label(k) as i32);
            let mut current = E::zero();

            for l in 0..h {
                let compare_char = E::cmpeq(bufs.read_chars[l], label_v);
                let sub = E::blend(compare_char, mismatch_v, match_v);

                // a local alignment may start fresh at this cell
                current = E::max(E::zero(), sub);

                if l == 0 {
                    for &p in graph.in_neighbors(k) {
                        let p = p as usize;
                        let subst_edit = E::add(bufs.last_batch_row[prev_slot + p], sub);
                        current = E::max(current, subst_edit);

                        let pred_col = if k - p < w {
                            bufs.nearby[(p & w_mask) * h + l]
                        } else {
                            bufs.farther[hops.slot(p) * h + l]
                        };
                        current = E::max(current, E::add(pred_col, del_v));
                    }

                    let ins_edit = E::add(bufs.last_batch_row[prev_slot + k], ins_v);
                    current = E::max(current, ins_edit);
                } else {
                    for &p in graph.in_neighbors(k) {
                        let p = p as usize;
                        let (subst_src, del_src) = if k - p < w {
                            let base = (p & w_mask) * h;
                            (bufs.nearby[base + l - 1], bufs.nearby[base + l])
                        } else {
                            let base = hops.slot(p) * h;
                            (bufs.farther[base + l - 1], bufs.farther[base + l])
                        };
                        current = E::max(current, E::add(subst_src, sub));
                        current = E::max(current, E::add(del_src, del_v));
                    }

                    let ins_edit = E::add(bufs.nearby[(k & w_mask) * h + l - 1], ins_v);
                    current = E::max(current, ins_edit);
                }

                // track the running maximum; lanes whose cell equals the
                // updated maximum take this cell as their endpoint, so the
                // latest coordinates win on ties
                best_scores = E::max(current, best_scores);
                let updated = E::cmpeq(current, best_scores);
                mask_set1_i32(&mut result.rows[..E::LANES], updated, (j + l) as i32);
                mask_set1_i32(&mut result.cols[..E::LANES], updated, k as i32);

                bufs.nearby[(k & w_mask) * h + l] = current;
                if hops.is_long(k) {
                    bufs.farther[hops.slot(k) * h + l] = current;
                }
            }

            // bottom cell feeds the next row block
            bufs.last_batch_row[cur_slot + k] = current;
        }
    }

    for lane in 0..E::LANES {
        result.scores[lane] = E::extract(&best_scores, lane);
    }
    result
}
