//! The four-phase alignment pipeline.
//!
//! Phase 1 runs the vectorized forward DP over both orientations of every
//! read and picks the better strand, then the reverse DP pins down each
//! optimum's begin position. Phases 2-4 run per read: bound a slab, rerun
//! the recurrence with traceback information, and walk out a CIGAR.
//!
//! Batches are independent jobs under rayon's dynamic scheduler; per-worker
//! scratch buffers come from `map_init`. Nothing mutable is shared: lane
//! results are collected per batch and scattered into the per-read output
//! vector, which is indexed by original read id so the externally observed
//! order is input order.

pub mod batch;
pub mod cigar;
pub mod traceback;
pub mod vector;

use std::io::Write;

use rayon::prelude::*;

use crate::config::{AlignConfig, ScorePrecision, Scoring};
use crate::error::AlignError;
use crate::graph::CsrGraph;
use crate::utils::{reverse_complement, sanitize_sequence};

use batch::ReadBatcher;
use vector::engine::{Engine16, Engine32, Engine8, SimdEngine};
use vector::forward::forward_pass_batch;
use vector::reverse::{reverse_pass_batch, BoostTargets};
use vector::{DpBuffers, LaneResult, LongHopTable, MAX_LANES};

/// Value and location of one read's best local alignment. Fields are filled
/// monotonically as the phases run; positions are meaningful only when the
/// score is positive.
#[derive(Debug, Clone)]
pub struct BestScoreInfo {
    pub score: i32,
    /// Vertex id the alignment ends at
    pub ref_col_end: usize,
    /// Vertex id the alignment begins at
    pub ref_col_start: usize,
    /// Last query position of the alignment, 0-indexed inclusive
    pub qry_row_end: usize,
    /// First query position of the alignment, 0-indexed inclusive
    pub qry_row_start: usize,
    pub strand: char,
    /// Offset inside the end vertex's sequence; 0 for single-character
    /// vertices
    pub vertex_seq_offset: usize,
    pub cigar: String,
}

impl Default for BestScoreInfo {
    fn default() -> Self {
        BestScoreInfo {
            score: 0,
            ref_col_end: 0,
            ref_col_start: 0,
            qry_row_end: 0,
            qry_row_start: 0,
            strand: '+',
            vertex_seq_offset: 0,
            cigar: String::new(),
        }
    }
}

/// Align every read against the graph. Dispatches once on the configured
/// score precision so the generic kernels monomorphize and inline.
pub fn align_to_dag(
    reads: &[Vec<u8>],
    graph: &CsrGraph,
    config: &AlignConfig,
) -> Result<Vec<BestScoreInfo>, AlignError> {
    config.validate().map_err(AlignError::InvariantViolation)?;
    match config.precision {
        ScorePrecision::Int8 => align_to_dag_local::<Engine8>(reads, graph, config),
        ScorePrecision::Int16 => align_to_dag_local::<Engine16>(reads, graph, config),
        ScorePrecision::Int32 => align_to_dag_local::<Engine32>(reads, graph, config),
    }
}

/// Per-read phase-1 outcome in original-read indexing.
#[derive(Clone, Copy, Default)]
struct EndPoint {
    score: i32,
    row: i32,
    col: i32,
}

fn align_to_dag_local<E: SimdEngine>(
    reads: &[Vec<u8>],
    graph: &CsrGraph,
    config: &AlignConfig,
) -> Result<Vec<BestScoreInfo>, AlignError> {
    if reads.is_empty() {
        return Ok(Vec::new());
    }

    let scoring = config.scoring;
    let w = config.block_width;
    let h = config.block_height;

    check_precision_contract::<E>(reads, graph, config)?;

    let plus: Vec<Vec<u8>> = reads.iter().map(|r| sanitize_sequence(r)).collect();
    let minus: Vec<Vec<u8>> = plus.iter().map(|r| reverse_complement(r)).collect();

    let fwd_hops = LongHopTable::forward(graph, w);
    let rev_hops = LongHopTable::reverse(graph, w);

    //
    // PHASE 1, forward direction: end locations on both strands
    //

    let plus_batcher = ReadBatcher::new(&plus, E::LANES, h, false);
    let minus_batcher = ReadBatcher::new(&minus, E::LANES, h, false);

    let plus_ends = scatter_lane_results(
        &plus_batcher,
        &run_forward::<E>(graph, &fwd_hops, &plus_batcher, &scoring, w, h),
        reads.len(),
    );
    let minus_ends = scatter_lane_results(
        &minus_batcher,
        &run_forward::<E>(graph, &fwd_hops, &minus_batcher, &scoring, w, h),
        reads.len(),
    );

    // strand selection: the forward strand must strictly win to be chosen
    let mut best: Vec<BestScoreInfo> = Vec::with_capacity(reads.len());
    let mut oriented: Vec<Vec<u8>> = Vec::with_capacity(reads.len());
    for i in 0..reads.len() {
        let (end, strand) = if plus_ends[i].score > minus_ends[i].score {
            (plus_ends[i], '+')
        } else {
            (minus_ends[i], '-')
        };
        let mut info = BestScoreInfo {
            score: end.score,
            strand,
            ..BestScoreInfo::default()
        };
        if end.score > 0 {
            info.qry_row_end = end.row as usize;
            info.ref_col_end = end.col as usize;
        }
        best.push(info);
        oriented.push(if strand == '+' {
            plus[i].clone()
        } else {
            minus[i].clone()
        });
    }

    //
    // PHASE 1, reverse direction: begin locations, anchored to the forward
    // endpoints through the cell boost
    //

    let rev_batcher = ReadBatcher::new(&oriented, E::LANES, h, true);
    let targets: Vec<BoostTargets> = (0..rev_batcher.num_batches())
        .map(|b| boost_targets_for_batch::<E>(&rev_batcher, b, &best))
        .collect();

    let rev_results: Vec<LaneResult> = (0..rev_batcher.num_batches())
        .into_par_iter()
        .map_init(
            || DpBuffers::<E>::new(graph.num_vertices(), rev_hops.count(), w, h),
            |bufs, b| {
                reverse_pass_batch::<E>(
                    graph,
                    &rev_hops,
                    &rev_batcher,
                    &scoring,
                    b,
                    &targets[b],
                    bufs,
                )
            },
        )
        .collect();
    let rev_ends = scatter_lane_results(&rev_batcher, &rev_results, reads.len());

    for i in 0..reads.len() {
        if best[i].score == 0 {
            continue;
        }
        // the boost adds exactly one point on the optimum path
        if rev_ends[i].score != best[i].score + 1 {
            return Err(AlignError::InvariantViolation(format!(
                "read {}: reverse DP score {} does not match forward score {} plus boost",
                i, rev_ends[i].score, best[i].score
            )));
        }
        best[i].ref_col_start = rev_ends[i].col as usize;
        best[i].qry_row_start = oriented[i].len() - 1 - rev_ends[i].row as usize;
    }

    //
    // PHASES 2-4: per-read traceback and CIGAR
    //

    let cigars: Vec<String> = best
        .par_iter()
        .enumerate()
        .map(|(i, info)| {
            if info.score == 0 {
                return Ok(String::new());
            }
            let tb = traceback::traceback(
                graph,
                &oriented[i],
                info.ref_col_end,
                info.qry_row_end,
                info.score,
                &scoring,
            )?;
            cigar::compact_and_validate(&tb.ops, info.score, tb.query_span, &scoring)
        })
        .collect::<Result<_, AlignError>>()?;

    for (info, cigar) in best.iter_mut().zip(cigars) {
        info.cigar = cigar;
    }

    Ok(best)
}

/// The DP must never produce a value outside the lane type; the bound is
/// `min(|V|, longest read) * match` plus one point for the reverse boost.
fn check_precision_contract<E: SimdEngine>(
    reads: &[Vec<u8>],
    graph: &CsrGraph,
    config: &AlignConfig,
) -> Result<(), AlignError> {
    let longest = reads.iter().map(|r| r.len()).max().unwrap_or(0);
    let required =
        graph.num_vertices().min(longest) as i64 * config.scoring.match_score as i64 + 1;
    if required > E::MAX_SCORE {
        return Err(AlignError::ScoreOverflow {
            precision_bits: config.precision.bits(),
            required,
        });
    }
    Ok(())
}

fn run_forward<E: SimdEngine>(
    graph: &CsrGraph,
    hops: &LongHopTable,
    batcher: &ReadBatcher,
    scoring: &Scoring,
    w: usize,
    h: usize,
) -> Vec<LaneResult> {
    (0..batcher.num_batches())
        .into_par_iter()
        .map_init(
            || DpBuffers::<E>::new(graph.num_vertices(), hops.count(), w, h),
            |bufs, b| forward_pass_batch::<E>(graph, hops, batcher, scoring, b, bufs),
        )
        .collect()
}

/// Map per-lane batch results back to original read indexing.
fn scatter_lane_results(
    batcher: &ReadBatcher,
    results: &[LaneResult],
    read_count: usize,
) -> Vec<EndPoint> {
    let mut ends = vec![EndPoint::default(); read_count];
    for (b, result) in results.iter().enumerate() {
        for lane in 0..batcher.lanes() {
            if let Some(read_id) = batcher.read_id(b, lane) {
                ends[read_id] = EndPoint {
                    score: result.scores[lane],
                    row: result.rows[lane],
                    col: result.cols[lane],
                };
            }
        }
    }
    ends
}

fn boost_targets_for_batch<E: SimdEngine>(
    batcher: &ReadBatcher,
    batch: usize,
    best: &[BestScoreInfo],
) -> BoostTargets {
    let mut targets = BoostTargets {
        rows: [-1; MAX_LANES],
        cols: [-1; MAX_LANES],
    };
    for lane in 0..E::LANES {
        if let Some(read_id) = batcher.read_id(batch, lane) {
            let info = &best[read_id];
            if info.score > 0 {
                let len = batcher.read_len(batch, lane);
                targets.rows[lane] = (len - 1 - info.qry_row_end) as i32;
                targets.cols[lane] = info.ref_col_end as i32;
            }
        }
    }
    targets
}

/// Write the per-read result blocks to `out` in input order. The whole
/// report goes through one writer lock, so concurrent diagnostics cannot
/// interleave with it.
pub fn write_results<W: Write>(
    out: &mut W,
    reads: &[Vec<u8>],
    results: &[BestScoreInfo],
) -> std::io::Result<()> {
    for (i, info) in results.iter().enumerate() {
        writeln!(
            out,
            "INFO, dagalign::align, aligning read #{}, length = {}",
            i + 1,
            reads[i].len()
        )?;
        writeln!(
            out,
            "INFO, dagalign::align, best score = {}, strand = {}, ending at vertex id = {}, DP row = {}, DP col = {}",
            info.score, info.strand, info.ref_col_end, info.qry_row_end, info.ref_col_end
        )?;
        writeln!(out, "INFO, dagalign::align, cigar: {}", info.cigar)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(labels: &[u8]) -> CsrGraph {
        let edges: Vec<(u32, u32)> = (0..labels.len() as u32 - 1).map(|i| (i, i + 1)).collect();
        CsrGraph::from_parts(labels.to_vec(), &edges).unwrap()
    }

    fn reads(seqs: &[&[u8]]) -> Vec<Vec<u8>> {
        seqs.iter().map(|s| s.to_vec()).collect()
    }

    #[test]
    fn test_full_pipeline_perfect_match() {
        let graph = chain(b"ACGTA");
        let results = align_to_dag(&reads(&[b"ACGTA"]), &graph, &AlignConfig::default()).unwrap();
        assert_eq!(results[0].score, 5);
        assert_eq!(results[0].cigar, "5=");
        assert_eq!(results[0].strand, '+');
        assert_eq!(results[0].ref_col_start, 0);
        assert_eq!(results[0].ref_col_end, 4);
        assert_eq!(results[0].qry_row_start, 0);
        assert_eq!(results[0].qry_row_end, 4);
    }

    #[test]
    fn test_minus_strand_selected() {
        // the read is the reverse complement of the reference chain
        let graph = chain(b"ACGTT");
        let results = align_to_dag(&reads(&[b"AACGT"]), &graph, &AlignConfig::default()).unwrap();
        assert_eq!(results[0].score, 5);
        assert_eq!(results[0].strand, '-');
        assert_eq!(results[0].cigar, "5=");
    }

    #[test]
    fn test_zero_score_read() {
        let graph = chain(b"AAAA");
        // sanitized to sentinels only, which never match
        let results = align_to_dag(&reads(&[b"NNN"]), &graph, &AlignConfig::default()).unwrap();
        assert_eq!(results[0].score, 0);
        assert_eq!(results[0].cigar, "");
    }

    #[test]
    fn test_precision_overflow_rejected() {
        let labels = vec![b'A'; 200];
        let edges: Vec<(u32, u32)> = (0..199).map(|i| (i, i + 1)).collect();
        let graph = CsrGraph::from_parts(labels, &edges).unwrap();
        let long_read = vec![b'A'; 200];

        let config = AlignConfig {
            precision: ScorePrecision::Int8,
            ..AlignConfig::default()
        };
        assert!(matches!(
            align_to_dag(&[long_read], &graph, &config),
            Err(AlignError::ScoreOverflow { .. })
        ));
    }

    #[test]
    fn test_results_in_input_order() {
        let graph = chain(b"ACGTACGT");
        let input = reads(&[b"CGT", b"ACGTACGT", b"GT"]);
        let results = align_to_dag(&input, &graph, &AlignConfig::default()).unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].score, 3);
        assert_eq!(results[1].score, 8);
        assert_eq!(results[2].score, 2);
    }

    #[test]
    fn test_write_results_format() {
        let graph = chain(b"ACGTA");
        let input = reads(&[b"ACGTA"]);
        let results = align_to_dag(&input, &graph, &AlignConfig::default()).unwrap();

        let mut out = Vec::new();
        write_results(&mut out, &input, &results).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("aligning read #1, length = 5"));
        assert!(text.contains("best score = 5, strand = +, ending at vertex id = 4"));
        assert!(text.contains("cigar: 5="));
    }
}
