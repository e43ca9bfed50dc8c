//! Packing query reads into SIMD-friendly batches.
//!
//! Reads are globally sorted by decreasing length so that long reads cluster
//! into the same batches and get scheduled first under the dynamic work
//! queue, amortizing lane imbalance. Each batch holds `lanes` reads padded
//! to a common length that is a multiple of the block height; the padding
//! character is the sentinel, which never matches a vertex label, so a
//! read's scores are independent of its batch mates.
//!
//! The character buffer is struct-of-arrays: within a batch, row `j` stores
//! the j-th character of every lane contiguously (`lane` stride 1, row
//! stride `lanes`), which is exactly the layout the kernels load a register
//! from. Per-batch prefix offsets give O(1) access to any batch.

use crate::config::DUMMY;

pub struct ReadBatcher {
    lanes: usize,
    block_height: usize,
    read_count: usize,
    sorted_order: Vec<usize>,
    sorted_lengths: Vec<usize>,
    soa: Vec<u8>,
    prefix: Vec<usize>,
}

impl ReadBatcher {
    /// Pack `reads` into batches of `lanes`. With `reversed` set, every
    /// read's characters are emitted back-to-front (the reverse DP consumes
    /// reversed queries); lengths are unchanged, so the sorted permutation
    /// and batch shapes are identical between the two orientations.
    pub fn new(reads: &[Vec<u8>], lanes: usize, block_height: usize, reversed: bool) -> Self {
        assert!(!reads.is_empty());

        // descending (length, index) pairs; equal lengths keep the larger
        // original index first, making the permutation fully deterministic
        let mut length_tuples: Vec<(usize, usize)> =
            reads.iter().map(|r| r.len()).zip(0..reads.len()).collect();
        length_tuples.sort_unstable_by(|a, b| b.cmp(a));

        let sorted_lengths: Vec<usize> = length_tuples.iter().map(|&(len, _)| len).collect();
        let sorted_order: Vec<usize> = length_tuples.iter().map(|&(_, idx)| idx).collect();

        let read_count = reads.len();
        let mut soa = Vec::new();
        let mut prefix = vec![0];

        for i in (0..read_count).step_by(lanes) {
            let batch_len = Self::round_up(sorted_lengths[i], block_height);
            for j in 0..batch_len {
                for k in 0..lanes {
                    let ch = if i + k < read_count && j < sorted_lengths[i + k] {
                        let read = &reads[sorted_order[i + k]];
                        if reversed {
                            read[read.len() - 1 - j]
                        } else {
                            read[j]
                        }
                    } else {
                        DUMMY
                    };
                    soa.push(ch);
                }
            }
            prefix.push(soa.len());
        }

        ReadBatcher {
            lanes,
            block_height,
            read_count,
            sorted_order,
            sorted_lengths,
            soa,
            prefix,
        }
    }

    fn round_up(len: usize, block_height: usize) -> usize {
        if len == 0 {
            block_height
        } else {
            len.div_ceil(block_height) * block_height
        }
    }

    pub fn lanes(&self) -> usize {
        self.lanes
    }

    pub fn read_count(&self) -> usize {
        self.read_count
    }

    pub fn num_batches(&self) -> usize {
        self.prefix.len() - 1
    }

    /// Common padded length of every lane in `batch` (a multiple of the
    /// block height).
    pub fn padded_len(&self, batch: usize) -> usize {
        (self.prefix[batch + 1] - self.prefix[batch]) / self.lanes
    }

    /// The `lanes` characters of row `row` in `batch`.
    #[inline(always)]
    pub fn row_chars(&self, batch: usize, row: usize) -> &[u8] {
        let start = self.prefix[batch] + row * self.lanes;
        &self.soa[start..start + self.lanes]
    }

    /// Original read index occupying `lane` of `batch`, or None for a
    /// padding lane.
    pub fn read_id(&self, batch: usize, lane: usize) -> Option<usize> {
        let pos = batch * self.lanes + lane;
        if pos < self.read_count {
            Some(self.sorted_order[pos])
        } else {
            None
        }
    }

    /// Length of the read occupying `lane` of `batch`.
    pub fn read_len(&self, batch: usize, lane: usize) -> usize {
        self.sorted_lengths[batch * self.lanes + lane]
    }
}
