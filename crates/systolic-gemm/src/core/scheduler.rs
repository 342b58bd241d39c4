//! Multi-level block decomposition and the parallel worker pool.
//!
//! A `(seq_len × input_size) × (input_size × output_size)` GEMM is cut
//! into `KERNEL_DIM`-sized tile blocks, cache-budget-sized L2 groups, and
//! an outer partition of the sequence dimension across a fixed pool of
//! workers. Each worker owns one private [`SystolicTile`] and drives the
//! streaming protocol for every block in its range:
//!
//! ```text
//! outer seq group → L2 row → L2 col → worker's seq tile
//!     → L2-internal row → L2-internal col → (tile rows/cols in protocol)
//! ```
//!
//! Workers never share tiles and never write the same output word: the
//! row-major path partitions sequence rows, the block-stationary path
//! partitions output columns. That single-writer discipline is a static
//! property of the decomposition, not something checked at runtime.

use log::debug;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::protocol::{load_weight_block, stream_block};
use super::tile::SystolicTile;
use crate::types::packed::{self, WORD_LANES};
use crate::types::{TilingParams, KERNEL_DIM, ROW_WORDS};

/// Words per weight block (KERNEL_DIM rows × ROW_WORDS words).
const BLOCK_WORDS: usize = KERNEL_DIM * ROW_WORDS;

/// Default worker-pool size for the tiled paths.
pub fn default_workers() -> usize {
    #[cfg(feature = "parallel")]
    {
        rayon::current_num_threads()
    }
    #[cfg(not(feature = "parallel"))]
    {
        1
    }
}

/// Output buffer shared across the worker pool.
///
/// Workers receive raw-pointer access because their write regions, while
/// disjoint by construction, interleave at word granularity and cannot be
/// expressed as `split_at_mut` partitions.
struct SharedOutput {
    ptr: *mut u32,
    len: usize,
}

// Safety: every merge target index is derived from a worker's private,
// non-overlapping block range; see the partitioning invariants above.
unsafe impl Send for SharedOutput {}
unsafe impl Sync for SharedOutput {}

impl SharedOutput {
    fn new(out: &mut [u32]) -> Self {
        Self { ptr: out.as_mut_ptr(), len: out.len() }
    }

    /// Merge a packed partial-sum word into output word `idx`.
    ///
    /// # Safety
    ///
    /// No other worker may target `idx` for the lifetime of the pool.
    #[inline]
    unsafe fn merge(&self, idx: usize, word: u32) {
        debug_assert!(idx < self.len);
        packed::merge(&mut *self.ptr.add(idx), word);
    }
}

/// Contiguous chunk of `0..total` owned by worker `w` of `workers`,
/// remainder spread over the first workers so every element is covered for
/// any pool size.
fn worker_range(total: usize, workers: usize, w: usize) -> std::ops::Range<usize> {
    let base = total / workers;
    let rem = total % workers;
    let start = w * base + w.min(rem);
    start..start + base + usize::from(w < rem)
}

fn run_workers<F>(workers: usize, body: F)
where
    F: Fn(usize) + Sync,
{
    #[cfg(feature = "parallel")]
    {
        (0..workers).into_par_iter().for_each(|w| body(w));
    }
    #[cfg(not(feature = "parallel"))]
    {
        for w in 0..workers {
            body(w);
        }
    }
}

/// Row-major weight-stationary tiled GEMM.
///
/// Weight sub-blocks are gathered from the row-major `weights` buffer per
/// tile block; strides are recomputed every block. Dimensions must be
/// multiples of [`KERNEL_DIM`]; the output accumulates in place.
pub fn tiled_matmul_with(
    params: &TilingParams,
    workers: usize,
    seq_len: usize,
    input: &[u32],
    output: &mut [u32],
    weights: &[u32],
    input_size: usize,
    output_size: usize,
) {
    let workers = workers.max(1);
    let dims = params.resolve(seq_len, input_size, output_size);
    let in_words = input_size / WORD_LANES;
    let out_words = output_size / WORD_LANES;

    let row_tiles = input_size / KERNEL_DIM;
    let col_tiles = output_size / KERNEL_DIM;
    let seq_blocks = seq_len.div_ceil(dims.seq_rows);

    // Ceiling counts so shapes that are not multiples of the cache blocks
    // still get their trailing tiles; in-loop bounds guards skip the
    // overhang.
    let outer_seq = seq_blocks.div_ceil(dims.l2_seq_blocks);
    let outer_rows = row_tiles.div_ceil(dims.l2_row_tiles * dims.l1_row_tiles);
    let outer_cols = col_tiles.div_ceil(dims.l2_col_tiles * dims.l1_col_tiles);

    debug!(
        "tiled gemm {seq_len}x{input_size}x{output_size}: {dims:?}, \
         outer {outer_seq}x{outer_rows}x{outer_cols}, {workers} workers"
    );

    let out = SharedOutput::new(output);

    run_workers(workers, |worker| {
        let mut tile = SystolicTile::new();
        let my_seq_tiles = worker_range(dims.l2_seq_blocks, workers, worker);

        for l2_in in 0..outer_seq {
            for l2_row in 0..outer_rows {
                for l2_col in 0..outer_cols {
                    for seq_tile in my_seq_tiles.clone() {
                        let seq_block = l2_in * dims.l2_seq_blocks + seq_tile;
                        let row_base = seq_block * dims.seq_rows;
                        if row_base >= seq_len {
                            continue;
                        }
                        let block_rows = dims.seq_rows.min(seq_len - row_base);

                        for t_row_l2 in 0..dims.l2_row_tiles {
                            for t_col_l2 in 0..dims.l2_col_tiles {
                                for t_row_l1 in 0..dims.l1_row_tiles {
                                    for t_col_l1 in 0..dims.l1_col_tiles {
                                        let tile_row = t_row_l2 * dims.l1_row_tiles + t_row_l1;
                                        let tile_col = t_col_l2 * dims.l1_col_tiles + t_col_l1;
                                        let row_start = (l2_row
                                            * dims.l2_row_tiles
                                            * dims.l1_row_tiles
                                            + tile_row)
                                            * KERNEL_DIM;
                                        let col_start = (l2_col
                                            * dims.l2_col_tiles
                                            * dims.l1_col_tiles
                                            + tile_col)
                                            * ROW_WORDS;
                                        if row_start >= input_size || col_start >= out_words {
                                            continue;
                                        }

                                        load_weight_block(
                                            &mut tile,
                                            (0..KERNEL_DIM).flat_map(|r| {
                                                (0..ROW_WORDS).map(move |c| {
                                                    weights[(row_start + r) * out_words
                                                        + col_start
                                                        + c]
                                                })
                                            }),
                                        );
                                        if tile.is_zero_block() {
                                            continue;
                                        }

                                        let in_base = row_start / WORD_LANES;
                                        stream_block(
                                            &mut tile,
                                            block_rows,
                                            |i, j| {
                                                input[(row_base + i) * in_words + in_base + j]
                                            },
                                            |m, word| unsafe {
                                                out.merge(
                                                    (row_base + m / ROW_WORDS) * out_words
                                                        + col_start
                                                        + m % ROW_WORDS,
                                                    word,
                                                );
                                            },
                                        );
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
    });
}

/// Block-stationary tiled GEMM over a pre-linearized weight buffer.
///
/// Consecutive weight blocks are contiguous (see [`rearrange_weights`]),
/// so every load is a sequential read, and the loop order iterates weight
/// columns before sequence rows: one load serves the entire sequence.
/// Input and output stay row-major; the result is bit-identical to
/// [`tiled_matmul_with`].
pub fn tiled_matmul_rearranged_with(
    workers: usize,
    seq_len: usize,
    input: &[u32],
    output: &mut [u32],
    weights: &[u32],
    input_size: usize,
    output_size: usize,
) {
    let workers = workers.max(1);
    let in_words = input_size / WORD_LANES;
    let out_words = output_size / WORD_LANES;
    let row_tiles = input_size / KERNEL_DIM;
    let col_tiles = output_size / KERNEL_DIM;

    debug!(
        "rearranged gemm {seq_len}x{input_size}x{output_size}: \
         {row_tiles}x{col_tiles} blocks, {workers} workers"
    );

    let out = SharedOutput::new(output);

    run_workers(workers, |worker| {
        let mut tile = SystolicTile::new();

        for col_blk in worker_range(col_tiles, workers, worker) {
            let col_start = col_blk * ROW_WORDS;
            for row_blk in 0..row_tiles {
                let base = (col_blk * row_tiles + row_blk) * BLOCK_WORDS;
                load_weight_block(
                    &mut tile,
                    weights[base..base + BLOCK_WORDS].iter().copied(),
                );
                if tile.is_zero_block() {
                    continue;
                }

                let in_base = row_blk * ROW_WORDS;
                stream_block(
                    &mut tile,
                    seq_len,
                    |i, j| input[i * in_words + in_base + j],
                    |m, word| unsafe {
                        out.merge(
                            (m / ROW_WORDS) * out_words + col_start + m % ROW_WORDS,
                            word,
                        );
                    },
                );
            }
        }
    });
}

/// Linearize a row-major weight buffer into the block-stationary layout
/// consumed by [`tiled_matmul_rearranged_with`]: blocks ordered
/// column-block-major, each block's 64 words contiguous and row-major
/// within the block.
pub fn rearrange_weights(weights: &[u32], input_size: usize, output_size: usize) -> Vec<u32> {
    let out_words = output_size / WORD_LANES;
    let mut linear = Vec::with_capacity(weights.len());
    for col_blk in 0..output_size / KERNEL_DIM {
        for row_blk in 0..input_size / KERNEL_DIM {
            for r in 0..KERNEL_DIM {
                for c in 0..ROW_WORDS {
                    linear.push(
                        weights[(row_blk * KERNEL_DIM + r) * out_words
                            + col_blk * ROW_WORDS
                            + c],
                    );
                }
            }
        }
    }
    linear
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dense::reference_matmul;
    use crate::testing::{pattern_words, words};

    fn run_tiled(
        workers: usize,
        seq: usize,
        input_size: usize,
        output_size: usize,
    ) -> (Vec<u32>, Vec<u32>) {
        let input = pattern_words(seq * input_size / WORD_LANES, 1);
        let weights = pattern_words(input_size * output_size / WORD_LANES, 2);

        let mut tiled = vec![0u32; seq * output_size / WORD_LANES];
        tiled_matmul_with(
            &TilingParams::default(),
            workers,
            seq,
            &input,
            &mut tiled,
            &weights,
            input_size,
            output_size,
        );

        let mut reference = vec![0u32; seq * output_size / WORD_LANES];
        reference_matmul(seq, &input, &mut reference, &weights, input_size, output_size);

        (tiled, reference)
    }

    #[test]
    fn test_tiled_matches_reference_single_tile() {
        let (tiled, reference) = run_tiled(1, 16, 16, 16);
        assert_eq!(tiled, reference);
    }

    #[test]
    fn test_tiled_matches_reference_multi_block() {
        let (tiled, reference) = run_tiled(2, 64, 48, 32);
        assert_eq!(tiled, reference);
    }

    #[test]
    fn test_tiled_matches_reference_ragged_seq() {
        // 144 is a multiple of KERNEL_DIM but not of the 128-row block.
        let (tiled, reference) = run_tiled(3, 144, 32, 48);
        assert_eq!(tiled, reference);
    }

    #[test]
    fn test_worker_count_invariance() {
        for workers in [1, 2, 3, 8] {
            let (tiled, reference) = run_tiled(workers, 64, 64, 64);
            assert_eq!(tiled, reference, "workers = {workers}");
        }
    }

    #[test]
    fn test_rearranged_matches_row_major() {
        let (seq, input_size, output_size) = (48, 32, 64);
        let input = pattern_words(seq * input_size / WORD_LANES, 5);
        let weights = pattern_words(input_size * output_size / WORD_LANES, 6);

        let mut row_major = vec![0u32; seq * output_size / WORD_LANES];
        tiled_matmul_with(
            &TilingParams::default(),
            2,
            seq,
            &input,
            &mut row_major,
            &weights,
            input_size,
            output_size,
        );

        let linear = rearrange_weights(&weights, input_size, output_size);
        let mut rearranged = vec![0u32; seq * output_size / WORD_LANES];
        tiled_matmul_rearranged_with(
            2,
            seq,
            &input,
            &mut rearranged,
            &linear,
            input_size,
            output_size,
        );

        assert_eq!(row_major, rearranged);
    }

    #[test]
    fn test_rearrange_weights_layout() {
        // 32×32: four blocks; the second linear block must be the block at
        // (row_blk = 1, col_blk = 0) of the row-major buffer.
        let weights = pattern_words(32 * 32 / WORD_LANES, 9);
        let linear = rearrange_weights(&weights, 32, 32);
        assert_eq!(linear.len(), weights.len());

        let out_words = 32 / WORD_LANES;
        for r in 0..KERNEL_DIM {
            for c in 0..ROW_WORDS {
                assert_eq!(
                    linear[BLOCK_WORDS + r * ROW_WORDS + c],
                    weights[(KERNEL_DIM + r) * out_words + c]
                );
            }
        }
    }

    #[test]
    fn test_accumulates_into_seeded_output() {
        let (seq, input_size, output_size) = (16, 16, 16);
        let input = pattern_words(seq * input_size / WORD_LANES, 3);
        let weights = pattern_words(input_size * output_size / WORD_LANES, 4);
        let seed = pattern_words(seq * output_size / WORD_LANES, 7);

        let mut seeded = seed.clone();
        tiled_matmul_with(
            &TilingParams::default(),
            1,
            seq,
            &input,
            &mut seeded,
            &weights,
            input_size,
            output_size,
        );

        let mut fresh = vec![0u32; seq * output_size / WORD_LANES];
        tiled_matmul_with(
            &TilingParams::default(),
            1,
            seq,
            &input,
            &mut fresh,
            &weights,
            input_size,
            output_size,
        );

        // Accumulation is additive lane-wise on top of the seed.
        for (i, (&s, &f)) in seeded.iter().zip(fresh.iter()).enumerate() {
            let mut expect = seed[i];
            packed::merge(&mut expect, f);
            assert_eq!(s, expect);
        }
    }

    #[test]
    fn test_zero_weights_leave_output_untouched() {
        let (seq, input_size, output_size) = (32, 32, 32);
        let input = pattern_words(seq * input_size / WORD_LANES, 11);
        let weights = words(input_size * output_size / WORD_LANES, 0);
        let seed = pattern_words(seq * output_size / WORD_LANES, 12);

        let mut output = seed.clone();
        tiled_matmul_with(
            &TilingParams::default(),
            2,
            seq,
            &input,
            &mut output,
            &weights,
            input_size,
            output_size,
        );
        assert_eq!(output, seed);
    }
}
