//! Dense int8 GEMM engines that bypass the tile emulation.
//!
//! [`reference_matmul`] is the ground-truth oracle: a naive triple loop
//! with no tiling and no pipeline model. [`blocked_matmul`] is the same
//! numeric contract under an L1/L2 cache-blocked traversal, accumulating
//! per-k-block partial sums. Because lane truncation is reduction mod 256
//! and lane merging is mod-256 addition, splitting the k-sum across blocks
//! cannot change the result: every engine in this crate is bit-identical.

use crate::types::packed::{self, WORD_LANES};
use crate::types::TilingParams;

/// Naive dense GEMM: `output[row][col] += Σ_k input[row][k] * weight[k][col]`
/// over logical i8 lanes, with i32 inner accumulation truncated to i8 per
/// output element.
///
/// Dimensions must be multiples of [`crate::KERNEL_DIM`]; the output
/// accumulates in place.
pub fn reference_matmul(
    seq_len: usize,
    input: &[u32],
    output: &mut [u32],
    weights: &[u32],
    input_size: usize,
    output_size: usize,
) {
    let in_words = input_size / WORD_LANES;
    let out_words = output_size / WORD_LANES;

    for row in 0..seq_len {
        for w in 0..out_words {
            let mut lanes = [0i8; WORD_LANES];
            for (l, lane) in lanes.iter_mut().enumerate() {
                let col = w * WORD_LANES + l;
                let mut acc = 0i32;
                for k in 0..input_size {
                    acc += packed::get_lane(input, in_words, row, k) as i32
                        * packed::get_lane(weights, out_words, k, col) as i32;
                }
                *lane = acc as i8;
            }
            packed::merge(&mut output[row * out_words + w], packed::pack(lanes));
        }
    }
}

/// Largest power-of-two fraction of `budget` that divides `dim`, never
/// below `floor`. Keeps the blocked traversal exact on dimensions that are
/// multiples of the tile size but not of the cache budget.
fn fit_block(budget: usize, dim: usize, floor: usize) -> usize {
    let mut block = budget.min(dim);
    while dim % block != 0 && block > floor {
        block /= 2;
    }
    block
}

/// Cache-blocked dense GEMM, numerically identical to
/// [`reference_matmul`].
///
/// The traversal mirrors the tiled scheduler's L1/L2 structure over the
/// same [`TilingParams`] budgets, but computes each block with plain
/// nested loops instead of the tile protocol. Partial sums for each
/// k-block are truncated to i8 and merged, which by mod-256 additivity
/// matches the single-pass truncation of the reference.
pub fn blocked_matmul(
    params: &TilingParams,
    seq_len: usize,
    input: &[u32],
    output: &mut [u32],
    weights: &[u32],
    input_size: usize,
    output_size: usize,
) {
    let in_words = input_size / WORD_LANES;
    let out_words = output_size / WORD_LANES;

    let seq_block = params.seq_block_rows.min(seq_len);
    let k_block = fit_block(params.l1_weight_cols, input_size, WORD_LANES);
    // Budget not spent on a narrow k dimension widens the column block.
    let ratio = params.l1_weight_cols / k_block;
    let col_block = fit_block(params.l1_weight_cols * ratio, output_size, WORD_LANES);

    let seq_blocks = seq_len.div_ceil(seq_block);
    let k_blocks = input_size / k_block;
    let col_blocks = output_size / col_block;

    let l2_seq = (params.l2_seq_rows / seq_block).clamp(1, seq_blocks);
    let l2_k = (params.l2_weight_rows / k_block).clamp(1, k_blocks);
    let l2_col = (params.l2_weight_cols / col_block).clamp(1, col_blocks);

    for outer_seq in 0..seq_blocks.div_ceil(l2_seq) {
        for outer_k in 0..k_blocks.div_ceil(l2_k) {
            for outer_col in 0..col_blocks.div_ceil(l2_col) {
                for l2_seq_idx in 0..l2_seq {
                    let seq_idx = outer_seq * l2_seq + l2_seq_idx;
                    let row_base = seq_idx * seq_block;
                    if row_base >= seq_len {
                        continue;
                    }
                    let rows = seq_block.min(seq_len - row_base);

                    for l2_k_idx in 0..l2_k {
                        let k_idx = outer_k * l2_k + l2_k_idx;
                        let k_base = k_idx * k_block;
                        if k_base >= input_size {
                            continue;
                        }

                        for l2_col_idx in 0..l2_col {
                            let col_idx = outer_col * l2_col + l2_col_idx;
                            let col_base = col_idx * col_block;
                            if col_base >= output_size {
                                continue;
                            }

                            for i in 0..rows {
                                let row = row_base + i;
                                for w in 0..col_block / WORD_LANES {
                                    let mut lanes = [0i8; WORD_LANES];
                                    for (l, lane) in lanes.iter_mut().enumerate() {
                                        let col = col_base + w * WORD_LANES + l;
                                        let mut acc = 0i32;
                                        for k in k_base..k_base + k_block {
                                            acc += packed::get_lane(input, in_words, row, k)
                                                as i32
                                                * packed::get_lane(weights, out_words, k, col)
                                                    as i32;
                                        }
                                        *lane = acc as i8;
                                    }
                                    packed::merge(
                                        &mut output
                                            [row * out_words + col_base / WORD_LANES + w],
                                        packed::pack(lanes),
                                    );
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}
