//! Public, shape-checked entry points for every compute engine.

use crate::core::{dense, scheduler};
use crate::error::Result;
use crate::simd;
use crate::types::packed::WORD_LANES;
use crate::types::{TilingParams, KERNEL_DIM};

fn check_shapes(
    seq_len: usize,
    input: &[u32],
    output: &[u32],
    weights: &[u32],
    input_size: usize,
    output_size: usize,
) {
    assert_eq!(seq_len % KERNEL_DIM, 0, "seq_len must be a multiple of {KERNEL_DIM}");
    assert_eq!(input_size % KERNEL_DIM, 0, "input_size must be a multiple of {KERNEL_DIM}");
    assert_eq!(output_size % KERNEL_DIM, 0, "output_size must be a multiple of {KERNEL_DIM}");
    assert_eq!(input.len(), seq_len * input_size / WORD_LANES, "input buffer size mismatch");
    assert_eq!(output.len(), seq_len * output_size / WORD_LANES, "output buffer size mismatch");
    assert_eq!(
        weights.len(),
        input_size * output_size / WORD_LANES,
        "weight buffer size mismatch"
    );
}

/// Row-major weight-stationary tiled GEMM through the emulated systolic
/// tile, with default cache budgets and worker pool.
///
/// `output` accumulates in place: pre-zero it for a plain product.
///
/// # Example
///
/// Identity weights reproduce the input:
///
/// ```
/// use systolic_gemm::{packed, tiled_matmul, KERNEL_DIM};
///
/// let row_words = KERNEL_DIM / 4;
/// let input: Vec<u32> = (0..KERNEL_DIM * row_words).map(|w| w as u32 * 0x01010101).collect();
///
/// let mut weights = vec![0u32; KERNEL_DIM * row_words];
/// for d in 0..KERNEL_DIM {
///     let mut lanes = [0i8; 4];
///     lanes[d % 4] = 1;
///     weights[d * row_words + d / 4] = packed::pack(lanes);
/// }
///
/// let mut output = vec![0u32; KERNEL_DIM * row_words];
/// tiled_matmul(KERNEL_DIM, &input, &mut output, &weights, KERNEL_DIM, KERNEL_DIM);
/// assert_eq!(output, input);
/// ```
pub fn tiled_matmul(
    seq_len: usize,
    input: &[u32],
    output: &mut [u32],
    weights: &[u32],
    input_size: usize,
    output_size: usize,
) {
    check_shapes(seq_len, input, output, weights, input_size, output_size);
    scheduler::tiled_matmul_with(
        &TilingParams::default(),
        scheduler::default_workers(),
        seq_len,
        input,
        output,
        weights,
        input_size,
        output_size,
    );
}

/// Block-stationary tiled GEMM over a weight buffer pre-linearized with
/// [`rearrange_weights`](crate::rearrange_weights).
///
/// Produces output bit-identical to [`tiled_matmul`] on the same logical
/// weights; the layouts trade an upfront rearrangement for sequential
/// weight loads amortized across the whole sequence.
pub fn tiled_matmul_rearranged(
    seq_len: usize,
    input: &[u32],
    output: &mut [u32],
    weights: &[u32],
    input_size: usize,
    output_size: usize,
) {
    check_shapes(seq_len, input, output, weights, input_size, output_size);
    scheduler::tiled_matmul_rearranged_with(
        scheduler::default_workers(),
        seq_len,
        input,
        output,
        weights,
        input_size,
        output_size,
    );
}

/// Naive dense GEMM: the correctness oracle every other engine must match
/// byte for byte.
pub fn reference_matmul(
    seq_len: usize,
    input: &[u32],
    output: &mut [u32],
    weights: &[u32],
    input_size: usize,
    output_size: usize,
) {
    check_shapes(seq_len, input, output, weights, input_size, output_size);
    dense::reference_matmul(seq_len, input, output, weights, input_size, output_size);
}

/// Cache-blocked dense GEMM with default budgets; bit-identical to
/// [`reference_matmul`] without tile emulation overhead.
pub fn blocked_matmul(
    seq_len: usize,
    input: &[u32],
    output: &mut [u32],
    weights: &[u32],
    input_size: usize,
    output_size: usize,
) {
    check_shapes(seq_len, input, output, weights, input_size, output_size);
    dense::blocked_matmul(
        &TilingParams::default(),
        seq_len,
        input,
        output,
        weights,
        input_size,
        output_size,
    );
}

/// 16-lane vectorized dense GEMM.
///
/// # Errors
///
/// [`GemmError::SimdUnsupported`](crate::GemmError::SimdUnsupported) on
/// platforms without 16-lane integer SIMD; gate on
/// [`simd_available`](crate::simd_available).
pub fn simd_matmul(
    seq_len: usize,
    input: &[u32],
    output: &mut [u32],
    weights: &[u32],
    input_size: usize,
    output_size: usize,
) -> Result<()> {
    check_shapes(seq_len, input, output, weights, input_size, output_size);
    simd::simd_matmul(seq_len, input, output, weights, input_size, output_size)
}

/// Compute engine selected for a [`Matmul`] invocation.
///
/// Which engine a deployment uses is a build-configuration decision of the
/// embedding layer; all of them share one numeric contract and produce
/// byte-identical output for the same logical inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    /// Naive dense oracle.
    Reference,
    /// Cache-blocked dense.
    Blocked,
    /// Systolic tile emulation, row-major weights.
    Tiled,
    /// Systolic tile emulation, pre-linearized weights (pass a buffer from
    /// [`rearrange_weights`](crate::rearrange_weights)).
    TiledRearranged,
    /// 16-lane vector kernel; requires platform support.
    Simd,
}

/// Builder for configuring a GEMM invocation.
///
/// # Example
///
/// All-zero weights leave a zeroed output untouched regardless of input:
///
/// ```
/// use systolic_gemm::{Engine, Matmul};
///
/// let input = vec![0x7f03_fe01_u32; 64]; // 16×16
/// let weights = vec![0u32; 64];
/// let mut output = vec![0u32; 64];
///
/// Matmul::new(16, 16, 16)
///     .engine(Engine::Tiled)
///     .workers(2)
///     .execute(&input, &mut output, &weights)?;
///
/// assert!(output.iter().all(|&w| w == 0));
/// # Ok::<(), systolic_gemm::GemmError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Matmul {
    seq_len: usize,
    input_size: usize,
    output_size: usize,
    engine: Engine,
    params: TilingParams,
    workers: usize,
}

impl Matmul {
    /// Create a builder for a `(seq_len × input_size) × (input_size ×
    /// output_size)` GEMM with the tiled engine, default cache budgets and
    /// a core-sized worker pool.
    pub fn new(seq_len: usize, input_size: usize, output_size: usize) -> Self {
        Self {
            seq_len,
            input_size,
            output_size,
            engine: Engine::Tiled,
            params: TilingParams::default(),
            workers: scheduler::default_workers(),
        }
    }

    /// Select the compute engine.
    pub fn engine(mut self, engine: Engine) -> Self {
        self.engine = engine;
        self
    }

    /// Override the cache-budget tiling parameters.
    pub fn tiling(mut self, params: TilingParams) -> Self {
        self.params = params;
        self
    }

    /// Set the worker-pool size for the tiled engines (clamped to at
    /// least 1). Output is identical for any pool size.
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Execute the GEMM, accumulating into `output`.
    ///
    /// For [`Engine::TiledRearranged`], `weights` must be a buffer from
    /// [`rearrange_weights`](crate::rearrange_weights).
    ///
    /// # Errors
    ///
    /// [`GemmError::SimdUnsupported`](crate::GemmError::SimdUnsupported)
    /// when [`Engine::Simd`] is selected without platform support.
    pub fn execute(&self, input: &[u32], output: &mut [u32], weights: &[u32]) -> Result<()> {
        check_shapes(self.seq_len, input, output, weights, self.input_size, self.output_size);
        match self.engine {
            Engine::Reference => {
                dense::reference_matmul(
                    self.seq_len,
                    input,
                    output,
                    weights,
                    self.input_size,
                    self.output_size,
                );
                Ok(())
            }
            Engine::Blocked => {
                dense::blocked_matmul(
                    &self.params,
                    self.seq_len,
                    input,
                    output,
                    weights,
                    self.input_size,
                    self.output_size,
                );
                Ok(())
            }
            Engine::Tiled => {
                scheduler::tiled_matmul_with(
                    &self.params,
                    self.workers,
                    self.seq_len,
                    input,
                    output,
                    weights,
                    self.input_size,
                    self.output_size,
                );
                Ok(())
            }
            Engine::TiledRearranged => {
                scheduler::tiled_matmul_rearranged_with(
                    self.workers,
                    self.seq_len,
                    input,
                    output,
                    weights,
                    self.input_size,
                    self.output_size,
                );
                Ok(())
            }
            Engine::Simd => simd::simd_matmul(
                self.seq_len,
                input,
                output,
                weights,
                self.input_size,
                self.output_size,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simd::simd_available;
    use crate::testing::pattern_words;
    use crate::types::packed;

    fn shapes() -> [(usize, usize, usize); 3] {
        [(16, 16, 16), (64, 48, 32), (144, 32, 64)]
    }

    #[test]
    fn test_all_engines_agree() {
        for (seq, input_size, output_size) in shapes() {
            let input = pattern_words(seq * input_size / WORD_LANES, 61);
            let weights = pattern_words(input_size * output_size / WORD_LANES, 62);
            let out_len = seq * output_size / WORD_LANES;

            let mut reference = vec![0u32; out_len];
            reference_matmul(seq, &input, &mut reference, &weights, input_size, output_size);

            let mut blocked = vec![0u32; out_len];
            blocked_matmul(seq, &input, &mut blocked, &weights, input_size, output_size);
            assert_eq!(blocked, reference, "blocked, shape {seq}x{input_size}x{output_size}");

            let mut tiled = vec![0u32; out_len];
            tiled_matmul(seq, &input, &mut tiled, &weights, input_size, output_size);
            assert_eq!(tiled, reference, "tiled, shape {seq}x{input_size}x{output_size}");

            let linear = crate::core::rearrange_weights(&weights, input_size, output_size);
            let mut rearranged = vec![0u32; out_len];
            tiled_matmul_rearranged(
                seq,
                &input,
                &mut rearranged,
                &linear,
                input_size,
                output_size,
            );
            assert_eq!(
                rearranged, reference,
                "rearranged, shape {seq}x{input_size}x{output_size}"
            );

            if simd_available() {
                let mut simd = vec![0u32; out_len];
                simd_matmul(seq, &input, &mut simd, &weights, input_size, output_size).unwrap();
                assert_eq!(simd, reference, "simd, shape {seq}x{input_size}x{output_size}");
            }
        }
    }

    #[test]
    fn test_builder_dispatches_every_engine() {
        let (seq, size) = (32, 32);
        let input = pattern_words(seq * size / WORD_LANES, 71);
        let weights = pattern_words(size * size / WORD_LANES, 72);

        let mut reference = vec![0u32; seq * size / WORD_LANES];
        Matmul::new(seq, size, size)
            .engine(Engine::Reference)
            .execute(&input, &mut reference, &weights)
            .unwrap();

        for engine in [Engine::Blocked, Engine::Tiled] {
            let mut out = vec![0u32; seq * size / WORD_LANES];
            Matmul::new(seq, size, size)
                .engine(engine)
                .workers(3)
                .execute(&input, &mut out, &weights)
                .unwrap();
            assert_eq!(out, reference, "{engine:?}");
        }

        let linear = crate::core::rearrange_weights(&weights, size, size);
        let mut out = vec![0u32; seq * size / WORD_LANES];
        Matmul::new(seq, size, size)
            .engine(Engine::TiledRearranged)
            .execute(&input, &mut out, &linear)
            .unwrap();
        assert_eq!(out, reference);

        let mut out = vec![0u32; seq * size / WORD_LANES];
        let simd = Matmul::new(seq, size, size)
            .engine(Engine::Simd)
            .execute(&input, &mut out, &weights);
        if simd_available() {
            simd.unwrap();
            assert_eq!(out, reference);
        } else {
            simd.unwrap_err();
        }
    }

    #[test]
    fn test_identity_weights_end_to_end() {
        // Block-diagonal identity over a 16×16 weight matrix reproduces an
        // arbitrary 16-row input exactly, modulo pre-existing output.
        let row_words = KERNEL_DIM / WORD_LANES;
        let input = pattern_words(KERNEL_DIM * row_words, 81);
        let mut weights = vec![0u32; KERNEL_DIM * row_words];
        for d in 0..KERNEL_DIM {
            let mut lanes = [0i8; WORD_LANES];
            lanes[d % WORD_LANES] = 1;
            weights[d * row_words + d / WORD_LANES] = packed::pack(lanes);
        }

        let seed = pattern_words(KERNEL_DIM * row_words, 82);
        let mut output = seed.clone();
        tiled_matmul(KERNEL_DIM, &input, &mut output, &weights, KERNEL_DIM, KERNEL_DIM);

        for i in 0..output.len() {
            let mut expect = seed[i];
            packed::merge(&mut expect, input[i]);
            assert_eq!(output[i], expect);
        }
    }

    #[test]
    #[should_panic(expected = "input buffer size mismatch")]
    fn test_shape_check_rejects_short_input() {
        let mut output = vec![0u32; 64];
        tiled_matmul(16, &[0u32; 10], &mut output, &[0u32; 64], 16, 16);
    }

    #[test]
    #[should_panic(expected = "multiple of 16")]
    fn test_shape_check_rejects_unaligned_dims() {
        let mut output = vec![0u32; 40];
        tiled_matmul(10, &[0u32; 40], &mut output, &[0u32; 64], 16, 16);
    }
}
