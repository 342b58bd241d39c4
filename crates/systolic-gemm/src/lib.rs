//! Emulation of a weight-stationary systolic-array matrix-multiplication
//! accelerator, driven by a multi-level cache-blocked scheduler, for
//! quantized (int8) transformer GEMMs.
//!
//! # What this crate models
//!
//! A fixed-size 16×16 compute tile holds a weight block stationary while
//! input rows stream through one packed word per cycle. Outputs become
//! defined only after a fixed pipeline-fill latency and must be drained
//! with zero-input cycles after the last real row. That timing contract of
//! the hardware unit is reproduced exactly by [`SystolicTile`] and the
//! streaming protocol behind [`tiled_matmul`].
//!
//! On top of the tile, the scheduler decomposes an arbitrarily large GEMM
//! into tile-sized blocks, cache-budget-sized L2 groups and a static
//! partition across a pool of workers, each owning a private tile
//! ([`TilingParams`] exposes the budgets). Two weight layouts are
//! supported: row-major ([`tiled_matmul`]) and pre-linearized
//! block-stationary ([`tiled_matmul_rearranged`] over a buffer from
//! [`rearrange_weights`]).
//!
//! Dense engines sharing the identical numeric contract serve as oracle
//! and non-accelerated execution paths: [`reference_matmul`],
//! [`blocked_matmul`] and the 16-lane vector kernel [`simd_matmul`].
//! For the same inputs, **all engines produce byte-identical output**.
//!
//! # Buffer format
//!
//! Matrices are flat `u32` buffers, four signed 8-bit lanes per word, lane
//! 0 in the low byte (see [`packed`]). Partial sums merge into the output
//! with lane-wise wrapping adds; overflow wraps by design and wraps
//! identically in every engine. All dimensions must be multiples of
//! [`KERNEL_DIM`].
//!
//! # Quick start
//!
//! ```
//! use systolic_gemm::{reference_matmul, tiled_matmul, Engine, Matmul};
//!
//! let (seq_len, input_size, output_size) = (32, 32, 32);
//! let input = vec![0x0102_0304_u32; seq_len * input_size / 4];
//! let weights = vec![0x0000_0100_u32; input_size * output_size / 4];
//!
//! // The emulated accelerator path...
//! let mut tiled = vec![0u32; seq_len * output_size / 4];
//! tiled_matmul(seq_len, &input, &mut tiled, &weights, input_size, output_size);
//!
//! // ...matches the dense oracle byte for byte.
//! let mut reference = vec![0u32; seq_len * output_size / 4];
//! reference_matmul(seq_len, &input, &mut reference, &weights, input_size, output_size);
//! assert_eq!(tiled, reference);
//!
//! // Engine selection is a configuration-time decision:
//! let mut out = vec![0u32; seq_len * output_size / 4];
//! Matmul::new(seq_len, input_size, output_size)
//!     .engine(Engine::Blocked)
//!     .execute(&input, &mut out, &weights)?;
//! assert_eq!(out, reference);
//! # Ok::<(), systolic_gemm::GemmError>(())
//! ```
//!
//! # Cargo features
//!
//! | Feature | Default | Effect |
//! |------------|---------|----------------------------------------|
//! | `parallel` | yes | rayon-backed worker pool for the tiled engines |

mod api;
mod core;
mod error;
mod simd;
mod types;

#[cfg(test)]
mod testing;

pub use api::{
    blocked_matmul, reference_matmul, simd_matmul, tiled_matmul, tiled_matmul_rearranged, Engine,
    Matmul,
};
pub use crate::core::{
    default_workers, drain_cycles, rearrange_weights, SystolicTile, OUTPUT_LATENCY,
};
pub use error::{GemmError, Result};
pub use simd::{simd_available, simd_level, SimdLevel};
pub use types::packed;
pub use types::{TilingParams, KERNEL_DIM, ROW_WORDS};
