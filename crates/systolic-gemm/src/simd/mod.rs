//! 16-lane vectorized dense GEMM with runtime capability dispatch.
//!
//! # Supported targets
//!
//! | Architecture | Instruction set | Register width |
//! |--------------|-----------------|----------------|
//! | aarch64 | NEON | 128-bit (16 × i8) |
//! | x86_64 | SSE2 | 128-bit (16 × i8) |
//!
//! On any other target [`simd_matmul`] reports
//! [`GemmError::SimdUnsupported`] before touching the buffers; missing
//! vector support is the one failure this crate surfaces as an error
//! rather than a contract violation. Callers select the engine at
//! configuration time and should feature-detect with [`simd_available`]:
//!
//! ```
//! use systolic_gemm::simd_available;
//!
//! if simd_available() {
//!     // dispatch the vector path
//! }
//! ```
//!
//! The kernel keeps 16 weight rows resident in 16 vector registers per
//! output tile, broadcasts each input lane and accumulates with wrapping
//! 8-bit multiply-add, then adds the tile result onto the existing output
//! in place. Results are bit-identical to every other engine.

mod detect;
mod kernels;

pub use detect::{simd_available, simd_level, SimdLevel};

#[cfg(any(target_arch = "aarch64", target_arch = "x86_64"))]
use log::debug;

use crate::error::{GemmError, Result};

/// Vectorized dense GEMM over packed int8 buffers.
///
/// Same numeric contract and buffer layout as
/// [`reference_matmul`](crate::reference_matmul); dimensions must be
/// multiples of [`KERNEL_DIM`](crate::KERNEL_DIM). Exposed to callers
/// through the shape-checked wrapper at the crate root.
///
/// # Errors
///
/// [`GemmError::SimdUnsupported`] when the platform lacks 16-lane integer
/// SIMD.
pub(crate) fn simd_matmul(
    seq_len: usize,
    input: &[u32],
    output: &mut [u32],
    weights: &[u32],
    input_size: usize,
    output_size: usize,
) -> Result<()> {
    match simd_level() {
        #[cfg(target_arch = "aarch64")]
        SimdLevel::Neon => {
            debug!("simd gemm {seq_len}x{input_size}x{output_size} via neon");
            unsafe {
                kernels::neon::gemm_i8(
                    seq_len,
                    input.as_ptr() as *const i8,
                    output.as_mut_ptr() as *mut i8,
                    weights.as_ptr() as *const i8,
                    input_size,
                    output_size,
                );
            }
            Ok(())
        }
        #[cfg(target_arch = "x86_64")]
        SimdLevel::Sse2 => {
            debug!("simd gemm {seq_len}x{input_size}x{output_size} via sse2");
            unsafe {
                kernels::sse2::gemm_i8(
                    seq_len,
                    input.as_ptr() as *const i8,
                    output.as_mut_ptr() as *mut i8,
                    weights.as_ptr() as *const i8,
                    input_size,
                    output_size,
                );
            }
            Ok(())
        }
        level => Err(GemmError::SimdUnsupported { detected: level }),
    }
}
