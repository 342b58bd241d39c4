//! Error types.
//!
//! This crate has almost no recoverable-error surface: shape mismatches
//! and protocol misuse are contract violations that produce incorrect
//! numbers, not reported failures (the safe API asserts shapes instead).
//! The one condition worth surfacing before dispatch is a platform without
//! the vector width the SIMD engine needs.

use thiserror::Error;

use crate::simd::SimdLevel;

/// Errors that can occur when dispatching a GEMM engine.
#[derive(Debug, Error)]
pub enum GemmError {
    /// The SIMD engine was requested on a platform without 16-lane
    /// integer SIMD.
    #[error("no 16-lane integer SIMD on this platform (detected: {detected})")]
    SimdUnsupported {
        /// The capability level that was detected instead.
        detected: SimdLevel,
    },
}

/// Result type for engine dispatch.
pub type Result<T> = std::result::Result<T, GemmError>;
