//! Runtime detection of 16-lane integer SIMD support.

use once_cell::sync::Lazy;

/// SIMD capability level for the 16-lane int8 kernels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimdLevel {
    /// aarch64 NEON (128-bit).
    Neon,
    /// x86_64 SSE2 (128-bit).
    Sse2,
    /// No 16-lane integer SIMD available.
    None,
}

impl std::fmt::Display for SimdLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimdLevel::Neon => write!(f, "neon"),
            SimdLevel::Sse2 => write!(f, "sse2"),
            SimdLevel::None => write!(f, "none"),
        }
    }
}

static LEVEL: Lazy<SimdLevel> = Lazy::new(detect);

/// The best available 16-lane kernel level, detected once per process.
pub fn simd_level() -> SimdLevel {
    *LEVEL
}

/// True when [`crate::simd_matmul`] can run on this machine.
pub fn simd_available() -> bool {
    simd_level() != SimdLevel::None
}

fn detect() -> SimdLevel {
    #[cfg(target_arch = "aarch64")]
    {
        if std::arch::is_aarch64_feature_detected!("neon") {
            return SimdLevel::Neon;
        }
    }
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("sse2") {
            return SimdLevel::Sse2;
        }
    }
    SimdLevel::None
}
