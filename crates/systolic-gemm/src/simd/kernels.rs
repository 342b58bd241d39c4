//! Architecture-specific 16-lane int8 GEMM kernels.
//!
//! Both kernels implement the same dataflow: for each (k-block, n-block)
//! pair, 16 weight rows are loaded into 16 vector registers once, then for
//! each 16-row input block every input lane is broadcast across a register
//! and multiply-accumulated into 16 row accumulators with wrapping 8-bit
//! arithmetic. Results are added in place onto the existing output bytes,
//! the vectorized form of the lane accumulator in
//! [`crate::packed::merge`].
//!
//! Because the packed-word lane order is the in-memory byte order, the
//! kernels operate directly on the byte view of the `u32` buffers with no
//! per-lane shuffling.
//!
//! All dimensions must be multiples of 16; callers go through
//! [`crate::simd_matmul`], which checks capability first.

#[cfg(target_arch = "aarch64")]
pub(crate) mod neon {
    use std::arch::aarch64::*;

    // 16-lane registers, 16×16 register blocks.
    const V: usize = crate::types::KERNEL_DIM;

    /// NEON int8 GEMM over raw byte views of the packed buffers.
    ///
    /// # Safety
    ///
    /// Pointers must cover `seq_len × input_size`, `seq_len × output_size`
    /// and `input_size × output_size` bytes respectively, and all three
    /// dimensions must be multiples of 16.
    #[target_feature(enable = "neon")]
    pub unsafe fn gemm_i8(
        seq_len: usize,
        input: *const i8,
        output: *mut i8,
        weights: *const i8,
        input_size: usize,
        output_size: usize,
    ) {
        for kb in 0..input_size / V {
            for nb in 0..output_size / V {
                let mut b = [vdupq_n_s8(0); V];
                for (r, reg) in b.iter_mut().enumerate() {
                    *reg = vld1q_s8(weights.add((kb * V + r) * output_size + nb * V));
                }

                for mb in 0..seq_len / V {
                    let mut c = [vdupq_n_s8(0); V];
                    for (r, acc) in c.iter_mut().enumerate() {
                        let a_row = std::slice::from_raw_parts(
                            input.add((mb * V + r) * input_size + kb * V),
                            V,
                        );
                        for (i, &a) in a_row.iter().enumerate() {
                            *acc = vmlaq_s8(*acc, b[i], vdupq_n_s8(a));
                        }
                    }

                    for (r, &acc) in c.iter().enumerate() {
                        let dst = output.add((mb * V + r) * output_size + nb * V);
                        vst1q_s8(dst, vaddq_s8(vld1q_s8(dst), acc));
                    }
                }
            }
        }
    }
}

#[cfg(target_arch = "x86_64")]
pub(crate) mod sse2 {
    use std::arch::x86_64::*;

    const V: usize = crate::types::KERNEL_DIM;

    /// Wrapping 8-bit lane product: SSE2 has no byte multiply, so even and
    /// odd bytes are multiplied as 16-bit lanes and recombined. The low
    /// byte of a 16-bit product only depends on the low bytes of its
    /// factors, which is exactly mod-256 semantics.
    #[inline]
    unsafe fn mul_i8(a: __m128i, b: __m128i) -> __m128i {
        let mask = _mm_set1_epi16(0x00FF);
        let even = _mm_mullo_epi16(a, b);
        let odd = _mm_slli_epi16::<8>(_mm_mullo_epi16(
            _mm_srli_epi16::<8>(a),
            _mm_srli_epi16::<8>(b),
        ));
        _mm_or_si128(_mm_and_si128(even, mask), odd)
    }

    /// SSE2 int8 GEMM over raw byte views of the packed buffers.
    ///
    /// # Safety
    ///
    /// Same contract as the NEON kernel: full-size buffers, all dimensions
    /// multiples of 16.
    #[target_feature(enable = "sse2")]
    pub unsafe fn gemm_i8(
        seq_len: usize,
        input: *const i8,
        output: *mut i8,
        weights: *const i8,
        input_size: usize,
        output_size: usize,
    ) {
        for kb in 0..input_size / V {
            for nb in 0..output_size / V {
                let mut b = [_mm_setzero_si128(); V];
                for (r, reg) in b.iter_mut().enumerate() {
                    *reg = _mm_loadu_si128(
                        weights.add((kb * V + r) * output_size + nb * V) as *const __m128i
                    );
                }

                for mb in 0..seq_len / V {
                    let mut c = [_mm_setzero_si128(); V];
                    for (r, acc) in c.iter_mut().enumerate() {
                        let a_row = std::slice::from_raw_parts(
                            input.add((mb * V + r) * input_size + kb * V),
                            V,
                        );
                        for (i, &a) in a_row.iter().enumerate() {
                            *acc = _mm_add_epi8(*acc, mul_i8(b[i], _mm_set1_epi8(a)));
                        }
                    }

                    for (r, &acc) in c.iter().enumerate() {
                        let dst =
                            output.add((mb * V + r) * output_size + nb * V) as *mut __m128i;
                        _mm_storeu_si128(dst, _mm_add_epi8(_mm_loadu_si128(dst), acc));
                    }
                }
            }
        }
    }
}
