//! Behavioral model of one weight-stationary systolic compute tile.
//!
//! The tile emulates a fixed-size `KERNEL_DIM × KERNEL_DIM` array of
//! multiply-accumulate cells with weights held stationary while input rows
//! stream through. The emulation is behavioral, not cycle-accurate: it
//! reproduces exactly what a caller can observe through the streaming
//! protocol (which word comes back on which cycle) without modeling the
//! internal diagonal wavefront.
//!
//! # Timing contract
//!
//! Every [`SystolicTile::queue`] or [`SystolicTile::stream`] call advances
//! the tile by one cycle. Numbering cycles from zero at the last weight
//! load, the word returned by cycle `c` is output word `c -`
//! [`OUTPUT_LATENCY`]; anything returned before the pipeline has filled
//! (`c < OUTPUT_LATENCY`) is garbage that the caller must discard. The tile
//! has no way to flag "not yet valid": like the hardware it models, the
//! fixed fill latency *is* the signal.
//!
//! After the last real input row of a block the pipeline still holds the
//! tail of the results; the caller flushes it by issuing zero-input cycles
//! up to [`drain_cycles`] (see [`crate::core::protocol`]).

use std::collections::VecDeque;

use crate::types::packed::{self, WORD_LANES};
use crate::types::{KERNEL_DIM, ROW_WORDS};

/// Cycles after a weight load before tile outputs are defined.
///
/// One row takes `ROW_WORDS` cycles to enter; the diagonal wavefront takes
/// `2*KERNEL_DIM - 1` row-times to cross the array, minus the cycle on
/// which the first word appears.
pub const OUTPUT_LATENCY: usize = ROW_WORDS * (2 * KERNEL_DIM - 1) - 1;

/// Total cycles (input plus drain) needed to flush every valid output word
/// for a block of `rows` streamed input rows.
#[inline]
pub const fn drain_cycles(rows: usize) -> usize {
    ROW_WORDS * (rows + 2 * KERNEL_DIM - 1) - 1
}

/// One emulated weight-stationary compute tile.
///
/// A tile is exclusively owned by the worker driving it: it is created once
/// per worker, reused for every block that worker processes, and its weight
/// memory is overwritten in place on each reload.
#[derive(Debug, Clone)]
pub struct SystolicTile {
    /// Stationary weights, row-major `[k][col]`.
    weights: [i8; KERNEL_DIM * KERNEL_DIM],
    /// The input row currently being assembled from queued lane words.
    staging: [i8; KERNEL_DIM],
    /// Output words computed but still inside the pipeline.
    pending: VecDeque<u32>,
    /// Cycles since the last weight load.
    cycle: usize,
    /// True while every loaded weight word has been zero.
    zero_weights: bool,
}

impl SystolicTile {
    /// Create an idle tile with zeroed weight memory.
    pub fn new() -> Self {
        Self {
            weights: [0; KERNEL_DIM * KERNEL_DIM],
            staging: [0; KERNEL_DIM],
            pending: VecDeque::with_capacity(2 * KERNEL_DIM * ROW_WORDS),
            cycle: 0,
            zero_weights: true,
        }
    }

    /// Write one packed weight word at flattened element `index`
    /// (row-major, so word `w` of the block lands at `index = w * 4`).
    ///
    /// Loading element 0 begins a new block: the cycle counter, staging row
    /// and output pipeline reset. Loads must be serialized before
    /// streaming; there is no mid-stream guard.
    pub fn load_weights(&mut self, index: usize, word: u32) {
        if index == 0 {
            self.staging = [0; KERNEL_DIM];
            self.pending.clear();
            self.cycle = 0;
            self.zero_weights = true;
        }
        let lanes = packed::unpack(word);
        self.weights[index..index + WORD_LANES]
            .copy_from_slice(&lanes);
        if word != 0 {
            self.zero_weights = false;
        }
    }

    /// True when the currently loaded weight block is entirely zero, in
    /// which case streaming it would contribute exactly nothing and the
    /// caller may skip the block outright.
    pub fn is_zero_block(&self) -> bool {
        self.zero_weights
    }

    /// Cycles elapsed since the last weight load.
    pub fn cycle(&self) -> usize {
        self.cycle
    }

    /// Stage one packed input word for lane `lane` (`0..ROW_WORDS-1`) of
    /// the current row and advance one cycle.
    ///
    /// Returns the output word that becomes valid on this cycle; garbage
    /// before [`OUTPUT_LATENCY`] cycles have elapsed.
    pub fn queue(&mut self, lane: usize, word: u32) -> u32 {
        debug_assert!(lane < ROW_WORDS - 1, "final lane must go through stream()");
        self.stage(lane, word);
        self.advance()
    }

    /// Stage the final lane of the current row, push the completed row
    /// through the array, and advance one cycle.
    ///
    /// All `ROW_WORDS` lanes of the row are consumed together at this
    /// point. Returns as [`SystolicTile::queue`] does.
    pub fn stream(&mut self, word: u32) -> u32 {
        self.stage(ROW_WORDS - 1, word);
        self.fire_row();
        self.advance()
    }

    fn stage(&mut self, lane: usize, word: u32) {
        let lanes = packed::unpack(word);
        self.staging[lane * WORD_LANES..(lane + 1) * WORD_LANES]
            .copy_from_slice(&lanes);
    }

    /// Multiply the staged row against the stationary weights and enqueue
    /// the row's output words. Column sums accumulate in 32 bits and are
    /// truncated to 8 on the way out, matching the narrow output port.
    fn fire_row(&mut self) {
        for w in 0..ROW_WORDS {
            let mut lanes = [0i8; WORD_LANES];
            for (l, lane) in lanes.iter_mut().enumerate() {
                let col = w * WORD_LANES + l;
                let mut acc = 0i32;
                for k in 0..KERNEL_DIM {
                    acc += self.staging[k] as i32 * self.weights[k * KERNEL_DIM + col] as i32;
                }
                *lane = acc as i8;
            }
            self.pending.push_back(packed::pack(lanes));
        }
    }

    fn advance(&mut self) -> u32 {
        let out = if self.cycle >= OUTPUT_LATENCY {
            self.pending.pop_front().unwrap_or(0)
        } else {
            0
        };
        self.cycle += 1;
        out
    }
}

impl Default for SystolicTile {
    fn default() -> Self {
        Self::new()
    }
}
