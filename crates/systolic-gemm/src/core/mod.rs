//! Core engines: the systolic tile model, its streaming protocol, the
//! multi-level block scheduler, and the dense cross-check engines.
//!
//! # Dataflow overview
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │ scheduler: outer seq group → L2 row → L2 col → worker seq tile │
//! │   → L2-internal row → L2-internal col                          │
//! │     ┌──────────────────────────────────────────────────┐       │
//! │     │ protocol (per 16×16 block):                      │       │
//! │     │   load 64 weight words → stream rows → drain     │       │
//! │     │     ┌──────────────────────────────┐             │       │
//! │     │     │ tile: weight-stationary MAC  │             │       │
//! │     │     │ array, 123-cycle fill latency│             │       │
//! │     │     └──────────────────────────────┘             │       │
//! │     └──────────────────────────────────────────────────┘       │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`dense`] provides the same numeric contract without any of the above:
//! a naive oracle and a cache-blocked variant, used for validation and as
//! non-accelerated execution paths.
//!
//! # Module contents
//!
//! - [`tile`](self::tile): [`SystolicTile`] and the timing constants
//! - `protocol`: the per-block load/stream/drain sequence
//! - [`scheduler`](self::scheduler): block decomposition and worker pool
//! - [`dense`](self::dense): reference and blocked dense engines

pub(crate) mod dense;
pub(crate) mod protocol;
pub(crate) mod scheduler;
pub(crate) mod tile;

pub use scheduler::{default_workers, rearrange_weights};
pub use tile::{drain_cycles, SystolicTile, OUTPUT_LATENCY};
