//! Snapshot pipeline - normalize, aggregate, trim, assemble
//!
//! The transformation steps are pure functions over candle slices; the
//! assembler is the only part that performs I/O.

mod aggregate;
pub mod assembler;
mod normalize;
pub mod plan;
pub mod snapshot;
mod trim;

pub use aggregate::aggregate;
pub use assembler::{AssemblerOptions, FailurePolicy, SnapshotAssembler, SnapshotError};
pub use normalize::{is_ascending, normalize};
pub use plan::{PlanError, TimeframePlan, TimeframeSource, TimeframeSpec};
pub use snapshot::{SlotStatus, Snapshot, TimeframeSlot, Timeframes};
pub use trim::{trim_recent, trim_recent_owned};
