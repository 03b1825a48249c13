//! Table timeline derivation.
//!
//! Pure, synchronous stages recomputed from the effective reservation set:
//!
//! 1. [`IntervalIndex`]: per-table sorted `[start, end)` lists
//! 2. [`conflicts_by_table`]: overlapping pairs per table
//! 3. [`assign_stacks`]: minimum display lanes per table
//! 4. [`compute_rotations`]: sequential turn numbers per table
//!
//! [`compute_view`] runs all of them and bundles the result.

mod conflicts;
mod interval_index;
mod rotation;
mod stacking;
mod view;

pub use conflicts::{conflicts_by_table, ConflictPair, Conflicts};
pub use interval_index::{Interval, IntervalIndex};
pub use rotation::{compute_rotations, display_rotation, RotationIndex, TurnFilter};
pub use stacking::{assign_stacks, StackAssignment, TableStack};
pub use view::{compute_view, DerivedGridView};
