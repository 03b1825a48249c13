//! Floor domain models.
//!
//! Canonical record shapes shared by every engine stage. Source-specific
//! field aliases are resolved before records reach this module, see
//! [`crate::source`].
//!
//! # Domain Mappings
//!
//! | floor-timeline | Scheduling term |
//! |----------------|-----------------|
//! | Reservation | Activity / job |
//! | Table | Resource |
//! | Slot | Time quantum |
//! | Turn (rotation) | Wave of sequential seatings |

mod duration;
mod patch;
mod reservation;

pub use duration::{CourseDurationResolver, DurationPolicy, MS_PER_MINUTE};
pub use patch::{PatchField, PatchValue, ReservationPatch};
pub use reservation::{Reservation, ReservationId, ReservationStatus, TableId};
