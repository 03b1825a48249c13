//! Table-timeline scheduling engine for restaurant floors.
//!
//! Maps time-bounded, multi-table reservations onto a discrete slot grid,
//! detects table-sharing conflicts, stacks overlapping reservations into
//! display lanes, numbers sequential seatings per table, and manages
//! optimistic local edits until the backend confirms them.
//!
//! # Modules
//!
//! - **`models`**: Domain types: `Reservation`, `ReservationPatch`, `DurationPolicy`
//! - **`source`**: Alias-tolerant wire records and the authoritative feed
//! - **`grid`**: Slot grid geometry and drag gestures
//! - **`timeline`**: Interval index, conflicts, lanes, turns and the derived view
//! - **`mutation`**: Optimistic patches and the persistence seam
//! - **`reassign`**: Batch re-tabling sessions
//! - **`validation`**: Snapshot and batch integrity checks
//! - **`floor`**: `FloorTimeline`, the memoizing facade over all of the above
//!
//! # Architecture
//!
//! Every derived structure is a pure function of (authoritative
//! reservations ⊕ pending patches). Only the mutation coordinator and the
//! floor facade hold state; derivation is synchronous and persistence is
//! the sole async boundary.
//!
//! # References
//!
//! - Kleinberg & Tardos (2005), "Algorithm Design", §4.1 interval partitioning
//! - Golumbic (2004), "Algorithmic Graph Theory and Perfect Graphs"

pub mod config;
pub mod error;
pub mod floor;
pub mod grid;
pub mod models;
pub mod mutation;
pub mod reassign;
pub mod source;
pub mod timeline;
pub mod validation;

pub use config::TimelineConfig;
pub use error::{Result, TimelineError};
pub use floor::FloorTimeline;
pub use models::{Reservation, ReservationPatch, TableId};
