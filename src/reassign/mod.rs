//! Batch re-tabling.
//!
//! A [`ReassignSession`] tracks one reservation's new table selection; a
//! [`ReassignBatch`] holds several open sessions and commits them together.

mod batch;
mod session;

pub use batch::{CommitReport, ReassignBatch};
pub use session::{ReassignSession, SessionState};
