//! Slot grid geometry.
//!
//! - [`TimeGrid`]: timestamp ⇄ column conversion and clipped placement
//! - [`resolve_drag_delta`]: pixel drags to whole columns and rows
//! - [`move_patch`] / [`resize_patch`]: grid gestures to reservation patches

mod drag;
mod time_grid;

pub use drag::{move_patch, resize_patch, resolve_drag_delta, DragDelta, GridCell};
pub use time_grid::{GridPlacement, TimeGrid, DEFAULT_SLOT_MS};
