//! Effective end-time resolution.
//!
//! # Resolution Order
//! 1. Explicit `end_ms`
//! 2. Explicit `duration_min`
//! 3. Course duration from a [`CourseDurationResolver`]
//! 4. Policy default
//!
//! The result is then floored to `start + min_duration`, so the effective
//! end is always strictly after the start.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::Reservation;

/// Milliseconds per minute.
pub const MS_PER_MINUTE: i64 = 60_000;

/// Looks up the default seating length of a course.
///
/// Owned by the settings collaborator; the engine only reads it.
pub trait CourseDurationResolver: Send + Sync {
    /// Duration in minutes, or `None` if the course is unknown.
    fn course_duration_min(&self, course: &str) -> Option<i64>;
}

impl CourseDurationResolver for HashMap<String, i64> {
    fn course_duration_min(&self, course: &str) -> Option<i64> {
        self.get(course).copied()
    }
}

impl<F> CourseDurationResolver for F
where
    F: Fn(&str) -> Option<i64> + Send + Sync,
{
    fn course_duration_min(&self, course: &str) -> Option<i64> {
        self(course)
    }
}

/// Rules for deriving a reservation's effective end.
#[derive(Clone)]
pub struct DurationPolicy {
    resolver: Option<Arc<dyn CourseDurationResolver>>,
    default_duration_min: i64,
    min_duration_min: i64,
}

impl fmt::Debug for DurationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DurationPolicy")
            .field("resolver", &self.resolver.is_some())
            .field("default_duration_min", &self.default_duration_min)
            .field("min_duration_min", &self.min_duration_min)
            .finish()
    }
}

impl Default for DurationPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl DurationPolicy {
    /// 120 minute default, 5 minute floor, no course resolver.
    pub fn new() -> Self {
        Self {
            resolver: None,
            default_duration_min: 120,
            min_duration_min: 5,
        }
    }

    /// Sets the course duration resolver.
    pub fn with_resolver(mut self, resolver: Arc<dyn CourseDurationResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Sets the fallback duration (minutes).
    pub fn with_default_duration_min(mut self, minutes: i64) -> Self {
        self.default_duration_min = minutes;
        self
    }

    /// Sets the duration floor (minutes). Values below one minute are raised to one.
    pub fn with_min_duration_min(mut self, minutes: i64) -> Self {
        self.min_duration_min = minutes.max(1);
        self
    }

    /// Duration floor in milliseconds.
    #[inline]
    pub fn min_duration_ms(&self) -> i64 {
        self.min_duration_min.max(1) * MS_PER_MINUTE
    }

    /// Unfloored end time according to the resolution order.
    fn raw_end_ms(&self, r: &Reservation) -> i64 {
        if let Some(end) = r.end_ms {
            return end;
        }
        let minutes = r
            .duration_min
            .or_else(|| {
                let course = r.course.as_deref()?;
                self.resolver.as_ref()?.course_duration_min(course)
            })
            .unwrap_or(self.default_duration_min);
        r.start_ms.saturating_add(minutes.saturating_mul(MS_PER_MINUTE))
    }

    /// Effective end (ms). Always `> r.start_ms`.
    pub fn effective_end_ms(&self, r: &Reservation) -> i64 {
        let floor = r.start_ms.saturating_add(self.min_duration_ms());
        self.raw_end_ms(r).max(floor)
    }

    /// Effective duration (ms).
    pub fn effective_duration_ms(&self, r: &Reservation) -> i64 {
        self.effective_end_ms(r) - r.start_ms
    }
}
