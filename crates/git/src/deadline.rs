use std::time::{Duration, Instant};

use crate::error::{GitUtilError, Result};

/// Optional point in time after which no new work may start.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now().checked_add(timeout))
    }

    pub fn instant(&self) -> Option<Instant> {
        self.0
    }

    /// Time left, `Some(ZERO)` once expired, `None` if unbounded.
    pub fn remaining(&self) -> Option<Duration> {
        self.0.map(|at| at.saturating_duration_since(Instant::now()))
    }

    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|left| left.is_zero())
    }

    /// Combine with a relative limit, keeping whichever ends first.
    pub fn min_with(self, timeout: Option<Duration>) -> Self {
        let other = timeout.and_then(|t| Instant::now().checked_add(t));
        match (self.0, other) {
            (Some(a), Some(b)) => Self(Some(a.min(b))),
            (a, b) => Self(a.or(b)),
        }
    }

    pub fn check(&self, context: &str) -> Result<()> {
        if self.is_expired() {
            return Err(GitUtilError::DeadlineExceeded {
                context: context.to_string(),
            });
        }
        Ok(())
    }
}
