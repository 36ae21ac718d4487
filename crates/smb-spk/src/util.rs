//! Timing utilities.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// A deadline tracker spanning the several reads of one stage.
///
/// An unbounded deadline never expires; it is what a stage without a
/// configured limit runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    at: Option<Instant>,
    limit: Option<Duration>,
}

impl Deadline {
    /// Create a deadline `duration` from now.
    #[must_use]
    pub fn from_now(duration: Duration) -> Self {
        Self {
            at: Some(Instant::now() + duration),
            limit: Some(duration),
        }
    }

    /// A deadline that never expires.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            at: None,
            limit: None,
        }
    }

    /// Create a deadline from an optional duration.
    #[must_use]
    pub fn after(duration: Option<Duration>) -> Self {
        duration.map_or_else(Self::unbounded, Self::from_now)
    }

    /// The duration this deadline was created with.
    #[must_use]
    pub const fn limit(&self) -> Option<Duration> {
        self.limit
    }

    /// Check if the deadline has passed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.at.is_some_and(|at| Instant::now() >= at)
    }

    /// Get the remaining time, or `None` when unbounded.
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Run `future` under this deadline. Returns `None` if it elapsed first.
    pub async fn apply<F: Future>(&self, future: F) -> Option<F::Output> {
        match self.at {
            Some(at) => tokio::time::timeout_at(at, future).await.ok(),
            None => Some(future.await),
        }
    }
}
