//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap socket operations with a deadline
//! - Track shared activity for bidirectional relays
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;

/// A deadline expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{operation} timed out after {limit:?}")]
pub struct Elapsed {
    pub operation: &'static str,
    pub limit: Duration,
}

/// Run `fut` with a deadline of `limit`.
pub async fn deadline<F: Future>(
    limit: Duration,
    operation: &'static str,
    fut: F,
) -> Result<F::Output, Elapsed> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| Elapsed { operation, limit })
}

/// Last-activity clock shared by the two directions of a relay, so a quiet
/// direction is not timed out while the other one is still moving bytes.
#[derive(Debug)]
pub struct ActivityClock {
    started: Instant,
    last_millis: AtomicU64,
}

impl ActivityClock {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            last_millis: AtomicU64::new(0),
        }
    }

    /// Record activity now.
    pub fn touch(&self) {
        let now = self.started.elapsed().as_millis() as u64;
        self.last_millis.fetch_max(now, Ordering::Relaxed);
    }

    /// Time since the most recent activity in either direction.
    pub fn idle_for(&self) -> Duration {
        let now = self.started.elapsed().as_millis() as u64;
        let last = self.last_millis.load(Ordering::Relaxed);
        Duration::from_millis(now.saturating_sub(last))
    }
}

impl Default for ActivityClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deadline_passes_through_output() {
        let value = deadline(Duration::from_secs(1), "test", async { 7 }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn deadline_reports_operation() {
        let err = deadline(
            Duration::from_millis(10),
            "backend read",
            tokio::time::sleep(Duration::from_secs(5)),
        )
        .await
        .unwrap_err();

        assert_eq!(err.operation, "backend read");
        assert!(err.to_string().contains("backend read timed out"));
    }

    #[tokio::test]
    async fn activity_clock_tracks_latest_touch() {
        let clock = ActivityClock::new();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(clock.idle_for() >= Duration::from_millis(20));

        clock.touch();
        assert!(clock.idle_for() < Duration::from_millis(20));
    }
}
