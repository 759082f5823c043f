//! Fixed-interval polling with an optional deadline.
//!
//! Both waits performed by the watcher (for a log to appear, and for it to
//! stop growing) share this primitive. The first has no deadline; the
//! second carries one computed per job.

use std::ops::ControlFlow;
use std::time::{Duration, Instant};

/// Absolute point in time after which polling gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(Instant);

impl Deadline {
    /// A deadline `timeout` from now.
    pub fn after(timeout: Duration) -> Self {
        let now = Instant::now();
        Self(now.checked_add(timeout).unwrap_or_else(|| far_future(now)))
    }

    pub fn has_passed(&self) -> bool {
        Instant::now() >= self.0
    }

    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }
}

// ~30 years; Instant cannot represent arbitrarily large offsets.
fn far_future(now: Instant) -> Instant {
    let mut span = Duration::from_secs(60 * 60 * 24 * 365 * 30);
    loop {
        if let Some(later) = now.checked_add(span) {
            return later;
        }
        span /= 2;
    }
}

/// Repeats a probe every `interval` until it breaks or the deadline passes.
#[derive(Debug, Clone, Copy)]
pub struct Poller {
    interval: Duration,
    deadline: Option<Deadline>,
}

impl Poller {
    /// Polls forever.
    pub fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            deadline: None,
        }
    }

    pub fn with_deadline(interval: Duration, deadline: Deadline) -> Self {
        Self {
            interval,
            deadline: Some(deadline),
        }
    }

    /// Runs `probe` until it returns `Break`, sleeping `interval` between
    /// attempts. The deadline is checked before every probe, so a probe
    /// never runs once it has passed. Returns `None` on deadline.
    pub async fn until<T, F>(&self, mut probe: F) -> Option<T>
    where
        F: FnMut() -> ControlFlow<T>,
    {
        loop {
            if self.deadline.is_some_and(|d| d.has_passed()) {
                return None;
            }

            if let ControlFlow::Break(value) = probe() {
                return Some(value);
            }

            tokio::time::sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_until_returns_first_break() {
        let poller = Poller::unbounded(Duration::from_millis(1));
        let mut attempts = 0;
        let result = poller
            .until(|| {
                attempts += 1;
                if attempts == 3 {
                    ControlFlow::Break(attempts)
                } else {
                    ControlFlow::Continue(())
                }
            })
            .await;
        assert_eq!(result, Some(3));
    }

    #[tokio::test]
    async fn test_until_gives_up_at_deadline() {
        let deadline = Deadline::after(Duration::from_millis(50));
        let poller = Poller::with_deadline(Duration::from_millis(10), deadline);
        let started = Instant::now();

        let result: Option<()> = poller.until(|| ControlFlow::Continue(())).await;

        assert!(result.is_none());
        assert!(started.elapsed() >= Duration::from_millis(50));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_passed_deadline_skips_probe() {
        let poller = Poller::with_deadline(Duration::from_millis(1), Deadline::after(Duration::ZERO));
        let mut called = false;
        let result: Option<()> = poller
            .until(|| {
                called = true;
                ControlFlow::Break(())
            })
            .await;
        assert!(result.is_none());
        assert!(!called);
    }

    #[test]
    fn test_huge_timeout_does_not_overflow() {
        let deadline = Deadline::after(Duration::MAX);
        assert!(!deadline.has_passed());
        assert!(deadline.remaining() > Duration::from_secs(60));
    }
}
