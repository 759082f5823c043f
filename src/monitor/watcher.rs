//! Log watcher: waits for a log file to appear and stop growing.

use std::ops::ControlFlow;
use std::path::Path;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::logfile;
use super::markers::LogMarkers;
use super::poll::{Deadline, Poller};

/// Result of waiting for a log file to stabilize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stabilization {
    /// Two consecutive size samples were equal.
    Stable { size: u64 },
    /// The deadline passed while the file was still growing.
    TimedOut,
    /// The file could no longer be read after it had appeared.
    Vanished,
}

impl Stabilization {
    pub fn is_stable(&self) -> bool {
        matches!(self, Stabilization::Stable { .. })
    }
}

/// Per-call stabilization bookkeeping. `previous_size` is `None` until a
/// baseline exists, so an empty file is never equal to an unset baseline.
#[derive(Debug, Clone, Copy)]
struct StabilizationState {
    previous_size: Option<u64>,
    started: Instant,
}

/// Watches a single log file at a time.
#[derive(Debug, Clone)]
pub struct LogWatcher {
    interval: Duration,
    timeout: Duration,
    markers: LogMarkers,
}

impl LogWatcher {
    pub fn new(interval: Duration, timeout: Duration, markers: LogMarkers) -> Self {
        Self {
            interval,
            timeout,
            markers,
        }
    }

    /// Blocks until `path` exists, then until its size stops changing or
    /// this job's own timeout elapses.
    ///
    /// The wait for the file to appear is unbounded and does not count
    /// against the timeout; the deadline starts once the file is seen.
    pub async fn await_stable(&self, path: &Path) -> Stabilization {
        self.wait_for_file(path).await;
        let deadline = Deadline::after(self.timeout);
        debug!(
            "{} found, waiting up to {:?} for it to stabilize",
            path.display(),
            deadline.remaining()
        );
        self.stabilize(path, deadline).await
    }

    /// Polls until `path` exists. Never gives up.
    pub async fn wait_for_file(&self, path: &Path) {
        let mut waits: u64 = 0;
        Poller::unbounded(self.interval)
            .until(|| {
                if path.exists() {
                    return ControlFlow::Break(());
                }
                waits += 1;
                info!(
                    "{} not found yet (check {}), job has not started. Waiting {:?}...",
                    path.display(),
                    waits,
                    self.interval
                );
                ControlFlow::Continue(())
            })
            .await;
    }

    /// Polls the size of an existing file until two consecutive samples
    /// match or `deadline` passes.
    pub async fn stabilize(&self, path: &Path, deadline: Deadline) -> Stabilization {
        let previous_size = match self.seed_baseline(path).await {
            Ok(seed) => seed,
            Err(e) => {
                warn!("Log file {} disappeared before polling: {}", path.display(), e);
                return Stabilization::Vanished;
            }
        };

        let mut state = StabilizationState {
            previous_size,
            started: Instant::now(),
        };

        let outcome = Poller::with_deadline(self.interval, deadline)
            .until(|| match std::fs::metadata(path) {
                Ok(meta) => {
                    let size = meta.len();
                    if state.previous_size == Some(size) {
                        ControlFlow::Break(Stabilization::Stable { size })
                    } else {
                        debug!(
                            "{} is still growing: {:?} -> {} bytes",
                            path.display(),
                            state.previous_size,
                            size
                        );
                        state.previous_size = Some(size);
                        ControlFlow::Continue(())
                    }
                }
                Err(e) => {
                    warn!("Failed to read size of {}: {}", path.display(), e);
                    ControlFlow::Break(Stabilization::Vanished)
                }
            })
            .await;

        match outcome {
            Some(result) => {
                if let Stabilization::Stable { size } = result {
                    info!(
                        "{} stable at {} bytes after {:?}",
                        path.display(),
                        size,
                        state.started.elapsed()
                    );
                }
                result
            }
            None => {
                warn!("Timeout reached while waiting for file: {}", path.display());
                Stabilization::TimedOut
            }
        }
    }

    /// Scans the whole file once. When a terminal banner is already present
    /// the current size becomes the baseline, so a finished log is stable on
    /// the first sample.
    ///
    /// The scan runs on the blocking pool so a large log does not stall
    /// other jobs polled on the same task.
    async fn seed_baseline(&self, path: &Path) -> std::io::Result<Option<u64>> {
        let markers = self.markers.clone();
        let owned = path.to_path_buf();
        let finished = tokio::task::spawn_blocking(move || {
            logfile::any_line(&owned, |line| markers.is_terminal(line))
        })
        .await
        .map_err(std::io::Error::other)
        .and_then(|r| r)?;

        if finished {
            let size = tokio::fs::metadata(path).await?.len();
            info!(
                "Existing log file {} found with marker. Initial file size: {}",
                path.display(),
                size
            );
            Ok(Some(size))
        } else {
            info!(
                "Existing log file {} found without success or error markers, baseline unset",
                path.display()
            );
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use tempfile::TempDir;

    fn watcher(interval_ms: u64, timeout_ms: u64) -> LogWatcher {
        LogWatcher::new(
            Duration::from_millis(interval_ms),
            Duration::from_millis(timeout_ms),
            LogMarkers::default(),
        )
    }

    #[tokio::test]
    async fn test_finished_log_is_stable_on_first_sample() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tc.out");
        fs::write(&path, "Total processing time: 12s\nJob finished: normal\n").unwrap();

        let started = Instant::now();
        let result = watcher(500, 10_000).await_stable(&path).await;

        assert_eq!(result, Stabilization::Stable { size: 48 });
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_marker_before_tail_window_seeds_baseline() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tc.out");
        let mut content = String::from("Job terminated due to SEGV\n");
        for i in 0..50 {
            content.push_str(&format!("cleanup step {i}\n"));
        }
        fs::write(&path, &content).unwrap();

        let started = Instant::now();
        let result = watcher(500, 10_000).await_stable(&path).await;

        assert_eq!(
            result,
            Stabilization::Stable {
                size: content.len() as u64
            }
        );
        assert!(started.elapsed() < Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_unmarked_log_needs_two_equal_samples() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tc.out");
        fs::write(&path, "SCF iteration 1\n").unwrap();

        let started = Instant::now();
        let result = watcher(50, 10_000).await_stable(&path).await;

        assert!(result.is_stable());
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_empty_file_is_not_stable_on_first_sample() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tc.out");
        fs::write(&path, "").unwrap();

        let started = Instant::now();
        let result = watcher(50, 10_000).await_stable(&path).await;

        assert_eq!(result, Stabilization::Stable { size: 0 });
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_growing_file_times_out() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tc.out");
        fs::write(&path, "start\n").unwrap();

        let writer_path = path.clone();
        let writer = tokio::spawn(async move {
            for i in 0..400 {
                let mut file = OpenOptions::new().append(true).open(&writer_path).unwrap();
                writeln!(file, "iteration {i}").unwrap();
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        });

        let started = Instant::now();
        let result = watcher(60, 300).await_stable(&path).await;
        writer.abort();

        assert_eq!(result, Stabilization::TimedOut);
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_waits_for_file_to_appear() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tc.out");

        let creator_path = path.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(80)).await;
            fs::write(&creator_path, "Job terminated due to SEGV\n").unwrap();
        });

        // Timeout is shorter than the wait for the file: the existence wait
        // must not consume it.
        let result = watcher(20, 60).await_stable(&path).await;
        assert!(result.is_stable());
    }

    #[tokio::test]
    async fn test_file_removed_before_polling_is_vanished() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tc.out");

        let result = watcher(10, 100)
            .stabilize(&path, Deadline::after(Duration::from_millis(100)))
            .await;
        assert_eq!(result, Stabilization::Vanished);
    }
}
