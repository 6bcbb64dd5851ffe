//! Records-per-minute pacing against wall-clock windows.
//!
//! A coarse leaky-bucket approximation: 60-second windows are counted from
//! run start, and a batch only waits when the cumulative record count has
//! outrun the cap for the current window before the window has elapsed.
//! Under-throttles when windows are skipped (very large caps); that is
//! acceptable — the goal is staying under the service's per-minute cap,
//! not perfect smoothing.

use std::time::Duration;

use tokio::time::Instant;

/// Per-run throttle state. Owned by the pipeline; batches are dispatched
/// sequentially, so the window accounting is never shared.
#[derive(Debug)]
pub struct Throttle {
    start: Instant,
    cap_per_minute: u32,
    window: u32,
}

impl Throttle {
    pub fn new(cap_per_minute: u32) -> Self {
        Self {
            start: Instant::now(),
            cap_per_minute,
            window: 1,
        }
    }

    /// Current throttle window index (starts at 1).
    pub fn window(&self) -> u32 {
        self.window
    }

    /// How long the next batch must wait, if at all.
    ///
    /// `batch_index` is 1-based; records sent so far is
    /// `batch_size * batch_index`. A pause of `60*window - elapsed + 1`
    /// seconds is due when that count exceeds the cap for the current
    /// window before the window's 60 seconds have elapsed.
    pub fn required_pause(&self, batch_index: u32, batch_size: u32) -> Option<Duration> {
        let elapsed = self.start.elapsed();
        let window_end = Duration::from_secs(60 * u64::from(self.window));
        let records_so_far = batch_size.saturating_mul(batch_index);
        let allotted = self.cap_per_minute.saturating_mul(self.window);

        if records_so_far > allotted && elapsed < window_end {
            Some(window_end + Duration::from_secs(1) - elapsed)
        } else {
            None
        }
    }

    /// Sleep out a pause computed by [`required_pause`](Self::required_pause)
    /// and advance to the next window.
    pub async fn pause(&mut self, wait: Duration) {
        tracing::info!(wait_secs = wait.as_secs(), "rate throttling in effect");
        tokio::time::sleep(wait).await;
        self.window += 1;
    }

    /// Combined check-and-sleep; returns the pause performed (zero if none).
    pub async fn wait_if_needed(&mut self, batch_index: u32, batch_size: u32) -> Duration {
        match self.required_pause(batch_index, batch_size) {
            Some(wait) => {
                self.pause(wait).await;
                wait
            }
            None => Duration::ZERO,
        }
    }
}
