use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::tui::AppEvent;

/// Recurring timer that asks the event loop to poll the job status.
///
/// At most one timer exists at a time. Stopping cancels the timer only; a
/// status request already in flight still completes and is still applied.
pub struct StatusPoller {
    interval: Duration,
    handle: Option<JoinHandle<()>>,
}

impl StatusPoller {
    pub fn new(interval: Duration) -> Self {
        Self { interval, handle: None }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Start the timer with an immediate first tick. Returns `false` (and does
    /// nothing) if it is already running.
    pub fn start(&mut self, tx: &UnboundedSender<AppEvent>) -> bool {
        if self.is_running() {
            return false;
        }

        let tx = tx.clone();
        let period = self.interval;
        self.handle = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if tx.send(AppEvent::PollStatus).is_err() {
                    break;
                }
            }
        }));

        tracing::debug!(interval_secs = period.as_secs(), "Status polling started");
        true
    }

    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            tracing::debug!("Status polling stopped");
        }
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.stop();
    }
}
