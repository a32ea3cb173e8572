//! Dongle presence tracking and background polling.
//!
//! `TokenMonitor` wraps any [`HardwareToken`]. Each presence check updates an
//! atomic "connected" flag and, only when the state flips, publishes a
//! [`ConnectionEvent`] to subscribers. The poller is one recurring tokio task
//! that calls the same presence check on a fixed interval.

use crate::clock::{Clock, SystemClock};
use crate::token::HardwareToken;
use crate::NodelockError;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Buffered connection events per subscriber.
const EVENT_CAPACITY: usize = 16;

/// Dongle connection state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionEvent {
    /// New state.
    pub connected: bool,
    /// When the change was observed.
    pub at: DateTime<Utc>,
}

/// Presence-tracking wrapper around a hardware token.
pub struct TokenMonitor {
    inner: Arc<dyn HardwareToken>,
    connected: AtomicBool,
    events: broadcast::Sender<ConnectionEvent>,
    clock: Arc<dyn Clock>,
}

impl TokenMonitor {
    /// Wrap a token. The initial state is "disconnected".
    pub fn new(inner: Arc<dyn HardwareToken>) -> Self {
        Self::with_clock(inner, Arc::new(SystemClock))
    }

    /// Wrap a token with a custom clock for event timestamps.
    pub fn with_clock(inner: Arc<dyn HardwareToken>, clock: Arc<dyn Clock>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner,
            connected: AtomicBool::new(false),
            events,
            clock,
        }
    }

    /// Last observed presence, without touching the hardware.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Receive connection changes from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    /// Run one presence check (what each poll tick does).
    pub fn poll_once(&self) -> bool {
        self.is_present()
    }

    fn record(&self, present: bool) {
        let previous = self.connected.swap(present, Ordering::SeqCst);
        if previous == present {
            return;
        }

        info!(connected = present, "Dongle {}", if present { "connected" } else { "disconnected" });
        let event = ConnectionEvent {
            connected: present,
            at: self.clock.now_utc(),
        };
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Start the background presence poll on the current tokio runtime.
    ///
    /// The task only updates the connected flag and publishes transitions.
    /// It stops when the returned handle is shut down or dropped.
    ///
    /// # Errors
    /// - `Config` - called outside a tokio runtime, or `interval` is zero
    pub fn spawn_poller(self: &Arc<Self>, interval: Duration) -> Result<PollerHandle, NodelockError> {
        if interval.is_zero() {
            return Err(NodelockError::Config(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        let runtime = tokio::runtime::Handle::try_current().map_err(|_| {
            NodelockError::Config("dongle poller requires a tokio runtime".to_string())
        })?;

        let monitor = Arc::clone(self);
        let task = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let probe = Arc::clone(&monitor);
                if tokio::task::spawn_blocking(move || probe.poll_once())
                    .await
                    .is_err()
                {
                    warn!("Dongle presence poll failed");
                }
            }
        });

        debug!(interval_ms = interval.as_millis() as u64, "Dongle poller started");
        Ok(PollerHandle { task: Some(task) })
    }
}

impl HardwareToken for TokenMonitor {
    fn is_present(&self) -> bool {
        let present = self.inner.is_present();
        self.record(present);
        present
    }

    fn hardware_id(&self) -> Option<String> {
        self.inner.hardware_id()
    }

    fn read(&self) -> Option<Vec<u8>> {
        self.inner.read()
    }

    fn write(&self, data: &[u8]) -> bool {
        self.inner.write(data)
    }
}

/// Handle to the background poll task.
#[derive(Debug)]
pub struct PollerHandle {
    task: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Stop polling.
    pub fn shutdown(mut self) {
        self.stop();
    }

    /// Whether the poll task is still scheduled.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Dongle poller stopped");
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
