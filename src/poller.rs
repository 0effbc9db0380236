//! Periodic background refresh of an online room

use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use std::io;
use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::error::RoomError;
use crate::reconcile::{Reconciler, SyncEvent};
use crate::room::{Room, RoomCode};
use crate::session::RoomService;
use crate::store::RoomStore;

/// Anything a client can read room snapshots from
pub trait RoomSource: Send + Sync {
    fn fetch(&self, code: &RoomCode) -> Result<Room, RoomError>;
}

impl<S: RoomStore> RoomSource for RoomService<S> {
    fn fetch(&self, code: &RoomCode) -> Result<Room, RoomError> {
        self.read(code.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u64,
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self { interval_ms: 700 }
    }
}

/// Reads a room at a fixed interval and feeds each snapshot to a shared
/// [`Reconciler`], forwarding the resulting events.
///
/// One thread does both the read and the wait, so a slow read delays the next
/// one instead of overlapping it. Failed reads are counted on the reconciler
/// and retried at the next tick. The thread stops when the poller is stopped
/// or dropped, or when the event receiver goes away.
pub struct Poller {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Poller {
    pub fn spawn<R>(
        source: Arc<R>,
        code: RoomCode,
        reconciler: Arc<Mutex<Reconciler>>,
        interval: Duration,
        events: Sender<SyncEvent>,
    ) -> io::Result<Self>
    where
        R: RoomSource + ?Sized + 'static,
    {
        let (stop_tx, stop_rx) = channel::<()>();

        let handle = thread::Builder::new()
            .name(format!("c4-poll-{}", code))
            .spawn(move || {
                debug!(%code, "polling started");
                loop {
                    match source.fetch(&code) {
                        Ok(room) => {
                            let changes = match reconciler.lock() {
                                Ok(mut reconciler) => reconciler.reconcile(&room),
                                Err(_) => {
                                    warn!(%code, "reconciler poisoned, polling stopped");
                                    return;
                                }
                            };
                            for event in changes {
                                if events.send(event).is_err() {
                                    trace!(%code, "event receiver gone");
                                    return;
                                }
                            }
                        }
                        Err(err) => {
                            trace!(%code, %err, "poll failed");
                            if let Ok(mut reconciler) = reconciler.lock() {
                                reconciler.poll_failed();
                            }
                        }
                    }

                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => continue,
                        _ => break,
                    }
                }
                debug!(%code, "polling stopped");
            })?;

        Ok(Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }

    /// Stops polling and waits for an in-flight read to finish
    pub fn stop(mut self) {
        self.shutdown();
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map_or(false, |handle| !handle.is_finished())
    }

    fn shutdown(&mut self) {
        // dropping the sender wakes the thread
        self.stop.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("poll thread panicked");
            }
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.shutdown();
    }
}
