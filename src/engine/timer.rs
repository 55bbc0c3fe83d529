// src/engine/timer.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::scheduler::WakeAlarm;

use super::RuntimeEvent;

/// [`WakeAlarm`] backed by a tokio sleep that sends
/// [`RuntimeEvent::AlarmFired`] into the wake runtime's channel.
#[derive(Debug)]
pub struct TokioWakeAlarm {
    tx: mpsc::Sender<RuntimeEvent>,
    pending: Mutex<Option<JoinHandle<()>>>,
    up: Arc<AtomicBool>,
}

impl TokioWakeAlarm {
    pub fn new(tx: mpsc::Sender<RuntimeEvent>) -> Self {
        Self {
            tx,
            pending: Mutex::new(None),
            up: Arc::new(AtomicBool::new(false)),
        }
    }

    fn pending(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.pending
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl WakeAlarm for TokioWakeAlarm {
    fn set(&self, interval_ms: i64) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("no tokio runtime available; alarm not armed");
            return;
        };

        let delay = Duration::from_millis(interval_ms.max(0) as u64);
        let tx = self.tx.clone();
        let up = Arc::clone(&self.up);

        let mut pending = self.pending();
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        up.store(true, Ordering::SeqCst);
        *pending = Some(handle.spawn(async move {
            tokio::time::sleep(delay).await;
            up.store(false, Ordering::SeqCst);
            if tx.send(RuntimeEvent::AlarmFired).await.is_err() {
                debug!("wake runtime gone; alarm dropped");
            }
        }));
        debug!(interval_ms, "alarm armed");
    }

    fn cancel(&self) {
        if let Some(previous) = self.pending().take() {
            previous.abort();
        }
        self.up.store(false, Ordering::SeqCst);
        debug!("alarm cancelled");
    }

    fn is_up(&self) -> bool {
        self.up.load(Ordering::SeqCst)
    }
}
