//! One-second clock shown in the header.

use chrono::Local;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::{PosError, Result};
use crate::format::format_timestamp;
use crate::view::Document;

pub const TICK: Duration = Duration::from_secs(1);

/// Handle to the running clock task. Dropping it stops the clock.
pub struct Clock {
    cancel_tx: watch::Sender<bool>,
    language_tx: watch::Sender<String>,
    task: Option<JoinHandle<()>>,
}

impl Clock {
    /// Spawn the ticker on the current tokio runtime. The first tick fires
    /// immediately.
    pub fn start(doc: Document, element_id: &str, language: &str) -> Result<Self> {
        let rt = tokio::runtime::Handle::try_current()
            .map_err(|e| PosError::Runtime(format!("clock needs a tokio runtime: {e}")))?;

        let (cancel_tx, mut cancel_rx) = watch::channel(false);
        let (language_tx, language_rx) = watch::channel(language.to_string());
        let element_id = element_id.to_string();

        let task = rt.spawn(async move {
            let mut ticker = tokio::time::interval(TICK);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            info!(element = %element_id, "clock started");
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        let lang = language_rx.borrow().clone();
                        let now = format_timestamp(&Local::now(), &lang);
                        if doc.set_text(&element_id, &now).is_err() {
                            debug!(element = %element_id, "clock element gone, stopping");
                            break;
                        }
                    }
                    changed = cancel_rx.changed() => {
                        if changed.is_err() || *cancel_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!(element = %element_id, "clock stopped");
        });

        Ok(Self {
            cancel_tx,
            language_tx,
            task: Some(task),
        })
    }

    /// Format subsequent ticks for `language`.
    pub fn set_language(&self, language: &str) {
        let _ = self.language_tx.send(language.to_string());
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Signal the task to stop and wait for it to exit.
    pub async fn stop(mut self) {
        let _ = self.cancel_tx.send(true);
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        let _ = self.cancel_tx.send(true);
    }
}
