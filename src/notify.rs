//! Transient banners.
//!
//! A banner is inserted under the host element with the `show` class, loses it
//! after [`VISIBLE_FOR`] (exit transition) and is removed [`EXIT_FOR`] later.
//! Banners are independent: there is no queue and they may overlap.

use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::Result;
use crate::view::{Document, Element, BODY};

pub const VISIBLE_FOR: Duration = Duration::from_millis(2700);
pub const EXIT_FOR: Duration = Duration::from_millis(300);
pub const SHOW_CLASS: &str = "show";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Success,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Info => "info",
            NotificationKind::Success => "success",
        }
    }
}

pub struct Notifier {
    doc: Document,
    host: String,
    next_id: u64,
    pending: Vec<(String, JoinHandle<()>)>,
}

impl Notifier {
    pub fn new(doc: Document) -> Self {
        Self::with_host(doc, BODY)
    }

    pub fn with_host(doc: Document, host: &str) -> Self {
        Self {
            doc,
            host: host.to_string(),
            next_id: 0,
            pending: Vec::new(),
        }
    }

    /// Insert a banner and schedule its removal. Returns the banner id.
    ///
    /// Outside a tokio runtime the banner is inserted but stays until
    /// [`Notifier::dismiss`] is called.
    pub fn notify(&mut self, message: &str, kind: NotificationKind) -> Result<String> {
        self.next_id += 1;
        let id = format!("notification-{}", self.next_id);
        self.doc.insert(
            &id,
            Element::new("div")
                .with_class("notification")
                .with_class(&format!("notification-{}", kind.as_str()))
                .with_class(SHOW_CLASS)
                .with_text(message)
                .with_parent(&self.host),
        )?;
        debug!(id = %id, kind = kind.as_str(), "notification shown");

        self.pending.retain(|(_, handle)| !handle.is_finished());
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                let doc = self.doc.clone();
                let banner = id.clone();
                let handle = rt.spawn(async move {
                    tokio::time::sleep(VISIBLE_FOR).await;
                    let _ = doc.remove_class(&banner, SHOW_CLASS);
                    tokio::time::sleep(EXIT_FOR).await;
                    doc.remove(&banner);
                });
                self.pending.push((id.clone(), handle));
            }
            Err(_) => {
                warn!(id = %id, "no runtime, notification will not auto-dismiss");
            }
        }
        Ok(id)
    }

    /// Remove a banner now, cancelling its lifecycle if one is scheduled.
    pub fn dismiss(&mut self, id: &str) -> bool {
        if let Some(pos) = self.pending.iter().position(|(banner, _)| banner == id) {
            let (_, handle) = self.pending.remove(pos);
            handle.abort();
        }
        self.doc.remove(id)
    }

    /// Banners still in the document, oldest first.
    pub fn visible(&self) -> Vec<String> {
        self.doc
            .children(&self.host)
            .unwrap_or_default()
            .into_iter()
            .filter(|id| id.starts_with("notification-"))
            .collect()
    }

    /// Cancel every scheduled lifecycle and drop the banners.
    pub fn shutdown(&mut self) {
        for (id, handle) in self.pending.drain(..) {
            handle.abort();
            self.doc.remove(&id);
        }
        for id in self.visible() {
            self.doc.remove(&id);
        }
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        for (_, handle) in &self.pending {
            handle.abort();
        }
    }
}
