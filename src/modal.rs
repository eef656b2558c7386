//! Overlay dialogs, toggled fully visible or hidden. No stacking, no focus
//! handling.

use tracing::debug;

use crate::error::Result;
use crate::view::Document;

pub fn open(doc: &Document, modal_id: &str) -> Result<()> {
    doc.set_hidden(modal_id, false)?;
    debug!(modal = modal_id, "modal opened");
    Ok(())
}

pub fn close(doc: &Document, modal_id: &str) -> Result<()> {
    doc.set_hidden(modal_id, true)?;
    debug!(modal = modal_id, "modal closed");
    Ok(())
}

pub fn is_open(doc: &Document, modal_id: &str) -> Result<bool> {
    Ok(!doc.is_hidden(modal_id)?)
}
