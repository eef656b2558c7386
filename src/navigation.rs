//! Sidebar navigation: exactly one page active at a time.
//!
//! A menu entry names its page through `data-page`; the page container is
//! found by the `${page}-page` id convention. Submenus are plain visibility
//! flips that do not touch the page state.

use tracing::{debug, warn};

use crate::error::Result;
use crate::view::Document;

pub const MENU_ITEM_CLASS: &str = "menu-item";
pub const PAGE_CLASS: &str = "page";
pub const ACTIVE_CLASS: &str = "active";

pub fn page_container_id(page: &str) -> String {
    format!("{page}-page")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigator {
    active_page: Option<String>,
}

impl Default for Navigator {
    fn default() -> Self {
        Self {
            active_page: Some("dashboard".to_string()),
        }
    }
}

impl Navigator {
    pub fn new(active_page: Option<String>) -> Self {
        Self { active_page }
    }

    pub fn active_page(&self) -> Option<&str> {
        self.active_page.as_deref()
    }

    /// Handle a click on `menu_item_id`.
    ///
    /// All highlights and pages are cleared first, then the clicked entry is
    /// highlighted. When its page container does not exist no page is shown
    /// and the highlight is left stale. Returns the page that became active.
    pub fn select(&mut self, doc: &Document, menu_item_id: &str) -> Result<Option<String>> {
        let page = doc.attr(menu_item_id, "data-page")?;

        for id in doc.ids_with_class(MENU_ITEM_CLASS) {
            doc.remove_class(&id, ACTIVE_CLASS)?;
        }
        for id in doc.ids_with_class(PAGE_CLASS) {
            doc.remove_class(&id, ACTIVE_CLASS)?;
        }
        doc.add_class(menu_item_id, ACTIVE_CLASS)?;

        let shown = page.filter(|p| {
            let found = doc.contains(&page_container_id(p));
            if !found {
                warn!(menu_item = menu_item_id, page = %p, "no page container for menu entry");
            }
            found
        });
        if let Some(page) = shown.as_deref() {
            doc.add_class(&page_container_id(page), ACTIVE_CLASS)?;
            debug!(page, "page activated");
        }
        self.active_page = shown.clone();
        Ok(shown)
    }

    /// Activate `page` through the first menu entry pointing at it.
    pub fn show_page(&mut self, doc: &Document, page: &str) -> Result<Option<String>> {
        let entry = doc
            .ids_with_class(MENU_ITEM_CLASS)
            .into_iter()
            .find(|id| doc.attr(id, "data-page").ok().flatten().as_deref() == Some(page));
        match entry {
            Some(id) => self.select(doc, &id),
            None => {
                warn!(page, "no menu entry for page");
                Ok(None)
            }
        }
    }
}

/// Flip a submenu's visibility. Returns true when it is now visible.
pub fn toggle_submenu(doc: &Document, submenu_id: &str) -> Result<bool> {
    let visible = doc.update(submenu_id, |el| {
        el.hidden = !el.hidden;
        !el.hidden
    })?;
    debug!(submenu = submenu_id, visible, "submenu toggled");
    Ok(visible)
}
