//! Headless document model and the renderers that draw into it.
//!
//! The markup layer owns the real page; the controllers only depend on the
//! anchors listed in [`Document::pos_layout`]. Every element keeps an inline
//! `hidden` flag (display none/block), a class list, text, an input value and
//! `data-*` attributes, which is all the controllers ever touch.

use chrono::Local;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{PosError, Result};
use crate::format::{esc, format_currency, format_timestamp};
use crate::forms::FormKind;
use crate::models::{Currency, Settings, Transaction};
use crate::stats::Stats;

pub const BODY: &str = "body";
pub const SHOP_TITLE: &str = "shopTitle";
pub const CURRENT_TIME: &str = "currentTime";
pub const TRANSACTIONS_TABLE_BODY: &str = "transactionsTableBody";
pub const STAT_TODAY_SALES: &str = "todaySales";
pub const STAT_TRANSACTION_COUNT: &str = "transactionCount";
pub const STAT_CUSTOMER_COUNT: &str = "customerCount";
pub const STAT_TOTAL_REVENUE: &str = "totalRevenue";
pub const SETTINGS_FORM: &str = "settingsForm";

/// Pages reachable from the sidebar, in menu order.
pub const PAGES: &[&str] = &[
    "dashboard",
    "sales",
    "transactions",
    "inventory",
    "employees",
    "reports",
    "settings",
];

/// Collapsible sidebar groups.
pub const SUBMENUS: &[&str] = &["inventorySubmenu", "reportsSubmenu"];

/// Rows kept in the recent-transactions table.
pub const RECENT_LIMIT: usize = 10;
pub const TABLE_COLUMNS: usize = 5;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Element {
    pub tag: String,
    pub hidden: bool,
    pub classes: BTreeSet<String>,
    pub text: String,
    pub value: String,
    pub checked: bool,
    pub inner_html: String,
    pub attrs: BTreeMap<String, String>,
    pub parent: Option<String>,
    pub children: Vec<String>,
}

impl Element {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Self::default()
        }
    }

    pub fn with_class(mut self, class: &str) -> Self {
        self.classes.insert(class.to_string());
        self
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn with_value(mut self, value: &str) -> Self {
        self.value = value.to_string();
        self
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn with_parent(mut self, parent: &str) -> Self {
        self.parent = Some(parent.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

#[derive(Debug, Default)]
struct Dom {
    elements: HashMap<String, Element>,
    // Document order, for class queries.
    order: Vec<String>,
}

/// Shared handle to the document; clones see the same elements.
#[derive(Debug, Clone, Default)]
pub struct Document {
    inner: Arc<Mutex<Dom>>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    fn dom(&self) -> MutexGuard<'_, Dom> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert or replace `id`. A parent, when named, must already exist.
    pub fn insert(&self, id: &str, element: Element) -> Result<()> {
        let mut dom = self.dom();
        if let Some(parent) = element.parent.as_deref() {
            let parent_el = dom
                .elements
                .get_mut(parent)
                .ok_or_else(|| PosError::MissingElement(parent.to_string()))?;
            if !parent_el.children.iter().any(|c| c == id) {
                parent_el.children.push(id.to_string());
            }
        }
        if dom.elements.insert(id.to_string(), element).is_none() {
            dom.order.push(id.to_string());
        }
        Ok(())
    }

    /// Remove `id` and its subtree. Returns false when it was not present.
    pub fn remove(&self, id: &str) -> bool {
        let mut dom = self.dom();
        let Some(element) = dom.elements.remove(id) else {
            return false;
        };
        if let Some(parent) = element.parent.as_deref() {
            if let Some(parent_el) = dom.elements.get_mut(parent) {
                parent_el.children.retain(|c| c != id);
            }
        }
        let mut stack = element.children;
        let mut removed = vec![id.to_string()];
        while let Some(child) = stack.pop() {
            if let Some(el) = dom.elements.remove(&child) {
                stack.extend(el.children);
            }
            removed.push(child);
        }
        dom.order.retain(|existing| !removed.contains(existing));
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.dom().elements.contains_key(id)
    }

    pub fn read<R>(&self, id: &str, f: impl FnOnce(&Element) -> R) -> Result<R> {
        let dom = self.dom();
        let element = dom
            .elements
            .get(id)
            .ok_or_else(|| PosError::MissingElement(id.to_string()))?;
        Ok(f(element))
    }

    pub fn update<R>(&self, id: &str, f: impl FnOnce(&mut Element) -> R) -> Result<R> {
        let mut dom = self.dom();
        let element = dom
            .elements
            .get_mut(id)
            .ok_or_else(|| PosError::MissingElement(id.to_string()))?;
        Ok(f(element))
    }

    /// Ids carrying `class`, in document order.
    pub fn ids_with_class(&self, class: &str) -> Vec<String> {
        let dom = self.dom();
        dom.order
            .iter()
            .filter(|id| {
                dom.elements
                    .get(id.as_str())
                    .is_some_and(|el| el.classes.contains(class))
            })
            .cloned()
            .collect()
    }

    pub fn text(&self, id: &str) -> Result<String> {
        self.read(id, |el| el.text.clone())
    }

    pub fn set_text(&self, id: &str, text: &str) -> Result<()> {
        self.update(id, |el| el.text = text.to_string())
    }

    pub fn value(&self, id: &str) -> Result<String> {
        self.read(id, |el| el.value.clone())
    }

    pub fn set_value(&self, id: &str, value: &str) -> Result<()> {
        self.update(id, |el| el.value = value.to_string())
    }

    pub fn checked(&self, id: &str) -> Result<bool> {
        self.read(id, |el| el.checked)
    }

    pub fn set_checked(&self, id: &str, checked: bool) -> Result<()> {
        self.update(id, |el| el.checked = checked)
    }

    pub fn is_hidden(&self, id: &str) -> Result<bool> {
        self.read(id, |el| el.hidden)
    }

    pub fn set_hidden(&self, id: &str, hidden: bool) -> Result<()> {
        self.update(id, |el| el.hidden = hidden)
    }

    pub fn has_class(&self, id: &str, class: &str) -> Result<bool> {
        self.read(id, |el| el.classes.contains(class))
    }

    pub fn add_class(&self, id: &str, class: &str) -> Result<()> {
        self.update(id, |el| {
            el.classes.insert(class.to_string());
        })
    }

    pub fn remove_class(&self, id: &str, class: &str) -> Result<()> {
        self.update(id, |el| {
            el.classes.remove(class);
        })
    }

    pub fn attr(&self, id: &str, name: &str) -> Result<Option<String>> {
        self.read(id, |el| el.attrs.get(name).cloned())
    }

    pub fn inner_html(&self, id: &str) -> Result<String> {
        self.read(id, |el| el.inner_html.clone())
    }

    pub fn set_inner_html(&self, id: &str, html: String) -> Result<()> {
        self.update(id, |el| el.inner_html = html)
    }

    pub fn children(&self, id: &str) -> Result<Vec<String>> {
        self.read(id, |el| el.children.clone())
    }

    /// The anchor set supplied by the POS markup.
    pub fn pos_layout() -> Self {
        let doc = Self::new();
        let add = |id: &str, element: Element| {
            // Parents are always inserted first below.
            let _ = doc.insert(id, element);
        };

        add(BODY, Element::new("body"));
        add(SHOP_TITLE, Element::new("h1").with_parent(BODY));
        add(CURRENT_TIME, Element::new("span").with_parent(BODY));

        add("sidebar", Element::new("nav").with_parent(BODY));
        for page in PAGES {
            let menu_id = format!("menu-{page}");
            let mut item = Element::new("li")
                .with_class("menu-item")
                .with_attr("data-page", page)
                .with_parent("sidebar");
            let mut container = Element::new("section")
                .with_class("page")
                .with_parent(BODY);
            if *page == "dashboard" {
                item = item.with_class("active");
                container = container.with_class("active");
            }
            add(menu_id.as_str(), item);
            add(format!("{page}-page").as_str(), container);
        }
        for submenu in SUBMENUS.iter().copied() {
            add(
                submenu,
                Element::new("ul")
                    .with_class("submenu")
                    .with_parent("sidebar")
                    .hidden(),
            );
        }

        for stat in [
            STAT_TODAY_SALES,
            STAT_TRANSACTION_COUNT,
            STAT_CUSTOMER_COUNT,
            STAT_TOTAL_REVENUE,
        ] {
            add(
                stat,
                Element::new("span")
                    .with_class("stat-value")
                    .with_parent("dashboard-page"),
            );
        }
        add(
            TRANSACTIONS_TABLE_BODY,
            Element::new("tbody").with_parent("dashboard-page"),
        );

        add(SETTINGS_FORM, Element::new("form").with_parent("settings-page"));
        for field in crate::settings::TEXT_FIELDS {
            add(field, Element::new("input").with_parent(SETTINGS_FORM));
        }
        add(
            crate::settings::CURRENCY_FIELD,
            Element::new("select").with_parent(SETTINGS_FORM),
        );
        add(
            crate::settings::LANGUAGE_FIELD,
            Element::new("select").with_parent(SETTINGS_FORM),
        );
        add(
            crate::settings::DARK_MODE_FIELD,
            Element::new("input")
                .with_attr("type", "checkbox")
                .with_parent(SETTINGS_FORM),
        );

        for kind in FormKind::ALL {
            add(
                kind.modal_id(),
                Element::new("div")
                    .with_class("modal")
                    .with_parent(BODY)
                    .hidden(),
            );
            add(
                kind.form_id(),
                Element::new("form").with_parent(kind.modal_id()),
            );
            for field in kind.fields() {
                add(field.id, Element::new("input").with_parent(kind.form_id()));
            }
            add(
                kind.error_id().as_str(),
                Element::new("p")
                    .with_class("form-error")
                    .with_parent(kind.form_id())
                    .hidden(),
            );
        }

        doc
    }
}

/// One rendered table row, before it is turned into markup.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionRow {
    pub id: String,
    pub date: String,
    pub customer: String,
    pub amount: String,
    pub status: String,
}

/// The newest [`RECENT_LIMIT`] transactions, newest first.
pub fn recent_rows(transactions: &[Transaction], settings: &Settings) -> Vec<TransactionRow> {
    transactions
        .iter()
        .rev()
        .take(RECENT_LIMIT)
        .map(|txn| TransactionRow {
            id: format!("#{}", txn.id),
            date: format_timestamp(&txn.date.with_timezone(&Local), &settings.language),
            customer: txn.customer_label().to_string(),
            amount: format_currency(settings.currency, txn.amount),
            status: txn.status.as_str().to_string(),
        })
        .collect()
}

pub fn transactions_html(transactions: &[Transaction], settings: &Settings) -> String {
    let rows = recent_rows(transactions, settings);
    if rows.is_empty() {
        return format!(
            "<tr><td colspan=\"{TABLE_COLUMNS}\" class=\"empty-state\">No transactions yet</td></tr>"
        );
    }
    rows.iter()
        .map(|row| {
            format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td>\
                 <td><span class=\"status-badge status-{}\">{}</span></td></tr>",
                esc(&row.id),
                esc(&row.date),
                esc(&row.customer),
                esc(&row.amount),
                row.status,
                row.status,
            )
        })
        .collect()
}

/// Redraw the recent-transactions table. Safe to call redundantly.
pub fn render_transactions(
    doc: &Document,
    transactions: &[Transaction],
    settings: &Settings,
) -> Result<()> {
    doc.set_inner_html(
        TRANSACTIONS_TABLE_BODY,
        transactions_html(transactions, settings),
    )
}

pub fn render_stats(doc: &Document, stats: &Stats, currency: Currency) -> Result<()> {
    doc.set_text(
        STAT_TODAY_SALES,
        &format_currency(currency, stats.today_sales),
    )?;
    doc.set_text(STAT_TRANSACTION_COUNT, &stats.transaction_count.to_string())?;
    doc.set_text(STAT_CUSTOMER_COUNT, &stats.customer_count.to_string())?;
    doc.set_text(
        STAT_TOTAL_REVENUE,
        &format_currency(currency, stats.total_revenue),
    )?;
    Ok(())
}
