//! Application state and the event handlers the page wires up.
//!
//! `App` owns every aggregate. Each mutation follows the same path: update
//! the aggregate, persist it, recompute stats, redraw.

use chrono::{Local, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{PosError, Result};
use crate::forms::{self, FormKind, FormSubmission};
use crate::modal;
use crate::models::{NewTransaction, Settings, Transaction, TransactionStatus};
use crate::navigation::{self, Navigator};
use crate::notify::{NotificationKind, Notifier};
use crate::settings;
use crate::stats::{self, Stats};
use crate::storage::PersistentStore;
use crate::view::{self, Document, CURRENT_TIME};

const DEMO_CUSTOMERS: &[&str] = &[
    "Sok Dara",
    "Chan Sophea",
    "Lim Vanna",
    "Keo Bopha",
    "Noy Rithy",
    "Mao Sreyneang",
];

const DEMO_MIN_CENTS: u32 = 500;
const DEMO_MAX_CENTS: u32 = 15_000;

pub struct App {
    doc: Document,
    store: PersistentStore,
    settings: Settings,
    transactions: Vec<Transaction>,
    stats: Stats,
    navigator: Navigator,
    notifier: Notifier,
    clock: Option<Clock>,
}

impl App {
    /// Load both aggregates from `store` and draw the initial page.
    pub fn load(doc: Document, store: PersistentStore) -> Result<Self> {
        let mut app = Self {
            notifier: Notifier::new(doc.clone()),
            doc,
            store,
            settings: Settings::default(),
            transactions: Vec::new(),
            stats: Stats::default(),
            navigator: Navigator::default(),
            clock: None,
        };
        app.load_settings()?;
        app.transactions = app.store.load_transactions()?;
        app.refresh()?;
        info!(
            transactions = app.transactions.len(),
            shop = %app.settings.shop_name,
            "app loaded"
        );
        Ok(app)
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn store(&self) -> &PersistentStore {
        &self.store
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Recompute stats from the full ledger and redraw table and widgets.
    pub fn refresh(&mut self) -> Result<()> {
        self.stats = stats::recompute(&self.transactions, Local::now());
        view::render_transactions(&self.doc, &self.transactions, &self.settings)?;
        view::render_stats(&self.doc, &self.stats, self.settings.currency)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Transactions
    // ------------------------------------------------------------------

    /// `TXN` followed by eight hex digits, unique within the current ledger.
    pub fn generate_transaction_id(&self) -> String {
        loop {
            let raw = Uuid::new_v4().simple().to_string().to_uppercase();
            let id = format!("TXN{}", raw.get(..8).unwrap_or(raw.as_str()));
            if !self.transactions.iter().any(|t| t.id == id) {
                return id;
            }
        }
    }

    /// Append a sale, persist the ledger and redraw.
    pub fn record_transaction(&mut self, input: NewTransaction) -> Result<Transaction> {
        if !input.amount.is_finite() || input.amount < 0.0 {
            return Err(PosError::InvalidAmount(input.amount.to_string()));
        }
        let txn = Transaction {
            id: self.generate_transaction_id(),
            date: Utc::now(),
            customer: input
                .customer
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty()),
            amount: input.amount,
            status: input.status,
        };
        let mut ledger = self.transactions.clone();
        ledger.push(txn.clone());
        self.store.save_transactions(&ledger)?;
        self.transactions = ledger;
        self.refresh()?;
        info!(id = %txn.id, amount = txn.amount, status = %txn.status, "transaction recorded");
        Ok(txn)
    }

    /// Append a synthetic completed sale with a random amount and customer.
    pub fn add_demo_transaction(&mut self) -> Result<Transaction> {
        let mut rng = rand::thread_rng();
        let cents = rng.gen_range(DEMO_MIN_CENTS..=DEMO_MAX_CENTS);
        let customer = if rng.gen_bool(0.25) {
            None
        } else {
            DEMO_CUSTOMERS.choose(&mut rng).map(|c| c.to_string())
        };
        debug!("adding demo transaction");
        self.record_transaction(NewTransaction {
            customer,
            amount: f64::from(cents) / 100.0,
            status: TransactionStatus::Completed,
        })
    }

    // ------------------------------------------------------------------
    // Modals, forms and navigation
    // ------------------------------------------------------------------

    pub fn open_modal(&self, modal_id: &str) -> Result<()> {
        modal::open(&self.doc, modal_id)
    }

    pub fn close_modal(&self, modal_id: &str) -> Result<()> {
        modal::close(&self.doc, modal_id)
    }

    /// Handle a form submit. The modal only closes once the record is
    /// accepted; transaction forms also record the sale.
    pub fn submit_form(&mut self, kind: FormKind) -> Result<FormSubmission> {
        let submission = forms::parse(&self.doc, kind)?;
        let recorded = match &submission {
            FormSubmission::Transaction(input) => Some(self.record_transaction(input.clone())?),
            _ => None,
        };
        forms::finish(&self.doc, kind)?;
        if let Some(txn) = recorded {
            self.announce(
                &format!("Transaction #{} recorded", txn.id),
                NotificationKind::Success,
            );
        }
        Ok(submission)
    }

    pub fn click_menu_item(&mut self, menu_item_id: &str) -> Result<Option<String>> {
        self.navigator.select(&self.doc, menu_item_id)
    }

    pub fn show_page(&mut self, page: &str) -> Result<Option<String>> {
        self.navigator.show_page(&self.doc, page)
    }

    pub fn toggle_submenu(&self, submenu_id: &str) -> Result<bool> {
        navigation::toggle_submenu(&self.doc, submenu_id)
    }

    // ------------------------------------------------------------------
    // Settings
    // ------------------------------------------------------------------

    /// Overlay persisted settings on the defaults and push them into the form.
    pub fn load_settings(&mut self) -> Result<()> {
        self.settings = self.store.load_settings()?;
        self.apply_settings()
    }

    /// Read the form, persist, and reflect the new values on the page.
    pub fn save_settings(&mut self) -> Result<()> {
        let updated = settings::read_form(&self.doc)?;
        self.store.save_settings(&updated)?;
        self.settings = updated;
        self.apply_settings()?;
        info!(shop = %self.settings.shop_name, currency = self.settings.currency.code(), "settings saved");
        self.announce("Settings saved successfully!", NotificationKind::Success);
        Ok(())
    }

    /// Restore defaults after `confirm` accepts the prompt. A declined prompt
    /// changes nothing and returns false.
    pub fn reset_settings(&mut self, confirm: impl FnOnce(&str) -> bool) -> Result<bool> {
        if !confirm(settings::RESET_CONFIRM_PROMPT) {
            info!("settings reset declined");
            return Ok(false);
        }
        self.store.clear_settings()?;
        self.load_settings()?;
        info!("settings reset to defaults");
        self.announce("Settings have been reset to default", NotificationKind::Info);
        Ok(true)
    }

    /// Live preview from the checkbox; persisted only on save.
    pub fn toggle_dark_mode(&mut self, enabled: bool) -> Result<()> {
        self.doc.set_checked(settings::DARK_MODE_FIELD, enabled)?;
        settings::apply_dark_mode(&self.doc, enabled)
    }

    fn apply_settings(&mut self) -> Result<()> {
        settings::populate_form(&self.doc, &self.settings)?;
        settings::apply_dark_mode(&self.doc, self.settings.dark_mode)?;
        settings::apply_shop_title(&self.doc, &self.settings)?;
        if let Some(clock) = &self.clock {
            clock.set_language(&self.settings.language);
        }
        self.refresh()
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    pub fn notify(&mut self, message: &str, kind: NotificationKind) -> Result<String> {
        self.notifier.notify(message, kind)
    }

    /// Banner for a change that is already committed; failure only logs.
    fn announce(&mut self, message: &str, kind: NotificationKind) {
        if let Err(e) = self.notifier.notify(message, kind) {
            warn!(error = %e, message, "notification not shown");
        }
    }

    /// Start the header clock. Must run inside a tokio runtime.
    pub fn start_clock(&mut self) -> Result<()> {
        if self.clock.as_ref().is_some_and(Clock::is_running) {
            return Ok(());
        }
        self.clock = Some(Clock::start(
            self.doc.clone(),
            CURRENT_TIME,
            &self.settings.language,
        )?);
        Ok(())
    }

    pub fn clock_running(&self) -> bool {
        self.clock.as_ref().is_some_and(Clock::is_running)
    }

    /// Cancel the clock and any pending notification lifecycles.
    pub async fn shutdown(&mut self) {
        if let Some(clock) = self.clock.take() {
            clock.stop().await;
        }
        self.notifier.shutdown();
        info!("app shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteStore;
    use crate::models::{Currency, WALK_IN_CUSTOMER};
    use crate::navigation::ACTIVE_CLASS;
    use crate::storage::{KeyValueStore, MemoryStore, SETTINGS_KEY, TRANSACTIONS_KEY};
    use crate::view::{
        SHOP_TITLE, STAT_CUSTOMER_COUNT, STAT_TODAY_SALES, STAT_TOTAL_REVENUE,
        STAT_TRANSACTION_COUNT, TRANSACTIONS_TABLE_BODY,
    };

    fn fresh_app() -> App {
        App::load(
            Document::pos_layout(),
            PersistentStore::new(MemoryStore::new()),
        )
        .expect("load app")
    }

    fn sale(customer: Option<&str>, amount: f64) -> NewTransaction {
        NewTransaction {
            customer: customer.map(str::to_string),
            amount,
            status: TransactionStatus::Completed,
        }
    }

    #[test]
    fn startup_with_empty_storage() {
        let app = fresh_app();
        let doc = app.document();
        assert_eq!(app.settings(), &Settings::default());
        assert_eq!(doc.text(SHOP_TITLE).unwrap(), "Corner POS");
        assert_eq!(doc.text(STAT_TRANSACTION_COUNT).unwrap(), "0");
        assert_eq!(doc.text(STAT_TOTAL_REVENUE).unwrap(), "$0.00");
        let table = doc.inner_html(TRANSACTIONS_TABLE_BODY).unwrap();
        assert_eq!(table.matches("<tr>").count(), 1);
        assert!(table.contains("No transactions yet"));
    }

    #[test]
    fn record_transaction_persists_and_redraws() {
        let mut app = fresh_app();
        let txn = app.record_transaction(sale(Some(" Dara "), 12.5)).unwrap();
        assert!(txn.id.starts_with("TXN"));
        assert_eq!(txn.id.len(), 11);
        assert_eq!(txn.customer.as_deref(), Some("Dara"));

        let stored = app.store().load_transactions().unwrap();
        assert_eq!(stored, vec![txn.clone()]);

        let doc = app.document();
        assert_eq!(doc.text(STAT_TODAY_SALES).unwrap(), "$12.50");
        assert_eq!(doc.text(STAT_TRANSACTION_COUNT).unwrap(), "1");
        assert_eq!(doc.text(STAT_CUSTOMER_COUNT).unwrap(), "1");
        let table = doc.inner_html(TRANSACTIONS_TABLE_BODY).unwrap();
        assert!(table.contains(&format!("#{}", txn.id)));
        assert!(table.contains("status-completed"));
    }

    #[test]
    fn negative_or_nan_amounts_are_refused() {
        let mut app = fresh_app();
        assert!(matches!(
            app.record_transaction(sale(None, -1.0)),
            Err(PosError::InvalidAmount(_))
        ));
        assert!(app.record_transaction(sale(None, f64::NAN)).is_err());
        assert!(app.transactions().is_empty());
    }

    #[test]
    fn ids_are_unique() {
        let mut app = fresh_app();
        for _ in 0..50 {
            app.add_demo_transaction().unwrap();
        }
        let mut ids: Vec<&str> = app.transactions().iter().map(|t| t.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), 50);
    }

    #[test]
    fn demo_transactions_are_plausible() {
        let mut app = fresh_app();
        let txn = app.add_demo_transaction().unwrap();
        assert_eq!(txn.status, TransactionStatus::Completed);
        assert!((5.0..=150.0).contains(&txn.amount));
        assert!(
            txn.customer.is_none()
                || DEMO_CUSTOMERS.contains(&txn.customer_label())
        );
        assert_eq!(app.stats().transaction_count, 1);
    }

    #[test]
    fn ledger_survives_reload() {
        let doc = Document::pos_layout();
        let store = PersistentStore::new(SqliteStore::open_in_memory("app://t").unwrap());
        let mut app = App::load(doc, store).unwrap();
        app.record_transaction(sale(None, 3.0)).unwrap();
        app.record_transaction(sale(Some("Vanna"), 4.0)).unwrap();

        let App { store, .. } = app;
        let reloaded = App::load(Document::pos_layout(), store).unwrap();
        assert_eq!(reloaded.transactions().len(), 2);
        assert_eq!(reloaded.stats().customer_count, 2);
        assert_eq!(reloaded.transactions()[0].customer_label(), WALK_IN_CUSTOMER);
    }

    #[test]
    fn twelve_sales_show_last_ten_newest_first() {
        let mut app = fresh_app();
        let mut ids = Vec::new();
        for i in 1..=12 {
            ids.push(app.record_transaction(sale(None, f64::from(i))).unwrap().id);
        }
        let table = app.document().inner_html(TRANSACTIONS_TABLE_BODY).unwrap();
        assert_eq!(table.matches("<tr>").count(), 10);
        let positions: Vec<usize> = ids[2..]
            .iter()
            .rev()
            .map(|id| table.find(&format!("#{id}<")).expect("row rendered"))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert!(!table.contains(&format!("#{}<", ids[0])));
        assert!(!table.contains(&format!("#{}<", ids[1])));
    }

    #[test]
    fn transaction_form_records_and_closes() {
        let mut app = fresh_app();
        app.open_modal("transactionModal").unwrap();
        let doc = app.document().clone();
        doc.set_value("txnCustomer", "Rithy").unwrap();
        doc.set_value("txnAmount", "8.75").unwrap();

        let submission = app.submit_form(FormKind::Transaction).unwrap();
        assert!(matches!(submission, FormSubmission::Transaction(_)));
        assert_eq!(app.transactions().len(), 1);
        assert_eq!(app.transactions()[0].customer.as_deref(), Some("Rithy"));
        assert!(doc.is_hidden("transactionModal").unwrap());
        assert_eq!(app.notifier().visible().len(), 1);
    }

    #[test]
    fn invalid_form_keeps_modal_open() {
        let mut app = fresh_app();
        app.open_modal("employeeModal").unwrap();
        let err = app.submit_form(FormKind::Employee).unwrap_err();
        assert!(matches!(err, PosError::Validation { .. }));
        assert!(!app.document().is_hidden("employeeModal").unwrap());
        assert!(app.transactions().is_empty());
    }

    #[test]
    fn menu_clicks_switch_pages() {
        let mut app = fresh_app();
        assert_eq!(
            app.click_menu_item("menu-transactions").unwrap().as_deref(),
            Some("transactions")
        );
        assert_eq!(app.navigator().active_page(), Some("transactions"));
        assert!(app
            .document()
            .has_class("transactions-page", ACTIVE_CLASS)
            .unwrap());
        assert!(!app
            .document()
            .has_class("dashboard-page", ACTIVE_CLASS)
            .unwrap());
        assert!(app.toggle_submenu("inventorySubmenu").unwrap());
    }

    #[test]
    fn save_settings_persists_and_updates_display() {
        let mut app = fresh_app();
        app.record_transaction(sale(None, 12.5)).unwrap();
        let doc = app.document().clone();
        doc.set_value(settings::SHOP_NAME_FIELD, "Lucky Mart").unwrap();
        doc.set_value(settings::CURRENCY_FIELD, "KHR").unwrap();
        doc.set_checked(settings::DARK_MODE_FIELD, true).unwrap();

        app.save_settings().unwrap();
        assert_eq!(app.settings().shop_name, "Lucky Mart");
        assert_eq!(app.store().load_settings().unwrap(), app.settings().clone());
        assert_eq!(doc.text(SHOP_TITLE).unwrap(), "Lucky Mart");
        assert_eq!(doc.text(STAT_TOTAL_REVENUE).unwrap(), "៛12.50");
        assert!(doc.has_class(view::BODY, settings::DARK_MODE_CLASS).unwrap());
        assert_eq!(app.notifier().visible().len(), 1);
    }

    #[test]
    fn reset_after_customization_restores_defaults() {
        let mut app = fresh_app();
        let doc = app.document().clone();
        doc.set_value(settings::SHOP_NAME_FIELD, "Custom").unwrap();
        doc.set_value(settings::CURRENCY_FIELD, "THB").unwrap();
        doc.set_value(settings::LANGUAGE_FIELD, "en").unwrap();
        doc.set_checked(settings::DARK_MODE_FIELD, true).unwrap();
        app.save_settings().unwrap();
        assert!(app.store().contains(SETTINGS_KEY).unwrap());

        let mut prompt = String::new();
        let reset = app
            .reset_settings(|msg| {
                prompt = msg.to_string();
                true
            })
            .unwrap();
        assert!(reset);
        assert_eq!(prompt, settings::RESET_CONFIRM_PROMPT);
        assert!(!app.store().contains(SETTINGS_KEY).unwrap());
        assert_eq!(app.settings(), &Settings::default());
        assert_eq!(doc.value(settings::SHOP_NAME_FIELD).unwrap(), "Corner POS");
        assert_eq!(doc.value(settings::CURRENCY_FIELD).unwrap(), "USD");
        assert_eq!(doc.value(settings::LANGUAGE_FIELD).unwrap(), "km");
        assert!(!doc.checked(settings::DARK_MODE_FIELD).unwrap());
        assert!(!doc.has_class(view::BODY, settings::DARK_MODE_CLASS).unwrap());
    }

    #[test]
    fn declined_reset_changes_nothing() {
        let mut app = fresh_app();
        app.document()
            .set_value(settings::SHOP_NAME_FIELD, "Keep Me")
            .unwrap();
        app.save_settings().unwrap();
        assert!(!app.reset_settings(|_| false).unwrap());
        assert_eq!(app.settings().shop_name, "Keep Me");
        assert!(app.store().contains(SETTINGS_KEY).unwrap());
    }

    #[test]
    fn persisted_keys_overlay_defaults_on_load() {
        let mut backend = MemoryStore::new();
        backend
            .set_item(SETTINGS_KEY, r#"{"currency":"KHR","darkMode":true}"#)
            .unwrap();
        let app = App::load(Document::pos_layout(), PersistentStore::new(backend)).unwrap();
        assert_eq!(app.settings().currency, Currency::Khr);
        assert_eq!(app.settings().shop_name, "Corner POS");
        let doc = app.document();
        assert_eq!(doc.value(settings::CURRENCY_FIELD).unwrap(), "KHR");
        assert!(doc.checked(settings::DARK_MODE_FIELD).unwrap());
        assert!(doc.has_class(view::BODY, settings::DARK_MODE_CLASS).unwrap());
    }

    #[test]
    fn dark_mode_preview_is_not_persisted() {
        let mut app = fresh_app();
        app.toggle_dark_mode(true).unwrap();
        assert!(app
            .document()
            .has_class(view::BODY, settings::DARK_MODE_CLASS)
            .unwrap());
        assert!(!app.store().contains(SETTINGS_KEY).unwrap());
    }

    /// Backend that reads fine but refuses every write.
    struct ReadOnlyBackend(MemoryStore);

    impl KeyValueStore for ReadOnlyBackend {
        fn get_item(&self, key: &str) -> Result<Option<String>> {
            self.0.get_item(key)
        }

        fn set_item(&mut self, _key: &str, _value: &str) -> Result<()> {
            Err(PosError::StorageInit("disk is read-only".into()))
        }

        fn remove_item(&mut self, _key: &str) -> Result<()> {
            Err(PosError::StorageInit("disk is read-only".into()))
        }

        fn keys(&self) -> Result<Vec<String>> {
            self.0.keys()
        }
    }

    #[test]
    fn failed_save_leaves_ledger_untouched() {
        let mut app = App::load(
            Document::pos_layout(),
            PersistentStore::new(ReadOnlyBackend(MemoryStore::new())),
        )
        .unwrap();
        assert!(app.record_transaction(sale(Some("Dara"), 5.0)).is_err());
        assert!(app.transactions().is_empty());
        assert_eq!(app.stats().transaction_count, 0);
        assert_eq!(app.document().text(STAT_TRANSACTION_COUNT).unwrap(), "0");
    }

    #[test]
    fn failed_save_keeps_transaction_modal_open() {
        let mut app = App::load(
            Document::pos_layout(),
            PersistentStore::new(ReadOnlyBackend(MemoryStore::new())),
        )
        .unwrap();
        app.open_modal("transactionModal").unwrap();
        app.document().set_value("txnAmount", "4").unwrap();
        assert!(app.submit_form(FormKind::Transaction).is_err());
        assert!(!app.document().is_hidden("transactionModal").unwrap());
        assert!(app.transactions().is_empty());
    }

    #[test]
    fn banner_failure_does_not_fail_a_recorded_sale() {
        let mut app = fresh_app();
        app.notifier = Notifier::with_host(app.doc.clone(), "noSuchHost");
        app.open_modal("transactionModal").unwrap();
        let doc = app.document().clone();
        doc.set_value("txnAmount", "9.5").unwrap();

        app.submit_form(FormKind::Transaction).unwrap();
        assert_eq!(app.transactions().len(), 1);
        assert!(doc.is_hidden("transactionModal").unwrap());
        assert_eq!(doc.value("txnAmount").unwrap(), "");
        assert!(app.notifier().visible().is_empty());
    }

    #[test]
    fn unreadable_ledger_is_kept_aside_on_first_sale() {
        let newer = r#"{"schemaVersion":2,"data":[{"id":"TXNOLD","total":{"minor":100}}]}"#;
        let mut backend = MemoryStore::new();
        backend.set_item(TRANSACTIONS_KEY, newer).unwrap();
        let mut app = App::load(Document::pos_layout(), PersistentStore::new(backend)).unwrap();
        assert!(app.transactions().is_empty());

        let txn = app.record_transaction(sale(None, 1.0)).unwrap();
        let backup = format!("{TRANSACTIONS_KEY}{}", crate::storage::UNREADABLE_SUFFIX);
        assert_eq!(
            app.store().backend().get_item(&backup).unwrap().as_deref(),
            Some(newer)
        );
        assert_eq!(app.store().load_transactions().unwrap(), vec![txn]);
    }

    #[tokio::test(start_paused = true)]
    async fn clock_and_banners_stop_on_shutdown() {
        let mut app = fresh_app();
        app.start_clock().unwrap();
        app.notify("hello", NotificationKind::Info).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(app.clock_running());
        assert!(!app.document().text(CURRENT_TIME).unwrap().is_empty());

        app.shutdown().await;
        assert!(!app.clock_running());
        assert!(app.notifier().visible().is_empty());
    }
}
