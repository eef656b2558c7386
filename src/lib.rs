//! Corner POS - headless point-of-sale front end.
//!
//! The page's controllers (modals, navigation, forms, settings, the
//! transaction ledger and its dashboard) run against a [`view::Document`]
//! and persist their two aggregates to an origin-scoped key/value store.
//!
//! Other scripts reach the ledger through three operations on [`app::App`]:
//! `record_transaction`, `generate_transaction_id` and `add_demo_transaction`.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod app;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod format;
pub mod forms;
pub mod modal;
pub mod models;
pub mod navigation;
pub mod notify;
pub mod settings;
pub mod stats;
pub mod storage;
pub mod view;

pub use app::App;
pub use error::{PosError, Result};
pub use models::{Currency, NewTransaction, Settings, Transaction, TransactionStatus};
pub use stats::Stats;

/// Boot the POS against the on-disk store and run until Ctrl-C.
pub fn run() -> anyhow::Result<()> {
    let config = config::AppConfig::from_env();

    // Structured logging: console + rolling file
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config::DEFAULT_LOG_FILTER));

    let log_dir = config.log_dir();
    config::prune_old_logs(&log_dir);
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("create log dir {}", log_dir.display()))?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "pos");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);
    let console_layer = fmt::layer().with_target(true);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_sha = env!("BUILD_GIT_SHA"),
        built_at = env!("BUILD_TIMESTAMP"),
        "Starting Corner POS"
    );

    // The page model is single-threaded: one event loop, no worker pool.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;

    runtime.block_on(async move {
        let backend = db::SqliteStore::open(&config.data_dir, &config.origin)
            .context("open local storage")?;
        let store = storage::PersistentStore::new(backend);
        let mut app = App::load(view::Document::pos_layout(), store).context("load app state")?;
        app.start_clock().context("start clock")?;

        let stats = app.stats().clone();
        info!(
            origin = %config.origin,
            transactions = stats.transaction_count,
            customers = stats.customer_count,
            revenue = %format::format_currency(app.settings().currency, stats.total_revenue),
            "POS ready"
        );

        tokio::signal::ctrl_c()
            .await
            .context("wait for shutdown signal")?;
        app.shutdown().await;
        anyhow::Ok(())
    })?;

    info!("Corner POS exited");
    Ok(())
}
