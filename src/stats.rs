//! Dashboard counters derived from the transaction ledger.
//!
//! Stats are never persisted and never patched in place: every mutation of the
//! ledger rescans the full list.

use chrono::{DateTime, Local, NaiveDate, TimeZone};
use std::collections::HashSet;

use crate::models::Transaction;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Stats {
    pub today_sales: f64,
    pub transaction_count: usize,
    pub customer_count: usize,
    pub total_revenue: f64,
}

/// Recompute every counter, using the local calendar day of `as_of` for
/// `today_sales`.
pub fn recompute(transactions: &[Transaction], as_of: DateTime<Local>) -> Stats {
    recompute_in(transactions, &Local, as_of.date_naive())
}

/// Same as [`recompute`] with an explicit zone for day bucketing.
pub fn recompute_in<Tz: TimeZone>(transactions: &[Transaction], tz: &Tz, day: NaiveDate) -> Stats {
    let mut customers: HashSet<&str> = HashSet::new();
    let mut stats = Stats {
        transaction_count: transactions.len(),
        ..Stats::default()
    };

    for txn in transactions {
        stats.total_revenue += txn.amount;
        if txn.date.with_timezone(tz).date_naive() == day {
            stats.today_sales += txn.amount;
        }
        // Every unnamed sale lands in the single walk-in bucket.
        customers.insert(txn.customer_label());
    }

    stats.customer_count = customers.len();
    stats
}
