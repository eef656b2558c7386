//! Display formatting for money, timestamps and table markup.

use chrono::{DateTime, TimeZone};
use std::fmt::Display;

use crate::models::Currency;

/// `$12.50`, `៛12.50`, `฿12.50`.
pub fn format_currency(currency: Currency, amount: f64) -> String {
    format!("{}{amount:.2}", currency.symbol())
}

/// Locale-style timestamp. English uses month-first 12h time; every other
/// language tag falls back to day-first 24h time.
pub fn format_timestamp<Tz>(at: &DateTime<Tz>, language: &str) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let lang = language.trim().to_ascii_lowercase();
    if lang == "en" || lang.starts_with("en-") {
        at.format("%m/%d/%Y, %I:%M:%S %p").to_string()
    } else {
        at.format("%d/%m/%Y %H:%M:%S").to_string()
    }
}

pub(crate) fn esc(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
