//! Persisted aggregates: the transaction ledger and the shop settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PosError;

/// Display name used for sales recorded without a customer.
pub const WALK_IN_CUSTOMER: &str = "Walk-in";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    #[default]
    Completed,
    Cancelled,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = PosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "cancelled" | "canceled" => Ok(TransactionStatus::Cancelled),
            other => Err(PosError::UnknownStatus(other.to_string())),
        }
    }
}

/// One recorded sale. Never mutated after it is appended to the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
    pub amount: f64,
    #[serde(default)]
    pub status: TransactionStatus,
}

impl Transaction {
    /// Customer name as displayed and counted; blank or absent means walk-in.
    pub fn customer_label(&self) -> &str {
        self.customer
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(WALK_IN_CUSTOMER)
    }
}

/// Input for recording a sale; id and date are assigned by the ledger.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewTransaction {
    pub customer: Option<String>,
    pub amount: f64,
    pub status: TransactionStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Currency {
    #[default]
    #[serde(rename = "USD")]
    Usd,
    #[serde(rename = "KHR")]
    Khr,
    #[serde(rename = "THB")]
    Thb,
}

impl Currency {
    pub const ALL: [Currency; 3] = [Currency::Usd, Currency::Khr, Currency::Thb];

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Khr => "KHR",
            Currency::Thb => "THB",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Usd => "$",
            Currency::Khr => "៛",
            Currency::Thb => "฿",
        }
    }
}

impl FromStr for Currency {
    type Err = PosError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        Currency::ALL
            .into_iter()
            .find(|c| c.code() == code)
            .ok_or(PosError::UnknownCurrency(code))
    }
}

/// Shop settings. Missing keys in a persisted blob fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub shop_name: String,
    pub shop_address: String,
    pub shop_phone: String,
    pub shop_email: String,
    pub currency: Currency,
    pub language: String,
    pub dark_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            shop_name: "Corner POS".to_string(),
            shop_address: String::new(),
            shop_phone: String::new(),
            shop_email: String::new(),
            currency: Currency::Usd,
            language: "km".to_string(),
            dark_mode: false,
        }
    }
}
