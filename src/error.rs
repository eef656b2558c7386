//! Error type shared by every controller in the crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PosError {
    /// A DOM anchor the controllers depend on is not present in the document.
    #[error("missing element: #{0}")]
    MissingElement(String),

    #[error("storage: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage init: {0}")]
    StorageInit(String),

    /// Form submission rejected; one message per offending field.
    #[error("{form} is invalid: {}", format_field_errors(.errors))]
    Validation {
        form: String,
        errors: Vec<(String, String)>,
    },

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("unknown currency: {0}")]
    UnknownCurrency(String),

    #[error("unknown transaction status: {0}")]
    UnknownStatus(String),

    #[error("runtime: {0}")]
    Runtime(String),
}

fn format_field_errors(errors: &[(String, String)]) -> String {
    errors
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, PosError>;
