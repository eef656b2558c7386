//! Binding between the settings form and the [`Settings`] aggregate.

use tracing::debug;

use crate::error::Result;
use crate::models::Settings;
use crate::view::{Document, BODY, SHOP_TITLE};

pub const SHOP_NAME_FIELD: &str = "shopName";
pub const SHOP_ADDRESS_FIELD: &str = "shopAddress";
pub const SHOP_PHONE_FIELD: &str = "shopPhone";
pub const SHOP_EMAIL_FIELD: &str = "shopEmail";
pub const CURRENCY_FIELD: &str = "currency";
pub const LANGUAGE_FIELD: &str = "language";
pub const DARK_MODE_FIELD: &str = "darkMode";

pub const TEXT_FIELDS: [&str; 4] = [
    SHOP_NAME_FIELD,
    SHOP_ADDRESS_FIELD,
    SHOP_PHONE_FIELD,
    SHOP_EMAIL_FIELD,
];

pub const DARK_MODE_CLASS: &str = "dark-mode";

pub const RESET_CONFIRM_PROMPT: &str =
    "Are you sure you want to reset all settings to default? This cannot be undone.";

/// Write every bound field from `settings`.
pub fn populate_form(doc: &Document, settings: &Settings) -> Result<()> {
    doc.set_value(SHOP_NAME_FIELD, &settings.shop_name)?;
    doc.set_value(SHOP_ADDRESS_FIELD, &settings.shop_address)?;
    doc.set_value(SHOP_PHONE_FIELD, &settings.shop_phone)?;
    doc.set_value(SHOP_EMAIL_FIELD, &settings.shop_email)?;
    doc.set_value(CURRENCY_FIELD, settings.currency.code())?;
    doc.set_value(LANGUAGE_FIELD, &settings.language)?;
    doc.set_checked(DARK_MODE_FIELD, settings.dark_mode)?;
    Ok(())
}

/// Read every bound field back into a fresh aggregate. An empty language
/// select keeps the default tag.
pub fn read_form(doc: &Document) -> Result<Settings> {
    let language = doc.value(LANGUAGE_FIELD)?.trim().to_string();
    Ok(Settings {
        shop_name: doc.value(SHOP_NAME_FIELD)?.trim().to_string(),
        shop_address: doc.value(SHOP_ADDRESS_FIELD)?.trim().to_string(),
        shop_phone: doc.value(SHOP_PHONE_FIELD)?.trim().to_string(),
        shop_email: doc.value(SHOP_EMAIL_FIELD)?.trim().to_string(),
        currency: doc.value(CURRENCY_FIELD)?.parse()?,
        language: if language.is_empty() {
            Settings::default().language
        } else {
            language
        },
        dark_mode: doc.checked(DARK_MODE_FIELD)?,
    })
}

pub fn apply_dark_mode(doc: &Document, enabled: bool) -> Result<()> {
    if enabled {
        doc.add_class(BODY, DARK_MODE_CLASS)?;
    } else {
        doc.remove_class(BODY, DARK_MODE_CLASS)?;
    }
    debug!(enabled, "dark mode applied");
    Ok(())
}

pub fn apply_shop_title(doc: &Document, settings: &Settings) -> Result<()> {
    doc.set_text(SHOP_TITLE, &settings.shop_name)
}
