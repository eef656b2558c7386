//! Data-entry dialogs: field extraction, validation and typed records.
//!
//! Every form lives inside one modal. A submit that fails validation keeps the
//! modal open and writes the messages into the form's inline error element.

use std::collections::BTreeMap;
use tracing::{debug, info};

use crate::error::{PosError, Result};
use crate::modal;
use crate::models::{NewTransaction, TransactionStatus};
use crate::view::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    /// Non-negative decimal.
    Amount,
    /// Non-negative whole number.
    Count,
    /// Any finite decimal.
    Number,
}

#[derive(Debug, Clone, Copy)]
pub struct FieldSpec {
    pub id: &'static str,
    pub label: &'static str,
    pub required: bool,
    pub kind: FieldKind,
}

const fn field(id: &'static str, label: &'static str, required: bool, kind: FieldKind) -> FieldSpec {
    FieldSpec {
        id,
        label,
        required,
        kind,
    }
}

const EMPLOYEE_FIELDS: &[FieldSpec] = &[
    field("employeeName", "Name", true, FieldKind::Text),
    field("employeePosition", "Position", true, FieldKind::Text),
    field("employeePhone", "Phone", false, FieldKind::Text),
];

const ITEM_FIELDS: &[FieldSpec] = &[
    field("itemName", "Item name", true, FieldKind::Text),
    field("itemPrice", "Price", true, FieldKind::Amount),
    field("itemStock", "Stock", false, FieldKind::Count),
];

const KPI_FIELDS: &[FieldSpec] = &[
    field("kpiName", "KPI name", true, FieldKind::Text),
    field("kpiTarget", "Target", true, FieldKind::Number),
    field("kpiPeriod", "Period", false, FieldKind::Text),
];

const TRANSACTION_FIELDS: &[FieldSpec] = &[
    field("txnCustomer", "Customer", false, FieldKind::Text),
    field("txnAmount", "Amount", true, FieldKind::Amount),
    field("txnStatus", "Status", false, FieldKind::Text),
];

pub const DEFAULT_KPI_PERIOD: &str = "monthly";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormKind {
    Employee,
    Item,
    Kpi,
    Transaction,
}

impl FormKind {
    pub const ALL: [FormKind; 4] = [
        FormKind::Employee,
        FormKind::Item,
        FormKind::Kpi,
        FormKind::Transaction,
    ];

    pub fn form_id(&self) -> &'static str {
        match self {
            FormKind::Employee => "employeeForm",
            FormKind::Item => "itemForm",
            FormKind::Kpi => "kpiForm",
            FormKind::Transaction => "transactionForm",
        }
    }

    pub fn modal_id(&self) -> &'static str {
        match self {
            FormKind::Employee => "employeeModal",
            FormKind::Item => "itemModal",
            FormKind::Kpi => "kpiModal",
            FormKind::Transaction => "transactionModal",
        }
    }

    pub fn error_id(&self) -> String {
        format!("{}Error", self.form_id())
    }

    pub fn fields(&self) -> &'static [FieldSpec] {
        match self {
            FormKind::Employee => EMPLOYEE_FIELDS,
            FormKind::Item => ITEM_FIELDS,
            FormKind::Kpi => KPI_FIELDS,
            FormKind::Transaction => TRANSACTION_FIELDS,
        }
    }

    pub fn from_form_id(form_id: &str) -> Option<FormKind> {
        FormKind::ALL.into_iter().find(|k| k.form_id() == form_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmployeeRecord {
    pub name: String,
    pub position: String,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemRecord {
    pub name: String,
    pub price: f64,
    pub stock: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KpiRecord {
    pub name: String,
    pub target: f64,
    pub period: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FormSubmission {
    Employee(EmployeeRecord),
    Item(ItemRecord),
    Kpi(KpiRecord),
    Transaction(NewTransaction),
}

/// Trimmed field values keyed by field id.
pub type FormData = BTreeMap<&'static str, String>;

pub fn extract(doc: &Document, kind: FormKind) -> Result<FormData> {
    let mut data = FormData::new();
    for def in kind.fields() {
        let raw = doc.value(def.id)?;
        data.insert(def.id, raw.trim().to_string());
    }
    Ok(data)
}

fn check_field(def: &FieldSpec, value: &str) -> Option<String> {
    if value.is_empty() {
        return def
            .required
            .then(|| format!("{} is required", def.label));
    }
    match def.kind {
        FieldKind::Text => None,
        FieldKind::Amount => match value.parse::<f64>() {
            Ok(n) if n.is_finite() && n >= 0.0 => None,
            Ok(_) => Some(format!("{} cannot be negative", def.label)),
            Err(_) => Some(format!("{} must be a number", def.label)),
        },
        FieldKind::Number => match value.parse::<f64>() {
            Ok(n) if n.is_finite() => None,
            _ => Some(format!("{} must be a number", def.label)),
        },
        FieldKind::Count => match value.parse::<u32>() {
            Ok(_) => None,
            Err(_) => Some(format!("{} must be a whole number", def.label)),
        },
    }
}

/// Per-field messages for `data`; empty when the form is acceptable.
pub fn validate(kind: FormKind, data: &FormData) -> Vec<(String, String)> {
    let mut errors: Vec<(String, String)> = kind
        .fields()
        .iter()
        .filter_map(|def| {
            let value = data.get(def.id).map(String::as_str).unwrap_or_default();
            check_field(def, value).map(|msg| (def.id.to_string(), msg))
        })
        .collect();

    if kind == FormKind::Transaction {
        let status = data.get("txnStatus").map(String::as_str).unwrap_or_default();
        if !status.is_empty() && status.parse::<TransactionStatus>().is_err() {
            errors.push(("txnStatus".to_string(), format!("Unknown status: {status}")));
        }
    }
    errors
}

fn optional(data: &FormData, id: &str) -> Option<String> {
    data.get(id).filter(|v| !v.is_empty()).cloned()
}

fn required(data: &FormData, id: &str) -> String {
    data.get(id).cloned().unwrap_or_default()
}

fn number(data: &FormData, id: &str) -> f64 {
    data.get(id)
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or_default()
}

/// Build the typed record. `data` must already have passed [`validate`].
fn build(kind: FormKind, data: &FormData) -> FormSubmission {
    match kind {
        FormKind::Employee => FormSubmission::Employee(EmployeeRecord {
            name: required(data, "employeeName"),
            position: required(data, "employeePosition"),
            phone: optional(data, "employeePhone"),
        }),
        FormKind::Item => FormSubmission::Item(ItemRecord {
            name: required(data, "itemName"),
            price: number(data, "itemPrice"),
            stock: optional(data, "itemStock").and_then(|v| v.parse().ok()),
        }),
        FormKind::Kpi => FormSubmission::Kpi(KpiRecord {
            name: required(data, "kpiName"),
            target: number(data, "kpiTarget"),
            period: optional(data, "kpiPeriod").unwrap_or_else(|| DEFAULT_KPI_PERIOD.to_string()),
        }),
        FormKind::Transaction => FormSubmission::Transaction(NewTransaction {
            customer: optional(data, "txnCustomer"),
            amount: number(data, "txnAmount"),
            status: optional(data, "txnStatus")
                .and_then(|v| v.parse().ok())
                .unwrap_or_default(),
        }),
    }
}

/// Read and validate a submitted form. On failure the inline error element is
/// filled in and the modal is left as it was.
pub fn parse(doc: &Document, kind: FormKind) -> Result<FormSubmission> {
    let data = extract(doc, kind)?;
    let errors = validate(kind, &data);
    if !errors.is_empty() {
        let message = errors
            .iter()
            .map(|(_, msg)| msg.as_str())
            .collect::<Vec<_>>()
            .join(". ");
        let error_id = kind.error_id();
        doc.set_text(&error_id, &message)?;
        doc.set_hidden(&error_id, false)?;
        debug!(form = kind.form_id(), errors = errors.len(), "form rejected");
        return Err(PosError::Validation {
            form: kind.form_id().to_string(),
            errors,
        });
    }
    Ok(build(kind, &data))
}

/// Clear the fields and the inline error, then close the modal.
pub fn finish(doc: &Document, kind: FormKind) -> Result<()> {
    for def in kind.fields() {
        doc.set_value(def.id, "")?;
    }
    let error_id = kind.error_id();
    doc.set_text(&error_id, "")?;
    doc.set_hidden(&error_id, true)?;
    modal::close(doc, kind.modal_id())?;
    info!(form = kind.form_id(), "form saved");
    Ok(())
}
