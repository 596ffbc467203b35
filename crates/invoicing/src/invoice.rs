use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use facturly_core::validation::{non_negative_amount, normalize_text, required_text};
use facturly_core::{ClientId, FieldErrors, InvoiceId, Validate};

pub const NUMBER_MAX: usize = 50;

/// Date format accepted for `due_date` (what an HTML date input submits).
pub const DUE_DATE_FORMAT: &str = "%Y-%m-%d";

/// Invoice status lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Sent,
    Paid,
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 3] = [Self::Draft, Self::Sent, Self::Paid];

    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }
}

impl core::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raw invoice form submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InvoiceInput {
    pub number: Option<String>,
    pub client_id: Option<String>,
    pub status: Option<String>,
    pub total_ht: Option<f64>,
    pub total_ttc: Option<f64>,
    pub due_date: Option<String>,
}

impl InvoiceInput {
    /// Pre-fill an edit form from a stored row.
    pub fn from_record(record: &InvoiceRecord) -> Self {
        Self {
            number: Some(record.number.clone()),
            client_id: Some(record.client_id.to_string()),
            status: Some(record.status.as_str().to_string()),
            total_ht: Some(record.total_ht),
            total_ttc: Some(record.total_ttc),
            due_date: record.due_date.map(|d| d.format(DUE_DATE_FORMAT).to_string()),
        }
    }
}

/// Normalized invoice, ready for insert/update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewInvoice {
    pub number: String,
    pub client_id: ClientId,
    pub status: InvoiceStatus,
    pub total_ht: f64,
    pub total_ttc: f64,
    pub due_date: Option<NaiveDate>,
}

/// Embedded `clients(name)` selection on invoice listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSummary {
    pub name: String,
}

/// Row of the `factures` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub id: InvoiceId,
    pub number: String,
    pub client_id: ClientId,
    #[serde(default)]
    pub status: InvoiceStatus,
    pub total_ht: f64,
    pub total_ttc: f64,
    #[serde(default)]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, rename = "clients", skip_serializing_if = "Option::is_none")]
    pub client: Option<ClientSummary>,
}

impl Validate for InvoiceInput {
    type Output = NewInvoice;

    fn validate(&self) -> Result<NewInvoice, FieldErrors> {
        let mut errors = FieldErrors::new();

        let number = required_text(&mut errors, "number", "Number", self.number.as_deref(), NUMBER_MAX);

        let client_id = match normalize_text(self.client_id.as_deref()) {
            None => {
                errors.add("client_id", "Client is required");
                None
            }
            Some(raw) => match raw.parse::<ClientId>() {
                Ok(id) => Some(id),
                Err(_) => {
                    errors.add("client_id", "Invalid client");
                    None
                }
            },
        };

        let status = match normalize_text(self.status.as_deref()) {
            None => InvoiceStatus::default(),
            Some(raw) => InvoiceStatus::parse(&raw).unwrap_or_else(|| {
                errors.add("status", "Status must be one of: draft, sent, paid");
                InvoiceStatus::default()
            }),
        };

        let total_ht = non_negative_amount(&mut errors, "total_ht", "Total HT", self.total_ht);
        let total_ttc = non_negative_amount(&mut errors, "total_ttc", "Total TTC", self.total_ttc);

        let due_date = match normalize_text(self.due_date.as_deref()) {
            None => None,
            Some(raw) => match NaiveDate::parse_from_str(&raw, DUE_DATE_FORMAT) {
                Ok(date) => Some(date),
                Err(_) => {
                    errors.add("due_date", "Due date must be a valid date (YYYY-MM-DD)");
                    None
                }
            },
        };

        match (number, client_id, total_ht, total_ttc) {
            (Some(number), Some(client_id), Some(total_ht), Some(total_ttc)) if errors.is_empty() => {
                Ok(NewInvoice {
                    number,
                    client_id,
                    status,
                    total_ht,
                    total_ttc,
                    due_date,
                })
            }
            _ => Err(errors),
        }
    }
}
