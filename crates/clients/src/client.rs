use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use facturly_core::validation::{optional_email, optional_text, required_text};
use facturly_core::{ClientId, FieldErrors, Validate};

pub const NAME_MAX: usize = 100;
pub const PHONE_MAX: usize = 20;
pub const ADDRESS_MAX: usize = 200;

/// Raw client form submission.
///
/// Every field is optional at this stage; a missing field and an empty one
/// are treated the same way.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientInput {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl ClientInput {
    /// Pre-fill an edit form from a stored row.
    pub fn from_record(record: &ClientRecord) -> Self {
        Self {
            name: Some(record.name.clone()),
            email: record.email.clone(),
            phone: record.phone.clone(),
            address: record.address.clone(),
        }
    }
}

/// Normalized client, ready for insert/update.
///
/// Absent optional fields serialize as `null` so an update clears them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewClient {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Row of the `clients` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientRecord {
    pub id: ClientId,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Validate for ClientInput {
    type Output = NewClient;

    fn validate(&self) -> Result<NewClient, FieldErrors> {
        let mut errors = FieldErrors::new();

        let name = required_text(&mut errors, "name", "Name", self.name.as_deref(), NAME_MAX);
        let email = optional_email(&mut errors, "email", self.email.as_deref());
        let phone = optional_text(&mut errors, "phone", "Phone", self.phone.as_deref(), PHONE_MAX);
        let address = optional_text(
            &mut errors,
            "address",
            "Address",
            self.address.as_deref(),
            ADDRESS_MAX,
        );

        errors.into_result(|| NewClient {
            name: name.unwrap_or_default(),
            email,
            phone,
            address,
        })
    }
}
