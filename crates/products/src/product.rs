use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use facturly_core::validation::{non_negative_amount, optional_text, required_text};
use facturly_core::{FieldErrors, ProductId, Validate};

pub const NAME_MAX: usize = 100;
pub const SKU_MAX: usize = 50;
pub const DESCRIPTION_MAX: usize = 500;

/// Raw product form submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductInput {
    pub name: Option<String>,
    pub sku: Option<String>,
    pub description: Option<String>,
    /// Unit price excluding tax.
    pub price: Option<f64>,
    pub stock: Option<i64>,
}

impl ProductInput {
    pub fn from_record(record: &ProductRecord) -> Self {
        Self {
            name: Some(record.name.clone()),
            sku: record.sku.clone(),
            description: record.description.clone(),
            price: Some(record.price),
            stock: Some(record.stock),
        }
    }
}

/// Normalized product, ready for insert/update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub price: f64,
    pub stock: i64,
}

/// Row of the `products` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub stock: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ProductRecord {
    pub fn in_stock(&self) -> bool {
        self.stock > 0
    }
}

impl Validate for ProductInput {
    type Output = NewProduct;

    fn validate(&self) -> Result<NewProduct, FieldErrors> {
        let mut errors = FieldErrors::new();

        let name = required_text(&mut errors, "name", "Name", self.name.as_deref(), NAME_MAX);
        let sku = optional_text(&mut errors, "sku", "SKU", self.sku.as_deref(), SKU_MAX);
        let description = optional_text(
            &mut errors,
            "description",
            "Description",
            self.description.as_deref(),
            DESCRIPTION_MAX,
        );
        let price = non_negative_amount(&mut errors, "price", "Price", self.price);

        let stock = self.stock.unwrap_or(0);
        if stock < 0 {
            errors.add("stock", "Stock must be zero or greater");
        }

        errors.into_result(|| NewProduct {
            name: name.unwrap_or_default(),
            sku,
            description,
            price: price.unwrap_or_default(),
            stock,
        })
    }
}
