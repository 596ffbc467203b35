//! Form validation primitives.
//!
//! Each resource crate exposes a raw "input" type (what a form submits) and
//! implements [`Validate`] for it, producing either a normalized record ready
//! for persistence or a [`FieldErrors`] set. Validation never performs IO.
//!
//! Normalization rules shared by every schema:
//! - text is trimmed before any check;
//! - an optional text field that is empty after trimming becomes `None`
//!   (serialized as `null`), never `""`.

use std::collections::BTreeMap;

use serde::Serialize;

/// Pure validation of raw form input into a normalized record.
pub trait Validate {
    type Output;

    fn validate(&self) -> Result<Self::Output, FieldErrors>;
}

/// Field-keyed validation failures.
///
/// Only the first violation per field is kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, String>);

impl FieldErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a violation for `field` unless one is already recorded.
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// `Ok(value)` when no violation was recorded.
    pub fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, FieldErrors> {
        if self.is_empty() { Ok(value()) } else { Err(self) }
    }
}

impl core::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        for (i, (field, message)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{field}: {message}")?;
        }
        Ok(())
    }
}

impl std::error::Error for FieldErrors {}

/// Trim a raw text value; empty becomes `None`.
pub fn normalize_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// Required, length-bounded text.
pub fn required_text(
    errors: &mut FieldErrors,
    field: &'static str,
    label: &str,
    raw: Option<&str>,
    max_chars: usize,
) -> Option<String> {
    match normalize_text(raw) {
        None => {
            errors.add(field, format!("{label} is required"));
            None
        }
        Some(value) => check_length(errors, field, label, value, max_chars),
    }
}

/// Optional, length-bounded text. Empty input is valid and yields `None`.
pub fn optional_text(
    errors: &mut FieldErrors,
    field: &'static str,
    label: &str,
    raw: Option<&str>,
    max_chars: usize,
) -> Option<String> {
    normalize_text(raw).and_then(|value| check_length(errors, field, label, value, max_chars))
}

/// Optional email address. Empty input is valid and yields `None`.
pub fn optional_email(
    errors: &mut FieldErrors,
    field: &'static str,
    raw: Option<&str>,
) -> Option<String> {
    let value = normalize_text(raw)?;
    if is_email(&value) {
        Some(value)
    } else {
        errors.add(field, "Invalid email address");
        None
    }
}

/// Required finite amount, zero or greater.
pub fn non_negative_amount(
    errors: &mut FieldErrors,
    field: &'static str,
    label: &str,
    raw: Option<f64>,
) -> Option<f64> {
    match raw {
        None => {
            errors.add(field, format!("{label} is required"));
            None
        }
        Some(v) if !v.is_finite() => {
            errors.add(field, format!("{label} must be a number"));
            None
        }
        Some(v) if v < 0.0 => {
            errors.add(field, format!("{label} must be zero or greater"));
            None
        }
        Some(v) => Some(v),
    }
}

fn check_length(
    errors: &mut FieldErrors,
    field: &'static str,
    label: &str,
    value: String,
    max_chars: usize,
) -> Option<String> {
    if value.chars().count() > max_chars {
        errors.add(field, format!("{label} must be at most {max_chars} characters"));
        None
    } else {
        Some(value)
    }
}

/// Structural email check: one `@`, non-empty local part, dotted domain,
/// no whitespace.
pub fn is_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|l| !l.is_empty())
}
