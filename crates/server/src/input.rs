//! Submitted form fields and tolerated input problems.
//!
//! Admin forms send scalars as text and lists as stringified JSON. A list that
//! fails to parse is not fatal: it reads as empty, a `warn!` is logged, and an
//! [`InputWarning`] is returned to the caller alongside the saved aggregate.
//! Scalars that fail to parse are [`ValidationError`]s.

use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Serialize;
use serde::de::DeserializeOwned;

use showcase_core::ValidationError;

/// Category of a tolerated input problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Input did not parse and was replaced by an empty value.
    MalformedInputTolerated,
}

/// A problem in the submitted input that did not abort the write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InputWarning {
    /// Submitted field name.
    pub field: String,
    /// Problem category.
    pub kind: WarningKind,
    /// Human-readable detail.
    pub message: String,
}

/// Accumulates [`InputWarning`]s while an input is parsed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Warnings(Vec<InputWarning>);

impl Warnings {
    #[must_use]
    pub const fn new() -> Self {
        Self(Vec::new())
    }

    /// Record a malformed field that was replaced by an empty value.
    pub fn tolerate(&mut self, field: &str, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(field, %message, "tolerating malformed input");
        self.0.push(InputWarning {
            field: field.to_string(),
            kind: WarningKind::MalformedInputTolerated,
            message,
        });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[InputWarning] {
        &self.0
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<InputWarning> {
        self.0
    }
}

/// Text fields of a submitted form, keyed by field name.
///
/// When a field is repeated, the last value wins.
#[derive(Debug, Default, Clone)]
pub struct FormFields {
    values: HashMap<String, String>,
}

impl FormFields {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, value)` pairs.
    #[must_use]
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Trimmed value, `None` when absent or blank.
    #[must_use]
    pub fn text(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    /// Trimmed value, empty string when absent.
    #[must_use]
    pub fn text_or_default(&self, name: &str) -> String {
        self.text(name).unwrap_or_default().to_string()
    }

    /// Trimmed non-blank value.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::Required` when absent or blank.
    pub fn required(&self, name: &str) -> Result<String, ValidationError> {
        self.text(name)
            .map(ToString::to_string)
            .ok_or_else(|| ValidationError::required(name))
    }

    /// Decimal value such as a price.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::Invalid` if present but not a decimal.
    pub fn decimal(&self, name: &str) -> Result<Option<Decimal>, ValidationError> {
        self.text(name)
            .map(|raw| {
                Decimal::from_str(raw)
                    .map_err(|_| ValidationError::invalid(name, format!("'{raw}' is not a number")))
            })
            .transpose()
    }

    /// Integer value.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::Invalid` if present but not an integer.
    pub fn int<T: FromStr>(&self, name: &str) -> Result<Option<T>, ValidationError> {
        self.text(name)
            .map(|raw| {
                raw.parse::<T>()
                    .map_err(|_| ValidationError::invalid(name, format!("'{raw}' is not an integer")))
            })
            .transpose()
    }

    /// Checkbox-style flag: `true`, `1`, `on` or `yes` (case-insensitive).
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.text(name).is_some_and(|v| {
            matches!(
                v.to_ascii_lowercase().as_str(),
                "true" | "1" | "on" | "yes"
            )
        })
    }

    /// A list submitted as stringified JSON.
    ///
    /// Absent or blank reads as empty. A value that is not a JSON array of `T`
    /// reads as empty and records a warning.
    pub fn json_list<T: DeserializeOwned>(&self, name: &str, warnings: &mut Warnings) -> Vec<T> {
        let Some(raw) = self.text(name) else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<T>>(raw) {
            Ok(items) => items,
            Err(e) => {
                warnings.tolerate(name, format!("ignored malformed JSON list: {e}"));
                Vec::new()
            }
        }
    }

    /// A list of ids, submitted as a JSON array (`[1, 2]`) or a
    /// comma-separated list (`1,2`).
    ///
    /// Entries that are not integers are skipped with a warning.
    pub fn id_list<I: From<i32>>(&self, name: &str, warnings: &mut Warnings) -> Vec<I> {
        let Some(raw) = self.text(name) else {
            return Vec::new();
        };

        if raw.starts_with('[') {
            return match serde_json::from_str::<Vec<i32>>(raw) {
                Ok(ids) => ids.into_iter().map(I::from).collect(),
                Err(e) => {
                    warnings.tolerate(name, format!("ignored malformed id list: {e}"));
                    Vec::new()
                }
            };
        }

        let mut ids = Vec::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part.parse::<i32>() {
                Ok(id) => ids.push(I::from(id)),
                Err(_) => warnings.tolerate(name, format!("ignored non-numeric id '{part}'")),
            }
        }
        ids
    }
}
