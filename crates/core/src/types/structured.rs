//! Structured records stored in JSONB columns.
//!
//! Payment method formats and delivery destinations used to be free-form JSON
//! blobs shaped by whoever submitted them. They are now explicit types wrapped
//! in a [`Versioned`] envelope so the stored shape can evolve:
//!
//! ```json
//! {"version": 1, "data": {"kind": "bank_transfer", "requisites": ["IBAN ..."]}}
//! ```

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::validation::ValidationError;

/// Schema version written by this build.
pub const CURRENT_SCHEMA_VERSION: u16 = 1;

/// Envelope tagging a stored JSON document with its schema version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versioned<T> {
    /// Schema version of `data`.
    pub version: u16,
    /// The payload.
    pub data: T,
}

impl<T: for<'de> Deserialize<'de>> Versioned<T> {
    /// Decode a stored document.
    ///
    /// # Errors
    ///
    /// Returns an error message if the JSON does not match the envelope, or the
    /// version is newer than this build understands.
    pub fn decode(value: serde_json::Value) -> Result<T, String> {
        let envelope: Self = serde_json::from_value(value).map_err(|e| e.to_string())?;
        if envelope.version > CURRENT_SCHEMA_VERSION {
            return Err(format!(
                "unsupported schema version {} (max {CURRENT_SCHEMA_VERSION})",
                envelope.version
            ));
        }
        Ok(envelope.data)
    }
}

impl<T: Serialize> Versioned<T> {
    /// Encode `data` under the current schema version.
    #[must_use]
    pub fn encode(data: &T) -> serde_json::Value {
        serde_json::json!({
            "version": CURRENT_SCHEMA_VERSION,
            "data": data,
        })
    }
}

/// How a payment method is carried out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentFormat {
    /// Card payment, listing accepted networks.
    Card {
        #[serde(default)]
        networks: Vec<String>,
    },
    /// Bank transfer with requisite lines shown to the customer.
    BankTransfer {
        #[serde(default)]
        requisites: Vec<String>,
    },
    /// Cash on delivery or pickup.
    Cash {
        #[serde(default)]
        note: Option<String>,
    },
    /// Online payment through a named provider.
    Online { provider: String },
}

impl PaymentFormat {
    /// Validate the format before it is written.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if a bank transfer has no requisites, an online
    /// provider is blank, or a list contains blank entries.
    pub fn validate(&self, field: &str) -> Result<(), ValidationError> {
        match self {
            Self::Card { networks } => no_blank_entries(field, "networks", networks),
            Self::BankTransfer { requisites } => {
                if requisites.is_empty() {
                    return Err(ValidationError::invalid(
                        field,
                        "bank transfer needs at least one requisite line",
                    ));
                }
                no_blank_entries(field, "requisites", requisites)
            }
            Self::Cash { .. } => Ok(()),
            Self::Online { provider } => {
                if provider.trim().is_empty() {
                    return Err(ValidationError::invalid(field, "online provider is blank"));
                }
                Ok(())
            }
        }
    }
}

/// A delivery destination inside a region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    /// City or area name.
    pub name: String,
    /// Delivery price.
    pub price: Decimal,
    /// Free-text delivery term, e.g. "2-3 days".
    #[serde(default)]
    pub term: String,
}

impl Destination {
    /// Validate a destination list before it is written.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if a destination has a blank name or a
    /// negative price.
    pub fn validate_all(field: &str, destinations: &[Self]) -> Result<(), ValidationError> {
        for (index, destination) in destinations.iter().enumerate() {
            if destination.name.trim().is_empty() {
                return Err(ValidationError::invalid(
                    field,
                    format!("destination {index} has a blank name"),
                ));
            }
            if destination.price.is_sign_negative() {
                return Err(ValidationError::invalid(
                    field,
                    format!("destination {index} has a negative price"),
                ));
            }
        }
        Ok(())
    }
}

fn no_blank_entries(field: &str, list: &str, entries: &[String]) -> Result<(), ValidationError> {
    if entries.iter().any(|e| e.trim().is_empty()) {
        return Err(ValidationError::invalid(
            field,
            format!("{list} contains a blank entry"),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;

    #[test]
    fn test_payment_format_tagged_shape() {
        let format: PaymentFormat =
            serde_json::from_value(json!({"kind": "online", "provider": "PayBox"})).unwrap();
        assert_eq!(
            format,
            PaymentFormat::Online {
                provider: "PayBox".to_string()
            }
        );
    }

    #[test]
    fn test_versioned_encode_then_decode() {
        let stored = Versioned::encode(&PaymentFormat::Cash { note: None });
        assert_eq!(stored["version"], json!(1));
        let decoded = Versioned::<PaymentFormat>::decode(stored).unwrap();
        assert_eq!(decoded, PaymentFormat::Cash { note: None });
    }

    #[test]
    fn test_versioned_rejects_future_version() {
        let stored = json!({"version": 99, "data": {"kind": "cash"}});
        let err = Versioned::<PaymentFormat>::decode(stored).unwrap_err();
        assert!(err.contains("unsupported schema version 99"));
    }

    #[test]
    fn test_versioned_rejects_bare_payload() {
        assert!(Versioned::<PaymentFormat>::decode(json!({"kind": "cash"})).is_err());
    }

    #[test]
    fn test_bank_transfer_requires_requisites() {
        let format = PaymentFormat::BankTransfer { requisites: vec![] };
        assert!(format.validate("methods").is_err());

        let format = PaymentFormat::BankTransfer {
            requisites: vec!["IBAN KZ00 0000".to_string()],
        };
        assert!(format.validate("methods").is_ok());
    }

    #[test]
    fn test_card_rejects_blank_network() {
        let format = PaymentFormat::Card {
            networks: vec!["Visa".to_string(), "  ".to_string()],
        };
        let err = format.validate("methods").unwrap_err();
        assert_eq!(err.field(), "methods");
    }

    #[test]
    fn test_destination_validation() {
        let ok = vec![Destination {
            name: "Almaty".to_string(),
            price: Decimal::new(1500, 0),
            term: "1-2 days".to_string(),
        }];
        assert!(Destination::validate_all("regions", &ok).is_ok());

        let negative = vec![Destination {
            name: "Astana".to_string(),
            price: Decimal::new(-1, 0),
            term: String::new(),
        }];
        assert!(Destination::validate_all("regions", &negative).is_err());

        let blank = vec![Destination {
            name: " ".to_string(),
            price: Decimal::ZERO,
            term: String::new(),
        }];
        assert!(Destination::validate_all("regions", &blank).is_err());
    }
}
