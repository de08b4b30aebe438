//! Validation errors for caller-supplied content.

/// A field failed validation.
///
/// Surfaced to HTTP clients as `400 Bad Request`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A required field is missing or blank.
    #[error("{field} is required")]
    Required {
        /// Field name as submitted.
        field: String,
    },
    /// A field has a value outside its allowed range or shape.
    #[error("{field}: {message}")]
    Invalid {
        /// Field name as submitted.
        field: String,
        /// Human-readable reason.
        message: String,
    },
}

impl ValidationError {
    /// Shorthand for [`ValidationError::Required`].
    #[must_use]
    pub fn required(field: impl Into<String>) -> Self {
        Self::Required {
            field: field.into(),
        }
    }

    /// Shorthand for [`ValidationError::Invalid`].
    #[must_use]
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            message: message.into(),
        }
    }

    /// The offending field name.
    #[must_use]
    pub fn field(&self) -> &str {
        match self {
            Self::Required { field } | Self::Invalid { field, .. } => field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ValidationError::required("phone").to_string(), "phone is required");
        assert_eq!(
            ValidationError::invalid("rating", "must be between 1 and 5").to_string(),
            "rating: must be between 1 and 5"
        );
    }

    #[test]
    fn test_field_accessor() {
        assert_eq!(ValidationError::invalid("items", "empty").field(), "items");
    }
}
