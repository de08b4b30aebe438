//! Customer reviews.

use chrono::{DateTime, Utc};
use serde::Serialize;

use showcase_core::{ReviewId, ValidationError};

use crate::input::FormFields;

pub const MIN_RATING: i16 = 1;
pub const MAX_RATING: i16 = 5;

#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub id: ReviewId,
    pub author_name: String,
    pub content: String,
    pub rating: i16,
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Submitted review fields. The photo travels separately as an upload.
#[derive(Debug, Clone)]
pub struct ReviewInput {
    pub author_name: String,
    pub content: String,
    pub rating: i16,
    /// Clear the current photo when no new one is uploaded.
    pub remove_photo: bool,
}

impl ReviewInput {
    /// Parse a submitted review form: `author_name`, `content`, `rating`,
    /// `remove_photo`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] for blank author or content, or a rating
    /// outside 1..=5.
    pub fn from_form(form: &FormFields) -> Result<Self, ValidationError> {
        let rating = form
            .int::<i16>("rating")?
            .ok_or_else(|| ValidationError::required("rating"))?;
        if !(MIN_RATING..=MAX_RATING).contains(&rating) {
            return Err(ValidationError::invalid(
                "rating",
                format!("must be between {MIN_RATING} and {MAX_RATING}"),
            ));
        }

        Ok(Self {
            author_name: form.required("author_name")?,
            content: form.required("content")?,
            rating,
            remove_photo: form.flag("remove_photo"),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_form() {
        let form = FormFields::from_pairs([
            ("author_name", "Dana"),
            ("content", "Lovely engraving"),
            ("rating", "5"),
        ]);
        let input = ReviewInput::from_form(&form).unwrap();
        assert_eq!(input.rating, 5);
        assert!(!input.remove_photo);
    }

    #[test]
    fn test_rating_bounds() {
        for bad in ["0", "6", "-1"] {
            let form = FormFields::from_pairs([
                ("author_name", "Dana"),
                ("content", "ok"),
                ("rating", bad),
            ]);
            assert_eq!(ReviewInput::from_form(&form).unwrap_err().field(), "rating");
        }
    }

    #[test]
    fn test_missing_rating() {
        let form = FormFields::from_pairs([("author_name", "Dana"), ("content", "ok")]);
        assert_eq!(
            ReviewInput::from_form(&form).unwrap_err(),
            ValidationError::required("rating")
        );
    }
}
