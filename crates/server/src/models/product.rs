//! Product aggregate: the product row, its description blocks and images.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use showcase_core::{ProductId, ProductImageId, ValidationError};

use super::common::{BlockInput, ContentBlock, Pagination, non_blank_blocks};
use crate::input::{FormFields, Warnings};
use crate::projection::IndexedChild;

/// A product with its ordered child collections.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub description: String,
    pub price: Decimal,
    pub version: i32,
    pub images: Vec<ProductImage>,
    pub blocks: Vec<ContentBlock>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// The display image, if the product has any images.
    #[must_use]
    pub fn primary_image(&self) -> Option<&ProductImage> {
        self.images.iter().find(|i| i.is_primary)
    }
}

/// A product image backed by a file under `/uploads/products/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductImage {
    pub id: ProductImageId,
    pub image_url: String,
    pub is_primary: bool,
    pub order_index: i32,
}

impl IndexedChild for ProductImage {
    type Id = ProductImageId;

    fn child_id(&self) -> ProductImageId {
        self.id
    }

    fn order_index(&self) -> i32 {
        self.order_index
    }
}

/// Explicit primary-image choice in a create/update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryImage {
    /// An image the product already has.
    Existing(ProductImageId),
    /// The n-th file uploaded with this request (zero-based).
    Upload(usize),
}

/// Submitted product fields.
#[derive(Debug, Clone, Default)]
pub struct ProductInput {
    pub title: String,
    pub description: String,
    pub price: Decimal,
    /// Full replacement for the description blocks.
    pub blocks: Vec<BlockInput>,
    /// Images to remove (update only).
    pub deleted_image_ids: Vec<ProductImageId>,
    pub primary: Option<PrimaryImage>,
    /// Version the editor loaded; `None` skips the check.
    pub expected_version: Option<i32>,
}

impl ProductInput {
    /// Parse a submitted product form.
    ///
    /// Fields: `title` (required), `description`, `price`, `blocks` (JSON),
    /// `deleted_ids`, `primary_image_id` or `primary_upload_index`, `version`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] for a missing title, an unparsable or
    /// negative price, or malformed ids.
    pub fn from_form(form: &FormFields, warnings: &mut Warnings) -> Result<Self, ValidationError> {
        let title = form.required("title")?;
        let price = form.decimal("price")?.unwrap_or(Decimal::ZERO);
        if price.is_sign_negative() {
            return Err(ValidationError::invalid("price", "must not be negative"));
        }

        let primary = match (
            form.int::<ProductImageId>("primary_image_id")?,
            form.int::<usize>("primary_upload_index")?,
        ) {
            (Some(_), Some(_)) => {
                return Err(ValidationError::invalid(
                    "primary_image_id",
                    "choose either an existing image or an upload, not both",
                ));
            }
            (Some(id), None) => Some(PrimaryImage::Existing(id)),
            (None, Some(index)) => Some(PrimaryImage::Upload(index)),
            (None, None) => None,
        };

        Ok(Self {
            title,
            description: form.text_or_default("description"),
            price,
            blocks: non_blank_blocks(form.json_list("blocks", warnings)),
            deleted_image_ids: form.id_list("deleted_ids", warnings),
            primary,
            expected_version: form.int("version")?,
        })
    }
}

/// Listing filter, read from the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    /// Case-insensitive title substring.
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ProductFilter {
    #[must_use]
    pub fn pagination(&self) -> Pagination {
        Pagination::from_query(self.page, self.per_page)
    }

    /// `ILIKE` pattern for the search term, with wildcards escaped.
    #[must_use]
    pub fn search_pattern(&self) -> Option<String> {
        let term = self.search.as_deref()?.trim();
        if term.is_empty() {
            return None;
        }
        let escaped = term
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        Some(format!("%{escaped}%"))
    }
}

/// The image to promote when a product has images but none is primary:
/// lowest `order_index`, ties broken by id.
#[must_use]
pub fn promotion_candidate(images: &[(ProductImageId, i32)]) -> Option<ProductImageId> {
    images
        .iter()
        .min_by_key(|(id, order_index)| (*order_index, *id))
        .map(|(id, _)| *id)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn id(n: i32) -> ProductImageId {
        ProductImageId::new(n)
    }

    #[test]
    fn test_promotion_candidate_lowest_order_index() {
        // Surviving originals were compacted to 0..k-1, new uploads follow.
        assert_eq!(promotion_candidate(&[(id(8), 1), (id(5), 0), (id(9), 2)]), Some(id(5)));
    }

    #[test]
    fn test_promotion_candidate_tie_breaks_on_id() {
        assert_eq!(promotion_candidate(&[(id(8), 0), (id(3), 0)]), Some(id(3)));
    }

    #[test]
    fn test_promotion_candidate_empty() {
        assert_eq!(promotion_candidate(&[]), None);
    }

    #[test]
    fn test_from_form_minimal() {
        let form = FormFields::from_pairs([("title", "Silver ring")]);
        let mut warnings = Warnings::new();
        let input = ProductInput::from_form(&form, &mut warnings).unwrap();
        assert_eq!(input.title, "Silver ring");
        assert_eq!(input.price, Decimal::ZERO);
        assert!(input.blocks.is_empty());
        assert!(input.primary.is_none());
        assert!(input.expected_version.is_none());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_from_form_full() {
        let form = FormFields::from_pairs([
            ("title", "Silver ring"),
            ("price", "12000"),
            ("blocks", r#"[{"title":"Material","content":"925"},{"title":"","content":""}]"#),
            ("deleted_ids", "4,7"),
            ("primary_upload_index", "0"),
            ("version", "3"),
        ]);
        let mut warnings = Warnings::new();
        let input = ProductInput::from_form(&form, &mut warnings).unwrap();
        assert_eq!(input.blocks.len(), 1);
        assert_eq!(input.deleted_image_ids, vec![id(4), id(7)]);
        assert_eq!(input.primary, Some(PrimaryImage::Upload(0)));
        assert_eq!(input.expected_version, Some(3));
    }

    #[test]
    fn test_from_form_malformed_blocks_tolerated() {
        let form = FormFields::from_pairs([("title", "Ring"), ("blocks", "not json")]);
        let mut warnings = Warnings::new();
        let input = ProductInput::from_form(&form, &mut warnings).unwrap();
        assert!(input.blocks.is_empty());
        assert_eq!(warnings.as_slice().len(), 1);
    }

    #[test]
    fn test_from_form_rejects_negative_price_and_missing_title() {
        let mut warnings = Warnings::new();
        let form = FormFields::from_pairs([("title", "Ring"), ("price", "-1")]);
        assert!(ProductInput::from_form(&form, &mut warnings).is_err());

        let form = FormFields::from_pairs([("price", "10")]);
        let err = ProductInput::from_form(&form, &mut warnings).unwrap_err();
        assert_eq!(err.field(), "title");
    }

    #[test]
    fn test_from_form_rejects_two_primary_choices() {
        let form = FormFields::from_pairs([
            ("title", "Ring"),
            ("primary_image_id", "2"),
            ("primary_upload_index", "0"),
        ]);
        assert!(ProductInput::from_form(&form, &mut Warnings::new()).is_err());
    }

    #[test]
    fn test_search_pattern_escapes_wildcards() {
        let filter = ProductFilter {
            search: Some(" 50%_off ".into()),
            ..ProductFilter::default()
        };
        assert_eq!(filter.search_pattern().unwrap(), "%50\\%\\_off%");

        let blank = ProductFilter {
            search: Some("  ".into()),
            ..ProductFilter::default()
        };
        assert!(blank.search_pattern().is_none());
    }
}
