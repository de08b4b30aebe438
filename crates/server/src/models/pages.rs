//! Singleton content pages.
//!
//! Each page is one root row plus ordered child collections. Inputs carry the
//! full desired state of list-valued collections; file-backed collections are
//! edited by deleting ids and appending uploads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use showcase_core::{
    CarouselItemId, CertificateId, Destination, FaqItemId, PageId, PartnershipImageId,
    PaymentFormat, PaymentMethodId, RegionId, SocialLinkId, ValidationError,
};

use super::common::{BlockInput, ContentBlock, non_blank_blocks};
use crate::input::{FormFields, Warnings};

// =============================================================================
// Company
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Company {
    pub id: PageId,
    pub title: String,
    pub description: String,
    pub version: i32,
    pub blocks: Vec<ContentBlock>,
    pub certificates: Vec<Certificate>,
    pub updated_at: DateTime<Utc>,
}

/// A certificate scan backed by a file under `/uploads/certificates/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Certificate {
    pub id: CertificateId,
    pub certificate_url: String,
    pub title: String,
    pub order_index: i32,
}

#[derive(Debug, Clone, Default)]
pub struct CompanyInput {
    pub title: String,
    pub description: String,
    pub blocks: Vec<BlockInput>,
    pub deleted_certificate_ids: Vec<CertificateId>,
    /// Titles for this request's uploads, by upload position.
    pub certificate_titles: Vec<String>,
    pub expected_version: Option<i32>,
}

impl CompanyInput {
    /// # Errors
    ///
    /// Returns [`ValidationError`] if `version` is not an integer.
    pub fn from_form(form: &FormFields, warnings: &mut Warnings) -> Result<Self, ValidationError> {
        Ok(Self {
            title: form.text_or_default("title"),
            description: form.text_or_default("description"),
            blocks: non_blank_blocks(form.json_list("blocks", warnings)),
            deleted_certificate_ids: form.id_list("deleted_ids", warnings),
            certificate_titles: form.json_list("certificate_titles", warnings),
            expected_version: form.int("version")?,
        })
    }
}

// =============================================================================
// Homepage
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Homepage {
    pub id: PageId,
    pub title: String,
    pub subtitle: String,
    pub version: i32,
    pub carousel: Vec<CarouselItem>,
    pub updated_at: DateTime<Utc>,
}

/// A carousel slide backed by a file under `/uploads/homepage/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CarouselItem {
    pub id: CarouselItemId,
    pub image_url: String,
    pub caption: String,
    pub link_url: Option<String>,
    pub order_index: i32,
}

/// Caption and link for a newly uploaded slide.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SlideCaption {
    #[serde(default)]
    pub caption: String,
    pub link_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct HomepageInput {
    pub title: String,
    pub subtitle: String,
    pub deleted_carousel_ids: Vec<CarouselItemId>,
    /// Captions for this request's uploads, by upload position.
    pub captions: Vec<SlideCaption>,
    pub expected_version: Option<i32>,
}

impl HomepageInput {
    /// # Errors
    ///
    /// Returns [`ValidationError`] if `version` is not an integer.
    pub fn from_form(form: &FormFields, warnings: &mut Warnings) -> Result<Self, ValidationError> {
        Ok(Self {
            title: form.text_or_default("title"),
            subtitle: form.text_or_default("subtitle"),
            deleted_carousel_ids: form.id_list("deleted_ids", warnings),
            captions: form.json_list("captions", warnings),
            expected_version: form.int("version")?,
        })
    }
}

// =============================================================================
// FAQ
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Faq {
    pub id: PageId,
    pub title: String,
    pub version: i32,
    pub items: Vec<FaqItem>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaqItem {
    pub id: FaqItemId,
    pub question: String,
    pub answer: String,
    pub order_index: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FaqItemInput {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: String,
}

#[derive(Debug, Clone, Default)]
pub struct FaqInput {
    pub title: String,
    pub items: Vec<FaqItemInput>,
    pub expected_version: Option<i32>,
}

impl FaqInput {
    /// # Errors
    ///
    /// Returns [`ValidationError`] if an item has an answer but no question,
    /// or `version` is not an integer.
    pub fn from_form(form: &FormFields, warnings: &mut Warnings) -> Result<Self, ValidationError> {
        let items: Vec<FaqItemInput> = form
            .json_list::<FaqItemInput>("items", warnings)
            .into_iter()
            .filter(|i| !(i.question.trim().is_empty() && i.answer.trim().is_empty()))
            .collect();
        if let Some(index) = items.iter().position(|i| i.question.trim().is_empty()) {
            return Err(ValidationError::invalid(
                "items",
                format!("item {index} has no question"),
            ));
        }

        Ok(Self {
            title: form.text_or_default("title"),
            items,
            expected_version: form.int("version")?,
        })
    }
}

// =============================================================================
// Partnership
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Partnership {
    pub id: PageId,
    pub title: String,
    pub description: String,
    pub version: i32,
    pub blocks: Vec<ContentBlock>,
    pub images: Vec<PartnershipImage>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartnershipImage {
    pub id: PartnershipImageId,
    pub image_url: String,
    pub order_index: i32,
}

#[derive(Debug, Clone, Default)]
pub struct PartnershipInput {
    pub title: String,
    pub description: String,
    pub blocks: Vec<BlockInput>,
    pub deleted_image_ids: Vec<PartnershipImageId>,
    pub expected_version: Option<i32>,
}

impl PartnershipInput {
    /// # Errors
    ///
    /// Returns [`ValidationError`] if `version` is not an integer.
    pub fn from_form(form: &FormFields, warnings: &mut Warnings) -> Result<Self, ValidationError> {
        Ok(Self {
            title: form.text_or_default("title"),
            description: form.text_or_default("description"),
            blocks: non_blank_blocks(form.json_list("blocks", warnings)),
            deleted_image_ids: form.id_list("deleted_ids", warnings),
            expected_version: form.int("version")?,
        })
    }
}

// =============================================================================
// Payment
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Payment {
    pub id: PageId,
    pub title: String,
    pub description: String,
    pub version: i32,
    pub methods: Vec<PaymentMethod>,
    pub descriptions: Vec<ContentBlock>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentMethod {
    pub id: PaymentMethodId,
    pub name: String,
    /// `None` when the stored document could not be decoded.
    pub format: Option<PaymentFormat>,
    pub order_index: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PaymentMethodInput {
    pub name: String,
    pub format: PaymentFormat,
}

#[derive(Debug, Clone, Default)]
pub struct PaymentInput {
    pub title: String,
    pub description: String,
    pub methods: Vec<PaymentMethodInput>,
    pub descriptions: Vec<BlockInput>,
    pub expected_version: Option<i32>,
}

impl PaymentInput {
    /// # Errors
    ///
    /// Returns [`ValidationError`] if a method has a blank name or an invalid
    /// format, or `version` is not an integer.
    pub fn from_form(form: &FormFields, warnings: &mut Warnings) -> Result<Self, ValidationError> {
        let methods: Vec<PaymentMethodInput> = form.json_list("methods", warnings);
        for (index, method) in methods.iter().enumerate() {
            if method.name.trim().is_empty() {
                return Err(ValidationError::invalid(
                    "methods",
                    format!("method {index} has a blank name"),
                ));
            }
            method.format.validate("methods")?;
        }

        Ok(Self {
            title: form.text_or_default("title"),
            description: form.text_or_default("description"),
            methods,
            descriptions: non_blank_blocks(form.json_list("descriptions", warnings)),
            expected_version: form.int("version")?,
        })
    }
}

// =============================================================================
// Delivery
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Delivery {
    pub id: PageId,
    pub title: String,
    pub description: String,
    pub version: i32,
    pub regions: Vec<DeliveryRegion>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryRegion {
    pub id: RegionId,
    pub name: String,
    /// Empty when the stored document could not be decoded.
    pub destinations: Vec<Destination>,
    pub order_index: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegionInput {
    pub name: String,
    #[serde(default)]
    pub destinations: Vec<Destination>,
}

#[derive(Debug, Clone, Default)]
pub struct DeliveryInput {
    pub title: String,
    pub description: String,
    pub regions: Vec<RegionInput>,
    pub expected_version: Option<i32>,
}

impl DeliveryInput {
    /// # Errors
    ///
    /// Returns [`ValidationError`] if a region has a blank name or an invalid
    /// destination, or `version` is not an integer.
    pub fn from_form(form: &FormFields, warnings: &mut Warnings) -> Result<Self, ValidationError> {
        let regions: Vec<RegionInput> = form.json_list("regions", warnings);
        for (index, region) in regions.iter().enumerate() {
            if region.name.trim().is_empty() {
                return Err(ValidationError::invalid(
                    "regions",
                    format!("region {index} has a blank name"),
                ));
            }
            Destination::validate_all("regions", &region.destinations)?;
        }

        Ok(Self {
            title: form.text_or_default("title"),
            description: form.text_or_default("description"),
            regions,
            expected_version: form.int("version")?,
        })
    }
}

// =============================================================================
// Contacts
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Contacts {
    pub id: PageId,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub working_hours: String,
    pub map_url: Option<String>,
    pub version: i32,
    pub social_links: Vec<SocialLink>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SocialLink {
    pub id: SocialLinkId,
    pub network: String,
    pub url: String,
    pub order_index: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SocialLinkInput {
    pub network: String,
    pub url: String,
}

#[derive(Debug, Clone, Default)]
pub struct ContactsInput {
    pub phone: String,
    pub email: String,
    pub address: String,
    pub working_hours: String,
    pub map_url: Option<String>,
    pub social_links: Vec<SocialLinkInput>,
    pub expected_version: Option<i32>,
}

impl ContactsInput {
    /// # Errors
    ///
    /// Returns [`ValidationError`] if a social link has a blank network or
    /// URL, or `version` is not an integer.
    pub fn from_form(form: &FormFields, warnings: &mut Warnings) -> Result<Self, ValidationError> {
        let social_links: Vec<SocialLinkInput> = form.json_list("social_links", warnings);
        if let Some(index) = social_links
            .iter()
            .position(|l| l.network.trim().is_empty() || l.url.trim().is_empty())
        {
            return Err(ValidationError::invalid(
                "social_links",
                format!("link {index} needs both a network and a URL"),
            ));
        }

        Ok(Self {
            phone: form.text_or_default("phone"),
            email: form.text_or_default("email"),
            address: form.text_or_default("address"),
            working_hours: form.text_or_default("working_hours"),
            map_url: form.text("map_url").map(ToString::to_string),
            social_links,
            expected_version: form.int("version")?,
        })
    }
}
