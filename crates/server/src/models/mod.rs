//! Domain models: aggregates as read back from the database, and the inputs
//! that create or replace them.

pub mod common;
pub mod order;
pub mod pages;
pub mod product;
pub mod review;

pub use common::{BlockInput, ContentBlock, Page, Pagination, Saved};
pub use order::{NewOrder, NewOrderItem, Order, OrderFilter, OrderItem, StatusUpdate};
pub use pages::{
    CarouselItem, Certificate, Company, CompanyInput, Contacts, ContactsInput, Delivery,
    DeliveryInput, DeliveryRegion, Faq, FaqInput, FaqItem, FaqItemInput, Homepage, HomepageInput,
    Partnership, PartnershipImage, PartnershipInput, Payment, PaymentInput, PaymentMethod,
    PaymentMethodInput, RegionInput, SlideCaption, SocialLink, SocialLinkInput,
};
pub use product::{PrimaryImage, Product, ProductFilter, ProductImage, ProductInput};
pub use review::{Review, ReviewInput};
