//! Core types for Showcase.
//!
//! This module provides type-safe wrappers for catalog and content concepts.

pub mod id;
pub mod status;
pub mod structured;
pub mod validation;

pub use id::*;
pub use status::OrderStatus;
pub use structured::{Destination, PaymentFormat, Versioned};
pub use validation::ValidationError;
