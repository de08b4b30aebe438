//! Showcase Core - Shared domain types library.
//!
//! This crate provides the types shared by every Showcase component:
//! - `server` - Catalog and content backend (repositories + HTTP adapter)
//! - `cli` - Command-line tools for migrations and seeding
//!
//! # Architecture
//!
//! The core crate contains only types and validation - no I/O, no database
//! access. Database encodings are gated behind the `postgres` feature.
//!
//! # Modules
//!
//! - [`types`] - Newtype IDs, order status, and structured content records

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
