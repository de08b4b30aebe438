//! Showcase server library.
//!
//! Transactional repositories for the catalog and content pages, the upload
//! file store they keep in step with, and the axum adapter in front of them.
//! Exposed as a library so integration tests can drive the repositories
//! directly.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod files;
pub mod input;
pub mod models;
pub mod projection;
pub mod routes;
pub mod state;
