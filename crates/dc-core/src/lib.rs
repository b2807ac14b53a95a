//! # dc-core
//!
//! Core types, traits, and utilities for docclip.
//!
//! This crate provides the foundational building blocks used across the other crates:
//! - Document identifiers and attribute values
//! - Core traits (Identifiable, AttributeReader)
//! - Configuration types
//! - Logging setup

pub mod config;
pub mod error;
pub mod logging;
pub mod traits;
pub mod types;

pub use error::*;
pub use traits::*;
pub use types::*;
