//! Infrastructure layer for cross-cutting concerns.
//!
//! Provides:
//! - Configuration file handling and settings resolution
//! - Error handling and result types

pub mod config;
pub mod error;
