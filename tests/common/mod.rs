//! Common test utilities and helpers
//!
//! This module provides shared utilities for all tests including:
//! - An in-memory change feed and document store
//! - Document and config fixtures
//! - Custom assertion macros

pub mod assertions;

// Re-export commonly used utilities
pub use fixtures::*;
pub use memory_store::*;
