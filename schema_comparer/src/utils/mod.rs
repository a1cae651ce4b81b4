//! Utilities for the schema comparer
//!
//! This module provides utility functions used across the library.

pub mod logging;
pub mod naming;

// Re-export key utility functions
pub use naming::{parameter_name, quote_identifier, quote_list, quote_literal};
