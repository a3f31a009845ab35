//! Utility functions for number formatting.

pub mod format;

pub use format::{format_man, format_people, format_year};
