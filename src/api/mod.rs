//! REST API client module for the RESAS open-data service.
//!
//! This module provides the `ApiClient` for fetching the prefecture list
//! and population composition data. Requests authenticate with the
//! `X-API-KEY` header.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
