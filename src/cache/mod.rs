//! In-memory caching of fetched population series.
//!
//! This module provides `PopulationCache`, keyed by prefecture code, and
//! `CachedData`, which records when a value was cached. Nothing is
//! persisted; the cache lives for one session.

pub mod manager;

pub use manager::PopulationCache;
