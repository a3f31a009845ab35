use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::models::{CachedSeries, Category};

#[derive(Debug, Clone)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    pub fn age_minutes(&self) -> i64 {
        let now = Utc::now();
        (now - self.cached_at).num_minutes()
    }

    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            format!("{}h ago", (minutes + 30) / 60)
        } else {
            format!("{}d ago", (minutes + 720) / 1440)
        }
    }
}

/// Fetched series keyed by prefecture code.
///
/// An entry only counts for the active category when its tag matches;
/// callers clear the whole cache when the category changes.
#[derive(Debug, Clone, Default)]
pub struct PopulationCache {
    entries: HashMap<u32, CachedData<CachedSeries>>,
}

impl PopulationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, code: u32, series: CachedSeries) {
        self.entries.insert(code, CachedData::new(series));
    }

    pub fn get(&self, code: u32) -> Option<&CachedSeries> {
        self.entries.get(&code).map(|c| &c.data)
    }

    /// The entry for `code`, if it was fetched under `category`.
    pub fn get_valid(&self, code: u32, category: Category) -> Option<&CachedSeries> {
        self.get(code).filter(|s| s.is_valid_for(category))
    }

    pub fn is_valid(&self, code: u32, category: Category) -> bool {
        self.get_valid(code, category).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of `codes` with a valid entry for `category`.
    pub fn valid_count<'a>(&self, codes: impl IntoIterator<Item = &'a u32>, category: Category) -> usize {
        codes
            .into_iter()
            .filter(|code| self.is_valid(**code, category))
            .count()
    }

    /// Fraction of `codes` already cached for `category`, in [0, 1].
    pub fn progress(&self, codes: &[u32], category: Category) -> f64 {
        if codes.is_empty() {
            return 0.0;
        }
        let ratio = self.valid_count(codes, category) as f64 / codes.len() as f64;
        ratio.clamp(0.0, 1.0)
    }

    /// Age of the most recently cached entry
    pub fn last_updated(&self) -> String {
        self.entries
            .values()
            .max_by_key(|c| c.cached_at)
            .map(|c| c.age_display())
            .unwrap_or_else(|| "never".to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================
