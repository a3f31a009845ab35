//! Population composition models.
//!
//! The RESAS `/population/composition/perYear` endpoint returns four series
//! per prefecture, one per [`Category`], in a fixed order. A fetched series
//! is kept as a [`CachedSeries`] tagged with the category it belongs to.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Population composition breakdown. The discriminant is the index of the
/// series in the API response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Category {
    #[default]
    Total = 0,
    Youth = 1,
    WorkingAge = 2,
    Elderly = 3,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Total,
        Category::Youth,
        Category::WorkingAge,
        Category::Elderly,
    ];

    /// Index of this category's series in the composition response.
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Label as used by RESAS.
    pub fn label(&self) -> &'static str {
        match self {
            Category::Total => "総人口",
            Category::Youth => "年少人口",
            Category::WorkingAge => "生産年齢人口",
            Category::Elderly => "老年人口",
        }
    }

    /// Get the next category (wrapping around)
    pub fn next(&self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    /// Get the previous category (wrapping around)
    pub fn prev(&self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One year of a population series. Fields such as `rate` are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub year: i32,
    pub value: i64,
}

/// A fetched series for one prefecture under one category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSeries {
    pub region_name: String,
    pub points: Vec<SeriesPoint>,
    pub category: Category,
    /// Last year with actual figures; later points are projections.
    pub boundary_year: Option<i32>,
}

impl CachedSeries {
    /// Tag compared against the active category's index.
    pub fn category_tag(&self) -> usize {
        self.category.index()
    }

    pub fn is_valid_for(&self, category: Category) -> bool {
        self.category_tag() == category.index()
    }

    /// The point to quote as "current": the boundary year if present,
    /// otherwise the last point.
    pub fn headline_point(&self) -> Option<SeriesPoint> {
        self.boundary_year
            .and_then(|year| self.points.iter().find(|p| p.year == year).copied())
            .or_else(|| self.points.last().copied())
    }

    pub fn max_value(&self) -> Option<i64> {
        self.points.iter().map(|p| p.value).max()
    }
}

// ===== Wire types =====

/// `result` of the perYear composition endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CompositionResult {
    #[serde(rename = "boundaryYear", default)]
    pub boundary_year: Option<i32>,
    #[serde(default)]
    pub data: Vec<CompositionSeries>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompositionSeries {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub data: Vec<SeriesPoint>,
}

impl CompositionResult {
    pub fn series(&self, category: Category) -> Option<&CompositionSeries> {
        self.data.get(category.index())
    }
}
