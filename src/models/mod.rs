//! Data models for RESAS entities.
//!
//! - `Region`: a prefecture code and name
//! - `Category`: the four population composition breakdowns
//! - `SeriesPoint`, `CachedSeries`: fetched per-year population figures
//! - `CompositionResult`: the wire shape of the composition endpoint

pub mod population;
pub mod region;

pub use population::{Category, CachedSeries, CompositionResult, SeriesPoint};
pub use region::{find_region, Region};
