use serde::{Deserialize, Serialize};

/// A prefecture as listed by the RESAS `/prefectures` endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    #[serde(rename = "prefCode")]
    pub code: u32,
    #[serde(rename = "prefName")]
    pub name: String,
}

impl Region {
    #[cfg(test)]
    pub fn new(code: u32, name: impl Into<String>) -> Self {
        Self {
            code,
            name: name.into(),
        }
    }
}

/// Find a region by code in a directory listing.
pub fn find_region(regions: &[Region], code: u32) -> Option<&Region> {
    regions.iter().find(|r| r.code == code)
}
