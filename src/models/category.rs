//! Marketplace category.

use serde::{Deserialize, Serialize};

/// A marketplace category, created lazily the first time a lot references it.
///
/// The name is whatever the first sighting reported; later sightings never
/// rename an existing category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Upstream category id.
    pub category_id: i64,
    /// Display name captured on first sighting.
    pub name: String,
}

impl Category {
    pub fn new(category_id: i64, name: impl Into<String>) -> Self {
        Self {
            category_id,
            name: name.into(),
        }
    }
}
