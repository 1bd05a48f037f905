//! Features and the feature collection assembled from a decoder.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::geometry::Geometry;

/// Attribute values keyed by field name, in attribute-table field order.
pub type Properties = Map<String, Value>;

/// One geometry (or none, for null shape records) with its attribute row.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename = "Feature")]
pub struct Feature {
    pub geometry: Option<Geometry>,
    pub properties: Properties,
}

/// Ordered features, serialising as a GeoJSON `FeatureCollection`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// Drain a feature sequence in order, stopping at the first error.
    ///
    /// No partial collection is returned on failure.
    pub fn assemble<I>(features: I) -> Result<Self>
    where
        I: IntoIterator<Item = Result<Feature>>,
    {
        features.into_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<T: IntoIterator<Item = Feature>>(iter: T) -> Self {
        Self {
            features: iter.into_iter().collect(),
        }
    }
}
