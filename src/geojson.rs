// src/geojson.rs
//! Экспорт в GeoJSON (RFC 7946): единственный интерфейс, который потребляет слой отрисовки.
//!
//! Кольца записываются парами `[lng, lat]`, внешние против часовой стрелки, дыры по часовой.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::Result;
use crate::contour::Contour;
use crate::polygon::FloodPolygon;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Geometry {
    Polygon { coordinates: Vec<Vec<[f64; 2]>> },
    LineString { coordinates: Vec<[f64; 2]> },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeatureProperties {
    pub water_level: f32,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub depth: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub elevation: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub cells: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename = "Feature")]
pub struct Feature {
    pub geometry: Geometry,
    pub properties: FeatureProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    #[must_use]
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        info!(path = %path.display(), features = self.features.len(), "GeoJSON written");
        Ok(())
    }
}

impl From<&FloodPolygon> for Feature {
    fn from(polygon: &FloodPolygon) -> Self {
        let mut rings = Vec::with_capacity(1 + polygon.holes.len());
        rings.push(polygon.exterior.clone());
        rings.extend(polygon.holes.iter().cloned());
        Feature {
            geometry: Geometry::Polygon { coordinates: rings },
            properties: FeatureProperties {
                water_level: polygon.properties.water_level,
                name: polygon.properties.name.clone(),
                depth: polygon.properties.depth,
                elevation: None,
                cells: Some(polygon.properties.cells),
            },
        }
    }
}

impl From<&Contour> for Feature {
    fn from(contour: &Contour) -> Self {
        Feature {
            geometry: Geometry::LineString {
                coordinates: contour.points.clone(),
            },
            properties: FeatureProperties {
                water_level: contour.level,
                elevation: Some(contour.level),
                ..FeatureProperties::default()
            },
        }
    }
}

#[must_use]
pub fn polygons_to_features(polygons: &[FloodPolygon]) -> FeatureCollection {
    FeatureCollection::new(polygons.iter().map(Feature::from).collect())
}

#[must_use]
pub fn contours_to_features(contours: &[Contour]) -> FeatureCollection {
    FeatureCollection::new(contours.iter().map(Feature::from).collect())
}
