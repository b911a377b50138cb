// src/config.rs
//! Конфигурация расчёта затопления
//!
//! Все поля имеют значения по умолчанию, поэтому пустой TOML-файл описывает рабочий
//! сценарий: синтетический рельеф прибрежного района и три уровня воды.

use serde::{Deserialize, Serialize};
use std::fs;
use tracing::info;

use crate::Result;
use crate::flood::{FloodContext, ReachabilityStrategy, SeedSet};
use crate::grid::{ElevationGrid, GeographicBounds};
use crate::model::{ElevationModel, ProceduralTerrain};
use crate::polygon::OutlineMode;
use crate::tiles::{TileSet, TileSpec};

/// Источник высот
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "kind")]
pub enum SourceConfig {
    /// Процедурная модель из секции `[terrain]`
    #[default]
    Procedural,
    /// Тайлы Terrain-RGB, пересэмплированные в сетку заданного разрешения
    TerrainRgb { tiles: Vec<TileSpec> },
}

/// Основные параметры расчёта
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FloodMapParams {
    /// Географический охват (по умолчанию южный Манхэттен)
    #[serde(default = "default_bounds")]
    pub bounds: GeographicBounds,

    /// Число узлов сетки по каждой оси
    #[serde(default = "default_resolution")]
    pub resolution: usize,

    /// Уровни воды в метрах, для каждого строится отдельный результат
    #[serde(default = "default_water_levels")]
    pub water_levels: Vec<f32>,

    #[serde(default)]
    pub strategy: ReachabilityStrategy,

    #[serde(default)]
    pub outline: OutlineMode,

    /// Экспортировать изолинии уровня воды
    #[serde(default)]
    pub contours: bool,

    /// Пикселей на ячейку в PNG-превью
    #[serde(default = "default_preview_scale")]
    pub preview_scale: u32,

    #[serde(default)]
    pub source: SourceConfig,

    /// Модель рельефа. Её `open_water` задаёт затравки и для тайлового источника.
    #[serde(default)]
    pub terrain: ElevationModel,
}

impl FloodMapParams {
    /// Загружает параметры из TOML-файла
    ///
    /// ```toml
    /// resolution = 300
    /// water_levels = [0.5, 1.0, 2.0]
    /// outline = "hull"
    ///
    /// [source]
    /// kind = "TerrainRgb"
    /// tiles = [{ path = "tiles/15/9646/12319.png", z = 15, x = 9646, y = 12319 }]
    /// ```
    pub fn from_toml_file(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let params: Self = toml::from_str(&contents)?;
        params.bounds.validate()?;
        Ok(params)
    }

    /// Собирает контекст расчёта: сетку, затравки и (для синтетики) модель.
    pub fn build_context(&self) -> Result<FloodContext> {
        match &self.source {
            SourceConfig::Procedural => {
                let terrain = ProceduralTerrain::new(self.terrain.clone());
                FloodContext::from_terrain(self.bounds, self.resolution, terrain)
            }
            SourceConfig::TerrainRgb { tiles } => {
                let tiles = TileSet::load(tiles)?;
                let grid = ElevationGrid::build(self.bounds, self.resolution, &tiles)?;
                let seeds = SeedSet::from_edges(&grid, &self.terrain.open_water);
                info!(seeds = seeds.len(), "context built from Terrain-RGB tiles");
                Ok(FloodContext::new(grid, seeds))
            }
        }
    }
}

fn default_bounds() -> GeographicBounds {
    GeographicBounds {
        north: 40.76,
        south: 40.70,
        east: -73.97,
        west: -74.03,
    }
}
fn default_resolution() -> usize {
    200
}
fn default_water_levels() -> Vec<f32> {
    vec![1.0, 2.0, 3.0]
}
fn default_preview_scale() -> u32 {
    4
}

impl Default for FloodMapParams {
    fn default() -> Self {
        Self {
            bounds: default_bounds(),
            resolution: default_resolution(),
            water_levels: default_water_levels(),
            strategy: ReachabilityStrategy::Exact,
            outline: OutlineMode::Traced,
            contours: false,
            preview_scale: default_preview_scale(),
            source: SourceConfig::Procedural,
            terrain: ElevationModel::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Edge;

    #[test]
    fn test_empty_toml_uses_defaults() {
        let params: FloodMapParams = toml::from_str("").unwrap();
        assert_eq!(params, FloodMapParams::default());
    }

    #[test]
    fn test_full_toml() {
        let params: FloodMapParams = toml::from_str(
            r#"
            resolution = 50
            water_levels = [0.5]
            outline = "hull"
            contours = true

            [bounds]
            north = 1.0
            south = 0.0
            east = 1.0
            west = 0.0

            [strategy.LineSample]
            samples = 12

            [terrain]
            open_water = ["East"]

            [[terrain.features]]
            name = "Harbor Basin"
            center = [0.8, 0.5]
            peak = -6.0
            radius = 0.1
            "#,
        )
        .unwrap();

        assert_eq!(params.resolution, 50);
        assert_eq!(params.outline, OutlineMode::Hull);
        assert!(params.contours);
        assert_eq!(params.strategy, ReachabilityStrategy::LineSample { samples: 12 });
        assert_eq!(params.terrain.open_water, vec![Edge::East]);
        assert_eq!(params.terrain.features[0].name, "Harbor Basin");
        assert_eq!(params.source, SourceConfig::Procedural);
    }

    #[test]
    fn test_tile_source() {
        let params: FloodMapParams = toml::from_str(
            r#"
            [source]
            kind = "TerrainRgb"
            tiles = [{ path = "a.png", z = 3, x = 1, y = 2 }]
            "#,
        )
        .unwrap();
        let SourceConfig::TerrainRgb { tiles } = params.source else {
            panic!("expected tile source");
        };
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].z, 3);
    }

    #[test]
    fn test_procedural_context() {
        let params = FloodMapParams {
            resolution: 20,
            ..FloodMapParams::default()
        };
        let ctx = params.build_context().unwrap();
        assert_eq!(ctx.grid().rows(), 20);
        assert!(ctx.terrain().is_some());
        assert!(!ctx.seeds().is_empty());
    }
}
