//! Затопление с учётом связности («ванна со связностью»).
//!
//! Ячейка затоплена, только если она ниже уровня воды и соединена с открытой водой
//! цепочкой таких же ячеек по 4-соседству. Изолированные низины за дамбой или хребтом
//! остаются сухими.

pub mod approx;
pub mod fill;
pub mod levels;
pub mod worker;

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::contour::{Contour, extract_contours};
use crate::grid::{Edge, ElevationGrid, GeographicBounds};
use crate::model::ProceduralTerrain;
use crate::polygon::{FloodPolygon, OutlineMode, build_hull_polygon, build_polygons};
use crate::{FloodError, Result};

pub use approx::{DEFAULT_SAMPLES, LineSampleApproximation, PixelFlood};
pub use fill::{compute_flooded, compute_flooded_cancellable};

/// Координаты ячейки сетки.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    #[must_use]
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }
}

/// Ячейки открытой воды, от которых распространяется затопление.
///
/// Строится один раз для сетки и дальше только читается.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSet {
    cells: BTreeSet<Cell>,
}

impl SeedSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Все ячейки на указанных сторонах сетки.
    #[must_use]
    pub fn from_edges(grid: &ElevationGrid, edges: &[Edge]) -> Self {
        let cells = edges
            .iter()
            .flat_map(|edge| edge.cells(grid.rows(), grid.cols()))
            .map(|(row, col)| Cell::new(row, col))
            .collect();
        Self { cells }
    }

    /// Произвольный набор ячеек; ячейки вне сетки отбрасываются.
    pub fn from_cells<I>(grid: &ElevationGrid, cells: I) -> Self
    where
        I: IntoIterator<Item = Cell>,
    {
        let mut seeds = Self::new();
        for cell in cells {
            if cell.row < grid.rows() && cell.col < grid.cols() {
                seeds.cells.insert(cell);
            } else {
                warn!(row = cell.row, col = cell.col, "seed outside grid ignored");
            }
        }
        seeds
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Cell> + '_ {
        self.cells.iter().copied()
    }
}

/// Результат расчёта затопления для конкретной тройки (сетка, уровень, затравки).
///
/// При смене уровня набор пересчитывается заново, а не изменяется.
#[derive(Debug, Clone, PartialEq)]
pub struct FloodedCellSet {
    rows: usize,
    cols: usize,
    water_level: f32,
    mask: Vec<bool>,
    count: usize,
}

impl FloodedCellSet {
    pub(crate) fn from_mask(rows: usize, cols: usize, water_level: f32, mask: Vec<bool>) -> Self {
        let count = mask.iter().filter(|&&f| f).count();
        Self {
            rows,
            cols,
            water_level,
            mask,
            count,
        }
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub fn water_level(&self) -> f32 {
        self.water_level
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Маска затопления построчно (`row * cols + col`).
    #[must_use]
    pub fn mask(&self) -> &[bool] {
        &self.mask
    }

    #[must_use]
    pub fn contains(&self, cell: Cell) -> bool {
        cell.row < self.rows && cell.col < self.cols && self.mask[cell.row * self.cols + cell.col]
    }

    /// Затопленные ячейки в построчном порядке.
    pub fn iter(&self) -> impl Iterator<Item = Cell> + '_ {
        let cols = self.cols;
        self.mask
            .iter()
            .enumerate()
            .filter(|&(_, &f)| f)
            .map(move |(idx, _)| Cell::new(idx / cols, idx % cols))
    }

    /// Проверяет, что каждая затопленная ячейка `self` затоплена и в `other`.
    #[must_use]
    pub fn is_subset_of(&self, other: &FloodedCellSet) -> bool {
        self.rows == other.rows
            && self.cols == other.cols
            && self.mask.iter().zip(&other.mask).all(|(&a, &b)| !a || b)
    }
}

/// Стратегия проверки достижимости.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReachabilityStrategy {
    /// Точный поиск в ширину по сетке.
    #[default]
    Exact,
    /// Быстрая попиксельная проверка прямой линией до ближайшей открытой воды.
    ///
    /// Может как недо-, так и пересоединять области на невыпуклом побережье.
    LineSample {
        #[serde(default = "default_samples")]
        samples: usize,
    },
}

fn default_samples() -> usize {
    DEFAULT_SAMPLES
}

/// Неизменяемый контекст расчётов: сетка, затравки и (для синтетики) модель рельефа.
///
/// Передаётся явно во все запросы; глобального состояния нет.
pub struct FloodContext {
    grid: ElevationGrid,
    seeds: SeedSet,
    terrain: Option<ProceduralTerrain>,
}

impl FloodContext {
    #[must_use]
    pub fn new(grid: ElevationGrid, seeds: SeedSet) -> Self {
        Self {
            grid,
            seeds,
            terrain: None,
        }
    }

    /// Строит сетку по процедурной модели; затравками служат стороны с открытой водой.
    pub fn from_terrain(
        bounds: GeographicBounds,
        resolution: usize,
        terrain: ProceduralTerrain,
    ) -> Result<Self> {
        let grid = ElevationGrid::build(bounds, resolution, &terrain)?;
        let seeds = SeedSet::from_edges(&grid, &terrain.model().open_water);
        Ok(Self {
            grid,
            seeds,
            terrain: Some(terrain),
        })
    }

    #[must_use]
    pub fn grid(&self) -> &ElevationGrid {
        &self.grid
    }

    #[must_use]
    pub fn seeds(&self) -> &SeedSet {
        &self.seeds
    }

    #[must_use]
    pub fn terrain(&self) -> Option<&ProceduralTerrain> {
        self.terrain.as_ref()
    }

    /// Затопленные ячейки при заданном уровне воды.
    pub fn flood(&self, water_level: f32, strategy: ReachabilityStrategy) -> Result<FloodedCellSet> {
        match strategy {
            ReachabilityStrategy::Exact => Ok(compute_flooded(&self.grid, water_level, &self.seeds)),
            ReachabilityStrategy::LineSample { samples } => {
                let terrain = self
                    .terrain
                    .as_ref()
                    .ok_or(FloodError::ApproximationUnavailable)?;
                Ok(LineSampleApproximation::new(terrain, samples).rasterize(
                    self.grid.rows(),
                    self.grid.cols(),
                    water_level,
                ))
            }
        }
    }

    /// Полигоны затопления; при наличии модели рельефа они подписываются названиями районов.
    #[must_use]
    pub fn polygons(&self, flooded: &FloodedCellSet, mode: OutlineMode) -> Vec<FloodPolygon> {
        let mut polygons = match mode {
            OutlineMode::Traced => build_polygons(flooded, &self.grid),
            OutlineMode::Hull => build_hull_polygon(flooded, &self.grid),
        };
        if let Some(terrain) = &self.terrain {
            terrain.name_polygons(&mut polygons, &self.grid.bounds());
        }
        polygons
    }

    /// Изолинии высоты, равной уровню воды.
    #[must_use]
    pub fn contours(&self, water_level: f32) -> Vec<Contour> {
        extract_contours(&self.grid, water_level)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ElevationModel;

    fn bounds() -> GeographicBounds {
        GeographicBounds::new(1.0, 0.0, 1.0, 0.0).unwrap()
    }

    #[test]
    fn test_seeds_from_edges_deduplicate_corners() {
        let grid = ElevationGrid::from_samples(bounds(), 3, 4, vec![0.0; 12]).unwrap();
        let seeds = SeedSet::from_edges(&grid, &[Edge::West, Edge::South]);
        // 3 ячейки западного края + 4 южного − общий угол
        assert_eq!(seeds.len(), 6);
        assert!(seeds.iter().any(|c| c == Cell::new(0, 0)));
        assert!(seeds.iter().any(|c| c == Cell::new(2, 0)));
        assert!(seeds.iter().any(|c| c == Cell::new(0, 3)));
    }

    #[test]
    fn test_seeds_outside_grid_are_dropped() {
        let grid = ElevationGrid::from_samples(bounds(), 2, 2, vec![0.0; 4]).unwrap();
        let seeds = SeedSet::from_cells(&grid, [Cell::new(0, 0), Cell::new(5, 1)]);
        assert_eq!(seeds.len(), 1);
    }

    #[test]
    fn test_line_sample_requires_model() {
        let grid = ElevationGrid::from_samples(bounds(), 2, 2, vec![0.0; 4]).unwrap();
        let seeds = SeedSet::from_edges(&grid, &[Edge::West]);
        let ctx = FloodContext::new(grid, seeds);
        assert!(matches!(
            ctx.flood(1.0, ReachabilityStrategy::LineSample { samples: 20 }),
            Err(FloodError::ApproximationUnavailable)
        ));
        assert_eq!(ctx.flood(1.0, ReachabilityStrategy::Exact).unwrap().len(), 4);
    }

    #[test]
    fn test_context_from_terrain_uses_open_water_edges() {
        let terrain = ProceduralTerrain::new(ElevationModel::default());
        let ctx = FloodContext::from_terrain(bounds(), 16, terrain).unwrap();
        assert_eq!(ctx.seeds().len(), 31);
        let flooded = ctx.flood(2.0, ReachabilityStrategy::Exact).unwrap();
        assert!(flooded.contains(Cell::new(5, 0)));
        assert!(!flooded.contains(Cell::new(12, 12)));
    }
}
