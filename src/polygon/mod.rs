//! Векторные полигоны затопления.
//!
//! Основной путь: точная трассировка границы каждой 4-связной компоненты затопленных
//! ячеек ([`build_polygons`]). Упрощённый путь: один выпуклый контур по центрам всех
//! затопленных ячеек ([`build_hull_polygon`]).
//!
//! Ячейка `(row, col)` занимает квадрат от узла `(col, row)` до `(col + 1, row + 1)`
//! в индексных координатах, а её центр `(col + 0.5, row + 0.5)` служит точкой для
//! выпуклой оболочки. Внешние кольца идут против часовой стрелки, дыры по часовой,
//! все кольца замкнуты (первая точка повторяется в конце).
//!
//! Изолинии ([`crate::contour`]) строятся по самим узлам: высота ячейки `(row, col)`
//! стоит в узле `(col, row)`, то есть в юго-западном углу её квадрата. Поэтому контур
//! того же уровня смещён относительно полигона на полшага сетки к юго-западу.

mod components;
pub mod hull;
pub mod trace;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::flood::FloodedCellSet;
use crate::grid::ElevationGrid;

pub use hull::{build_hull_polygon, convex_hull};
pub use trace::build_polygons;

/// Способ построения контура затопления.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlineMode {
    /// Точная граница с дырами.
    #[default]
    Traced,
    /// Выпуклая оболочка. Завышает площадь: сухая суша в вогнутостях берега окажется
    /// внутри полигона.
    Hull,
}

/// Метаданные полигона.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolygonProperties {
    pub water_level: f32,
    /// Название района
    pub name: Option<String>,
    /// Максимальная глубина воды в метрах
    pub depth: Option<f32>,
    /// Число затопленных ячеек
    pub cells: usize,
}

/// Затопленная область: внешнее кольцо и дыры в координатах `[lng, lat]`.
#[derive(Debug, Clone, PartialEq)]
pub struct FloodPolygon {
    pub exterior: Vec<[f64; 2]>,
    pub holes: Vec<Vec<[f64; 2]>>,
    pub properties: PolygonProperties,
}

impl FloodPolygon {
    /// Точка внутри внешнего кольца и вне всех дыр.
    #[must_use]
    pub fn contains(&self, point: [f64; 2]) -> bool {
        ring_contains(&self.exterior, point) && !self.holes.iter().any(|hole| ring_contains(hole, point))
    }

    /// Площадь без дыр (в квадратных градусах).
    #[must_use]
    pub fn area(&self) -> f64 {
        let holes: f64 = self.holes.iter().map(|hole| signed_area(hole).abs()).sum();
        signed_area(&self.exterior).abs() - holes
    }
}

/// Ориентированная площадь кольца; положительна для обхода против часовой стрелки.
#[must_use]
pub fn signed_area(ring: &[[f64; 2]]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for k in 0..ring.len() {
        let [x0, y0] = ring[k];
        let [x1, y1] = ring[(k + 1) % ring.len()];
        sum += x0 * y1 - x1 * y0;
    }
    sum / 2.0
}

/// Чётно-нечётная проверка лучом.
fn ring_contains(ring: &[[f64; 2]], point: [f64; 2]) -> bool {
    let [px, py] = point;
    let mut inside = false;
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let [xi, yi] = ring[i];
        let [xj, yj] = ring[j];
        if (yi > py) != (yj > py) && px < (xj - xi) * (py - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Максимальная глубина по набору ячеек.
fn max_depth<I>(grid: &ElevationGrid, water_level: f32, cells: I) -> Option<f32>
where
    I: IntoIterator<Item = usize>,
{
    cells
        .into_iter()
        .filter_map(|idx| grid.elevation(idx / grid.cols(), idx % grid.cols()))
        .map(|elevation| water_level - elevation)
        .reduce(f32::max)
}

fn check_shape(flooded: &FloodedCellSet, grid: &ElevationGrid) -> bool {
    if flooded.rows() == grid.rows() && flooded.cols() == grid.cols() {
        true
    } else {
        warn!(
            flooded_rows = flooded.rows(),
            flooded_cols = flooded.cols(),
            grid_rows = grid.rows(),
            grid_cols = grid.cols(),
            "flooded set does not match grid shape"
        );
        false
    }
}
