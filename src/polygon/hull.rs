use super::{FloodPolygon, PolygonProperties, check_shape, max_depth};
use crate::flood::FloodedCellSet;
use crate::grid::ElevationGrid;

fn cross(o: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

/// Выпуклая оболочка (monotone chain).
///
/// Возвращает замкнутое кольцо против часовой стрелки. Меньше трёх различных точек
/// или все точки на одной прямой дают пустое кольцо. Нечисловые точки игнорируются.
#[must_use]
pub fn convex_hull(points: &[[f64; 2]]) -> Vec<[f64; 2]> {
    let mut sorted: Vec<[f64; 2]> = points
        .iter()
        .copied()
        .filter(|p| p[0].is_finite() && p[1].is_finite())
        .collect();
    sorted.sort_by(|a, b| a[0].total_cmp(&b[0]).then(a[1].total_cmp(&b[1])));
    sorted.dedup();
    if sorted.len() < 3 {
        return Vec::new();
    }

    let mut lower: Vec<[f64; 2]> = Vec::with_capacity(sorted.len());
    for &p in &sorted {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<[f64; 2]> = Vec::with_capacity(sorted.len());
    for &p in sorted.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    let mut hull = lower;
    hull.extend(upper);
    if hull.len() < 3 {
        return Vec::new();
    }
    hull.push(hull[0]);
    hull
}

/// Упрощённый контур: выпуклая оболочка центров всех затопленных ячеек.
///
/// Это завышенная оценка: на вогнутом берегу сухая суша попадёт внутрь полигона.
/// Годится для грубой отрисовки, но не для экспорта.
#[must_use]
pub fn build_hull_polygon(flooded: &FloodedCellSet, grid: &ElevationGrid) -> Vec<FloodPolygon> {
    if !check_shape(flooded, grid) {
        return Vec::new();
    }

    let centers: Vec<[f64; 2]> = flooded
        .iter()
        .map(|cell| grid.to_lng_lat(cell.col as f64 + 0.5, cell.row as f64 + 0.5))
        .collect();
    let exterior = convex_hull(&centers);
    if exterior.is_empty() {
        return Vec::new();
    }

    let water_level = flooded.water_level();
    let cells = flooded.iter().map(|cell| grid.index(cell.row, cell.col));
    vec![FloodPolygon {
        exterior,
        holes: Vec::new(),
        properties: PolygonProperties {
            water_level,
            name: None,
            depth: max_depth(grid, water_level, cells),
            cells: flooded.len(),
        },
    }]
}
