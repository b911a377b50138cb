//! Трассировка границ затопленных компонент.
//!
//! Каждая сторона затопленной ячейки, граничащая с сухой ячейкой или краем сетки, даёт
//! направленное ребро, ориентированное так, что вода слева. Рёбра сцепляются по вершинам
//! в кольца. В вершине, где сходятся две компоненты по диагонали, выбирается самый левый
//! поворот: так компоненты 4-связности не склеиваются.

use std::collections::HashMap;

use tracing::{debug, warn};

use super::components::{DRY, label_components};
use super::{FloodPolygon, PolygonProperties, check_shape, max_depth};
use crate::flood::FloodedCellSet;
use crate::grid::ElevationGrid;

/// Узел сетки `(x, y)` в индексных координатах.
type Vertex = (i64, i64);

struct BoundaryEdge {
    from: Vertex,
    to: Vertex,
    component: usize,
}

impl BoundaryEdge {
    fn direction(&self) -> Vertex {
        (self.to.0 - self.from.0, self.to.1 - self.from.1)
    }
}

/// Точные полигоны: по одному на каждую 4-связную компоненту, с дырами на месте
/// окружённых сухих участков.
///
/// Полигоны упорядочены по минимальному индексу ячейки компоненты. Пустой набор даёт
/// пустой список.
#[must_use]
pub fn build_polygons(flooded: &FloodedCellSet, grid: &ElevationGrid) -> Vec<FloodPolygon> {
    if flooded.is_empty() || !check_shape(flooded, grid) {
        return Vec::new();
    }

    let components = label_components(flooded);
    let edges = boundary_edges(flooded, &components.labels);

    let mut exteriors: Vec<Option<Vec<Vertex>>> = vec![None; components.count];
    let mut holes: Vec<Vec<Vec<Vertex>>> = vec![Vec::new(); components.count];
    for (ring, component) in link_rings(&edges) {
        let ring = simplify(&ring);
        match doubled_area(&ring) {
            area if area > 0 => {
                if exteriors[component].is_some() {
                    warn!(component, "second exterior ring traced, dropping it");
                } else {
                    exteriors[component] = Some(ring);
                }
            }
            area if area < 0 => holes[component].push(ring),
            _ => {}
        }
    }

    let mut cells: Vec<Vec<usize>> = vec![Vec::new(); components.count];
    for (idx, &label) in components.labels.iter().enumerate() {
        if label != DRY {
            cells[label].push(idx);
        }
    }

    let water_level = flooded.water_level();
    let to_geo = |ring: &[Vertex]| -> Vec<[f64; 2]> {
        let mut points: Vec<[f64; 2]> = ring
            .iter()
            .map(|&(x, y)| grid.to_lng_lat(x as f64, y as f64))
            .collect();
        if let Some(&first) = points.first() {
            points.push(first);
        }
        points
    };

    let polygons: Vec<FloodPolygon> = exteriors
        .into_iter()
        .zip(holes)
        .zip(cells)
        .enumerate()
        .filter_map(|(n, ((exterior, holes), cells))| {
            let exterior = exterior?;
            Some(FloodPolygon {
                exterior: to_geo(exterior.as_slice()),
                holes: holes.iter().map(|hole| to_geo(hole.as_slice())).collect(),
                properties: PolygonProperties {
                    water_level,
                    name: Some(format!("zone_{}", n + 1)),
                    depth: max_depth(grid, water_level, cells.iter().copied()),
                    cells: cells.len(),
                },
            })
        })
        .collect();

    debug!(water_level, polygons = polygons.len(), "flood outlines traced");
    polygons
}

fn boundary_edges(flooded: &FloodedCellSet, labels: &[usize]) -> Vec<BoundaryEdge> {
    let rows = flooded.rows();
    let cols = flooded.cols();
    let wet = |i: usize, j: usize| labels[i * cols + j] != DRY;
    let mut edges = Vec::new();

    for i in 0..rows {
        for j in 0..cols {
            let component = labels[i * cols + j];
            if component == DRY {
                continue;
            }
            let (x, y) = (j as i64, i as i64);
            let mut push = |from: Vertex, to: Vertex| edges.push(BoundaryEdge { from, to, component });

            if i == 0 || !wet(i - 1, j) {
                push((x, y), (x + 1, y));
            }
            if j + 1 == cols || !wet(i, j + 1) {
                push((x + 1, y), (x + 1, y + 1));
            }
            if i + 1 == rows || !wet(i + 1, j) {
                push((x + 1, y + 1), (x, y + 1));
            }
            if j == 0 || !wet(i, j - 1) {
                push((x, y + 1), (x, y));
            }
        }
    }

    edges
}

/// Приоритет поворота: налево, прямо, направо, назад.
fn turn_rank(incoming: Vertex, outgoing: Vertex) -> u8 {
    let left = (-incoming.1, incoming.0);
    if outgoing == left {
        0
    } else if outgoing == incoming {
        1
    } else if outgoing == (-left.0, -left.1) {
        2
    } else {
        3
    }
}

fn link_rings(edges: &[BoundaryEdge]) -> Vec<(Vec<Vertex>, usize)> {
    let mut outgoing: HashMap<Vertex, Vec<usize>> = HashMap::new();
    for (idx, edge) in edges.iter().enumerate() {
        outgoing.entry(edge.from).or_default().push(idx);
    }

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();

    for start in 0..edges.len() {
        if used[start] {
            continue;
        }

        let mut ring = vec![edges[start].from];
        let mut current = start;
        loop {
            used[current] = true;
            let vertex = edges[current].to;
            let incoming = edges[current].direction();
            let next = outgoing.get(&vertex).and_then(|candidates| {
                candidates
                    .iter()
                    .copied()
                    .min_by_key(|&c| turn_rank(incoming, edges[c].direction()))
            });

            match next {
                Some(next) if next == start => break,
                Some(next) if !used[next] => {
                    ring.push(vertex);
                    current = next;
                }
                _ => {
                    warn!(?vertex, "boundary ring left open");
                    break;
                }
            }
        }

        rings.push((ring, edges[start].component));
    }

    rings
}

/// Убирает вершины посреди прямых участков.
fn simplify(ring: &[Vertex]) -> Vec<Vertex> {
    let n = ring.len();
    if n < 3 {
        return ring.to_vec();
    }
    (0..n)
        .filter(|&k| {
            let (px, py) = ring[(k + n - 1) % n];
            let (cx, cy) = ring[k];
            let (nx, ny) = ring[(k + 1) % n];
            (cx - px) * (ny - cy) - (cy - py) * (nx - cx) != 0
        })
        .map(|k| ring[k])
        .collect()
}

fn doubled_area(ring: &[Vertex]) -> i64 {
    let n = ring.len();
    (0..n)
        .map(|k| {
            let (x0, y0) = ring[k];
            let (x1, y1) = ring[(k + 1) % n];
            x0 * y1 - x1 * y0
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GeographicBounds;
    use crate::polygon::signed_area;
    use approx::assert_relative_eq;

    fn setup(rows: usize, cols: usize, mask: &[u8]) -> (FloodedCellSet, ElevationGrid) {
        let bounds = GeographicBounds::new(rows as f64, 0.0, cols as f64, 0.0).unwrap();
        let grid = ElevationGrid::from_samples(bounds, rows, cols, vec![0.0; rows * cols]).unwrap();
        let mask = mask.iter().map(|&m| m == 1).collect();
        (FloodedCellSet::from_mask(rows, cols, 2.0, mask), grid)
    }

    #[test]
    fn test_empty_set_gives_no_polygons() {
        let (flooded, grid) = setup(2, 2, &[0, 0, 0, 0]);
        assert!(build_polygons(&flooded, &grid).is_empty());
    }

    #[test]
    fn test_single_cell_square() {
        let (flooded, grid) = setup(2, 2, &[0, 0, 0, 1]);
        let polygons = build_polygons(&flooded, &grid);
        assert_eq!(polygons.len(), 1);
        let polygon = &polygons[0];
        assert_eq!(polygon.exterior.len(), 5);
        assert_eq!(polygon.exterior.first(), polygon.exterior.last());
        assert_relative_eq!(signed_area(&polygon.exterior), 1.0);
        assert!(polygon.contains([1.5, 1.5]));
        assert!(!polygon.contains([0.5, 0.5]));
        assert_eq!(polygon.properties.cells, 1);
        assert_eq!(polygon.properties.depth, Some(2.0));
        assert_eq!(polygon.properties.name.as_deref(), Some("zone_1"));
    }

    #[test]
    fn test_l_shape_drops_collinear_vertices() {
        let (flooded, grid) = setup(2, 2, &[1, 1, 1, 0]);
        let polygons = build_polygons(&flooded, &grid);
        assert_eq!(polygons.len(), 1);
        // 6 углов + замыкающая точка
        assert_eq!(polygons[0].exterior.len(), 7);
        assert_relative_eq!(polygons[0].area(), 3.0);
    }

    #[test]
    fn test_enclosed_dry_cell_becomes_hole() {
        #[rustfmt::skip]
        let (flooded, grid) = setup(3, 3, &[
            1, 1, 1,
            1, 0, 1,
            1, 1, 1,
        ]);
        let polygons = build_polygons(&flooded, &grid);
        assert_eq!(polygons.len(), 1);
        let polygon = &polygons[0];
        assert_eq!(polygon.holes.len(), 1);
        assert!(signed_area(&polygon.exterior) > 0.0);
        assert!(signed_area(&polygon.holes[0]) < 0.0);
        assert_relative_eq!(polygon.area(), 8.0);
        assert!(!polygon.contains([1.5, 1.5]));
        assert!(polygon.contains([0.5, 1.5]));
    }

    #[test]
    fn test_diagonal_pinch_keeps_components_apart() {
        #[rustfmt::skip]
        let (flooded, grid) = setup(2, 2, &[
            1, 0,
            0, 1,
        ]);
        let polygons = build_polygons(&flooded, &grid);
        assert_eq!(polygons.len(), 2);
        for polygon in &polygons {
            assert_eq!(polygon.exterior.len(), 5);
            assert!(polygon.holes.is_empty());
            assert_relative_eq!(polygon.area(), 1.0);
        }
        assert!(polygons[0].contains([0.5, 0.5]));
        assert!(polygons[1].contains([1.5, 1.5]));
        assert_eq!(polygons[1].properties.name.as_deref(), Some("zone_2"));
    }
}
