//! Изолинии высоты методом marching squares.
//!
//! Каждая ячейка из четырёх соседних узлов получает 4-битный код (tl = 8, tr = 4,
//! br = 2, bl = 1; бит выставлен, если угол ниже порога). Пересечения на рёбрах
//! интерполируются линейно. Отрезки внутри ячейки ориентированы так, что область ниже
//! порога остаётся слева: так сцепляются соседние ячейки и так идут открытые линии.
//! Замкнутые контуры на выходе всегда против часовой стрелки (в координатах lng/lat),
//! вокруг низин и вокруг возвышенностей одинаково.
//!
//! Точки лежат на рёбрах между узлами сетки, а не между центрами ячеек, как у
//! полигонов затопления (см. [`crate::polygon`]).

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::grid::ElevationGrid;

/// Изолиния: упорядоченные точки `[lng, lat]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub level: f32,
    pub points: Vec<[f64; 2]>,
    /// Замкнутый контур повторяет первую точку в конце.
    pub closed: bool,
}

impl Contour {
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Ориентированная площадь (формула шнурования); для открытых линий
    /// считается как будто линия замкнута.
    #[must_use]
    pub fn signed_area(&self) -> f64 {
        crate::polygon::signed_area(&self.points)
    }
}

/// Ребро сетки между двумя соседними узлами.
///
/// Горизонтальные рёбра `(i, j)–(i, j+1)` нумеруются первыми, затем вертикальные
/// `(i, j)–(i+1, j)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct EdgeId(usize);

struct Segment {
    from: EdgeId,
    to: EdgeId,
}

struct EdgeLayout {
    rows: usize,
    cols: usize,
}

impl EdgeLayout {
    fn horizontal(&self, i: usize, j: usize) -> EdgeId {
        EdgeId(i * (self.cols - 1) + j)
    }

    fn vertical(&self, i: usize, j: usize) -> EdgeId {
        EdgeId(self.rows * (self.cols - 1) + i * self.cols + j)
    }

    /// Узлы ребра `((i0, j0), (i1, j1))`.
    fn nodes(&self, edge: EdgeId) -> ((usize, usize), (usize, usize)) {
        let horizontal_count = self.rows * (self.cols - 1);
        if edge.0 < horizontal_count {
            let i = edge.0 / (self.cols - 1);
            let j = edge.0 % (self.cols - 1);
            ((i, j), (i, j + 1))
        } else {
            let k = edge.0 - horizontal_count;
            let i = k / self.cols;
            let j = k % self.cols;
            ((i, j), (i + 1, j))
        }
    }
}

/// Извлекает изолинии уровня `threshold`.
///
/// Ячейки с углом без данных пропускаются (линия в них обрывается). Контуры короче
/// трёх точек отбрасываются. Порядок контуров не гарантируется.
#[must_use]
pub fn extract_contours(grid: &ElevationGrid, threshold: f32) -> Vec<Contour> {
    let rows = grid.rows();
    let cols = grid.cols();
    if rows < 2 || cols < 2 {
        return Vec::new();
    }

    let layout = EdgeLayout { rows, cols };
    let segments = march(grid, &layout, threshold);
    if segments.is_empty() {
        return Vec::new();
    }

    let start_of: HashMap<EdgeId, usize> = segments
        .iter()
        .enumerate()
        .map(|(idx, seg)| (seg.from, idx))
        .collect();
    let has_predecessor: HashSet<EdgeId> =
        segments.iter().map(|seg| seg.to).collect();

    let point = |edge: EdgeId| crossing_point(grid, &layout, edge, threshold);
    let max_steps = rows * cols;
    let mut used = vec![false; segments.len()];
    let mut contours = Vec::new();

    // Сначала открытые линии: они начинаются на ребре, в которое ничего не входит
    // (граница сетки или ячейка без данных). Остаются замкнутые петли.
    let open_starts = (0..segments.len()).filter(|&s| !has_predecessor.contains(&segments[s].from));
    let loop_starts = 0..segments.len();

    for start in open_starts.chain(loop_starts) {
        if used[start] {
            continue;
        }

        let mut points = vec![point(segments[start].from)];
        let mut current = start;
        let mut steps = 0;
        let mut closed = false;

        loop {
            used[current] = true;
            let to = segments[current].to;
            points.push(point(to));
            steps += 1;

            match start_of.get(&to) {
                Some(&next) if next == start => {
                    closed = true;
                    break;
                }
                Some(&next) if !used[next] => {
                    if steps >= max_steps {
                        warn!(threshold, steps, "contour truncated, closing it");
                        points.push(points[0]);
                        closed = true;
                        break;
                    }
                    current = next;
                }
                _ => break,
            }
        }

        let distinct = if closed { points.len() - 1 } else { points.len() };
        if distinct >= 3 {
            if closed && crate::polygon::signed_area(&points) < 0.0 {
                points.reverse();
            }
            contours.push(Contour {
                level: threshold,
                points,
                closed,
            });
        }
    }

    debug!(threshold, segments = segments.len(), contours = contours.len(), "contours traced");
    contours
}

/// Строит ориентированные отрезки для всех ячеек с пересечением.
fn march(grid: &ElevationGrid, layout: &EdgeLayout, threshold: f32) -> Vec<Segment> {
    let mut segments = Vec::new();

    for ci in 0..grid.rows() - 1 {
        for cj in 0..grid.cols() - 1 {
            // Углы против часовой стрелки: bl, br, tr, tl
            let corners = [
                grid.elevation(ci, cj),
                grid.elevation(ci, cj + 1),
                grid.elevation(ci + 1, cj + 1),
                grid.elevation(ci + 1, cj),
            ];
            let [Some(bl), Some(br), Some(tr), Some(tl)] = corners else {
                continue;
            };

            let below = [bl < threshold, br < threshold, tr < threshold, tl < threshold];
            let case = (u8::from(below[3]) << 3)
                | (u8::from(below[2]) << 2)
                | (u8::from(below[1]) << 1)
                | u8::from(below[0]);
            if case == 0 || case == 15 {
                continue;
            }

            // Рёбра в том же обходе: нижнее (bl→br), правое (br→tr), верхнее (tr→tl), левое (tl→bl)
            let edges = [
                layout.horizontal(ci, cj),
                layout.vertical(ci, cj + 1),
                layout.horizontal(ci + 1, cj),
                layout.vertical(ci, cj),
            ];
            // Вход: угол k ниже порога, угол k+1 выше. Выход: наоборот.
            let is_entry = |k: usize| below[k] && !below[(k + 1) % 4];
            let is_exit = |k: usize| !below[k] && below[(k + 1) % 4];

            if case == 5 || case == 10 {
                let center = (bl + br + tr + tl) / 4.0;
                let step = if center < threshold { 1 } else { 3 };
                for k in (0..4).filter(|&k| is_entry(k)) {
                    segments.push(Segment {
                        from: edges[k],
                        to: edges[(k + step) % 4],
                    });
                }
            } else {
                let entry = (0..4).find(|&k| is_entry(k));
                let exit = (0..4).find(|&k| is_exit(k));
                if let (Some(a), Some(b)) = (entry, exit) {
                    segments.push(Segment {
                        from: edges[a],
                        to: edges[b],
                    });
                }
            }
        }
    }

    segments
}

/// Точка пересечения порога на ребре в координатах `[lng, lat]`.
///
/// Вычисляется по глобальному ребру, поэтому обе соседние ячейки получают одну и ту же точку.
fn crossing_point(grid: &ElevationGrid, layout: &EdgeLayout, edge: EdgeId, threshold: f32) -> [f64; 2] {
    let ((i0, j0), (i1, j1)) = layout.nodes(edge);
    let v0 = f64::from(grid.get(i0, j0));
    let v1 = f64::from(grid.get(i1, j1));
    let denom = v1 - v0;
    let t = if denom == 0.0 {
        0.5
    } else {
        ((f64::from(threshold) - v0) / denom).clamp(0.0, 1.0)
    };

    let x = j0 as f64 + (j1 - j0) as f64 * t;
    let y = i0 as f64 + (i1 - i0) as f64 * t;
    grid.to_lng_lat(x, y)
}
