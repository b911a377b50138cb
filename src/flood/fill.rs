use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use super::{Cell, FloodedCellSet, SeedSet};
use crate::grid::ElevationGrid;

const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (0, -1), (-1, 0)];

/// Как часто BFS проверяет флаг отмены (в обработанных ячейках).
const CANCEL_CHECK_INTERVAL: usize = 4096;

/// Точный расчёт затопления поиском в ширину от затравок.
///
/// Ячейка-кандидат: есть данные и высота строго ниже `water_level`. В результат попадают
/// только кандидаты, достижимые от затравки-кандидата через кандидатов по 4-соседству.
/// Результат не зависит от порядка обхода и монотонно растёт с уровнем воды.
#[must_use]
pub fn compute_flooded(grid: &ElevationGrid, water_level: f32, seeds: &SeedSet) -> FloodedCellSet {
    match flood_from_seeds(grid, water_level, seeds, None) {
        Some(flooded) => flooded,
        None => unreachable!("flood fill without a cancel flag always completes"),
    }
}

/// То же, что [`compute_flooded`], но прерывается, как только поднят `cancel`.
///
/// Возвращает `None`, если расчёт был отменён.
#[must_use]
pub fn compute_flooded_cancellable(
    grid: &ElevationGrid,
    water_level: f32,
    seeds: &SeedSet,
    cancel: &AtomicBool,
) -> Option<FloodedCellSet> {
    flood_from_seeds(grid, water_level, seeds, Some(cancel))
}

fn flood_from_seeds(
    grid: &ElevationGrid,
    water_level: f32,
    seeds: &SeedSet,
    cancel: Option<&AtomicBool>,
) -> Option<FloodedCellSet> {
    let rows = grid.rows();
    let cols = grid.cols();
    let data = grid.data();
    let is_candidate = |idx: usize| {
        let v = data[idx];
        !grid.is_no_data(v) && v < water_level
    };

    let mut flooded = vec![false; rows * cols];
    let mut queue = VecDeque::new();

    for seed in seeds.iter() {
        // набор затравок не привязан к форме сетки
        if seed.row >= rows || seed.col >= cols {
            warn!(row = seed.row, col = seed.col, rows, cols, "seed outside grid ignored");
            continue;
        }
        let idx = grid.index(seed.row, seed.col);
        if !flooded[idx] && is_candidate(idx) {
            flooded[idx] = true;
            queue.push_back(seed);
        }
    }

    let mut processed = 0usize;
    while let Some(cell) = queue.pop_front() {
        processed += 1;
        if let Some(flag) = cancel
            && processed % CANCEL_CHECK_INTERVAL == 0
            && flag.load(Ordering::Relaxed)
        {
            debug!(water_level, processed, "flood fill cancelled");
            return None;
        }

        for &(dr, dc) in &DIRECTIONS {
            let (Some(nr), Some(nc)) = (
                cell.row.checked_add_signed(dr),
                cell.col.checked_add_signed(dc),
            ) else {
                continue;
            };
            if nr >= rows || nc >= cols {
                continue;
            }

            let nidx = nr * cols + nc;
            if !flooded[nidx] && is_candidate(nidx) {
                flooded[nidx] = true;
                queue.push_back(Cell::new(nr, nc));
            }
        }
    }

    if cancel.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
        return None;
    }

    let result = FloodedCellSet::from_mask(rows, cols, water_level, flooded);
    debug!(
        water_level,
        seeds = seeds.len(),
        flooded = result.len(),
        "flood fill finished"
    );
    Some(result)
}
