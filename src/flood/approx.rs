//! Быстрая попиксельная аппроксимация достижимости (аналог шейдера).
//!
//! Высота считается процедурно, без сетки. Точка считается затопленной, если она ниже
//! уровня воды и ни одна из `samples` точек на прямой до ближайшей стороны с открытой
//! водой не поднимается выше уровня. Это проверка прямой видимости, а не поиск пути:
//! - котловина за холмом, до которой вода доходит в обход, останется сухой;
//! - узкий гребень между точками выборки будет пропущен, и отрезанная низина «затопится».
//!
//! Источник истины: [`compute_flooded`](super::compute_flooded).

use super::FloodedCellSet;
use crate::model::ProceduralTerrain;
#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Число точек выборки на луче по умолчанию.
pub const DEFAULT_SAMPLES: usize = 20;

/// Результат для одного пикселя.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelFlood {
    pub flooded: bool,
    /// `water_level - elevation` для затопленных точек, иначе 0. Только для окраски.
    pub depth: f32,
}

impl PixelFlood {
    const DRY: Self = Self {
        flooded: false,
        depth: 0.0,
    };
}

pub struct LineSampleApproximation<'a> {
    terrain: &'a ProceduralTerrain,
    samples: usize,
}

impl<'a> LineSampleApproximation<'a> {
    #[must_use]
    pub fn new(terrain: &'a ProceduralTerrain, samples: usize) -> Self {
        Self {
            terrain,
            samples: samples.max(2),
        }
    }

    /// Проверка одной нормализованной точки.
    #[must_use]
    pub fn evaluate(&self, u: f64, v: f64, water_level: f32) -> PixelFlood {
        let elevation = self.terrain.elevation_at(u, v);
        if !(elevation < water_level) {
            return PixelFlood::DRY;
        }

        let Some((edge, _)) = self.terrain.model().nearest_open_water(u, v) else {
            return PixelFlood::DRY;
        };
        let (tu, tv) = edge.project(u, v);

        let last = (self.samples - 1) as f64;
        for k in 1..self.samples {
            let t = k as f64 / last;
            let su = u + (tu - u) * t;
            let sv = v + (tv - v) * t;
            if self.terrain.elevation_at(su, sv) > water_level {
                return PixelFlood::DRY;
            }
        }

        PixelFlood {
            flooded: true,
            depth: water_level - elevation,
        }
    }

    /// Вычисляет маску в узлах сетки `rows × cols` (те же позиции, что и при построении
    /// сетки из модели), чтобы результат можно было сравнить с точным расчётом.
    #[must_use]
    pub fn rasterize(&self, rows: usize, cols: usize, water_level: f32) -> FloodedCellSet {
        let pixel = |idx: usize| {
            let u = (idx % cols) as f64 / cols as f64;
            let v = (idx / cols) as f64 / rows as f64;
            self.evaluate(u, v, water_level).flooded
        };

        #[cfg(feature = "parallel")]
        let mask: Vec<bool> = (0..rows * cols).into_par_iter().map(pixel).collect();
        #[cfg(not(feature = "parallel"))]
        let mask: Vec<bool> = (0..rows * cols).map(pixel).collect();

        FloodedCellSet::from_mask(rows, cols, water_level, mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ElevationModel, TerrainFeature};

    fn ridge_terrain() -> ProceduralTerrain {
        ProceduralTerrain::new(ElevationModel {
            features: vec![TerrainFeature {
                name: "Ridge".into(),
                center: [0.15, 0.5],
                peak: 100.0,
                radius: 0.1,
            }],
            ..ElevationModel::default()
        })
    }

    #[test]
    fn test_shore_is_flooded_with_depth() {
        let terrain = ProceduralTerrain::new(ElevationModel::default());
        let approx = LineSampleApproximation::new(&terrain, DEFAULT_SAMPLES);
        let pixel = approx.evaluate(0.0, 0.6, 1.0);
        assert!(pixel.flooded);
        // у кромки высота −1 м
        assert!((pixel.depth - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_high_ground_is_dry() {
        let terrain = ProceduralTerrain::new(ElevationModel::default());
        let approx = LineSampleApproximation::new(&terrain, DEFAULT_SAMPLES);
        assert_eq!(approx.evaluate(0.7, 0.7, 5.0), PixelFlood::DRY);
    }

    #[test]
    fn test_ridge_blocks_straight_line() {
        let terrain = ridge_terrain();
        let approx = LineSampleApproximation::new(&terrain, DEFAULT_SAMPLES);
        // за хребтом: прямая на запад пересекает вершину
        assert!(!approx.evaluate(0.3, 0.5, 30.0).flooded);
        // севернее хребта прямая свободна
        assert!(approx.evaluate(0.3, 0.75, 30.0).flooded);
    }

    #[test]
    fn test_no_open_water_means_dry() {
        let terrain = ProceduralTerrain::new(ElevationModel {
            open_water: Vec::new(),
            shore_elevation: -5.0,
            interior_elevation: -5.0,
            ..ElevationModel::default()
        });
        let approx = LineSampleApproximation::new(&terrain, DEFAULT_SAMPLES);
        assert!(!approx.evaluate(0.5, 0.5, 0.0).flooded);
    }
}
