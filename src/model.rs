// src/model.rs
//! Процедурная модель рельефа
//!
//! Высота вычисляется по нормализованной позиции `(u, v)` без обращения к сетке:
//! - базовый региональный градиент: низкая прибрежная полоса у сторон с открытой водой
//!   и подъём вглубь суши;
//! - именованные формы рельефа (холмы с положительной высотой, котловины с отрицательной),
//!   которые складываются с градиентом;
//! - необязательный микрорельеф на шуме `fastnoise-lite`.
//!
//! Одна и та же модель служит источником синтетической сетки и основой быстрой
//! попиксельной аппроксимации достижимости, поэтому обе ветви видят одинаковый рельеф.

use crate::grid::{Edge, ElevationSource, GeographicBounds, SamplePoint};
use crate::polygon::FloodPolygon;
use fastnoise_lite::{FastNoiseLite, FractalType, NoiseType};
use serde::{Deserialize, Serialize};

/// Доля полного подъёма, набираемая внутри прибрежной полосы.
const SHORE_SHARE: f64 = 0.2;

/// Масштаб нормализованных координат для генератора шума.
const NOISE_SCALE: f32 = 1000.0;

/// Именованная форма рельефа
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TerrainFeature {
    /// Название района (попадает в свойства полигона затопления)
    pub name: String,

    /// Центр в нормализованных координатах `[u, v]`
    pub center: [f64; 2],

    /// Высота вершины над градиентом в метрах (отрицательная у котловин)
    pub peak: f32,

    /// Радиус влияния в нормализованных единицах
    pub radius: f64,
}

impl TerrainFeature {
    /// Вклад формы в высоту точки: `peak · (1 − (r/R)²)²` внутри радиуса, иначе 0.
    #[must_use]
    pub fn contribution(&self, u: f64, v: f64) -> f64 {
        if self.radius <= 0.0 {
            return 0.0;
        }
        let du = u - self.center[0];
        let dv = v - self.center[1];
        let q = (du * du + dv * dv) / (self.radius * self.radius);
        if q >= 1.0 {
            0.0
        } else {
            f64::from(self.peak) * (1.0 - q) * (1.0 - q)
        }
    }
}

/// Настройки микрорельефа
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReliefSettings {
    #[serde(default)]
    pub seed: u64,

    /// Амплитуда в метрах
    #[serde(default = "default_relief_amplitude")]
    pub amplitude: f32,

    #[serde(default = "default_relief_frequency")]
    pub frequency: f32,
}

fn default_relief_amplitude() -> f32 {
    0.5
}
fn default_relief_frequency() -> f32 {
    0.01
}

/// Параметры процедурной модели рельефа
///
/// Загружается из секции `[terrain]` конфигурации.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ElevationModel {
    /// Стороны, выходящие к открытой воде (у них лежит низкая прибрежная полоса)
    #[serde(default = "default_open_water")]
    pub open_water: Vec<Edge>,

    /// Высота у самой кромки воды, м
    #[serde(default = "default_shore_elevation")]
    pub shore_elevation: f32,

    /// Высота в глубине суши, м
    #[serde(default = "default_interior_elevation")]
    pub interior_elevation: f32,

    /// Ширина прибрежной полосы в нормализованных единицах (0.01–0.49)
    #[serde(default = "default_coastal_band")]
    pub coastal_band: f64,

    #[serde(default)]
    pub relief: Option<ReliefSettings>,

    #[serde(default)]
    pub features: Vec<TerrainFeature>,
}

fn default_open_water() -> Vec<Edge> {
    vec![Edge::West, Edge::South]
}
fn default_shore_elevation() -> f32 {
    -1.0
}
fn default_interior_elevation() -> f32 {
    40.0
}
fn default_coastal_band() -> f64 {
    0.2
}

impl Default for ElevationModel {
    fn default() -> Self {
        Self {
            open_water: default_open_water(),
            shore_elevation: default_shore_elevation(),
            interior_elevation: default_interior_elevation(),
            coastal_band: default_coastal_band(),
            relief: None,
            features: Vec::new(),
        }
    }
}

impl ElevationModel {
    /// Расстояние до ближайшей стороны с открытой водой и сама сторона.
    #[must_use]
    pub fn nearest_open_water(&self, u: f64, v: f64) -> Option<(Edge, f64)> {
        self.open_water
            .iter()
            .map(|&edge| (edge, edge.distance(u, v)))
            .fold(None, |best, (edge, d)| match best {
                Some((_, best_d)) if best_d <= d => best,
                _ => Some((edge, d)),
            })
    }

    /// Базовый градиент без форм рельефа и шума.
    #[must_use]
    pub fn base_elevation(&self, u: f64, v: f64) -> f64 {
        let d = self
            .nearest_open_water(u, v)
            .map_or(0.5, |(_, d)| d.clamp(0.0, 0.5));
        let band = self.coastal_band.clamp(0.01, 0.49);

        let rise = if d <= band {
            SHORE_SHARE * d / band
        } else {
            SHORE_SHARE + (1.0 - SHORE_SHARE) * ((d - band) / (0.5 - band)).min(1.0)
        };

        let shore = f64::from(self.shore_elevation);
        shore + (f64::from(self.interior_elevation) - shore) * rise
    }
}

/// Готовая к вычислениям модель: параметры плюс инициализированный генератор шума.
pub struct ProceduralTerrain {
    model: ElevationModel,
    relief: Option<(FastNoiseLite, f32)>,
}

impl ProceduralTerrain {
    #[must_use]
    pub fn new(model: ElevationModel) -> Self {
        let relief = model.relief.as_ref().map(|settings| {
            let mut noise = FastNoiseLite::new();
            noise.set_seed(Some(settings.seed as i32));
            noise.set_noise_type(Some(NoiseType::OpenSimplex2));
            noise.set_fractal_type(Some(FractalType::FBm));
            noise.set_fractal_octaves(Some(3));
            noise.set_frequency(Some(settings.frequency));
            (noise, settings.amplitude)
        });
        Self { model, relief }
    }

    #[must_use]
    pub fn model(&self) -> &ElevationModel {
        &self.model
    }

    /// Высота в метрах в нормализованной точке.
    #[must_use]
    pub fn elevation_at(&self, u: f64, v: f64) -> f32 {
        let mut h = self.model.base_elevation(u, v);
        for feature in &self.model.features {
            h += feature.contribution(u, v);
        }
        if let Some((noise, amplitude)) = &self.relief {
            let n = noise.get_noise_2d(u as f32 * NOISE_SCALE, v as f32 * NOISE_SCALE);
            h += f64::from(n * amplitude);
        }
        h as f32
    }

    /// Подписывает полигоны названиями форм рельефа, чей центр оказался под водой.
    ///
    /// Полигоны без подходящей формы сохраняют исходную метку.
    pub fn name_polygons(&self, polygons: &mut [FloodPolygon], bounds: &GeographicBounds) {
        for feature in &self.model.features {
            let [u, v] = feature.center;
            let point = [
                bounds.west + u * (bounds.east - bounds.west),
                bounds.south + v * (bounds.north - bounds.south),
            ];
            if let Some(polygon) = polygons.iter_mut().find(|p| p.contains(point)) {
                polygon.properties.name = Some(feature.name.clone());
            }
        }
    }
}

impl ElevationSource for ProceduralTerrain {
    fn elevation(&self, point: SamplePoint) -> Option<f32> {
        Some(self.elevation_at(point.u, point.v))
    }
}
