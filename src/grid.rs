use crate::terrain_rgb::{self, TerrainRgb};
use crate::{FloodError, Result};
use image::{ImageBuffer, Luma, Rgba, RgbaImage};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Значение «нет данных» по умолчанию (NaN тоже считается отсутствием данных).
pub const DEFAULT_NO_DATA: f32 = -9999.0;

/// Географический прямоугольник в десятичных градусах.
///
/// Переход через антимеридиан не поддерживается.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeographicBounds {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl GeographicBounds {
    /// Создаёт границы, проверяя `north > south` и `east > west`.
    pub fn new(north: f64, south: f64, east: f64, west: f64) -> Result<Self> {
        let bounds = Self {
            north,
            south,
            east,
            west,
        };
        bounds.validate()?;
        Ok(bounds)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.north > self.south) || !(self.east > self.west) {
            return Err(FloodError::InvalidGrid(format!(
                "bounds must satisfy north > south and east > west, got {self:?}"
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lat >= self.south && lat <= self.north && lng >= self.west && lng <= self.east
    }

    /// Нормализованная позиция `(u, v)`: `u` растёт на восток, `v` на север.
    #[must_use]
    pub fn normalize(&self, lat: f64, lng: f64) -> (f64, f64) {
        (
            (lng - self.west) / (self.east - self.west),
            (lat - self.south) / (self.north - self.south),
        )
    }

    fn out_of_bounds(&self, lat: f64, lng: f64) -> FloodError {
        FloodError::OutOfBounds {
            lat,
            lng,
            north: self.north,
            south: self.south,
            east: self.east,
            west: self.west,
        }
    }
}

/// Способ чтения высоты между узлами сетки.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Interpolation {
    Nearest,
    #[default]
    Bilinear,
}

/// Сторона области (используется для открытой воды и затравок).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Edge {
    North,
    South,
    East,
    West,
}

impl Edge {
    /// Расстояние от нормализованной точки до стороны.
    #[must_use]
    pub fn distance(self, u: f64, v: f64) -> f64 {
        match self {
            Edge::West => u,
            Edge::East => 1.0 - u,
            Edge::South => v,
            Edge::North => 1.0 - v,
        }
    }

    /// Ближайшая к точке позиция на стороне (перпендикуляр).
    #[must_use]
    pub fn project(self, u: f64, v: f64) -> (f64, f64) {
        match self {
            Edge::West => (0.0, v),
            Edge::East => (1.0, v),
            Edge::South => (u, 0.0),
            Edge::North => (u, 1.0),
        }
    }

    /// Ячейки `(row, col)` сетки `rows × cols`, лежащие на этой стороне.
    pub fn cells(self, rows: usize, cols: usize) -> Box<dyn Iterator<Item = (usize, usize)>> {
        match self {
            Edge::West => Box::new((0..rows).map(|i| (i, 0))),
            Edge::East => Box::new((0..rows).map(move |i| (i, cols - 1))),
            Edge::South => Box::new((0..cols).map(|j| (0, j))),
            Edge::North => Box::new((0..cols).map(move |j| (rows - 1, j))),
        }
    }
}

/// Точка, в которой источник должен вернуть высоту.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplePoint {
    pub lat: f64,
    pub lng: f64,
    /// Нормализованная долгота в пределах строящейся сетки (0 на западе, 1 на востоке).
    pub u: f64,
    /// Нормализованная широта (0 на юге, 1 на севере).
    pub v: f64,
}

/// Источник высот для построения сетки: растр, набор тайлов или процедурная модель.
pub trait ElevationSource: Sync {
    /// Высота в метрах или `None`, если данных нет.
    fn elevation(&self, point: SamplePoint) -> Option<f32>;
}

/// Равномерная сетка высот над географическим прямоугольником.
///
/// Строка `i` лежит на широте `south + i·lat_step` (строка 0 южная),
/// столбец `j` на долготе `west + j·lng_step`. Данные хранятся построчно.
/// После построения сетка только читается и может разделяться между потоками.
#[derive(Debug, Clone)]
pub struct ElevationGrid {
    rows: usize,
    cols: usize,
    bounds: GeographicBounds,
    no_data: f32,
    data: Vec<f32>,
}

impl ElevationGrid {
    /// Создаёт сетку из готовых значений (построчно, с юга на север).
    pub fn from_samples(
        bounds: GeographicBounds,
        rows: usize,
        cols: usize,
        data: Vec<f32>,
    ) -> Result<Self> {
        bounds.validate()?;
        if rows == 0 || cols == 0 {
            return Err(FloodError::InvalidGrid(format!(
                "grid must be at least 1x1, got {rows}x{cols}"
            )));
        }
        if data.len() != rows * cols {
            return Err(FloodError::InvalidGrid(format!(
                "expected {} samples for {rows}x{cols}, got {}",
                rows * cols,
                data.len()
            )));
        }
        Ok(Self {
            rows,
            cols,
            bounds,
            no_data: DEFAULT_NO_DATA,
            data,
        })
    }

    /// Переопределяет значение «нет данных», принятое поставщиком растра.
    #[must_use]
    pub fn with_no_data(mut self, no_data: f32) -> Self {
        self.no_data = no_data;
        self
    }

    /// Строит сетку `resolution × resolution`, опрашивая источник в каждом узле.
    ///
    /// Память и время растут как `O(resolution²)`.
    pub fn build<S>(bounds: GeographicBounds, resolution: usize, source: &S) -> Result<Self>
    where
        S: ElevationSource + ?Sized,
    {
        bounds.validate()?;
        if resolution == 0 {
            return Err(FloodError::InvalidGrid("resolution must be positive".into()));
        }

        let rows = resolution;
        let cols = resolution;
        let lat_step = (bounds.north - bounds.south) / rows as f64;
        let lng_step = (bounds.east - bounds.west) / cols as f64;

        let sample = |idx: usize| {
            let i = idx / cols;
            let j = idx % cols;
            let point = SamplePoint {
                lat: bounds.south + i as f64 * lat_step,
                lng: bounds.west + j as f64 * lng_step,
                u: j as f64 / cols as f64,
                v: i as f64 / rows as f64,
            };
            source.elevation(point).unwrap_or(DEFAULT_NO_DATA)
        };

        #[cfg(feature = "parallel")]
        let data: Vec<f32> = (0..rows * cols).into_par_iter().map(sample).collect();
        #[cfg(not(feature = "parallel"))]
        let data: Vec<f32> = (0..rows * cols).map(sample).collect();

        info!(rows, cols, "elevation grid built");
        Self::from_samples(bounds, rows, cols, data)
    }

    /// Строит сетку из растра Terrain-RGB: по ячейке на пиксель.
    ///
    /// Строка 0 изображения северная, поэтому строки переворачиваются.
    /// Пиксели с нулевой альфой считаются отсутствием данных.
    pub fn from_terrain_rgb(image: &RgbaImage, bounds: GeographicBounds) -> Result<Self> {
        let cols = image.width() as usize;
        let rows = image.height() as usize;
        let mut data = vec![DEFAULT_NO_DATA; rows * cols];

        for (x, y, pixel) in image.enumerate_pixels() {
            let [r, g, b, a] = pixel.0;
            if a == 0 {
                continue;
            }
            let i = rows - 1 - y as usize;
            data[i * cols + x as usize] = terrain_rgb::decode(TerrainRgb::new(r, g, b)) as f32;
        }

        Self::from_samples(bounds, rows, cols, data)
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
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn bounds(&self) -> GeographicBounds {
        self.bounds
    }

    #[must_use]
    pub fn no_data(&self) -> f32 {
        self.no_data
    }

    #[must_use]
    pub fn lat_step(&self) -> f64 {
        (self.bounds.north - self.bounds.south) / self.rows as f64
    }

    #[must_use]
    pub fn lng_step(&self) -> f64 {
        (self.bounds.east - self.bounds.west) / self.cols as f64
    }

    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    #[must_use]
    pub fn index(&self, row: usize, col: usize) -> usize {
        row * self.cols + col
    }

    /// Сырое значение узла (включая значение «нет данных»).
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[self.index(row, col)]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        let idx = self.index(row, col);
        self.data[idx] = value;
    }

    #[must_use]
    pub fn is_no_data(&self, value: f32) -> bool {
        value.is_nan() || value == self.no_data
    }

    /// Высота узла или `None` для ячейки без данных.
    #[must_use]
    pub fn elevation(&self, row: usize, col: usize) -> Option<f32> {
        let value = self.get(row, col);
        (!self.is_no_data(value)).then_some(value)
    }

    /// Переводит координаты в индексном пространстве (`x` по столбцам, `y` по строкам)
    /// в `[lng, lat]`.
    #[must_use]
    pub fn to_lng_lat(&self, x: f64, y: f64) -> [f64; 2] {
        [
            self.bounds.west + x * self.lng_step(),
            self.bounds.south + y * self.lat_step(),
        ]
    }

    /// Высота в точке.
    ///
    /// Вне границ возвращает [`FloodError::OutOfBounds`], для ячеек без данных `Ok(None)`.
    pub fn sample(&self, lat: f64, lng: f64, interpolation: Interpolation) -> Result<Option<f32>> {
        if !self.bounds.contains(lat, lng) {
            return Err(self.bounds.out_of_bounds(lat, lng));
        }

        let fy = (lat - self.bounds.south) / self.lat_step();
        let fx = (lng - self.bounds.west) / self.lng_step();
        let max_row = self.rows - 1;
        let max_col = self.cols - 1;

        match interpolation {
            Interpolation::Nearest => {
                let i = (fy.round() as usize).min(max_row);
                let j = (fx.round() as usize).min(max_col);
                Ok(self.elevation(i, j))
            }
            Interpolation::Bilinear => {
                let i0 = (fy.floor() as usize).min(max_row);
                let j0 = (fx.floor() as usize).min(max_col);
                let i1 = (i0 + 1).min(max_row);
                let j1 = (j0 + 1).min(max_col);
                let ty = (fy - i0 as f64).clamp(0.0, 1.0);
                let tx = (fx - j0 as f64).clamp(0.0, 1.0);

                let corners = [
                    (i0, j0, (1.0 - tx) * (1.0 - ty)),
                    (i0, j1, tx * (1.0 - ty)),
                    (i1, j0, (1.0 - tx) * ty),
                    (i1, j1, tx * ty),
                ];

                // углы с нулевым весом не влияют на результат, их данные не нужны
                let mut elevation = 0.0;
                for (i, j, weight) in corners {
                    if weight == 0.0 {
                        continue;
                    }
                    let Some(value) = self.elevation(i, j) else {
                        return Ok(None);
                    };
                    elevation += f64::from(value) * weight;
                }
                Ok(Some(elevation as f32))
            }
        }
    }

    /// Минимум и максимум среди ячеек с данными.
    #[must_use]
    pub fn elevation_range(&self) -> Option<(f32, f32)> {
        self.data
            .iter()
            .copied()
            .filter(|&v| !self.is_no_data(v))
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Оттенки серого, север сверху; ячейки без данных чёрные.
    #[must_use]
    pub fn to_grayscale_image(&self) -> Vec<u8> {
        let (lo, hi) = self.elevation_range().unwrap_or((0.0, 1.0));
        let span = (hi - lo).max(f32::EPSILON);
        let mut pixels = Vec::with_capacity(self.data.len());
        for row in (0..self.rows).rev() {
            for col in 0..self.cols {
                let value = match self.elevation(row, col) {
                    Some(v) => (((v - lo) / span).clamp(0.0, 1.0) * 254.0) as u8 + 1,
                    None => 0,
                };
                pixels.push(value);
            }
        }
        pixels
    }

    pub fn save_as_png(&self, path: &str) -> Result<()> {
        let img: ImageBuffer<Luma<u8>, Vec<u8>> =
            ImageBuffer::from_raw(self.cols as u32, self.rows as u32, self.to_grayscale_image())
                .ok_or_else(|| FloodError::InvalidGrid("Failed to create image buffer".into()))?;
        img.save(path)?;
        Ok(())
    }

    /// Кодирует сетку в изображение Terrain-RGB (север сверху).
    ///
    /// Ячейки без данных становятся прозрачными пикселями, как их и читает
    /// [`ElevationGrid::from_terrain_rgb`]. Высоты вне диапазона кодека возвращают
    /// ошибку, а не обрезаются.
    pub fn to_terrain_rgb(&self) -> Result<RgbaImage> {
        let mut img = RgbaImage::new(self.cols as u32, self.rows as u32);
        for row in 0..self.rows {
            for col in 0..self.cols {
                let pixel = match self.elevation(row, col) {
                    Some(v) => {
                        let [r, g, b] = terrain_rgb::encode(f64::from(v))?.to_array();
                        Rgba([r, g, b, 255])
                    }
                    None => Rgba([0, 0, 0, 0]),
                };
                let y = (self.rows - 1 - row) as u32;
                img.put_pixel(col as u32, y, pixel);
            }
        }
        Ok(img)
    }
}

/// Сетка может служить источником для пересэмплирования в другое разрешение.
impl ElevationSource for ElevationGrid {
    fn elevation(&self, point: SamplePoint) -> Option<f32> {
        self.sample(point.lat, point.lng, Interpolation::Bilinear)
            .ok()
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_bounds() -> GeographicBounds {
        GeographicBounds::new(1.0, 0.0, 1.0, 0.0).unwrap()
    }

    #[test]
    fn test_bounds_validation() {
        assert!(GeographicBounds::new(1.0, 2.0, 1.0, 0.0).is_err());
        assert!(GeographicBounds::new(1.0, 0.0, 0.0, 0.0).is_err());
        assert!(GeographicBounds::new(40.8, 40.7, -73.9, -74.0).is_ok());
    }

    #[test]
    fn test_from_samples_rejects_bad_shapes() {
        assert!(matches!(
            ElevationGrid::from_samples(unit_bounds(), 0, 3, vec![]),
            Err(FloodError::InvalidGrid(_))
        ));
        assert!(matches!(
            ElevationGrid::from_samples(unit_bounds(), 2, 2, vec![1.0; 3]),
            Err(FloodError::InvalidGrid(_))
        ));
    }

    #[test]
    fn test_node_coordinates() {
        let grid = ElevationGrid::from_samples(unit_bounds(), 4, 2, vec![0.0; 8]).unwrap();
        assert_relative_eq!(grid.lat_step(), 0.25);
        assert_relative_eq!(grid.lng_step(), 0.5);
        let [lng, lat] = grid.to_lng_lat(1.0, 3.0);
        assert_relative_eq!(lng, 0.5);
        assert_relative_eq!(lat, 0.75);
    }

    #[test]
    fn test_sample_out_of_bounds() {
        let grid = ElevationGrid::from_samples(unit_bounds(), 2, 2, vec![0.0; 4]).unwrap();
        assert!(matches!(
            grid.sample(1.5, 0.5, Interpolation::Nearest),
            Err(FloodError::OutOfBounds { .. })
        ));
        assert!(matches!(
            grid.sample(0.5, -0.1, Interpolation::Bilinear),
            Err(FloodError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_sample_bilinear_and_nearest() {
        // узлы на широтах 0 и 0.5, долготах 0 и 0.5
        let grid =
            ElevationGrid::from_samples(unit_bounds(), 2, 2, vec![0.0, 10.0, 20.0, 30.0]).unwrap();
        let mid = grid.sample(0.25, 0.25, Interpolation::Bilinear).unwrap().unwrap();
        assert_relative_eq!(mid, 15.0, epsilon = 1e-4);
        let near = grid.sample(0.1, 0.4, Interpolation::Nearest).unwrap().unwrap();
        assert_relative_eq!(near, 10.0);
        // за последним узлом значение фиксируется на краю
        let edge = grid.sample(1.0, 1.0, Interpolation::Bilinear).unwrap().unwrap();
        assert_relative_eq!(edge, 30.0);
    }

    #[test]
    fn test_sample_reports_no_data() {
        let grid = ElevationGrid::from_samples(
            unit_bounds(),
            2,
            2,
            vec![0.0, DEFAULT_NO_DATA, 20.0, 30.0],
        )
        .unwrap();
        assert_eq!(grid.sample(0.25, 0.25, Interpolation::Bilinear).unwrap(), None);
        assert_eq!(grid.sample(0.0, 0.0, Interpolation::Nearest).unwrap(), Some(0.0));
    }

    #[test]
    fn test_bilinear_on_node_ignores_missing_neighbour() {
        let grid = ElevationGrid::from_samples(
            unit_bounds(),
            2,
            2,
            vec![0.0, DEFAULT_NO_DATA, 20.0, 30.0],
        )
        .unwrap();
        // ровно на узле (0, 0) и на ребре между (0, 0) и (1, 0)
        assert_eq!(grid.sample(0.0, 0.0, Interpolation::Bilinear).unwrap(), Some(0.0));
        let edge = grid.sample(0.25, 0.0, Interpolation::Bilinear).unwrap().unwrap();
        assert_relative_eq!(edge, 10.0, epsilon = 1e-4);
        // сосед без данных получает вес, как только точка сдвигается к нему
        assert_eq!(grid.sample(0.0, 0.1, Interpolation::Bilinear).unwrap(), None);
    }

    #[test]
    fn test_terrain_rgb_round_trip_through_image() {
        let grid = ElevationGrid::from_samples(
            unit_bounds(),
            2,
            3,
            vec![-3.5, 0.0, 1.2, 15.0, DEFAULT_NO_DATA, 120.4],
        )
        .unwrap();
        let image = grid.to_terrain_rgb().unwrap();
        assert_eq!(image.get_pixel(1, 0).0[3], 0);
        assert_eq!(image.get_pixel(0, 1).0[3], 255);
        let decoded = ElevationGrid::from_terrain_rgb(&image, unit_bounds()).unwrap();

        assert_eq!(decoded.rows(), 2);
        assert_eq!(decoded.cols(), 3);
        assert_relative_eq!(decoded.get(0, 0), -3.5, epsilon = 0.05);
        assert_relative_eq!(decoded.get(1, 2), 120.4, epsilon = 0.05);
        // прозрачный пиксель снова читается как «нет данных»
        assert_eq!(decoded.elevation(1, 1), None);
    }

    #[test]
    fn test_transparent_pixels_are_no_data() {
        let mut img = RgbaImage::new(2, 1);
        img.put_pixel(0, 0, image::Rgba([1, 134, 160, 255]));
        img.put_pixel(1, 0, image::Rgba([1, 134, 160, 0]));
        let grid = ElevationGrid::from_terrain_rgb(&img, unit_bounds()).unwrap();
        assert_relative_eq!(grid.elevation(0, 0).unwrap(), 0.0, epsilon = 1e-3);
        assert_eq!(grid.elevation(0, 1), None);
    }

    #[test]
    fn test_build_resamples_existing_grid() {
        let coarse =
            ElevationGrid::from_samples(unit_bounds(), 2, 2, vec![0.0, 10.0, 20.0, 30.0]).unwrap();
        let fine = ElevationGrid::build(unit_bounds(), 4, &coarse).unwrap();
        assert_eq!(fine.rows(), 4);
        assert_relative_eq!(fine.get(0, 0), 0.0);
        assert_relative_eq!(fine.get(1, 1), 15.0, epsilon = 1e-4);
        assert!(ElevationGrid::build(unit_bounds(), 0, &coarse).is_err());
    }
}
