// src/tiles.rs
//! Тайлы Terrain-RGB в схеме slippy map (z/x/y, Web Mercator).

use std::f64::consts::PI;
use std::path::{Path, PathBuf};

use image::RgbaImage;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::grid::{ElevationSource, GeographicBounds, SamplePoint};
use crate::terrain_rgb::{self, TerrainRgb};
use crate::{FloodError, Result};

pub const MAX_ZOOM: u8 = 22;

/// Предел широты Web Mercator: `atan(sinh(π))`.
const MERCATOR_LAT_LIMIT: f64 = 85.051_128_779_8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    pub z: u8,
    /// Столбец: 0 на 180° з. д., растёт на восток.
    pub x: u32,
    /// Строка: 0 у северного предела, растёт на юг.
    pub y: u32,
}

impl TileCoord {
    pub fn new(z: u8, x: u32, y: u32) -> Result<Self> {
        if z > MAX_ZOOM {
            return Err(FloodError::InvalidTile(format!("zoom {z} exceeds {MAX_ZOOM}")));
        }
        let n = 1u32 << z;
        if x >= n || y >= n {
            return Err(FloodError::InvalidTile(format!("tile {z}/{x}/{y} outside the zoom level")));
        }
        Ok(Self { z, x, y })
    }

    /// Тайл, содержащий точку.
    pub fn from_lat_lng(lat: f64, lng: f64, z: u8) -> Result<Self> {
        if z > MAX_ZOOM {
            return Err(FloodError::InvalidTile(format!("zoom {z} exceeds {MAX_ZOOM}")));
        }
        let (fx, fy) = world_position(lat, lng, z);
        let max = (1u32 << z) - 1;
        Ok(Self {
            z,
            x: (fx.floor().max(0.0) as u32).min(max),
            y: (fy.floor().max(0.0) as u32).min(max),
        })
    }

    /// Географические границы тайла.
    #[must_use]
    pub fn bounds(&self) -> GeographicBounds {
        let n = f64::from(1u32 << self.z);
        let lat = |y: f64| (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees();
        GeographicBounds {
            north: lat(f64::from(self.y)),
            south: lat(f64::from(self.y + 1)),
            east: f64::from(self.x + 1) / n * 360.0 - 180.0,
            west: f64::from(self.x) / n * 360.0 - 180.0,
        }
    }

    /// Дробная позиция точки внутри тайла в пикселях (`0..size`), ось `y` вниз.
    #[must_use]
    pub fn pixel_position(&self, lat: f64, lng: f64, size: u32) -> (f64, f64) {
        let (fx, fy) = world_position(lat, lng, self.z);
        (
            (fx - f64::from(self.x)) * f64::from(size),
            (fy - f64::from(self.y)) * f64::from(size),
        )
    }
}

/// Позиция в единицах тайлов на уровне `z`.
fn world_position(lat: f64, lng: f64, z: u8) -> (f64, f64) {
    let n = f64::from(1u32 << z);
    let lat_rad = lat.clamp(-MERCATOR_LAT_LIMIT, MERCATOR_LAT_LIMIT).to_radians();
    let x = (lng + 180.0) / 360.0 * n;
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n;
    (x, y)
}

/// Описание тайла в конфигурации.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TileSpec {
    pub path: PathBuf,
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

/// Декодированный тайл.
pub struct TerrainRgbTile {
    coord: TileCoord,
    bounds: GeographicBounds,
    image: RgbaImage,
}

impl TerrainRgbTile {
    /// Тайл из уже декодированного изображения; оно должно быть непустым квадратом.
    pub fn new(coord: TileCoord, image: RgbaImage) -> Result<Self> {
        if image.width() == 0 || image.width() != image.height() {
            return Err(FloodError::InvalidTile(format!(
                "tile {}/{}/{} is {}x{}, expected a non-empty square",
                coord.z,
                coord.x,
                coord.y,
                image.width(),
                image.height()
            )));
        }
        Ok(Self {
            coord,
            bounds: coord.bounds(),
            image,
        })
    }

    pub fn open(path: &Path, coord: TileCoord) -> Result<Self> {
        let image = image::open(path)?.to_rgba8();
        let tile = Self::new(coord, image)?;
        debug!(path = %path.display(), z = coord.z, x = coord.x, y = coord.y, "tile loaded");
        Ok(tile)
    }

    #[must_use]
    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    #[must_use]
    pub fn bounds(&self) -> GeographicBounds {
        self.bounds
    }

    /// Высота ближайшего пикселя; для прозрачных пикселей и точек вне тайла `None`.
    #[must_use]
    pub fn elevation(&self, lat: f64, lng: f64) -> Option<f32> {
        if !self.bounds.contains(lat, lng) {
            return None;
        }
        let size = self.image.width();
        let (px, py) = self.coord.pixel_position(lat, lng, size);
        let max = f64::from(size - 1);
        let [r, g, b, a] = self
            .image
            .get_pixel(px.clamp(0.0, max) as u32, py.clamp(0.0, max) as u32)
            .0;
        (a != 0).then(|| terrain_rgb::decode(TerrainRgb::new(r, g, b)) as f32)
    }
}

/// Набор тайлов как источник высот: точка берётся из первого тайла, который её покрывает.
#[derive(Default)]
pub struct TileSet {
    tiles: Vec<TerrainRgbTile>,
}

impl TileSet {
    #[must_use]
    pub fn new(tiles: Vec<TerrainRgbTile>) -> Self {
        Self { tiles }
    }

    pub fn load(specs: &[TileSpec]) -> Result<Self> {
        let tiles = specs
            .iter()
            .map(|spec| TerrainRgbTile::open(&spec.path, TileCoord::new(spec.z, spec.x, spec.y)?))
            .collect::<Result<Vec<_>>>()?;
        info!(tiles = tiles.len(), "Terrain-RGB tiles loaded");
        Ok(Self { tiles })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Общий охват всех тайлов.
    #[must_use]
    pub fn bounds(&self) -> Option<GeographicBounds> {
        self.tiles.iter().map(TerrainRgbTile::bounds).reduce(|a, b| GeographicBounds {
            north: a.north.max(b.north),
            south: a.south.min(b.south),
            east: a.east.max(b.east),
            west: a.west.min(b.west),
        })
    }
}

impl ElevationSource for TileSet {
    fn elevation(&self, point: SamplePoint) -> Option<f32> {
        self.tiles
            .iter()
            .find_map(|tile| tile.elevation(point.lat, point.lng))
    }
}
