//! Движок расчёта зон затопления при подъёме уровня моря.
//!
//! Сетка высот и уровень воды превращаются в связный набор затопленных ячеек и
//! векторные полигоны для отрисовки. Точный расчёт ([`flood::compute_flooded`]) служит
//! источником истины; [`flood::LineSampleApproximation`] даёт быстрое, но приближённое
//! превью.

pub mod config;
pub mod contour;
pub mod error;
pub mod flood;
pub mod geojson;
pub mod grid;
pub mod model;
pub mod polygon;
pub mod render;
pub mod terrain_rgb;
pub mod tiles;

pub use config::{FloodMapParams, SourceConfig};
pub use contour::{Contour, extract_contours};
pub use error::FloodError;
pub use flood::levels::flood_levels;
pub use flood::worker::{FloodUpdate, FloodWorker};
pub use flood::{
    Cell, FloodContext, FloodedCellSet, ReachabilityStrategy, SeedSet, compute_flooded,
};
pub use grid::{Edge, ElevationGrid, ElevationSource, GeographicBounds, Interpolation};
pub use model::{ElevationModel, ProceduralTerrain, TerrainFeature};
pub use polygon::{FloodPolygon, OutlineMode, PolygonProperties, build_polygons, convex_hull};

pub type Result<T> = std::result::Result<T, FloodError>;
