//! Ошибки движка затопления.

use thiserror::Error;

/// Ошибки, возникающие при построении сетки, кодировании высот и экспорте.
///
/// Вырожденная геометрия (меньше трёх точек) ошибкой не считается:
/// такие случаи возвращают пустой результат.
#[derive(Debug, Error)]
pub enum FloodError {
    /// Высота не представима в Terrain-RGB (24 бита, шаг 0.1 м, смещение 10 000 м).
    #[error("Elevation {elevation} m cannot be represented in Terrain-RGB")]
    OutOfRange {
        /// Исходная высота в метрах.
        elevation: f64,
    },

    /// Точка запроса лежит за пределами сетки.
    #[error(
        "Coordinate ({lat}, {lng}) is outside grid bounds ({south}-{north}, {west}-{east})"
    )]
    OutOfBounds {
        /// Широта запроса.
        lat: f64,
        /// Долгота запроса.
        lng: f64,
        /// Северная граница.
        north: f64,
        /// Южная граница.
        south: f64,
        /// Восточная граница.
        east: f64,
        /// Западная граница.
        west: f64,
    },

    /// Сетка нулевого размера или повреждённые данные.
    #[error("Invalid grid: {0}")]
    InvalidGrid(String),

    /// Некорректный тайл: уровень масштаба или номер вне допустимого диапазона.
    #[error("Invalid tile: {0}")]
    InvalidTile(String),

    /// Стратегия `LineSample` запрошена для сетки без процедурной модели рельефа.
    #[error("Line-sample reachability requires a procedural elevation model")]
    ApproximationUnavailable,

    /// Фоновый расчёт остановлен (поток завершился или канал закрыт).
    #[error("Flood worker is no longer running")]
    WorkerStopped,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
