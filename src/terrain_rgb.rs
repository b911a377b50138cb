// src/terrain_rgb.rs
//! Кодек Terrain-RGB: высота ↔ три байта цвета.
//!
//! `value = -10000 + (R·65536 + G·256 + B) · 0.1`

use crate::{FloodError, Result};

/// Смещение, при котором код 0 соответствует −10 000 м.
pub const BASE_ELEVATION: f64 = -10_000.0;

/// Шаг квантования в метрах.
pub const INTERVAL: f64 = 0.1;

/// Максимальный 24-битный код.
const MAX_CODE: u32 = 0x00FF_FFFF;

/// Наибольшая кодируемая высота: `-10000 + (2^24 - 1) · 0.1`.
pub const MAX_ELEVATION: f64 = BASE_ELEVATION + MAX_CODE as f64 * INTERVAL;

/// Одна закодированная высота (пиксель тайла).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TerrainRgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl TerrainRgb {
    #[must_use]
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Возвращает 24-битный код `R·65536 + G·256 + B`.
    #[must_use]
    pub fn code(self) -> u32 {
        (u32::from(self.r) << 16) | (u32::from(self.g) << 8) | u32::from(self.b)
    }

    #[must_use]
    pub fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

/// Кодирует высоту в Terrain-RGB.
///
/// Значения вне `[-10000, 1 667 721.5]` (а также NaN/∞) не обрезаются,
/// а возвращают [`FloodError::OutOfRange`].
pub fn encode(elevation: f64) -> Result<TerrainRgb> {
    if !elevation.is_finite() {
        return Err(FloodError::OutOfRange { elevation });
    }

    let scaled = ((elevation - BASE_ELEVATION) / INTERVAL).round();
    if scaled < 0.0 || scaled > f64::from(MAX_CODE) {
        return Err(FloodError::OutOfRange { elevation });
    }

    let code = scaled as u32;
    Ok(TerrainRgb {
        r: (code / 65_536) as u8,
        g: ((code % 65_536) / 256) as u8,
        b: (code % 256) as u8,
    })
}

/// Декодирует пиксель Terrain-RGB в метры.
#[must_use]
pub fn decode(rgb: TerrainRgb) -> f64 {
    BASE_ELEVATION + f64::from(rgb.code()) * INTERVAL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_within_half_step() {
        let mut e = BASE_ELEVATION;
        while e <= 1_000_000.0 {
            let decoded = decode(encode(e).unwrap());
            assert!(
                (decoded - e).abs() <= 0.05 + 1e-6,
                "{e} decoded to {decoded}"
            );
            e += 997.3;
        }
    }

    #[test]
    fn test_dense_sweep_hits_every_code() {
        // шаг 0.1 м: нижний край диапазона и окрестность нуля
        for (first_code, count) in [(0u32, 10_001u32), (95_000, 10_001)] {
            for k in 0..count {
                let code = first_code + k;
                let e = BASE_ELEVATION + f64::from(code) * INTERVAL;
                let rgb = encode(e).unwrap();
                assert_eq!(rgb.code(), code, "{e} encoded off its step");
                assert!((decode(rgb) - e).abs() <= 0.05 + 1e-6);
            }
        }
    }

    #[test]
    fn test_known_values() {
        assert_eq!(encode(-10_000.0).unwrap(), TerrainRgb::new(0, 0, 0));
        // 0 м → код 100 000 = 0x0186A0
        assert_eq!(encode(0.0).unwrap(), TerrainRgb::new(1, 134, 160));
        assert!((decode(TerrainRgb::new(1, 134, 160))).abs() < 1e-9);
        assert!((decode(TerrainRgb::new(255, 255, 255)) - MAX_ELEVATION).abs() < 1e-6);
    }

    #[test]
    fn test_example_elevation() {
        let rgb = encode(2949.6).unwrap();
        assert!((decode(rgb) - 2949.6).abs() <= 0.05);
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(matches!(
            encode(-20_000.0),
            Err(FloodError::OutOfRange { .. })
        ));
        assert!(matches!(
            encode(MAX_ELEVATION + 1.0),
            Err(FloodError::OutOfRange { .. })
        ));
        assert!(encode(f64::NAN).is_err());
        assert!(encode(MAX_ELEVATION).is_ok());
    }
}
