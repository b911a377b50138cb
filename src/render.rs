// src/render.rs
//! Растровое превью: рельеф в оттенках серого, вода с оттенком по глубине,
//! поверх контуры полигонов и изолинии. Север сверху.

use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_line_segment_mut;
use tracing::info;

use crate::{FloodError, Result};
use crate::contour::Contour;
use crate::flood::FloodedCellSet;
use crate::grid::ElevationGrid;
use crate::polygon::FloodPolygon;

const OUTLINE: Rgba<u8> = Rgba([255, 64, 32, 255]);
const CONTOUR: Rgba<u8> = Rgba([255, 220, 0, 255]);
const NO_DATA: Rgba<u8> = Rgba([0, 0, 0, 255]);

pub struct FloodPreview<'a> {
    grid: &'a ElevationGrid,
    /// Пикселей на ячейку
    scale: u32,
}

impl<'a> FloodPreview<'a> {
    #[must_use]
    pub fn new(grid: &'a ElevationGrid, scale: u32) -> Self {
        Self {
            grid,
            scale: scale.max(1),
        }
    }

    /// Позиция `[lng, lat]` в пикселях превью.
    fn to_pixel(&self, point: [f64; 2]) -> (f32, f32) {
        let bounds = self.grid.bounds();
        let x = (point[0] - bounds.west) / self.grid.lng_step();
        let y = (bounds.north - point[1]) / self.grid.lat_step();
        let scale = f64::from(self.scale);
        ((x * scale) as f32, (y * scale) as f32)
    }

    /// Рисует превью; набор затопленных ячеек должен совпадать с сеткой по форме.
    pub fn render(
        &self,
        flooded: &FloodedCellSet,
        polygons: &[FloodPolygon],
        contours: &[Contour],
    ) -> Result<RgbaImage> {
        let rows = self.grid.rows();
        let cols = self.grid.cols();
        if flooded.rows() != rows || flooded.cols() != cols {
            return Err(FloodError::InvalidGrid(format!(
                "flooded set is {}x{}, grid is {rows}x{cols}",
                flooded.rows(),
                flooded.cols()
            )));
        }
        let width = cols as u32 * self.scale;
        let height = rows as u32 * self.scale;
        let (lo, hi) = self.grid.elevation_range().unwrap_or((0.0, 1.0));
        let span = (hi - lo).max(f32::EPSILON);
        let water_level = flooded.water_level();

        let mut img = RgbaImage::new(width, height);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            let col = (x / self.scale) as usize;
            let row = rows - 1 - (y / self.scale) as usize;
            *pixel = match self.grid.elevation(row, col) {
                None => NO_DATA,
                Some(elevation) if flooded.mask()[row * cols + col] => {
                    let depth = ((water_level - elevation) / span).clamp(0.0, 1.0);
                    let shade = (200.0 - depth * 150.0) as u8;
                    Rgba([30, shade / 2 + 40, shade.saturating_add(55), 255])
                }
                Some(elevation) => {
                    let g = (((elevation - lo) / span).clamp(0.0, 1.0) * 200.0) as u8 + 40;
                    Rgba([g, g, g, 255])
                }
            };
        }

        for polygon in polygons {
            for ring in std::iter::once(&polygon.exterior).chain(&polygon.holes) {
                self.draw_path(&mut img, ring, OUTLINE);
            }
        }
        for contour in contours {
            self.draw_path(&mut img, &contour.points, CONTOUR);
        }

        Ok(img)
    }

    fn draw_path(&self, img: &mut RgbaImage, points: &[[f64; 2]], color: Rgba<u8>) {
        for pair in points.windows(2) {
            draw_line_segment_mut(img, self.to_pixel(pair[0]), self.to_pixel(pair[1]), color);
        }
    }

    pub fn save_as_png(
        &self,
        flooded: &FloodedCellSet,
        polygons: &[FloodPolygon],
        contours: &[Contour],
        path: &str,
    ) -> Result<()> {
        let img = self.render(flooded, polygons, contours)?;
        img.save(path)?;
        info!(path, width = img.width(), height = img.height(), "preview saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flood::{FloodContext, SeedSet};
    use crate::grid::{Edge, GeographicBounds};
    use crate::polygon::OutlineMode;

    #[test]
    fn test_preview_marks_water_and_outline() {
        let bounds = GeographicBounds::new(4.0, 0.0, 4.0, 0.0).unwrap();
        let data: Vec<f32> = (0..16).map(|i| (i % 4) as f32).collect();
        let grid = ElevationGrid::from_samples(bounds, 4, 4, data).unwrap();
        let seeds = SeedSet::from_edges(&grid, &[Edge::West]);
        let ctx = FloodContext::new(grid, seeds);
        let flooded = ctx.flood(1.5, crate::flood::ReachabilityStrategy::Exact).unwrap();
        let polygons = ctx.polygons(&flooded, OutlineMode::Traced);

        let preview = FloodPreview::new(ctx.grid(), 8);
        let img = preview.render(&flooded, &polygons, &[]).unwrap();
        assert_eq!(img.dimensions(), (32, 32));

        // вода на западе, суша на востоке
        let water = img.get_pixel(4, 12);
        let land = img.get_pixel(28, 12);
        assert!(water.0[2] > water.0[0]);
        assert_eq!(land.0[0], land.0[2]);
        // граница полигона проходит по x = 16
        assert_eq!(*img.get_pixel(16, 12), OUTLINE);
    }

    #[test]
    fn test_mismatched_flood_set_is_rejected() {
        let bounds = GeographicBounds::new(2.0, 0.0, 2.0, 0.0).unwrap();
        let grid = ElevationGrid::from_samples(bounds, 2, 2, vec![0.0; 4]).unwrap();
        let other = FloodedCellSet::from_mask(3, 3, 1.0, vec![true; 9]);
        let preview = FloodPreview::new(&grid, 2);
        assert!(matches!(
            preview.render(&other, &[], &[]),
            Err(FloodError::InvalidGrid(_))
        ));
    }
}
