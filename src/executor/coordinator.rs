//! Normalized (0–1000) → device pixel mapping.
//!
//! The model points at a screenshot that was shrunk so its longer side is at
//! most [`MAX_LINE_RES`]. Mapping reproduces that shrink, truncates, and then
//! scales back up, so a tap lands on the pixel the model actually saw rather
//! than on a linear interpolation of the full-resolution screen.
use crate::agent_engine::action::Point;
use crate::errors::PilotResult;
use crate::executor::screen::{ScreenSize, ScreenSizeSource};
use crate::perception::pipeline::MAX_LINE_RES;

/// Downscale factor applied to screenshots of this size. Never above 1.0.
pub fn downscale_factor(size: ScreenSize) -> f64 {
    let max_line = MAX_LINE_RES as f64;
    let mut scale = 1.0_f64;
    if size.height > MAX_LINE_RES {
        scale = max_line / size.height as f64;
    }
    if size.width > MAX_LINE_RES {
        scale = scale.min(max_line / size.width as f64);
    }
    scale
}

/// Maps a normalized point to device pixels for the given screen.
pub fn to_device_pixels(point: Point, size: ScreenSize) -> (i32, i32) {
    let scale = downscale_factor(size);
    let scaled_x = (point.x as f64 * size.width as f64 * scale / 1000.0).floor();
    let scaled_y = (point.y as f64 * size.height as f64 * scale / 1000.0).floor();
    ((scaled_x / scale).floor() as i32, (scaled_y / scale).floor() as i32)
}

/// Maps points against the live screen size.
pub struct CoordinateMapper {
    source: ScreenSizeSource,
}

impl CoordinateMapper {
    pub fn new(source: ScreenSizeSource) -> Self {
        Self { source }
    }

    pub async fn map(&self, point: Point) -> PilotResult<(i32, i32)> {
        let size = self.source.current().await?;
        let (x, y) = to_device_pixels(point, size);
        tracing::debug!(nx = point.x, ny = point.y, x, y, "normalized point mapped");
        Ok((x, y))
    }

    pub fn source(&self) -> &ScreenSizeSource {
        &self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: u16, y: u16) -> Point {
        Point::new(x as i64, y as i64).unwrap()
    }

    #[test]
    fn tall_phone_reproduces_screenshot_quantization() {
        let size = ScreenSize::new(1080, 2340);
        assert_eq!(to_device_pixels(p(500, 500), size), (539, 1170));
        assert_eq!(to_device_pixels(p(999, 999), size), (1078, 2335));
        assert_eq!(to_device_pixels(p(0, 0), size), (0, 0));
    }

    #[test]
    fn other_resolutions() {
        assert_eq!(to_device_pixels(p(500, 500), ScreenSize::new(720, 1280)), (360, 640));
        assert_eq!(to_device_pixels(p(250, 750), ScreenSize::new(1440, 3200)), (357, 2400));
        assert_eq!(to_device_pixels(p(123, 456), ScreenSize::new(1080, 1920)), (132, 874));
        assert_eq!(to_device_pixels(p(500, 500), ScreenSize::new(2340, 1080)), (1170, 539));
    }

    #[test]
    fn small_screens_map_linearly() {
        for &(w, h) in &[(1000u32, 800u32), (1120, 1120), (480, 854)] {
            let size = ScreenSize::new(w, h);
            assert_eq!(downscale_factor(size), 1.0);
            for &(x, y) in &[(0u16, 0u16), (1, 999), (333, 667), (999, 999)] {
                let expected = (
                    (x as u32 * w / 1000) as i32,
                    (y as u32 * h / 1000) as i32,
                );
                assert_eq!(to_device_pixels(p(x, y), size), expected);
            }
        }
    }

    #[test]
    fn never_upscales_and_picks_tighter_side() {
        assert_eq!(downscale_factor(ScreenSize::new(1080, 2340)), 1120.0 / 2340.0);
        assert_eq!(downscale_factor(ScreenSize::new(2400, 1600)), 1120.0 / 2400.0);
    }

    #[test]
    fn results_stay_on_screen() {
        let sizes = [
            ScreenSize::new(1080, 2340),
            ScreenSize::new(1440, 3200),
            ScreenSize::new(720, 1600),
            ScreenSize::new(2560, 1600),
        ];
        for size in sizes {
            for x in (0..1000).step_by(37).chain([999]) {
                for y in (0..1000).step_by(41).chain([999]) {
                    let (px, py) = to_device_pixels(p(x, y), size);
                    assert!(px >= 0 && (px as u32) < size.width, "{x},{y} on {size:?}");
                    assert!(py >= 0 && (py as u32) < size.height, "{x},{y} on {size:?}");
                }
            }
        }
    }

    #[test]
    fn deterministic() {
        let size = ScreenSize::new(1080, 2400);
        assert_eq!(to_device_pixels(p(417, 83), size), to_device_pixels(p(417, 83), size));
    }
}
