//! Window-relative capture regions.

use image::RgbaImage;

/// A pixel rectangle relative to the window's top-left corner.
///
/// Coordinates assume a 2560x1440 game window. `right` and `bottom` are
/// exclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ScreenRegion {
    pub name: &'static str,
    pub left: u32,
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
}

impl ScreenRegion {
    pub const fn new(name: &'static str, left: u32, top: u32, right: u32, bottom: u32) -> Self {
        Self {
            name,
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> u32 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.saturating_sub(self.top)
    }
}

/// Crops a region out of a full window frame.
///
/// The region is clamped to the frame, so a window that shrank between polls
/// yields a smaller (possibly empty) image instead of a panic.
pub fn crop_region(frame: &RgbaImage, region: &ScreenRegion) -> RgbaImage {
    let (w, h) = frame.dimensions();

    let x0 = region.left.min(w);
    let y0 = region.top.min(h);
    let rw = region.width().min(w - x0);
    let rh = region.height().min(h - y0);

    image::imageops::crop_imm(frame, x0, y0, rw, rh).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_crop_region() {
        let frame = RgbaImage::from_fn(100, 200, |x, y| Rgba([x as u8, y as u8, 0, 255]));

        let region = ScreenRegion::new("test", 10, 50, 60, 70);
        let cropped = crop_region(&frame, &region);

        assert_eq!(cropped.dimensions(), (50, 20));
        assert_eq!(cropped.get_pixel(0, 0)[0], 10);
        assert_eq!(cropped.get_pixel(0, 0)[1], 50);
    }

    #[test]
    fn test_crop_region_clamps() {
        let frame = RgbaImage::new(100, 100);
        let region = ScreenRegion::new("test", 90, 90, 150, 150);
        assert_eq!(crop_region(&frame, &region).dimensions(), (10, 10));

        // Entirely outside the frame
        let region = ScreenRegion::new("test", 200, 200, 250, 250);
        assert_eq!(crop_region(&frame, &region).dimensions(), (0, 0));
    }
}
