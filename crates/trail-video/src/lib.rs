use image::{ImageBuffer, Pixel, RgbaImage};
use serde::{Deserialize, Serialize};

#[cfg(feature = "video")]
pub mod video;

/// Axis-aligned rectangle in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Whether the rectangle lies fully inside a `width` x `height` frame.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x + self.width <= width && self.y + self.height <= height
    }
}

/// One decoded color frame together with its place in the video.
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub index: u64,
    pub timestamp_secs: f64,
    pub image: RgbaImage,
}

/// Crop a rectangle out of a frame, clamped to the frame bounds.
pub fn crop_rect<P>(
    frame: &ImageBuffer<P, Vec<P::Subpixel>>,
    rect: &PixelRect,
) -> ImageBuffer<P, Vec<P::Subpixel>>
where
    P: Pixel + 'static,
{
    let (w, h) = frame.dimensions();
    let x = rect.x.min(w.saturating_sub(1));
    let y = rect.y.min(h.saturating_sub(1));
    let rw = rect.width.min(w - x);
    let rh = rect.height.min(h - y);

    image::imageops::crop_imm(frame, x, y, rw, rh).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_rect() {
        let img = RgbaImage::new(640, 480);
        let rect = PixelRect::new(480, 10, 150, 150);
        let cropped = crop_rect(&img, &rect);
        assert_eq!(cropped.dimensions(), (150, 150));
    }

    #[test]
    fn test_crop_rect_clamps_to_frame() {
        let img = RgbaImage::new(100, 100);
        let rect = PixelRect::new(80, 90, 150, 150);
        let cropped = crop_rect(&img, &rect);
        assert_eq!(cropped.dimensions(), (20, 10));
    }

    #[test]
    fn test_fits_within() {
        let rect = PixelRect::new(480, 170, 150, 300);
        assert!(rect.fits_within(640, 480));
        assert!(!rect.fits_within(640, 400));
        assert!(!rect.fits_within(600, 480));
    }
}
