use crate::matching::best_match;
use image::GrayImage;
use std::collections::HashMap;
use tracing::debug;
use trail_assets::{ReferenceAssets, UiElement};
use trail_video::PixelRect;

/// Template acceptance threshold for UI chrome.
const MATCH_CONFIDENCE: f64 = 0.8;

/// Finds fixed-shape UI regions in a frame, remembering each one for the
/// rest of the session. The cache is never re-verified: UI panels do not
/// move mid-recording, and skipping the search keeps per-frame cost flat.
#[derive(Default)]
pub struct UiLocator {
    cache: HashMap<UiElement, PixelRect>,
}

impl UiLocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Locate `element` in the frame. Template correlation when a template is
    /// configured and scores above threshold (result cached); otherwise the
    /// conventional fallback rectangle, which is not cached so a later frame
    /// with a clean template hit can still upgrade it.
    pub fn locate(
        &mut self,
        frame_gray: &GrayImage,
        assets: &ReferenceAssets,
        element: UiElement,
    ) -> Option<PixelRect> {
        if let Some(rect) = self.cache.get(&element) {
            return Some(*rect);
        }

        let (w, h) = frame_gray.dimensions();

        if let Some(template) = assets.templates.get(&element) {
            if let Some(m) = best_match(frame_gray, template) {
                if m.score > MATCH_CONFIDENCE {
                    let (rw, rh) = element.region_size();
                    let rect = PixelRect::new(m.x, m.y, rw, rh);
                    debug!(
                        "Located {} at ({}, {}) score {:.3}",
                        element.as_str(),
                        m.x,
                        m.y,
                        m.score
                    );
                    self.cache.insert(element, rect);
                    return Some(rect);
                }
                debug!(
                    "Template for {} peaked at {:.3}, below threshold",
                    element.as_str(),
                    m.score
                );
            }
        }

        let fallback = assets.fallback.get(element).resolve(w, h);
        if fallback.is_none() {
            debug!(
                "No {} region: frame {}x{} too small for fallback",
                element.as_str(),
                w,
                h
            );
        }
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;
    use trail_assets::LayoutConfig;
    use trail_video::crop_rect;

    fn frame_with_pattern() -> GrayImage {
        GrayImage::from_fn(320, 240, |x, y| {
            image::Luma([(x.wrapping_mul(13) ^ y.wrapping_mul(7)) as u8])
        })
    }

    fn assets_with_template(element: UiElement, template: GrayImage) -> ReferenceAssets {
        let mut templates = HashMap::new();
        templates.insert(element, template);
        ReferenceAssets::from_parts(
            RgbaImage::from_pixel(64, 64, image::Rgba([0, 0, 0, 255])),
            templates,
            LayoutConfig::default(),
        )
    }

    fn assets_without_templates() -> ReferenceAssets {
        ReferenceAssets::from_parts(
            RgbaImage::from_pixel(64, 64, image::Rgba([0, 0, 0, 255])),
            HashMap::new(),
            LayoutConfig::default(),
        )
    }

    #[test]
    fn test_template_hit_is_cached() {
        let frame = frame_with_pattern();
        let template = crop_rect(&frame, &PixelRect::new(200, 40, 24, 24));
        let assets = assets_with_template(UiElement::Minimap, template);

        let mut locator = UiLocator::new();
        let rect = locator
            .locate(&frame, &assets, UiElement::Minimap)
            .unwrap();
        assert_eq!((rect.x, rect.y), (200, 40));
        assert_eq!((rect.width, rect.height), (150, 150));

        // Cached: a completely different frame returns the same region
        let blank = GrayImage::new(320, 240);
        let again = locator.locate(&blank, &assets, UiElement::Minimap).unwrap();
        assert_eq!(again, rect);
    }

    #[test]
    fn test_no_template_falls_back_to_conventional_position() {
        let frame = GrayImage::new(800, 600);
        let assets = assets_without_templates();

        let mut locator = UiLocator::new();
        let rect = locator
            .locate(&frame, &assets, UiElement::BattleList)
            .unwrap();
        assert_eq!(rect, PixelRect::new(640, 170, 150, 300));
    }

    #[test]
    fn test_weak_match_falls_back_and_is_not_cached() {
        let frame = frame_with_pattern();
        // A template that exists nowhere in the frame
        let template = GrayImage::from_fn(24, 24, |x, _| image::Luma([(x % 3) as u8 * 80]));
        let assets = assets_with_template(UiElement::Minimap, template);

        let mut locator = UiLocator::new();
        let rect = locator
            .locate(&frame, &assets, UiElement::Minimap)
            .unwrap();
        assert_eq!(rect, PixelRect::new(160, 10, 150, 150));
        assert!(locator.cache.is_empty());
    }

    #[test]
    fn test_tiny_frame_has_no_region() {
        let frame = GrayImage::new(100, 80);
        let assets = assets_without_templates();

        let mut locator = UiLocator::new();
        assert!(locator.locate(&frame, &assets, UiElement::Minimap).is_none());
    }
}
