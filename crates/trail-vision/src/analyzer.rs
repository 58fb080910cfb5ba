use crate::battle_list::read_battle_list;
use crate::locator::UiLocator;
use crate::ocr::TextRecognizer;
use crate::tracker::PositionTracker;
use crate::vitals::extract_vitals;
use image::RgbaImage;
use std::sync::Arc;
use tracing::debug;
use trail_assets::{ReferenceAssets, UiElement};
use trail_state::FrameAnalysis;
use trail_video::crop_rect;

/// Per-session frame analyzer. Owns the UI-region cache and the tracker
/// state, so one instance must see the frames of exactly one recording, in
/// order. Independent sessions get independent instances; only the reference
/// assets are shared, read-only.
pub struct FrameAnalyzer {
    assets: Arc<ReferenceAssets>,
    locator: UiLocator,
    tracker: PositionTracker,
    ocr: Box<dyn TextRecognizer>,
}

impl FrameAnalyzer {
    pub fn new(assets: Arc<ReferenceAssets>, ocr: Box<dyn TextRecognizer>, floor: i32) -> Self {
        Self {
            assets,
            locator: UiLocator::new(),
            tracker: PositionTracker::new(floor),
            ocr,
        }
    }

    /// Analyze one frame. Component failures (missing UI regions, lost
    /// tracking, empty recognition) degrade to absent or empty fields and
    /// never abort the frame.
    pub fn analyze(&mut self, frame: &RgbaImage) -> FrameAnalysis {
        let frame_gray = image::imageops::grayscale(frame);

        let player_coords = self
            .locator
            .locate(&frame_gray, &self.assets, UiElement::Minimap)
            .and_then(|rect| {
                let minimap_gray = crop_rect(&frame_gray, &rect);
                self.tracker
                    .advance(&self.assets.world_map_gray, &minimap_gray)
            });
        if player_coords.is_none() {
            debug!("No position fix for this frame");
        }

        let battle_list = self
            .locator
            .locate(&frame_gray, &self.assets, UiElement::BattleList)
            .map(|rect| read_battle_list(frame, &rect, self.ocr.as_ref()))
            .unwrap_or_default();

        let stats = extract_vitals(frame, &self.assets.vitals);

        FrameAnalysis {
            player_coords,
            stats,
            battle_list,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use std::collections::HashMap;
    use trail_assets::{AnchoredRect, FallbackLayout, LayoutConfig};
    use trail_state::Position;

    struct SilentOcr;

    impl TextRecognizer for SilentOcr {
        fn recognize(&self, _region: &RgbaImage) -> Vec<String> {
            Vec::new()
        }
    }

    fn blocky_rgba(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            let v = ((x / 6)
                .wrapping_mul(97)
                .wrapping_add((y / 6).wrapping_mul(57))
                .wrapping_mul(2654435761)
                >> 24) as u8;
            Rgba([v, v, v, 255])
        })
    }

    /// Small-layout assets so tests stay fast: a 40x40 minimap region in the
    /// frame's top-right, correlated against a 160x120 world map.
    fn test_assets() -> (Arc<ReferenceAssets>, RgbaImage, Position) {
        let world_map = blocky_rgba(160, 120);

        let layout = LayoutConfig {
            fallback: FallbackLayout {
                minimap: AnchoredRect {
                    right_offset: 50,
                    top: 10,
                    width: 40,
                    height: 40,
                },
                battle_list: AnchoredRect {
                    right_offset: 50,
                    top: 60,
                    width: 40,
                    height: 88,
                },
            },
            ..LayoutConfig::default()
        };

        let assets = Arc::new(ReferenceAssets::from_parts(
            world_map.clone(),
            HashMap::new(),
            layout,
        ));

        // The frame carries a copy of world map pixels (70, 30)..(110, 70)
        // at its minimap fallback position.
        let mut frame = RgbaImage::from_pixel(320, 240, Rgba([5, 5, 5, 255]));
        for y in 0..40 {
            for x in 0..40 {
                frame.put_pixel(270 + x, 10 + y, *world_map.get_pixel(70 + x, 30 + y));
            }
        }

        let expected = Position { x: 90, y: 50, z: 7 };
        (assets, frame, expected)
    }

    #[test]
    fn test_full_frame_analysis_recovers_position() {
        let (assets, frame, expected) = test_assets();
        let mut analyzer = FrameAnalyzer::new(assets, Box::new(SilentOcr), 7);

        let result = analyzer.analyze(&frame);
        assert_eq!(result.player_coords, Some(expected));
        assert!(result.battle_list.is_empty());
        assert_eq!(result.stats.hp_percent, 0.0);
    }

    #[test]
    fn test_sequential_frames_keep_tracking() {
        let (assets, frame, expected) = test_assets();
        let mut analyzer = FrameAnalyzer::new(assets, Box::new(SilentOcr), 7);

        let first = analyzer.analyze(&frame).player_coords.unwrap();
        // Identical next frame: flow reports no movement
        let second = analyzer.analyze(&frame).player_coords.unwrap();
        assert_eq!(first, expected);
        assert_eq!(second, expected);
    }

    #[test]
    fn test_unlocatable_minimap_degrades_to_absent_position() {
        let (assets, _, _) = test_assets();
        let mut analyzer = FrameAnalyzer::new(assets, Box::new(SilentOcr), 7);

        // Frame too small for any fallback region
        let tiny = RgbaImage::from_pixel(40, 30, Rgba([5, 5, 5, 255]));
        let result = analyzer.analyze(&tiny);
        assert!(result.player_coords.is_none());
        assert!(result.battle_list.is_empty());
    }
}
