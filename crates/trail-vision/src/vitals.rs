use crate::color::{range_ratio, VITAL_BLUE, VITAL_RED};
use image::RgbaImage;
use trail_assets::VitalsLayout;
use trail_state::VitalStats;
use trail_video::crop_rect;

/// Read health and mana percentages from their fixed strips near the
/// bottom-left of the frame. No search happens here: the strips sit at a
/// constant offset from the frame edges on every supported client layout.
pub fn extract_vitals(frame: &RgbaImage, layout: &VitalsLayout) -> VitalStats {
    let (w, h) = frame.dimensions();

    let hp_percent = layout
        .health
        .resolve(w, h)
        .map(|rect| {
            let strip = crop_rect(frame, &rect);
            (range_ratio(&strip, &VITAL_RED) * 100.0).clamp(0.0, 100.0)
        })
        .unwrap_or(0.0);

    let mana_percent = layout
        .mana
        .resolve(w, h)
        .map(|rect| {
            let strip = crop_rect(frame, &rect);
            (range_ratio(&strip, &VITAL_BLUE) * 100.0).clamp(0.0, 100.0)
        })
        .unwrap_or(0.0);

    VitalStats {
        hp_percent,
        mana_percent,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    /// Frame with vital strips filled to the given fractions.
    fn frame_with_vitals(hp: f64, mana: f64) -> RgbaImage {
        let mut frame = RgbaImage::from_pixel(640, 480, Rgba([10, 10, 10, 255]));
        let layout = VitalsLayout::default();

        let hp_rect = layout.health.resolve(640, 480).unwrap();
        let hp_w = (hp_rect.width as f64 * hp) as u32;
        for y in hp_rect.y..hp_rect.y + hp_rect.height {
            for x in hp_rect.x..hp_rect.x + hp_w {
                frame.put_pixel(x, y, Rgba([200, 30, 30, 255]));
            }
        }

        let mana_rect = layout.mana.resolve(640, 480).unwrap();
        let mana_w = (mana_rect.width as f64 * mana) as u32;
        for y in mana_rect.y..mana_rect.y + mana_rect.height {
            for x in mana_rect.x..mana_rect.x + mana_w {
                frame.put_pixel(x, y, Rgba([30, 60, 200, 255]));
            }
        }

        frame
    }

    #[test]
    fn test_full_and_half_bars() {
        let frame = frame_with_vitals(1.0, 0.5);
        let stats = extract_vitals(&frame, &VitalsLayout::default());
        assert!((stats.hp_percent - 100.0).abs() < 2.0);
        assert!((stats.mana_percent - 50.0).abs() < 2.0);
    }

    #[test]
    fn test_empty_bars_read_zero() {
        let frame = RgbaImage::from_pixel(640, 480, Rgba([10, 10, 10, 255]));
        let stats = extract_vitals(&frame, &VitalsLayout::default());
        assert_eq!(stats.hp_percent, 0.0);
        assert_eq!(stats.mana_percent, 0.0);
    }

    #[test]
    fn test_percentages_bounded_on_arbitrary_pixels() {
        // Saturate the whole frame in bar colors; ratios still cap at 100
        let mut frame = RgbaImage::from_pixel(640, 480, Rgba([200, 30, 30, 255]));
        for y in 470..480 {
            for x in 0..640 {
                frame.put_pixel(x, y, Rgba([30, 60, 200, 255]));
            }
        }
        let stats = extract_vitals(&frame, &VitalsLayout::default());
        assert!(stats.hp_percent >= 0.0 && stats.hp_percent <= 100.0);
        assert!(stats.mana_percent >= 0.0 && stats.mana_percent <= 100.0);
    }

    #[test]
    fn test_frame_smaller_than_layout_reads_zero() {
        let frame = RgbaImage::from_pixel(60, 20, Rgba([200, 30, 30, 255]));
        let stats = extract_vitals(&frame, &VitalsLayout::default());
        assert_eq!(stats.hp_percent, 0.0);
        assert_eq!(stats.mana_percent, 0.0);
    }
}
