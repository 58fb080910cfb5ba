use crate::color::{range_ratio, HEALTH_BAR_GREEN};
use crate::ocr::TextRecognizer;
use image::RgbaImage;
use trail_state::BattleListEntry;
use trail_video::{crop_rect, PixelRect};

/// Every battle-list row has this fixed height.
pub const ROW_HEIGHT: u32 = 22;
/// Rows darker than this hold no entity.
const EMPTY_ROW_BRIGHTNESS: f64 = 25.0;
/// A highlighted left edge marks the selected target.
const TARGET_EDGE_BRIGHTNESS: f64 = 100.0;
/// Status icons occupy the leftmost pixels of each row.
const ICON_MARGIN: u32 = 5;
/// The health bar strip within a row.
const HP_BAR_TOP: u32 = 12;
const HP_BAR_BOTTOM: u32 = 15;

/// Extract the entities listed in the battle-list region, top to bottom.
/// Rows are independent; nothing links an entry to the previous frame.
pub fn read_battle_list(
    frame: &RgbaImage,
    region: &PixelRect,
    ocr: &dyn TextRecognizer,
) -> Vec<BattleListEntry> {
    let roi = crop_rect(frame, region);
    let (w, h) = roi.dimensions();
    if w <= ICON_MARGIN + 1 || h < ROW_HEIGHT {
        return Vec::new();
    }

    let mut entries = Vec::new();
    for row_index in 0..h / ROW_HEIGHT {
        let row = crop_rect(
            &roi,
            &PixelRect::new(0, row_index * ROW_HEIGHT, w, ROW_HEIGHT),
        );
        if mean_brightness(&row) < EMPTY_ROW_BRIGHTNESS {
            continue;
        }

        let name_area = crop_rect(&row, &PixelRect::new(ICON_MARGIN, 0, w - ICON_MARGIN, ROW_HEIGHT));
        let tokens = ocr.recognize(&name_area);
        if tokens.is_empty() {
            continue;
        }
        let name = tokens.join(" ");

        let hp_percent = health_bar_percent(&row);
        let is_target = {
            let edge = crop_rect(&row, &PixelRect::new(0, 0, 3, ROW_HEIGHT));
            mean_brightness(&edge) > TARGET_EDGE_BRIGHTNESS
        };

        entries.push(BattleListEntry {
            name,
            hp_percent,
            is_target,
        });
    }
    entries
}

/// Green-pixel ratio over the row's health-bar strip, scaled to 0..=100.
fn health_bar_percent(row: &RgbaImage) -> f64 {
    let w = row.width();
    if w <= 2 * ICON_MARGIN {
        return 0.0;
    }
    let bar = crop_rect(
        row,
        &PixelRect::new(ICON_MARGIN, HP_BAR_TOP, w - 2 * ICON_MARGIN, HP_BAR_BOTTOM - HP_BAR_TOP),
    );
    (range_ratio(&bar, &HEALTH_BAR_GREEN) * 100.0).clamp(0.0, 100.0)
}

/// Mean over all color channels, matching how row emptiness is judged.
fn mean_brightness(img: &RgbaImage) -> f64 {
    let n = (img.width() * img.height()) as f64 * 3.0;
    if n == 0.0 {
        return 0.0;
    }
    img.pixels()
        .map(|p| p[0] as f64 + p[1] as f64 + p[2] as f64)
        .sum::<f64>()
        / n
}
