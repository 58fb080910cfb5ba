use crate::cluster::{dominant_activity_area, ActivityArea};
use crate::font::draw_label;
use anyhow::{Context, Result};
use image::{Rgba, RgbaImage};
use imageproc::drawing::draw_line_segment_mut;
use std::path::Path;
use tracing::info;

/// Trail polyline color (indigo).
const PATH_COLOR: Rgba<u8> = Rgba([75, 0, 130, 255]);
/// Label color above the highlighted area.
const LABEL_COLOR: Rgba<u8> = Rgba([0, 255, 255, 255]);
/// Highlight blend: 70% map, 30% white.
const HIGHLIGHT_WEIGHT: f64 = 0.3;
const LABEL_SCALE: u32 = 2;

/// Render the recorded trail onto a copy of the world map and, when a
/// dominant activity area exists, highlight and caption it. Pure function of
/// its inputs; rendering the same trail twice gives identical images.
pub fn render_trail(
    world_map: &RgbaImage,
    positions: &[(i32, i32)],
    label: &str,
) -> RgbaImage {
    let mut canvas = world_map.clone();

    for pair in positions.windows(2) {
        draw_thick_segment(&mut canvas, pair[0], pair[1], PATH_COLOR);
    }

    if let Some(area) = dominant_activity_area(positions) {
        highlight_area(&mut canvas, &area);
        let label_y = area.y - 10 - (7 * LABEL_SCALE) as i32;
        draw_label(
            &mut canvas,
            area.x,
            label_y.max(0),
            label,
            LABEL_SCALE,
            LABEL_COLOR,
        );
    }

    canvas
}

/// Render and write the composited image.
pub fn write_trail(
    world_map: &RgbaImage,
    positions: &[(i32, i32)],
    label: &str,
    output_path: &Path,
) -> Result<()> {
    let canvas = render_trail(world_map, positions, label);
    canvas
        .save(output_path)
        .with_context(|| format!("Failed to write trail image {}", output_path.display()))?;
    info!(
        "Trail image written to {} ({} positions)",
        output_path.display(),
        positions.len()
    );
    Ok(())
}

/// 2px-wide line segment: the 1px primitive drawn over a 2x2 pen footprint.
fn draw_thick_segment(canvas: &mut RgbaImage, from: (i32, i32), to: (i32, i32), color: Rgba<u8>) {
    for (ox, oy) in [(0, 0), (1, 0), (0, 1), (1, 1)] {
        draw_line_segment_mut(
            canvas,
            ((from.0 + ox) as f32, (from.1 + oy) as f32),
            ((to.0 + ox) as f32, (to.1 + oy) as f32),
            color,
        );
    }
}

/// Blend the area's bounding rectangle toward white, clamped to the map.
fn highlight_area(canvas: &mut RgbaImage, area: &ActivityArea) {
    let (w, h) = canvas.dimensions();
    let x0 = area.x.max(0) as u32;
    let y0 = area.y.max(0) as u32;
    if x0 >= w || y0 >= h {
        return;
    }
    let x1 = ((area.x + area.width as i32).max(0) as u32).min(w - 1);
    let y1 = ((area.y + area.height as i32).max(0) as u32).min(h - 1);

    for y in y0..=y1 {
        for x in x0..=x1 {
            let px = canvas.get_pixel_mut(x, y);
            for c in 0..3 {
                let blended =
                    px[c] as f64 * (1.0 - HIGHLIGHT_WEIGHT) + 255.0 * HIGHLIGHT_WEIGHT;
                px[c] = blended.round().min(255.0) as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_fn(width, height, |x, y| {
            Rgba([((x + y) % 200) as u8, 60, 90, 255])
        })
    }

    fn dense_trail() -> Vec<(i32, i32)> {
        // 60 points circling (120, 120) plus a few distant excursions
        let mut points: Vec<(i32, i32)> = (0..55)
            .map(|i| (120 + ((i * 13) % 15) as i32, 120 + ((i * 7) % 15) as i32))
            .collect();
        points.extend([(400, 40), (420, 400), (30, 380)]);
        points
    }

    #[test]
    fn test_path_is_drawn_on_a_copy() {
        let world = map(64, 64);
        let rendered = render_trail(&world, &[(5, 5), (40, 5)], "Hunt Area");
        // Source untouched
        assert_ne!(world.get_pixel(20, 5), &PATH_COLOR);
        // Path drawn between the two points
        assert_eq!(rendered.get_pixel(20, 5), &PATH_COLOR);
        assert_eq!(rendered.get_pixel(20, 6), &PATH_COLOR);
    }

    #[test]
    fn test_short_trail_renders_without_highlight() {
        let world = map(64, 64);
        let trail = [(10, 10), (20, 20), (30, 10)];
        let rendered = render_trail(&world, &trail, "Hunt Area");
        // Corner far from the path keeps its original pixels
        assert_eq!(rendered.get_pixel(60, 60), world.get_pixel(60, 60));
    }

    #[test]
    fn test_rendering_is_deterministic() {
        let world = map(512, 512);
        let trail = dense_trail();
        let a = render_trail(&world, &trail, "Hunt Area");
        let b = render_trail(&world, &trail, "Hunt Area");
        assert_eq!(a.as_raw(), b.as_raw());
    }

    #[test]
    fn test_dense_area_is_highlighted() {
        let world = map(512, 512);
        let trail = dense_trail();
        let rendered = render_trail(&world, &trail, "Hunt Area");

        // A pixel inside the dense cluster's bounds but off the trail grid
        // should have been pushed toward white.
        let area = dominant_activity_area(&trail).unwrap();
        assert!(area.x >= 115 && area.x <= 125);
        let sample = world.get_pixel(area.x as u32 + 1, area.y as u32 + 1);
        let highlighted = rendered.get_pixel(area.x as u32 + 1, area.y as u32 + 1);
        assert!(highlighted[0] as u32 >= sample[0] as u32);
        assert!(highlighted[2] > sample[2]);
    }
}
