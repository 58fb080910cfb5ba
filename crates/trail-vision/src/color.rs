use image::RgbaImage;

/// Inclusive HSV range in OpenCV convention: hue 0..=179 (degrees halved),
/// saturation and value 0..=255. Bar colors are specified this way so the
/// thresholds stay comparable with the usual CV literature.
#[derive(Debug, Clone, Copy)]
pub struct HsvRange {
    pub h: (u8, u8),
    pub s: (u8, u8),
    pub v: (u8, u8),
}

/// Green of a battle-list health bar.
pub const HEALTH_BAR_GREEN: HsvRange = HsvRange {
    h: (30, 90),
    s: (100, 255),
    v: (100, 255),
};

/// Red of the player's health strip.
pub const VITAL_RED: HsvRange = HsvRange {
    h: (0, 10),
    s: (120, 255),
    v: (70, 255),
};

/// Blue of the player's mana strip.
pub const VITAL_BLUE: HsvRange = HsvRange {
    h: (100, 140),
    s: (150, 255),
    v: (0, 255),
};

impl HsvRange {
    pub fn contains(&self, h: u8, s: u8, v: u8) -> bool {
        self.h.0 <= h
            && h <= self.h.1
            && self.s.0 <= s
            && s <= self.s.1
            && self.v.0 <= v
            && v <= self.v.1
    }
}

/// RGB to HSV with hue halved into 0..=179.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let v = max;
    let delta = (max - min) as f32;

    let s = if max == 0 {
        0
    } else {
        (delta * 255.0 / max as f32).round() as u8
    };

    if delta == 0.0 {
        return (0, s, v);
    }

    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let mut hue = if max == r {
        60.0 * (gf - bf) / delta
    } else if max == g {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    if hue < 0.0 {
        hue += 360.0;
    }

    ((hue / 2.0).round().min(179.0) as u8, s, v)
}

/// Fraction of an image's pixels whose HSV falls inside `range`, in 0.0..=1.0.
pub fn range_ratio(img: &RgbaImage, range: &HsvRange) -> f64 {
    let total = (img.width() * img.height()) as f64;
    if total == 0.0 {
        return 0.0;
    }
    let hits = img
        .pixels()
        .filter(|p| {
            let (h, s, v) = rgb_to_hsv(p[0], p[1], p[2]);
            range.contains(h, s, v)
        })
        .count();
    hits as f64 / total
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_primary_hues() {
        assert_eq!(rgb_to_hsv(255, 0, 0), (0, 255, 255));
        assert_eq!(rgb_to_hsv(0, 255, 0), (60, 255, 255));
        assert_eq!(rgb_to_hsv(0, 0, 255), (120, 255, 255));
    }

    #[test]
    fn test_gray_has_no_saturation() {
        let (h, s, v) = rgb_to_hsv(128, 128, 128);
        assert_eq!((h, s), (0, 0));
        assert_eq!(v, 128);
    }

    #[test]
    fn test_bar_colors_land_in_their_ranges() {
        let (h, s, v) = rgb_to_hsv(40, 200, 40); // health-bar green
        assert!(HEALTH_BAR_GREEN.contains(h, s, v));

        let (h, s, v) = rgb_to_hsv(200, 30, 30); // vital red
        assert!(VITAL_RED.contains(h, s, v));

        let (h, s, v) = rgb_to_hsv(30, 60, 200); // vital blue
        assert!(VITAL_BLUE.contains(h, s, v));
    }

    #[test]
    fn test_range_ratio_half_filled() {
        let img = RgbaImage::from_fn(10, 10, |x, _| {
            if x < 5 {
                Rgba([0, 255, 0, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        });
        let ratio = range_ratio(&img, &HEALTH_BAR_GREEN);
        assert!((ratio - 0.5).abs() < 1e-9);
    }
}
