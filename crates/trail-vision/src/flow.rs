use image::GrayImage;

/// Lucas-Kanade window size, matching the minimap's feature scale.
const WINDOW: i32 = 15;
const PYRAMID_LEVELS: usize = 2;
const MAX_ITERATIONS: u32 = 10;
const EPSILON: f32 = 0.03;

/// Estimate per-point displacement between two temporally adjacent grayscale
/// images. Returns one entry per input point: the new position, or `None`
/// when the point could not be tracked (flat neighborhood or it left the
/// image).
pub fn track_points(
    prev: &GrayImage,
    curr: &GrayImage,
    points: &[(f32, f32)],
) -> Vec<Option<(f32, f32)>> {
    let prev_pyr = Pyramid::build(prev, PYRAMID_LEVELS);
    let curr_pyr = Pyramid::build(curr, PYRAMID_LEVELS);

    points
        .iter()
        .map(|&p| track_one(&prev_pyr, &curr_pyr, p))
        .collect()
}

fn track_one(prev_pyr: &Pyramid, curr_pyr: &Pyramid, point: (f32, f32)) -> Option<(f32, f32)> {
    let levels = prev_pyr.levels.len();
    let mut guess = (0.0f32, 0.0f32);
    let half = WINDOW / 2;

    for level in (0..levels).rev() {
        let scale = 1.0 / (1u32 << level) as f32;
        let px = point.0 * scale;
        let py = point.1 * scale;
        let prev_img = &prev_pyr.levels[level];
        let curr_img = &curr_pyr.levels[level];

        // Spatial gradient matrix over the window in the previous image
        let mut g11 = 0.0f32;
        let mut g12 = 0.0f32;
        let mut g22 = 0.0f32;
        for wy in -half..=half {
            for wx in -half..=half {
                let ix = (prev_img.get(px as i32 + wx + 1, py as i32 + wy)
                    - prev_img.get(px as i32 + wx - 1, py as i32 + wy))
                    * 0.5;
                let iy = (prev_img.get(px as i32 + wx, py as i32 + wy + 1)
                    - prev_img.get(px as i32 + wx, py as i32 + wy - 1))
                    * 0.5;
                g11 += ix * ix;
                g12 += ix * iy;
                g22 += iy * iy;
            }
        }

        let det = g11 * g22 - g12 * g12;
        if det.abs() < 1e-6 {
            if level == 0 {
                return None;
            }
            continue;
        }
        let inv_det = 1.0 / det;

        // The coarse estimate was already rescaled into this level's coordinates
        let mut dx = guess.0;
        let mut dy = guess.1;

        for _ in 0..MAX_ITERATIONS {
            let mut bx = 0.0f32;
            let mut by = 0.0f32;
            for wy in -half..=half {
                for wx in -half..=half {
                    let ix = (prev_img.get(px as i32 + wx + 1, py as i32 + wy)
                        - prev_img.get(px as i32 + wx - 1, py as i32 + wy))
                        * 0.5;
                    let iy = (prev_img.get(px as i32 + wx, py as i32 + wy + 1)
                        - prev_img.get(px as i32 + wx, py as i32 + wy - 1))
                        * 0.5;
                    let it = curr_img.sample(px + dx + wx as f32, py + dy + wy as f32)
                        - prev_img.get(px as i32 + wx, py as i32 + wy);
                    bx += ix * it;
                    by += iy * it;
                }
            }
            let ddx = inv_det * (g22 * bx - g12 * by);
            let ddy = inv_det * (-g12 * bx + g11 * by);
            dx -= ddx;
            dy -= ddy;
            if ddx * ddx + ddy * ddy < EPSILON * EPSILON {
                break;
            }
        }

        // Propagate to the next (finer) level
        guess = if level > 0 { (dx * 2.0, dy * 2.0) } else { (dx, dy) };
    }

    let new_pos = (point.0 + guess.0, point.1 + guess.1);
    let base = &curr_pyr.levels[0];
    if new_pos.0 < 0.0
        || new_pos.1 < 0.0
        || new_pos.0 >= base.width as f32
        || new_pos.1 >= base.height as f32
    {
        return None;
    }
    Some(new_pos)
}

/// f32 image stack, each level half the size of the one below.
struct Pyramid {
    levels: Vec<FloatImage>,
}

impl Pyramid {
    fn build(img: &GrayImage, extra_levels: usize) -> Self {
        let mut levels = vec![FloatImage::from_gray(img)];
        for _ in 0..extra_levels {
            let prev = levels.last().unwrap();
            if prev.width < 2 * WINDOW as u32 || prev.height < 2 * WINDOW as u32 {
                break;
            }
            levels.push(prev.halved());
        }
        Self { levels }
    }
}

struct FloatImage {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl FloatImage {
    fn from_gray(img: &GrayImage) -> Self {
        Self {
            width: img.width(),
            height: img.height(),
            data: img.pixels().map(|p| p[0] as f32).collect(),
        }
    }

    fn halved(&self) -> Self {
        let width = (self.width / 2).max(1);
        let height = (self.height / 2).max(1);
        let mut data = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                let sum = self.get((x * 2) as i32, (y * 2) as i32)
                    + self.get((x * 2 + 1) as i32, (y * 2) as i32)
                    + self.get((x * 2) as i32, (y * 2 + 1) as i32)
                    + self.get((x * 2 + 1) as i32, (y * 2 + 1) as i32);
                data.push(sum * 0.25);
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Clamped integer access.
    fn get(&self, x: i32, y: i32) -> f32 {
        let x = x.clamp(0, self.width as i32 - 1) as usize;
        let y = y.clamp(0, self.height as i32 - 1) as usize;
        self.data[y * self.width as usize + x]
    }

    /// Bilinear sample at a subpixel position, clamped at the borders.
    fn sample(&self, x: f32, y: f32) -> f32 {
        let x0 = x.floor() as i32;
        let y0 = y.floor() as i32;
        let fx = x - x0 as f32;
        let fy = y - y0 as f32;
        let p00 = self.get(x0, y0);
        let p10 = self.get(x0 + 1, y0);
        let p01 = self.get(x0, y0 + 1);
        let p11 = self.get(x0 + 1, y0 + 1);
        p00 * (1.0 - fx) * (1.0 - fy)
            + p10 * fx * (1.0 - fy)
            + p01 * (1.0 - fx) * fy
            + p11 * fx * fy
    }
}
