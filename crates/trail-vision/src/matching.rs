use image::GrayImage;
use tracing::debug;

/// Best template position within a larger image.
#[derive(Debug, Clone, Copy)]
pub struct TemplateMatch {
    pub x: u32,
    pub y: u32,
    /// Zero-mean normalized cross-correlation, -1.0..=1.0.
    pub score: f64,
}

/// Downscale factor for the coarse search pass.
const COARSE_SCALE: u32 = 4;
/// Templates smaller than this skip the coarse pass entirely.
const MIN_COARSE_TEMPLATE: u32 = 64;
/// Refinement window around the upscaled coarse result, in full-res pixels.
const REFINE_RADIUS: u32 = 8;

/// Find the offset where `template` correlates best with `image`.
///
/// Exhaustive at full resolution for small templates; larger searches run a
/// downscaled pass first and refine around its winner. The returned score is
/// always computed at full resolution. `None` when the template does not fit
/// inside the image.
pub fn best_match(image: &GrayImage, template: &GrayImage) -> Option<TemplateMatch> {
    let (iw, ih) = image.dimensions();
    let (tw, th) = template.dimensions();
    if tw == 0 || th == 0 || tw > iw || th > ih {
        return None;
    }

    let (tmpl_mean, tmpl_std) = compute_stats(template);

    if tw.min(th) < MIN_COARSE_TEMPLATE {
        return search(image, template, tmpl_mean, tmpl_std, 0, iw - tw, 0, ih - th);
    }

    let coarse_image = downscale(image, COARSE_SCALE);
    let coarse_template = downscale(template, COARSE_SCALE);
    let (cm, cs) = compute_stats(&coarse_template);
    let (ciw, cih) = coarse_image.dimensions();
    let (ctw, cth) = coarse_template.dimensions();
    if ctw > ciw || cth > cih {
        return search(image, template, tmpl_mean, tmpl_std, 0, iw - tw, 0, ih - th);
    }

    let coarse = search(
        &coarse_image,
        &coarse_template,
        cm,
        cs,
        0,
        ciw - ctw,
        0,
        cih - cth,
    )?;

    let cx = coarse.x * COARSE_SCALE;
    let cy = coarse.y * COARSE_SCALE;
    let x0 = cx.saturating_sub(REFINE_RADIUS);
    let y0 = cy.saturating_sub(REFINE_RADIUS);
    let x1 = (cx + REFINE_RADIUS).min(iw - tw);
    let y1 = (cy + REFINE_RADIUS).min(ih - th);

    let refined = search(image, template, tmpl_mean, tmpl_std, x0, x1, y0, y1);
    if let Some(ref m) = refined {
        debug!(
            "Template refined to ({}, {}) score {:.3} from coarse ({}, {})",
            m.x, m.y, m.score, cx, cy
        );
    }
    refined
}

/// Exhaustive zero-mean NCC over the given offset range (inclusive bounds).
fn search(
    image: &GrayImage,
    template: &GrayImage,
    tmpl_mean: f64,
    tmpl_std: f64,
    x0: u32,
    x1: u32,
    y0: u32,
    y1: u32,
) -> Option<TemplateMatch> {
    if tmpl_std < 1e-10 {
        return None;
    }

    let mut best: Option<TemplateMatch> = None;
    for oy in y0..=y1 {
        for ox in x0..=x1 {
            let score = ncc_at(image, template, ox, oy, tmpl_mean, tmpl_std);
            if best.map_or(true, |b| score > b.score) {
                best = Some(TemplateMatch {
                    x: ox,
                    y: oy,
                    score,
                });
            }
        }
    }
    best
}

/// Zero-mean NCC of `template` against the window of `image` at (ox, oy).
fn ncc_at(
    image: &GrayImage,
    template: &GrayImage,
    ox: u32,
    oy: u32,
    tmpl_mean: f64,
    tmpl_std: f64,
) -> f64 {
    let (tw, th) = template.dimensions();
    let n = (tw * th) as f64;

    let mut sum = 0.0;
    let mut sum_sq = 0.0;
    for y in 0..th {
        for x in 0..tw {
            let p = image.get_pixel(ox + x, oy + y)[0] as f64;
            sum += p;
            sum_sq += p * p;
        }
    }
    let win_mean = sum / n;
    let win_var = (sum_sq / n - win_mean * win_mean).max(0.0);
    let win_std = win_var.sqrt();

    let denom = win_std * tmpl_std;
    if denom < 1e-10 {
        return 0.0;
    }

    let mut cross = 0.0;
    for y in 0..th {
        for x in 0..tw {
            let ip = image.get_pixel(ox + x, oy + y)[0] as f64;
            let tp = template.get_pixel(x, y)[0] as f64;
            cross += (ip - win_mean) * (tp - tmpl_mean);
        }
    }

    cross / (n * denom)
}

/// Mean and standard deviation of pixel values.
pub fn compute_stats(img: &GrayImage) -> (f64, f64) {
    let n = (img.width() * img.height()) as f64;
    if n == 0.0 {
        return (0.0, 0.0);
    }
    let mean = img.pixels().map(|p| p[0] as f64).sum::<f64>() / n;
    let variance = img
        .pixels()
        .map(|p| (p[0] as f64 - mean).powi(2))
        .sum::<f64>()
        / n;
    (mean, variance.sqrt())
}

fn downscale(img: &GrayImage, factor: u32) -> GrayImage {
    image::imageops::resize(
        img,
        (img.width() / factor).max(1),
        (img.height() / factor).max(1),
        image::imageops::FilterType::Triangle,
    )
}
