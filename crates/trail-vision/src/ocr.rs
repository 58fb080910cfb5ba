use image::{GrayImage, RgbaImage};
use std::path::PathBuf;
use std::process::Command;
use tracing::{debug, warn};

/// External text recognition over a cropped sub-image. Implementations
/// return the recognized tokens in reading order; an empty result means
/// nothing legible was found and is not an error.
pub trait TextRecognizer {
    fn recognize(&self, region: &RgbaImage) -> Vec<String>;
}

/// Recognizes row text by shelling out to the Tesseract CLI.
/// Falls back gracefully (empty results) when Tesseract is not installed.
pub struct TesseractRecognizer {
    available: bool,
    temp_dir: PathBuf,
}

impl TesseractRecognizer {
    pub fn new() -> Self {
        let available = check_tesseract();
        if available {
            debug!("Tesseract OCR available");
        } else {
            warn!("Tesseract not found; battle-list names will be empty");
        }

        let temp_dir = std::env::temp_dir().join("trailscope_ocr");
        let _ = std::fs::create_dir_all(&temp_dir);

        Self {
            available,
            temp_dir,
        }
    }

    pub fn is_available(&self) -> bool {
        self.available
    }

    fn run_tesseract(&self, image: &GrayImage) -> Option<String> {
        let temp_path = self.temp_dir.join("row_input.png");
        if image.save(&temp_path).is_err() {
            return None;
        }

        let output = Command::new("tesseract")
            .arg(&temp_path)
            .arg("stdout")
            .arg("--psm")
            .arg("7") // Single text line
            .output()
            .ok()?;

        if !output.status.success() {
            return None;
        }

        let text = String::from_utf8(output.stdout).ok()?;
        let trimmed = text.trim().to_string();

        if trimmed.is_empty() {
            None
        } else {
            debug!("OCR result: '{}'", trimmed);
            Some(trimmed)
        }
    }
}

impl Default for TesseractRecognizer {
    fn default() -> Self {
        Self::new()
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize(&self, region: &RgbaImage) -> Vec<String> {
        if !self.available {
            return Vec::new();
        }

        let processed = preprocess_for_ocr(region);
        match self.run_tesseract(&processed) {
            Some(text) => text.split_whitespace().map(str::to_string).collect(),
            None => Vec::new(),
        }
    }
}

/// Pre-process a row crop for OCR:
/// 1. Convert to grayscale
/// 2. Threshold to isolate bright text (game UI text is light on dark)
/// 3. Invert so text is dark on white (Tesseract preference)
fn preprocess_for_ocr(image: &RgbaImage) -> GrayImage {
    let gray = image::imageops::grayscale(image);
    let (w, h) = gray.dimensions();

    GrayImage::from_fn(w, h, |x, y| {
        let pixel = gray.get_pixel(x, y)[0];
        if pixel > 140 {
            image::Luma([0u8]) // Text → black
        } else {
            image::Luma([255u8]) // Background → white
        }
    })
}

/// Check if Tesseract is installed and accessible
fn check_tesseract() -> bool {
    Command::new("tesseract")
        .arg("--version")
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preprocess_inverts_bright_text() {
        let img = RgbaImage::from_fn(10, 10, |x, _| {
            if x < 5 {
                image::Rgba([200, 200, 200, 255]) // bright → text → black
            } else {
                image::Rgba([30, 30, 30, 255]) // dark → background → white
            }
        });
        let processed = preprocess_for_ocr(&img);
        assert_eq!(processed.get_pixel(0, 0)[0], 0);
        assert_eq!(processed.get_pixel(9, 0)[0], 255);
    }
}
