//! CLI tool to analyze a single saved screenshot through the full pipeline.
//! Usage: cargo run --bin analyze_frame --features cli -- <screenshot.png> <data_dir>

use std::path::PathBuf;
use std::sync::Arc;
use trail_assets::ReferenceAssets;
use trail_vision::{FrameAnalyzer, TesseractRecognizer};

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <screenshot.png> <data_dir>", args[0]);
        std::process::exit(1);
    }

    let input_path = PathBuf::from(&args[1]);
    let data_dir = PathBuf::from(&args[2]);

    println!("Loading image: {}", input_path.display());
    let frame = image::open(&input_path)
        .expect("Failed to open image")
        .to_rgba8();
    println!("Image size: {}x{}", frame.width(), frame.height());

    let assets = match ReferenceAssets::load(&data_dir) {
        Ok(a) => Arc::new(a),
        Err(e) => {
            eprintln!("Failed to load reference assets: {}", e);
            std::process::exit(1);
        }
    };

    let ocr = TesseractRecognizer::new();
    if !ocr.is_available() {
        println!("Tesseract not available; names will be empty");
    }

    let mut analyzer = FrameAnalyzer::new(assets, Box::new(ocr), 7);
    let result = analyzer.analyze(&frame);

    match serde_json::to_string_pretty(&result) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize result: {}", e),
    }
}
