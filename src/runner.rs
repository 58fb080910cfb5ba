use anyhow::Result;
use std::path::PathBuf;
use tracing::{info, warn};
use trail_assets::ReferenceAssets;
use trail_report::write_trail;
use trail_state::{FrameRecord, ResultSink};
use trail_video::DecodedFrame;
use trail_vision::FrameAnalyzer;

#[cfg(feature = "video")]
use anyhow::Context;
#[cfg(feature = "video")]
use std::path::Path;
#[cfg(feature = "video")]
use std::sync::atomic::AtomicBool;
#[cfg(feature = "video")]
use std::sync::Arc;
#[cfg(feature = "video")]
use trail_vision::TesseractRecognizer;

/// The driver samples progress once per this many frames.
pub const PROGRESS_SAMPLE_INTERVAL: u64 = 50;

/// Settings for one analysis run.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Directory holding map.png, templates/ and layout.json.
    pub data_dir: PathBuf,
    /// Where the rendered trail image goes.
    pub artifact_path: PathBuf,
    /// Analyze every (frame_skip + 1)-th frame.
    pub frame_skip: u32,
    /// World-map floor the recording plays on.
    pub floor: i32,
    /// Caption for the highlighted activity area.
    pub area_label: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            artifact_path: PathBuf::from("trail.png"),
            frame_skip: 0,
            floor: 7,
            area_label: "Hunt Area".to_string(),
        }
    }
}

/// Periodic progress sample handed to the caller's callback.
#[derive(Debug, Clone, Copy)]
pub struct RunProgress {
    pub frames_seen: u64,
    pub total_frames: Option<u64>,
    pub percent: Option<u8>,
}

/// What happened over a completed run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub frames_seen: u64,
    pub frames_analyzed: u64,
    pub positions_recovered: usize,
    pub artifact: Option<PathBuf>,
}

/// Drive the analyzer over a frame sequence, strictly in arrival order.
///
/// Every analyzed frame is handed to the sink before the next one is
/// touched. A decode failure (an `Err` item) aborts the run at that frame;
/// everything recorded so far stays in the sink. The trail artifact is
/// rendered only after a clean end of stream, and only when at least two
/// positions were recovered.
pub fn run_frames<I, S, P>(
    frames: I,
    analyzer: &mut FrameAnalyzer,
    assets: &ReferenceAssets,
    cfg: &RunConfig,
    sink: &mut S,
    total_frames: Option<u64>,
    mut progress: P,
) -> Result<RunSummary>
where
    I: IntoIterator<Item = Result<DecodedFrame>>,
    S: ResultSink,
    P: FnMut(RunProgress),
{
    let step = cfg.frame_skip as u64 + 1;
    let mut frames_seen = 0u64;
    let mut frames_analyzed = 0u64;
    let mut positions: Vec<(i32, i32)> = Vec::new();

    for item in frames {
        let frame = match item {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Stopping at frame {}: stream unreadable", frames_seen);
                let _ = sink.flush();
                return Err(e.context("Analysis run aborted mid-stream"));
            }
        };

        if frame.index % step == 0 {
            let analysis = analyzer.analyze(&frame.image);
            if let Some(pos) = analysis.player_coords {
                positions.push((pos.x, pos.y));
            }
            sink.record(&FrameRecord {
                frame_index: frame.index,
                timestamp_secs: frame.timestamp_secs,
                analysis,
            })?;
            frames_analyzed += 1;
        }

        if frames_seen % PROGRESS_SAMPLE_INTERVAL == 0 {
            progress(sample_progress(frames_seen, total_frames));
        }
        frames_seen += 1;
    }

    sink.flush()?;
    progress(RunProgress {
        frames_seen,
        total_frames,
        percent: Some(100),
    });

    let artifact = if positions.len() >= 2 {
        write_trail(
            &assets.world_map,
            &positions,
            &cfg.area_label,
            &cfg.artifact_path,
        )?;
        Some(cfg.artifact_path.clone())
    } else {
        info!(
            "Skipping trail artifact: only {} position(s) recovered",
            positions.len()
        );
        None
    };

    info!(
        "Run complete: {} frames seen, {} analyzed, {} positions",
        frames_seen,
        frames_analyzed,
        positions.len()
    );

    Ok(RunSummary {
        frames_seen,
        frames_analyzed,
        positions_recovered: positions.len(),
        artifact,
    })
}

fn sample_progress(frames_seen: u64, total_frames: Option<u64>) -> RunProgress {
    let percent = total_frames
        .filter(|&t| t > 0)
        .map(|t| ((frames_seen as f64 / t as f64) * 100.0).min(100.0) as u8);
    RunProgress {
        frames_seen,
        total_frames,
        percent,
    }
}

/// Analyze a video file end to end: decode on a blocking task, feed the
/// sequential analysis loop through a bounded channel, and render the trail
/// artifact when the stream ends cleanly.
#[cfg(feature = "video")]
pub async fn run_video<S, P>(
    video_path: &Path,
    cfg: RunConfig,
    mut sink: S,
    progress: P,
) -> Result<RunSummary>
where
    S: ResultSink + Send + 'static,
    P: FnMut(RunProgress) + Send + 'static,
{
    let assets = Arc::new(
        ReferenceAssets::load(&cfg.data_dir).context("Reference assets unavailable")?,
    );

    let video_info = trail_video::video::probe_video(video_path)?;
    info!(
        "Starting analysis of {} ({}x{}, {} frames)",
        video_path.display(),
        video_info.width,
        video_info.height,
        video_info
            .total_frames
            .map(|t| t.to_string())
            .unwrap_or_else(|| "?".to_string())
    );

    let stop = Arc::new(AtomicBool::new(false));
    let (tx, rx) = tokio::sync::mpsc::channel::<Result<DecodedFrame>>(4);

    let decode_path = video_path.to_path_buf();
    let stop_decode = stop.clone();
    let decode = tokio::task::spawn_blocking(move || {
        trail_video::video::decode_video(&decode_path, tx, stop_decode);
    });

    let analyze = tokio::task::spawn_blocking(move || {
        let ocr = TesseractRecognizer::new();
        let mut analyzer = FrameAnalyzer::new(assets.clone(), Box::new(ocr), cfg.floor);
        run_frames(
            ChannelFrames { rx },
            &mut analyzer,
            &assets,
            &cfg,
            &mut sink,
            video_info.total_frames,
            progress,
        )
    });

    let summary = analyze.await.context("Analysis task panicked")?;
    decode.await.context("Decode task panicked")?;
    summary
}

/// Blocking iterator over the decode channel.
#[cfg(feature = "video")]
struct ChannelFrames {
    rx: tokio::sync::mpsc::Receiver<Result<DecodedFrame>>,
}

#[cfg(feature = "video")]
impl Iterator for ChannelFrames {
    type Item = Result<DecodedFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.blocking_recv()
    }
}
