use crate::DecodedFrame;
use anyhow::{Context, Result};
use image::RgbaImage;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Basic stream properties read without decoding the whole file.
#[derive(Debug, Clone, Copy)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    /// Container frame count, when the format records one.
    pub total_frames: Option<u64>,
}

/// Open the file just far enough to read stream properties.
pub fn probe_video(path: &Path) -> Result<VideoInfo> {
    ffmpeg_next::init()?;

    let ictx = ffmpeg_next::format::input(path)
        .with_context(|| format!("Failed to open video {}", path.display()))?;
    let stream = ictx
        .streams()
        .best(ffmpeg_next::media::Type::Video)
        .ok_or_else(|| anyhow::anyhow!("No video stream in {}", path.display()))?;

    let params = stream.parameters();
    let decoder_ctx = ffmpeg_next::codec::context::Context::from_parameters(params)?;
    let decoder = decoder_ctx.decoder().video()?;

    let frames = stream.frames();
    Ok(VideoInfo {
        width: decoder.width(),
        height: decoder.height(),
        total_frames: if frames > 0 {
            Some(frames as u64)
        } else {
            None
        },
    })
}

/// Decode a video sequentially on the calling (blocking) thread, sending each
/// frame through the channel in presentation order. A decode failure is sent
/// in-band so the receiving side sees exactly where the stream became
/// unreadable; frames already sent stay valid.
pub fn decode_video(
    path: &Path,
    tx: mpsc::Sender<Result<DecodedFrame>>,
    stop: Arc<AtomicBool>,
) {
    if let Err(e) = decode_inner(path, &tx, stop) {
        warn!("Video decode failed: {:#}", e);
        let _ = tx.blocking_send(Err(e));
    }
}

fn decode_inner(
    path: &Path,
    tx: &mpsc::Sender<Result<DecodedFrame>>,
    stop: Arc<AtomicBool>,
) -> Result<()> {
    ffmpeg_next::init()?;

    let mut ictx = ffmpeg_next::format::input(path)
        .with_context(|| format!("Failed to open video {}", path.display()))?;

    let video_stream = ictx
        .streams()
        .best(ffmpeg_next::media::Type::Video)
        .ok_or_else(|| anyhow::anyhow!("No video stream found"))?;

    let stream_index = video_stream.index();
    let time_base = f64::from(video_stream.time_base());
    let frame_rate = f64::from(video_stream.avg_frame_rate());
    let decoder_ctx =
        ffmpeg_next::codec::context::Context::from_parameters(video_stream.parameters())?;
    let mut decoder = decoder_ctx.decoder().video()?;

    let mut scaler = ffmpeg_next::software::scaling::Context::get(
        decoder.format(),
        decoder.width(),
        decoder.height(),
        ffmpeg_next::format::Pixel::RGBA,
        decoder.width(),
        decoder.height(),
        ffmpeg_next::software::scaling::Flags::BILINEAR,
    )?;

    info!(
        "Video opened: {}x{}, format {:?}",
        decoder.width(),
        decoder.height(),
        decoder.format()
    );

    let width = decoder.width();
    let height = decoder.height();
    let mut frame_index = 0u64;

    let mut forward = |decoded: &ffmpeg_next::frame::Video,
                       scaler: &mut ffmpeg_next::software::scaling::Context|
     -> Result<bool> {
        let mut rgba_frame = ffmpeg_next::frame::Video::empty();
        scaler.run(decoded, &mut rgba_frame)?;

        let data = rgba_frame.data(0);
        let stride = rgba_frame.stride(0);

        // Copy row-by-row in case stride != width*4
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for y in 0..height as usize {
            let row_start = y * stride;
            let row_end = row_start + (width as usize * 4);
            pixels.extend_from_slice(&data[row_start..row_end]);
        }

        let timestamp_secs = match decoded.timestamp() {
            Some(ts) => ts as f64 * time_base,
            None if frame_rate > 0.0 => frame_index as f64 / frame_rate,
            None => 0.0,
        };

        if let Some(image) = RgbaImage::from_raw(width, height, pixels) {
            let frame = DecodedFrame {
                index: frame_index,
                timestamp_secs,
                image,
            };
            frame_index += 1;
            if tx.blocking_send(Ok(frame)).is_err() {
                // Receiver dropped
                return Ok(false);
            }
        }
        Ok(true)
    };

    for (stream, packet) in ictx.packets() {
        if stop.load(Ordering::Relaxed) {
            return Ok(());
        }

        if stream.index() != stream_index {
            continue;
        }

        decoder.send_packet(&packet)?;

        let mut decoded_frame = ffmpeg_next::frame::Video::empty();
        while decoder.receive_frame(&mut decoded_frame).is_ok() {
            if stop.load(Ordering::Relaxed) {
                return Ok(());
            }
            if !forward(&decoded_frame, &mut scaler)? {
                return Ok(());
            }
        }
    }

    // Flush decoder
    decoder.send_eof()?;
    let mut decoded_frame = ffmpeg_next::frame::Video::empty();
    while decoder.receive_frame(&mut decoded_frame).is_ok() {
        if stop.load(Ordering::Relaxed) {
            return Ok(());
        }
        if !forward(&decoded_frame, &mut scaler)? {
            return Ok(());
        }
    }

    info!("Video decode complete: {} frames", frame_index);
    Ok(())
}
