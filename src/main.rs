//! Analyze a gameplay recording: per-frame positions, vitals and battle
//! list to a JSON-lines file, plus a rendered trail map when the run ends.
//!
//! Usage: trailscope <video.mp4> [--data-dir DIR] [--out trail.png]
//!                   [--records records.jsonl] [--skip N] [--floor Z]
//!
//! Video decoding needs the `video` feature (ffmpeg).

use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    trailscope::init_tracing();
    run().await
}

#[cfg(feature = "video")]
struct CliArgs {
    video: std::path::PathBuf,
    records: std::path::PathBuf,
    config: trailscope::RunConfig,
}

#[cfg(feature = "video")]
fn expect_value(args: &mut impl Iterator<Item = String>, flag: &str) -> Result<String> {
    args.next()
        .ok_or_else(|| anyhow::anyhow!("{} needs a value", flag))
}

#[cfg(feature = "video")]
fn parse_args() -> Result<CliArgs> {
    use anyhow::bail;
    use std::path::PathBuf;

    let mut args = std::env::args().skip(1);
    let mut video: Option<PathBuf> = None;
    let mut records = PathBuf::from("records.jsonl");
    let mut config = trailscope::RunConfig::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--data-dir" => {
                config.data_dir = PathBuf::from(expect_value(&mut args, "--data-dir")?)
            }
            "--out" => config.artifact_path = PathBuf::from(expect_value(&mut args, "--out")?),
            "--records" => records = PathBuf::from(expect_value(&mut args, "--records")?),
            "--skip" => config.frame_skip = expect_value(&mut args, "--skip")?.parse()?,
            "--floor" => config.floor = expect_value(&mut args, "--floor")?.parse()?,
            "--label" => config.area_label = expect_value(&mut args, "--label")?,
            other => {
                if video.is_none() {
                    video = Some(PathBuf::from(other));
                } else {
                    bail!("Unexpected argument: {}", other);
                }
            }
        }
    }

    let Some(video) = video else {
        bail!(
            "Usage: trailscope <video> [--data-dir DIR] [--out PATH] [--records PATH] [--skip N] [--floor Z] [--label TEXT]"
        );
    };

    Ok(CliArgs {
        video,
        records,
        config,
    })
}

#[cfg(feature = "video")]
async fn run() -> Result<()> {
    use anyhow::bail;
    use tracing::info;
    use trail_state::JsonLinesSink;
    use trailscope::run_video;

    let cli = parse_args()?;
    if !cli.video.exists() {
        bail!("Video file not found: {}", cli.video.display());
    }

    let sink = JsonLinesSink::create(&cli.records)?;

    let summary = run_video(&cli.video, cli.config, sink, |p| {
        if let Some(percent) = p.percent {
            info!("Progress: {}% ({} frames)", percent, p.frames_seen);
        }
    })
    .await?;

    info!(
        "Done: {} frames analyzed, {} positions recovered",
        summary.frames_analyzed, summary.positions_recovered
    );
    match summary.artifact {
        Some(path) => info!("Trail map: {}", path.display()),
        None => info!("No trail map: not enough recovered positions"),
    }

    Ok(())
}

#[cfg(not(feature = "video"))]
async fn run() -> Result<()> {
    anyhow::bail!("trailscope was built without video decoding; rebuild with `--features video`")
}
