pub mod runner;

#[cfg(feature = "video")]
pub use runner::run_video;
pub use runner::{run_frames, RunConfig, RunProgress, RunSummary, PROGRESS_SAMPLE_INTERVAL};

/// Install the default tracing subscriber for the CLI.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "trailscope=debug,trail_vision=debug,trail_video=debug".into()
            }),
        )
        .init();
}
