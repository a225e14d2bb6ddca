//! Transcode command - Convert local AVIs to mp4

use anyhow::{Context, Result};
use bridge_desktop::{TokioFileSystem, TokioProcessRunner};
use clap::Args;
use core_runtime::config::{DEFAULT_ENCODER, ENV_FFMPEG};
use core_transcode::{TranscodeOutcome, Transcoder};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Args, Debug)]
pub struct TranscodeArgs {
    /// Video to transcode
    #[arg(required = true)]
    pub videos: Vec<PathBuf>,

    /// Encoder program (default: $OPTICAM_FFMPEG or ffmpeg)
    #[arg(long)]
    pub ffmpeg: Option<String>,
}

impl TranscodeArgs {
    fn program(&self) -> String {
        self.ffmpeg
            .clone()
            .or_else(|| std::env::var(ENV_FFMPEG).ok().filter(|p| !p.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_ENCODER.to_string())
    }
}

/// Transcodes every video in order and stops at the first failure
pub async fn run(args: TranscodeArgs) -> Result<()> {
    let transcoder = Transcoder::new(
        Arc::new(TokioProcessRunner::new()),
        Arc::new(TokioFileSystem::new()),
        args.program(),
    );

    let outcomes = transcoder
        .transcode_all(args.videos.as_slice())
        .await
        .context("Transcode failed")?;

    let transcoded = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, TranscodeOutcome::Transcoded { .. }))
        .count();
    info!(
        "Transcoded {} of {} videos",
        transcoded,
        outcomes.len()
    );

    Ok(())
}
