//! Download command - Fetch new alarm videos from Dropbox

use anyhow::{Context, Result};
use bridge_desktop::{ReqwestHttpClient, TokioFileSystem, TokioProcessRunner};
use clap::Args;
use core_runtime::config::{CoreConfig, CoreConfigBuilder};
use core_runtime::events::EventBus;
use core_sync::{SyncConfig, SyncCoordinator};
use core_transcode::Transcoder;
use provider_dropbox::DropboxConnector;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use super::version::VERSION;

#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Destination directory (default: $VIDEO_ROOT_DIR or .)
    #[arg(long)]
    pub dest: Option<PathBuf>,

    /// Remove videos from Dropbox after download
    #[arg(long)]
    pub remove_downloaded: bool,

    /// With --remove-downloaded, also remove videos that were already downloaded
    #[arg(long)]
    pub remove_skipped: bool,

    /// Transcode downloaded videos to mp4 format
    #[arg(long)]
    pub transcode: bool,

    /// Download every revision of each video into its own file
    #[arg(long)]
    pub revisions: bool,

    /// Encoder program (default: $OPTICAM_FFMPEG or ffmpeg)
    #[arg(long)]
    pub ffmpeg: Option<String>,
}

impl DownloadArgs {
    fn config(self) -> Result<CoreConfig> {
        let mut builder = CoreConfigBuilder::from_env()
            .remove_downloaded(self.remove_downloaded)
            .remove_skipped(self.remove_skipped)
            .transcode_after_download(self.transcode)
            .download_revisions(self.revisions);

        if let Some(dest) = self.dest {
            builder = builder.video_root(dest);
        }
        if let Some(program) = self.ffmpeg {
            builder = builder.encoder_program(program);
        }

        Ok(builder.build()?)
    }
}

pub async fn run(args: DownloadArgs) -> Result<()> {
    let config = args.config()?;

    info!(
        "Downloading new surveillance camera videos from Dropbox (opticam-dbx version {})",
        VERSION
    );

    let http_client = Arc::new(ReqwestHttpClient::new().context("Cannot create HTTP client")?);
    let provider = Arc::new(
        DropboxConnector::new(http_client, config.access_token.clone())
            .with_request_timeout(config.request_timeout),
    );
    let file_system = Arc::new(TokioFileSystem::new());
    let event_bus = Arc::new(EventBus::default());

    let mut coordinator = SyncCoordinator::new(
        SyncConfig::from_core(&config),
        provider,
        file_system.clone(),
        event_bus.clone(),
    );

    if config.features.transcode_after_download {
        let transcoder = Transcoder::new(
            Arc::new(TokioProcessRunner::new()),
            file_system,
            config.encoder_program.clone(),
        )
        .with_event_bus(event_bus);
        coordinator = coordinator.with_post_download_hook(Arc::new(transcoder));
    }

    let report = coordinator.run().await.context("Download failed")?;

    info!(
        "Downloaded {} new videos ({} bytes), skipped {}, repaired {}, removed {} from Dropbox",
        report.downloaded, report.bytes, report.skipped, report.repaired, report.removed_remote
    );

    Ok(())
}
