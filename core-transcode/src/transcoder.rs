//! Transcode step
//!
//! The output path is the source path with its extension replaced by the
//! target extension. The encoder is invoked as
//! `<program> -y -i <source> <destination>` with its output captured.

use crate::error::{Result, TranscodeError};
use async_trait::async_trait;
use bridge_traits::{process::ProcessRunner, storage::FileSystemAccess};
use core_runtime::events::{CoreEvent, EventBus, TranscodeEvent};
use core_sync::{PostDownloadHook, SyncError};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Container extension produced by default
pub const DEFAULT_TARGET_EXTENSION: &str = "mp4";

/// Result of a single transcode request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TranscodeOutcome {
    /// The encoder produced `destination`
    Transcoded { destination: PathBuf },
    /// `destination` was already up to date
    Skipped { destination: PathBuf },
}

impl TranscodeOutcome {
    pub fn destination(&self) -> &Path {
        match self {
            TranscodeOutcome::Transcoded { destination }
            | TranscodeOutcome::Skipped { destination } => destination,
        }
    }
}

/// Runs an external encoder over local video files
pub struct Transcoder {
    runner: Arc<dyn ProcessRunner>,
    file_system: Arc<dyn FileSystemAccess>,
    program: String,
    target_extension: String,
    event_bus: Option<Arc<EventBus>>,
}

impl Transcoder {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        file_system: Arc<dyn FileSystemAccess>,
        program: impl Into<String>,
    ) -> Self {
        Self {
            runner,
            file_system,
            program: program.into(),
            target_extension: DEFAULT_TARGET_EXTENSION.to_string(),
            event_bus: None,
        }
    }

    pub fn with_target_extension(mut self, extension: impl Into<String>) -> Self {
        self.target_extension = extension.into();
        self
    }

    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Sibling output path of `source`
    pub fn destination_for(&self, source: &Path) -> PathBuf {
        source.with_extension(&self.target_extension)
    }

    /// Transcode `source` unless its output is already up to date.
    ///
    /// # Errors
    ///
    /// - [`TranscodeError::InvalidSource`] if `source` is not a regular file
    ///   or already carries the target extension
    /// - [`TranscodeError::Spawn`] if the encoder cannot be started
    /// - [`TranscodeError::EncoderFailed`] if it exits unsuccessfully
    #[instrument(skip_all, fields(source = %source.display()))]
    pub async fn transcode(&self, source: &Path) -> Result<TranscodeOutcome> {
        let destination = self.destination_for(source);
        if destination == source {
            return Err(TranscodeError::InvalidSource {
                path: source.to_path_buf(),
            });
        }

        let source_meta = self
            .file_system
            .metadata(source)
            .await
            .map_err(|e| TranscodeError::Filesystem(format!("{}: {}", source.display(), e)))?
            .filter(|meta| meta.is_file())
            .ok_or_else(|| TranscodeError::InvalidSource {
                path: source.to_path_buf(),
            })?;

        let dest_meta = self
            .file_system
            .metadata(&destination)
            .await
            .map_err(|e| TranscodeError::Filesystem(format!("{}: {}", destination.display(), e)))?;

        let up_to_date = match (dest_meta, source_meta.modified_at) {
            (Some(dest), Some(source_modified)) if dest.is_file() => dest
                .modified_at
                .map_or(false, |dest_modified| dest_modified >= source_modified),
            _ => false,
        };

        if up_to_date {
            info!(
                "Not transcoding {} to {} as the source is older than destination",
                source.display(),
                destination.display()
            );
            self.emit(TranscodeEvent::Skipped {
                source: source.display().to_string(),
                destination: destination.display().to_string(),
            });
            return Ok(TranscodeOutcome::Skipped { destination });
        }

        info!("Transcoding {} to {}", source.display(), destination.display());
        self.emit(TranscodeEvent::Started {
            source: source.display().to_string(),
            destination: destination.display().to_string(),
        });

        let started = Instant::now();
        match self.encode(source, &destination).await {
            Ok(()) => {
                self.emit(TranscodeEvent::Completed {
                    source: source.display().to_string(),
                    destination: destination.display().to_string(),
                    duration_ms: started.elapsed().as_millis() as u64,
                });
                Ok(TranscodeOutcome::Transcoded { destination })
            }
            Err(e) => {
                self.emit(TranscodeEvent::Failed {
                    source: source.display().to_string(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Transcode every source in order, stopping at the first failure
    pub async fn transcode_all<P: AsRef<Path>>(&self, sources: &[P]) -> Result<Vec<TranscodeOutcome>> {
        let mut outcomes = Vec::with_capacity(sources.len());
        for source in sources {
            outcomes.push(self.transcode(source.as_ref()).await?);
        }
        Ok(outcomes)
    }

    async fn encode(&self, source: &Path, destination: &Path) -> Result<()> {
        let args: Vec<OsString> = vec![
            "-y".into(),
            "-i".into(),
            source.as_os_str().to_owned(),
            destination.as_os_str().to_owned(),
        ];

        let output = self
            .runner
            .run(&self.program, &args)
            .await
            .map_err(|e| TranscodeError::Spawn {
                program: self.program.clone(),
                message: e.to_string(),
            })?;

        if !output.success() {
            return Err(TranscodeError::EncoderFailed {
                source_path: source.to_path_buf(),
                status: output.status_code,
                stdout: output.stdout_lossy(),
                stderr: output.stderr_lossy(),
            });
        }

        debug!(stderr_bytes = output.stderr.len(), "Encoder finished");
        Ok(())
    }

    fn emit(&self, event: TranscodeEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Transcode(event)).ok();
        }
    }
}

#[async_trait]
impl PostDownloadHook for Transcoder {
    async fn after_download(&self, destination: &Path) -> core_sync::Result<()> {
        self.transcode(destination)
            .await
            .map(|_| ())
            .map_err(|e| SyncError::Hook(e.to_string()))
    }
}
