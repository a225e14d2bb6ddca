//! Integration tests for the transcode step
//!
//! The encoder is mocked; source and output files live in a temporary
//! directory so modification times come from the real filesystem.

use async_trait::async_trait;
use bridge_desktop::TokioFileSystem;
use bridge_traits::{
    error::Result as BridgeResult,
    process::{ProcessOutput, ProcessRunner},
};
use core_runtime::events::{CoreEvent, EventBus, EventStream, TranscodeEvent};
use core_sync::{PostDownloadHook, SyncError};
use core_transcode::{TranscodeError, TranscodeOutcome, Transcoder};
use mockall::mock;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

mock! {
    Runner {}

    #[async_trait]
    impl ProcessRunner for Runner {
        async fn run(&self, program: &str, args: &[OsString]) -> BridgeResult<ProcessOutput>;
    }
}

fn exited(code: i32, stderr: &str) -> ProcessOutput {
    ProcessOutput {
        status_code: Some(code),
        stdout: Vec::new(),
        stderr: stderr.as_bytes().to_vec(),
    }
}

fn write_with_mtime(path: &Path, modified: SystemTime) {
    std::fs::write(path, b"data").unwrap();
    std::fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(modified)
        .unwrap();
}

fn transcoder(runner: MockRunner) -> Transcoder {
    Transcoder::new(Arc::new(runner), Arc::new(TokioFileSystem::new()), "ffmpeg")
}

struct Clip {
    _dir: TempDir,
    source: PathBuf,
    output: PathBuf,
}

fn clip() -> Clip {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("2023-06-15 14-30-22.avi");
    let output = dir.path().join("2023-06-15 14-30-22.mp4");
    Clip {
        _dir: dir,
        source,
        output,
    }
}

fn base_time() -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(1_686_839_422)
}

#[tokio::test]
async fn test_missing_output_invokes_encoder() {
    let clip = clip();
    write_with_mtime(&clip.source, base_time());

    let expected_args: Vec<OsString> = vec![
        "-y".into(),
        "-i".into(),
        clip.source.clone().into_os_string(),
        clip.output.clone().into_os_string(),
    ];
    let mut runner = MockRunner::new();
    runner
        .expect_run()
        .withf(move |program, args| program == "ffmpeg" && args == expected_args.as_slice())
        .times(1)
        .returning(|_, _| Ok(exited(0, "")));

    let outcome = transcoder(runner).transcode(&clip.source).await.unwrap();

    assert_eq!(
        outcome,
        TranscodeOutcome::Transcoded {
            destination: clip.output.clone()
        }
    );
}

#[tokio::test]
async fn test_newer_output_is_skipped() {
    let clip = clip();
    write_with_mtime(&clip.source, base_time());
    write_with_mtime(&clip.output, base_time() + Duration::from_secs(60));

    let mut runner = MockRunner::new();
    runner.expect_run().never();

    let outcome = transcoder(runner).transcode(&clip.source).await.unwrap();

    assert_eq!(
        outcome,
        TranscodeOutcome::Skipped {
            destination: clip.output.clone()
        }
    );
}

#[tokio::test]
async fn test_output_with_same_mtime_is_skipped() {
    let clip = clip();
    write_with_mtime(&clip.source, base_time());
    write_with_mtime(&clip.output, base_time());

    let mut runner = MockRunner::new();
    runner.expect_run().never();

    let outcome = transcoder(runner).transcode(&clip.source).await.unwrap();
    assert!(matches!(outcome, TranscodeOutcome::Skipped { .. }));
}

#[tokio::test]
async fn test_updated_source_is_transcoded_again() {
    let clip = clip();
    write_with_mtime(&clip.output, base_time());
    write_with_mtime(&clip.source, base_time() + Duration::from_secs(5));

    let mut runner = MockRunner::new();
    runner.expect_run().times(1).returning(|_, _| Ok(exited(0, "")));

    let outcome = transcoder(runner).transcode(&clip.source).await.unwrap();
    assert_eq!(outcome.destination(), clip.output.as_path());
    assert!(matches!(outcome, TranscodeOutcome::Transcoded { .. }));
}

#[tokio::test]
async fn test_directory_at_output_is_not_treated_as_up_to_date() {
    let clip = clip();
    write_with_mtime(&clip.source, base_time());
    std::fs::create_dir(&clip.output).unwrap();

    let mut runner = MockRunner::new();
    runner
        .expect_run()
        .times(1)
        .returning(|_, _| Ok(exited(1, "Is a directory")));

    let err = transcoder(runner).transcode(&clip.source).await.unwrap_err();
    assert!(matches!(err, TranscodeError::EncoderFailed { .. }));
}

#[tokio::test]
async fn test_encoder_failure_carries_output() {
    let clip = clip();
    write_with_mtime(&clip.source, base_time());

    let mut runner = MockRunner::new();
    runner.expect_run().returning(|_, _| {
        Ok(ProcessOutput {
            status_code: Some(1),
            stdout: b"ffmpeg version 6.0".to_vec(),
            stderr: b"Invalid data found when processing input".to_vec(),
        })
    });

    let bus = Arc::new(EventBus::new(16));
    let mut events = EventStream::new(bus.subscribe());
    let err = transcoder(runner)
        .with_event_bus(bus.clone())
        .transcode(&clip.source)
        .await
        .unwrap_err();

    match err {
        TranscodeError::EncoderFailed {
            source_path,
            status,
            stdout,
            stderr,
        } => {
            assert_eq!(source_path, clip.source);
            assert_eq!(status, Some(1));
            assert_eq!(stdout, "ffmpeg version 6.0");
            assert_eq!(stderr, "Invalid data found when processing input");
        }
        other => panic!("unexpected error: {:?}", other),
    }

    let events = events.drain();
    assert!(matches!(
        events.as_slice(),
        [
            CoreEvent::Transcode(TranscodeEvent::Started { .. }),
            CoreEvent::Transcode(TranscodeEvent::Failed { .. })
        ]
    ));
}

#[tokio::test]
async fn test_missing_source_is_invalid() {
    let clip = clip();
    let mut runner = MockRunner::new();
    runner.expect_run().never();

    let err = transcoder(runner).transcode(&clip.source).await.unwrap_err();
    assert!(matches!(err, TranscodeError::InvalidSource { path } if path == clip.source));
}

#[tokio::test]
async fn test_batch_stops_at_first_failure() {
    let first = clip();
    let second = clip();
    write_with_mtime(&first.source, base_time());
    write_with_mtime(&second.source, base_time());

    let mut runner = MockRunner::new();
    runner
        .expect_run()
        .times(1)
        .returning(|_, _| Ok(exited(69, "unsupported codec")));

    let result = transcoder(runner)
        .transcode_all(&[first.source.clone(), second.source.clone()])
        .await;

    assert!(matches!(
        result,
        Err(TranscodeError::EncoderFailed { status: Some(69), .. })
    ));
}

#[tokio::test]
async fn test_batch_reports_each_outcome() {
    let fresh = clip();
    let done = clip();
    write_with_mtime(&fresh.source, base_time());
    write_with_mtime(&done.source, base_time());
    write_with_mtime(&done.output, base_time() + Duration::from_secs(1));

    let mut runner = MockRunner::new();
    runner.expect_run().times(1).returning(|_, _| Ok(exited(0, "")));

    let outcomes = transcoder(runner)
        .transcode_all(&[&fresh.source, &done.source])
        .await
        .unwrap();

    assert!(matches!(outcomes[0], TranscodeOutcome::Transcoded { .. }));
    assert!(matches!(outcomes[1], TranscodeOutcome::Skipped { .. }));
}

#[tokio::test]
async fn test_post_download_hook_maps_errors() {
    let clip = clip();
    write_with_mtime(&clip.source, base_time());

    let mut runner = MockRunner::new();
    runner
        .expect_run()
        .returning(|_, _| Ok(exited(1, "broken pipe")));

    let hook: Arc<dyn PostDownloadHook> = Arc::new(transcoder(runner));
    let err = hook.after_download(&clip.source).await.unwrap_err();

    match err {
        SyncError::Hook(message) => assert!(message.contains("broken pipe")),
        other => panic!("unexpected error: {:?}", other),
    }
}
