use crate::config::ReceiverConfig;
use crate::mock::{MockSdk, RecordingWriter};
use crate::receiver::{AudioReceiver, ReceiverContext, ReceiverExit, VideoReceiver};
use common::{MediaKind, SdkError};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

const POLL: Duration = Duration::from_millis(10);

fn receiver_config() -> ReceiverConfig {
    ReceiverConfig {
        poll_interval: POLL,
        audio_buffer_threshold: 1,
        ..ReceiverConfig::default()
    }
}

fn context(sdk: &Arc<MockSdk>, config: ReceiverConfig, cancel: &CancellationToken) -> ReceiverContext {
    ReceiverContext {
        sdk: sdk.clone(),
        av_index: 3,
        config,
        cancel: cancel.clone(),
    }
}

#[tokio::test]
async fn test_video_payloads_arrive_in_production_order() {
    let sdk = Arc::new(MockSdk::new());
    sdk.push_frame(MediaKind::Video, b"V1-sps-pps-idr|")
        .push_frame(MediaKind::Video, b"V2-p|")
        .push_frame(MediaKind::Video, b"V3-p|")
        .push_error(MediaKind::Video, SdkError::AvSessionClosedByRemote);

    let writer = RecordingWriter::new();
    let cancel = CancellationToken::new();
    let report = VideoReceiver::new(context(&sdk, receiver_config(), &cancel))
        .run(writer.clone())
        .await;

    assert_eq!(writer.data(), b"V1-sps-pps-idr|V2-p|V3-p|");
    assert_eq!(report.kind, MediaKind::Video);
    assert_eq!(report.frames, 3);
    assert_eq!(report.bytes, writer.data().len() as u64);
    assert_eq!(
        report.exit,
        ReceiverExit::SessionEnded(SdkError::AvSessionClosedByRemote)
    );
}

#[tokio::test(start_paused = true)]
async fn test_no_data_is_retried_after_backoff() {
    const NOT_READY: usize = 20;

    let sdk = Arc::new(MockSdk::new());
    for _ in 0..NOT_READY {
        sdk.push_error(MediaKind::Video, SdkError::AvDataNotReady);
    }
    sdk.push_error(MediaKind::Video, SdkError::AvRemoteTimeoutDisconnect);

    let writer = RecordingWriter::new();
    let cancel = CancellationToken::new();
    let started = Instant::now();
    let report = VideoReceiver::new(context(&sdk, receiver_config(), &cancel))
        .run(writer.clone())
        .await;

    assert_eq!(sdk.video_polls.load(Ordering::SeqCst), NOT_READY + 1);
    assert!(started.elapsed() >= POLL * NOT_READY as u32);
    assert_eq!(writer.writes(), 0);
    assert_eq!(report.frames, 0);
    assert_eq!(
        report.exit,
        ReceiverExit::SessionEnded(SdkError::AvRemoteTimeoutDisconnect)
    );
}

#[tokio::test(start_paused = true)]
async fn test_video_keeps_polling_after_non_terminal_errors() {
    let sdk = Arc::new(MockSdk::new());
    sdk.push_error(MediaKind::Video, SdkError::AvIncompleteFrame)
        .push_error(MediaKind::Video, SdkError::AvTimeout)
        .push_frame(MediaKind::Video, b"V1")
        .push_error(MediaKind::Video, SdkError::AvInvalidSessionId);

    let writer = RecordingWriter::new();
    let cancel = CancellationToken::new();
    let report = VideoReceiver::new(context(&sdk, receiver_config(), &cancel))
        .run(writer.clone())
        .await;

    assert_eq!(writer.data(), b"V1");
    assert_eq!(report.exit, ReceiverExit::SessionEnded(SdkError::AvInvalidSessionId));
}

#[tokio::test(start_paused = true)]
async fn test_terminal_video_closes_write_end_once_and_leaves_audio_running() {
    let sdk = Arc::new(MockSdk::new());
    sdk.push_error(MediaKind::Video, SdkError::AvSessionClosedByRemote);
    sdk.push_frame(MediaKind::Audio, b"A1|");

    let cancel = CancellationToken::new();
    let video_writer = RecordingWriter::new();
    let audio_writer = RecordingWriter::new();

    let video = tokio::spawn(
        VideoReceiver::new(context(&sdk, receiver_config(), &cancel)).run(video_writer.clone()),
    );
    let audio = tokio::spawn(
        AudioReceiver::new(context(&sdk, receiver_config(), &cancel)).run(audio_writer.clone()),
    );

    let video_report = video.await.unwrap();
    assert!(matches!(video_report.exit, ReceiverExit::SessionEnded(_)));
    assert_eq!(video_writer.shutdowns(), 1);
    assert_eq!(video_writer.other_handles(), 0);

    // Audio still delivers what arrives after the video stream ended
    tokio::time::sleep(Duration::from_millis(50)).await;
    sdk.push_frame(MediaKind::Audio, b"A2|");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!audio.is_finished());

    cancel.cancel();
    let audio_report = audio.await.unwrap();
    assert_eq!(audio_report.exit, ReceiverExit::Shutdown);
    assert_eq!(audio_writer.data(), b"A1|A2|");
    assert_eq!(audio_writer.shutdowns(), 1);

    // No cross-talk between the streams
    assert!(video_writer.data().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_lost_audio_frame_is_skipped_without_backoff() {
    let sdk = Arc::new(MockSdk::new());
    sdk.push_error(MediaKind::Audio, SdkError::AvFrameLost)
        .push_frame(MediaKind::Audio, b"A1")
        .push_error(MediaKind::Audio, SdkError::AvSessionClosedByRemote);

    let writer = RecordingWriter::new();
    let cancel = CancellationToken::new();
    let started = Instant::now();
    let report = AudioReceiver::new(context(&sdk, receiver_config(), &cancel))
        .run(writer.clone())
        .await;

    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(sdk.audio_polls.load(Ordering::SeqCst), 3);
    assert_eq!(writer.data(), b"A1");
    assert_eq!(report.frames, 1);
    assert_eq!(
        report.exit,
        ReceiverExit::SessionEnded(SdkError::AvSessionClosedByRemote)
    );
}

#[tokio::test(start_paused = true)]
async fn test_audio_waits_for_buffer_threshold() {
    let sdk = Arc::new(MockSdk::new());
    for _ in 0..3 {
        sdk.push_frame(MediaKind::Audio, b"A");
    }

    let writer = RecordingWriter::new();
    let cancel = CancellationToken::new();
    let config = ReceiverConfig {
        audio_buffer_threshold: 25,
        ..receiver_config()
    };
    let task = tokio::spawn(AudioReceiver::new(context(&sdk, config, &cancel)).run(writer.clone()));

    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();
    let report = task.await.unwrap();

    assert_eq!(sdk.audio_polls.load(Ordering::SeqCst), 0);
    assert!(sdk.audio_buffer_checks.load(Ordering::SeqCst) >= 5);
    assert_eq!(report.frames, 0);
    assert_eq!(report.exit, ReceiverExit::Shutdown);
}

#[tokio::test]
async fn test_failed_audio_buffer_query_ends_loop() {
    let sdk = Arc::new(MockSdk::new());
    sdk.fail_audio_buffer_check(SdkError::AvInvalidSessionId);
    let cancel = CancellationToken::new();
    let report = AudioReceiver::new(context(&sdk, receiver_config(), &cancel))
        .run(RecordingWriter::new())
        .await;
    assert_eq!(report.exit, ReceiverExit::SessionEnded(SdkError::AvInvalidSessionId));

    let sdk = Arc::new(MockSdk::new());
    sdk.fail_audio_buffer_check(SdkError::AvNotInitialized);
    let report = AudioReceiver::new(context(&sdk, receiver_config(), &cancel))
        .run(RecordingWriter::new())
        .await;
    assert_eq!(report.exit, ReceiverExit::SdkFailure(SdkError::AvNotInitialized));
}

#[tokio::test]
async fn test_cancel_lets_in_flight_write_complete() {
    let payload: Vec<u8> = (0u8..16).collect();
    let sdk = Arc::new(MockSdk::new());
    sdk.push_frame(MediaKind::Video, &payload);

    // Four bytes of buffering: the write stays pending until we read
    let (writer, mut reader) = tokio::io::duplex(4);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(VideoReceiver::new(context(&sdk, receiver_config(), &cancel)).run(writer));

    let mut received = vec![0u8; 4];
    reader.read_exact(&mut received).await.unwrap();
    cancel.cancel();
    reader.read_to_end(&mut received).await.unwrap();

    let report = task.await.unwrap();
    assert_eq!(received, payload);
    assert_eq!(report.frames, 1);
    assert_eq!(report.exit, ReceiverExit::Shutdown);
}

#[tokio::test]
async fn test_cancelled_receiver_does_not_poll() {
    let sdk = Arc::new(MockSdk::new());
    sdk.push_frame(MediaKind::Video, b"V1");

    let writer = RecordingWriter::new();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = VideoReceiver::new(context(&sdk, receiver_config(), &cancel))
        .run(writer.clone())
        .await;

    assert_eq!(report.exit, ReceiverExit::Shutdown);
    assert_eq!(sdk.video_polls.load(Ordering::SeqCst), 0);
    assert_eq!(writer.shutdowns(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_write_failures_reset_after_success() {
    let sdk = Arc::new(MockSdk::new());
    for payload in [b"V1|", b"V2|", b"V3|", b"V4|"] {
        sdk.push_frame(MediaKind::Video, payload);
    }
    sdk.push_error(MediaKind::Video, SdkError::AvSessionClosedByRemote);

    let writer = RecordingWriter::new();
    writer.fail_next(2);
    let cancel = CancellationToken::new();
    let config = ReceiverConfig {
        max_consecutive_write_failures: 3,
        ..receiver_config()
    };
    let report = VideoReceiver::new(context(&sdk, config, &cancel))
        .run(writer.clone())
        .await;

    assert_eq!(writer.data(), b"V3|V4|");
    assert_eq!(report.frames, 2);
    assert!(matches!(report.exit, ReceiverExit::SessionEnded(_)));
}

#[tokio::test(start_paused = true)]
async fn test_sustained_write_failures_end_receiver() {
    let sdk = Arc::new(MockSdk::new());
    for _ in 0..10 {
        sdk.push_frame(MediaKind::Audio, b"A");
    }

    let writer = RecordingWriter::new();
    writer.fail_always();
    let cancel = CancellationToken::new();
    let config = ReceiverConfig {
        max_consecutive_write_failures: 3,
        ..receiver_config()
    };
    let report = AudioReceiver::new(context(&sdk, config, &cancel))
        .run(writer.clone())
        .await;

    assert_eq!(report.exit, ReceiverExit::PipeBroken { failures: 3 });
    assert_eq!(sdk.audio_polls.load(Ordering::SeqCst), 3);
    assert_eq!(writer.shutdowns(), 1);
}
