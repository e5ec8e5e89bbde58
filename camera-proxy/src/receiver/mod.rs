mod audio;
mod video;

pub use audio::AudioReceiver;
pub use video::VideoReceiver;

use crate::config::ReceiverConfig;
use crate::sdk::AvSdk;
use common::{CodecId, Frame, MediaKind, SdkError};
use std::fmt;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Why a receiver loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverExit {
    /// Cooperative shutdown was requested
    Shutdown,
    /// The SDK reported a session-terminal condition
    SessionEnded(SdkError),
    /// A non-terminal SDK failure that the loop cannot continue past
    SdkFailure(SdkError),
    /// Too many consecutive pipe write failures
    PipeBroken { failures: u32 },
}

impl fmt::Display for ReceiverExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReceiverExit::Shutdown => write!(f, "shutdown requested"),
            ReceiverExit::SessionEnded(err) => write!(f, "session ended: {} [{}]", err, err.name()),
            ReceiverExit::SdkFailure(err) => write!(f, "SDK failure: {} [{}]", err, err.name()),
            ReceiverExit::PipeBroken { failures } => {
                write!(f, "pipe broken after {} failed writes", failures)
            }
        }
    }
}

/// Totals reported when a receiver finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiverReport {
    pub kind: MediaKind,
    pub frames: u64,
    pub bytes: u64,
    pub exit: ReceiverExit,
}

/// What a receiver needs from the session.
///
/// The two receivers share nothing but the cancellation token.
#[derive(Clone)]
pub struct ReceiverContext {
    pub sdk: Arc<dyn AvSdk>,
    pub av_index: i32,
    pub config: ReceiverConfig,
    pub cancel: CancellationToken,
}

pub(crate) enum WriteOutcome {
    Written,
    Failed,
    GaveUp(u32),
}

/// Owns the pipe write end of one receiver
pub(crate) struct FrameForwarder<W> {
    kind: MediaKind,
    writer: W,
    frames: u64,
    bytes: u64,
    consecutive_failures: u32,
    max_failures: u32,
    codec_checked: bool,
}

impl<W: AsyncWrite + Unpin> FrameForwarder<W> {
    pub(crate) fn new(kind: MediaKind, writer: W, max_failures: u32) -> Self {
        Self {
            kind,
            writer,
            frames: 0,
            bytes: 0,
            consecutive_failures: 0,
            max_failures: max_failures.max(1),
            codec_checked: false,
        }
    }

    pub(crate) async fn forward(&mut self, frame: &Frame<'_>) -> WriteOutcome {
        self.check_codec(frame);

        match self.writer.write_all(frame.payload).await {
            Ok(()) => {
                self.frames += 1;
                self.bytes += frame.len() as u64;
                self.consecutive_failures = 0;
                if self.frames % 500 == 0 {
                    debug!(
                        "📤 {} frame #{} forwarded ({} bytes total)",
                        self.kind, frame.frame_no, self.bytes
                    );
                }
                WriteOutcome::Written
            }
            Err(e) => {
                self.consecutive_failures += 1;
                warn!(
                    "Failed to write {} frame #{} ({} bytes): {}",
                    self.kind,
                    frame.frame_no,
                    frame.len(),
                    e
                );
                if self.consecutive_failures >= self.max_failures {
                    WriteOutcome::GaveUp(self.consecutive_failures)
                } else {
                    WriteOutcome::Failed
                }
            }
        }
    }

    /// Warn once when the stream is not in the format the transcoder reads.
    ///
    /// Returns true when the warning was emitted.
    fn check_codec(&mut self, frame: &Frame<'_>) -> bool {
        if self.codec_checked {
            return false;
        }
        self.codec_checked = true;

        let expected = match self.kind {
            MediaKind::Video => CodecId::VIDEO_H264,
            MediaKind::Audio => CodecId::AUDIO_PCM,
        };
        if frame.info.codec_id != expected {
            warn!(
                "⚠️  {} codec is {} ({:#04x}), transcoder input expects {}",
                self.kind,
                frame.info.codec_name(),
                frame.info.codec_id,
                match self.kind {
                    MediaKind::Video => "h264",
                    MediaKind::Audio => "pcm",
                }
            );
            return true;
        }
        false
    }

    /// Shut down and drop the write end so the reader sees end-of-stream.
    pub(crate) async fn finish(mut self, exit: ReceiverExit) -> ReceiverReport {
        if let Err(e) = self.writer.shutdown().await {
            debug!("Closing {} pipe: {}", self.kind, e);
        }
        drop(self.writer);

        info!(
            "{} receiver stopped: {} ({} frames, {} bytes)",
            self.kind, exit, self.frames, self.bytes
        );

        ReceiverReport {
            kind: self.kind,
            frames: self.frames,
            bytes: self.bytes,
            exit,
        }
    }
}
