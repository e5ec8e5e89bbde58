use super::{FrameForwarder, ReceiverContext, ReceiverExit, ReceiverReport, WriteOutcome};
use crate::sdk::log_sdk_error;
use common::{ErrorClass, Frame, MediaKind};
use tokio::io::AsyncWrite;
use tracing::{debug, info, warn};

/// Pulls PCM frames and writes them to the audio pipe.
///
/// Frames are only read once the SDK has buffered at least
/// `audio_buffer_threshold` of them.
pub struct AudioReceiver {
    ctx: ReceiverContext,
}

impl AudioReceiver {
    pub fn new(ctx: ReceiverContext) -> Self {
        Self { ctx }
    }

    pub async fn run<W: AsyncWrite + Unpin>(self, writer: W) -> ReceiverReport {
        let ReceiverContext {
            sdk,
            av_index,
            config,
            cancel,
        } = self.ctx;

        info!("Audio receiver started (AV index {})", av_index);

        let mut buf = vec![0u8; config.audio_buffer_size];
        let mut forwarder = FrameForwarder::new(
            MediaKind::Audio,
            writer,
            config.max_consecutive_write_failures,
        );

        let exit = loop {
            if cancel.is_cancelled() {
                break ReceiverExit::Shutdown;
            }

            match sdk.check_audio_buf(av_index) {
                Ok(buffered) if buffered < config.audio_buffer_threshold => {
                    tokio::time::sleep(config.poll_interval).await;
                    continue;
                }
                Ok(_) => {}
                Err(err) => {
                    log_sdk_error("audio buffer", &err);
                    break if err.is_terminal() {
                        ReceiverExit::SessionEnded(err)
                    } else {
                        ReceiverExit::SdkFailure(err)
                    };
                }
            }

            match sdk.recv_audio_frame(av_index, &mut buf) {
                Ok(received) => {
                    let len = received.len.min(buf.len());
                    let frame = Frame::new(
                        MediaKind::Audio,
                        received.frame_no,
                        received.info,
                        &buf[..len],
                    );

                    if cancel.is_cancelled() {
                        break ReceiverExit::Shutdown;
                    }

                    match forwarder.forward(&frame).await {
                        WriteOutcome::Written => {}
                        WriteOutcome::Failed => tokio::time::sleep(config.poll_interval).await,
                        WriteOutcome::GaveUp(failures) => {
                            break ReceiverExit::PipeBroken { failures }
                        }
                    }
                }
                Err(err) => match err.class() {
                    // Skip it and ask again right away
                    ErrorClass::FrameLost => {
                        debug!("[audio receiver] {}", err.name());
                    }
                    ErrorClass::NoData => tokio::time::sleep(config.poll_interval).await,
                    ErrorClass::SessionTerminal => {
                        warn!("[audio receiver] {}: {}", err.name(), err);
                        break ReceiverExit::SessionEnded(err);
                    }
                    ErrorClass::Failure => {
                        debug!("[audio receiver] {} ({}): {}", err.name(), err.code(), err);
                        tokio::time::sleep(config.poll_interval).await;
                    }
                },
            }
        };

        forwarder.finish(exit).await
    }
}
