use super::{FrameForwarder, ReceiverContext, ReceiverExit, ReceiverReport, WriteOutcome};
use common::{ErrorClass, Frame, MediaKind};
use tokio::io::AsyncWrite;
use tracing::{debug, info, warn};

/// Pulls H.264 frames and writes them to the video pipe
pub struct VideoReceiver {
    ctx: ReceiverContext,
}

impl VideoReceiver {
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

        info!("Video receiver started (AV index {})", av_index);

        let mut buf = vec![0u8; config.video_buffer_size];
        let mut forwarder = FrameForwarder::new(
            MediaKind::Video,
            writer,
            config.max_consecutive_write_failures,
        );

        let exit = loop {
            if cancel.is_cancelled() {
                break ReceiverExit::Shutdown;
            }

            match sdk.recv_video_frame(av_index, &mut buf) {
                Ok(received) => {
                    let len = received.len.min(buf.len());
                    let frame = Frame::new(
                        MediaKind::Video,
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
                    ErrorClass::NoData => tokio::time::sleep(config.poll_interval).await,
                    ErrorClass::SessionTerminal => {
                        warn!("[video receiver] {}: {}", err.name(), err);
                        break ReceiverExit::SessionEnded(err);
                    }
                    ErrorClass::FrameLost | ErrorClass::Failure => {
                        // The decoder copes with gaps in the stream
                        debug!("[video receiver] {} ({}): {}", err.name(), err.code(), err);
                        tokio::time::sleep(config.poll_interval).await;
                    }
                },
            }
        };

        forwarder.finish(exit).await
    }
}
