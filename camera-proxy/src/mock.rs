//! Test doubles: a scripted SDK, a recording pipe writer and a recording
//! transcoder bridge sharing one event log.

use crate::errors::TranscodeError;
use crate::sdk::{AvSdk, ClientStart, ReceivedFrame};
use crate::transcoder::{TranscodeBridge, TranscoderProcess};
use async_trait::async_trait;
use common::{
    CodecId, FrameInfo, IoCtrl, IoCtrlType, LanDevice, MediaKind, SdkError, SdkResult,
};
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub type EventLog = Arc<Mutex<Vec<String>>>;

fn record(log: &EventLog, event: impl Into<String>) {
    log.lock().unwrap().push(event.into());
}

enum Scripted {
    Frame(Vec<u8>),
    Error(SdkError),
}

/// SDK whose stream calls replay scripted queues.
///
/// An exhausted queue reports "no data yet" forever.
#[derive(Default)]
pub struct MockSdk {
    events: EventLog,
    video: Mutex<VecDeque<Scripted>>,
    audio: Mutex<VecDeque<Scripted>>,
    audio_buffer_error: Mutex<Option<SdkError>>,
    rejected_command: Mutex<Option<(IoCtrlType, SdkError)>>,
    connect_error: Mutex<Option<SdkError>>,
    auth_error: Mutex<Option<SdkError>>,
    cancel_after_connect: Mutex<Option<CancellationToken>>,
    cancel_after_command: Mutex<Option<(IoCtrlType, CancellationToken)>>,
    ioctrls: Mutex<Vec<IoCtrl>>,
    cleans: Mutex<Vec<(MediaKind, Instant)>>,
    video_frames_sent: AtomicUsize,
    audio_frames_sent: AtomicUsize,
    pub video_polls: AtomicUsize,
    pub audio_polls: AtomicUsize,
    pub audio_buffer_checks: AtomicUsize,
}

impl MockSdk {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> EventLog {
        self.events.clone()
    }

    pub fn event_list(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn queue(&self, kind: MediaKind) -> &Mutex<VecDeque<Scripted>> {
        match kind {
            MediaKind::Video => &self.video,
            MediaKind::Audio => &self.audio,
        }
    }

    pub fn push_frame(&self, kind: MediaKind, payload: &[u8]) -> &Self {
        self.queue(kind)
            .lock()
            .unwrap()
            .push_back(Scripted::Frame(payload.to_vec()));
        self
    }

    pub fn push_error(&self, kind: MediaKind, err: SdkError) -> &Self {
        self.queue(kind)
            .lock()
            .unwrap()
            .push_back(Scripted::Error(err));
        self
    }

    pub fn fail_audio_buffer_check(&self, err: SdkError) {
        *self.audio_buffer_error.lock().unwrap() = Some(err);
    }

    pub fn reject_command(&self, io_type: IoCtrlType, err: SdkError) {
        *self.rejected_command.lock().unwrap() = Some((io_type, err));
    }

    pub fn fail_connect(&self, err: SdkError) {
        *self.connect_error.lock().unwrap() = Some(err);
    }

    pub fn fail_auth(&self, err: SdkError) {
        *self.auth_error.lock().unwrap() = Some(err);
    }

    /// Cancel `token` once the connect call returns, as a signal would
    pub fn cancel_after_connect(&self, token: CancellationToken) {
        *self.cancel_after_connect.lock().unwrap() = Some(token);
    }

    /// Cancel `token` once a command of `io_type` has been accepted
    pub fn cancel_after_command(&self, io_type: IoCtrlType, token: CancellationToken) {
        *self.cancel_after_command.lock().unwrap() = Some((io_type, token));
    }

    pub fn ioctrls(&self) -> Vec<IoCtrl> {
        self.ioctrls.lock().unwrap().clone()
    }

    pub fn cleans(&self) -> Vec<(MediaKind, Instant)> {
        self.cleans.lock().unwrap().clone()
    }

    fn next_frame(&self, kind: MediaKind, buf: &mut [u8]) -> SdkResult<ReceivedFrame> {
        match kind {
            MediaKind::Video => self.video_polls.fetch_add(1, Ordering::SeqCst),
            MediaKind::Audio => self.audio_polls.fetch_add(1, Ordering::SeqCst),
        };

        let next = self.queue(kind).lock().unwrap().pop_front();
        match next {
            Some(Scripted::Frame(payload)) => {
                let counter = match kind {
                    MediaKind::Video => &self.video_frames_sent,
                    MediaKind::Audio => &self.audio_frames_sent,
                };
                let frame_no = counter.fetch_add(1, Ordering::SeqCst);
                record(&self.events, format!("sdk:{}_frame:{}", kind, frame_no));

                let len = payload.len().min(buf.len());
                buf[..len].copy_from_slice(&payload[..len]);
                Ok(ReceivedFrame {
                    len,
                    frame_no: frame_no as u32,
                    info: FrameInfo {
                        codec_id: match kind {
                            MediaKind::Video => CodecId::VIDEO_H264,
                            MediaKind::Audio => CodecId::AUDIO_PCM,
                        },
                        ..FrameInfo::default()
                    },
                })
            }
            Some(Scripted::Error(err)) => Err(err),
            None => Err(SdkError::AvDataNotReady),
        }
    }
}

impl AvSdk for MockSdk {
    fn initialize(&self, _udp_port: u16, _max_av_channels: u32) -> SdkResult<()> {
        record(&self.events, "sdk:initialize");
        Ok(())
    }

    fn deinitialize(&self) {
        record(&self.events, "sdk:deinitialize");
    }

    fn api_version(&self) -> u32 {
        0x0403_0001
    }

    fn lan_search(&self, _max_devices: usize, _timeout: Duration) -> SdkResult<Vec<LanDevice>> {
        Ok(Vec::new())
    }

    fn get_session_id(&self) -> SdkResult<i32> {
        Ok(7)
    }

    fn connect_by_uid(&self, uid: &str, session_id: i32) -> SdkResult<i32> {
        record(&self.events, format!("sdk:connect:{}", uid));
        if let Some(token) = self.cancel_after_connect.lock().unwrap().as_ref() {
            token.cancel();
        }
        match *self.connect_error.lock().unwrap() {
            Some(err) => Err(err),
            None => Ok(session_id),
        }
    }

    fn client_start(
        &self,
        _session_id: i32,
        username: &str,
        _password: &str,
        _timeout: Duration,
        _channel: u8,
    ) -> SdkResult<ClientStart> {
        record(&self.events, format!("sdk:client_start:{}", username));
        match *self.auth_error.lock().unwrap() {
            Some(err) => Err(err),
            None => Ok(ClientStart {
                av_index: 3,
                service_type: 0,
                resend: true,
            }),
        }
    }

    fn send_ioctrl(&self, _av_index: i32, command: &IoCtrl) -> SdkResult<()> {
        record(&self.events, format!("sdk:ioctrl:{}", command));
        if let Some((io_type, err)) = *self.rejected_command.lock().unwrap() {
            if command.io_type() == io_type {
                return Err(err);
            }
        }
        self.ioctrls.lock().unwrap().push(*command);
        if let Some((io_type, token)) = self.cancel_after_command.lock().unwrap().as_ref() {
            if command.io_type() == *io_type {
                token.cancel();
            }
        }
        Ok(())
    }

    fn recv_video_frame(&self, _av_index: i32, buf: &mut [u8]) -> SdkResult<ReceivedFrame> {
        self.next_frame(MediaKind::Video, buf)
    }

    fn check_audio_buf(&self, _av_index: i32) -> SdkResult<u32> {
        self.audio_buffer_checks.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = *self.audio_buffer_error.lock().unwrap() {
            return Err(err);
        }
        Ok(self.audio.lock().unwrap().len() as u32)
    }

    fn recv_audio_frame(&self, _av_index: i32, buf: &mut [u8]) -> SdkResult<ReceivedFrame> {
        self.next_frame(MediaKind::Audio, buf)
    }

    fn clean_video_buf(&self, _av_index: i32) {
        record(&self.events, "sdk:clean:video");
        self.cleans
            .lock()
            .unwrap()
            .push((MediaKind::Video, Instant::now()));
    }

    fn clean_audio_buf(&self, _av_index: i32) {
        record(&self.events, "sdk:clean:audio");
        self.cleans
            .lock()
            .unwrap()
            .push((MediaKind::Audio, Instant::now()));
    }

    fn client_exit(&self, _session_id: i32, _channel: u8) {
        record(&self.events, "sdk:client_exit");
    }

    fn client_stop(&self, _av_index: i32) {
        record(&self.events, "sdk:client_stop");
    }

    fn session_close(&self, _session_id: i32) {
        record(&self.events, "sdk:session_close");
    }
}

#[derive(Default)]
struct WriterState {
    data: Vec<u8>,
    writes: usize,
    failures_left: u32,
    always_fail: bool,
    shutdowns: usize,
}

/// In-memory pipe write end
#[derive(Clone, Default)]
pub struct RecordingWriter {
    state: Arc<Mutex<WriterState>>,
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` writes with a broken pipe
    pub fn fail_next(&self, count: u32) {
        self.state.lock().unwrap().failures_left = count;
    }

    pub fn fail_always(&self) {
        self.state.lock().unwrap().always_fail = true;
    }

    pub fn data(&self) -> Vec<u8> {
        self.state.lock().unwrap().data.clone()
    }

    pub fn writes(&self) -> usize {
        self.state.lock().unwrap().writes
    }

    pub fn shutdowns(&self) -> usize {
        self.state.lock().unwrap().shutdowns
    }

    /// Number of handles alive besides this one
    pub fn other_handles(&self) -> usize {
        Arc::strong_count(&self.state) - 1
    }
}

impl AsyncWrite for RecordingWriter {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let mut state = self.state.lock().unwrap();
        if state.always_fail || state.failures_left > 0 {
            state.failures_left = state.failures_left.saturating_sub(1);
            return Poll::Ready(Err(io::Error::from(io::ErrorKind::BrokenPipe)));
        }
        state.data.extend_from_slice(buf);
        state.writes += 1;
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        self.state.lock().unwrap().shutdowns += 1;
        Poll::Ready(Ok(()))
    }
}

/// Bridge that records launches and terminations instead of spawning
pub struct RecordingBridge {
    events: EventLog,
    fail_launch: bool,
}

impl RecordingBridge {
    pub fn new(events: EventLog) -> Self {
        Self {
            events,
            fail_launch: false,
        }
    }

    pub fn failing(events: EventLog) -> Self {
        Self {
            events,
            fail_launch: true,
        }
    }
}

#[async_trait]
impl TranscodeBridge for RecordingBridge {
    async fn launch(&self) -> Result<Box<dyn TranscoderProcess>, TranscodeError> {
        if self.fail_launch {
            return Err(TranscodeError::SpawnFailed {
                program: "ffmpeg".to_string(),
                source: io::Error::from(io::ErrorKind::NotFound),
            });
        }
        record(&self.events, "transcoder:launch");
        Ok(Box::new(RecordedProcess {
            events: self.events.clone(),
        }))
    }
}

struct RecordedProcess {
    events: EventLog,
}

#[async_trait]
impl TranscoderProcess for RecordedProcess {
    fn id(&self) -> Option<u32> {
        None
    }

    async fn terminate(&mut self) -> Result<(), TranscodeError> {
        record(&self.events, "transcoder:terminate");
        Ok(())
    }
}
