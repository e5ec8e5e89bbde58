use super::{AvSdk, ClientStart, ReceivedFrame};
use common::{
    CodecId, FrameFlags, FrameInfo, IoCtrl, LanDevice, MediaKind, SdkError, SdkResult,
};
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Packed AV API version reported by the simulator (4.3.0.0)
const SIMULATED_API_VERSION: u32 = 0x0403_0000;

/// Parameters of the simulated camera
#[derive(Debug, Clone)]
pub struct SimulatedCamera {
    pub uid: String,
    pub fps: u32,
    pub video_bitrate: usize,
    pub audio_sample_rate: u32,
    /// Duration of one PCM frame
    pub audio_frame_duration: Duration,
    /// Close the session from the "remote" side after this long
    pub session_length: Option<Duration>,
}

impl Default for SimulatedCamera {
    fn default() -> Self {
        Self {
            uid: "SIMCAM0000000000000A".to_string(),
            fps: 25,
            video_bitrate: 1_000_000,
            audio_sample_rate: 8000,
            audio_frame_duration: Duration::from_millis(40),
            session_length: None,
        }
    }
}

#[derive(Debug, Default)]
struct StreamClock {
    started: Option<Instant>,
    delivered: u64,
}

impl StreamClock {
    /// Frames due since the stream was started
    fn due(&self, period: Duration) -> u64 {
        match self.started {
            Some(started) => (started.elapsed().as_micros() / period.as_micros().max(1)) as u64,
            None => 0,
        }
    }
}

/// In-process implementation of [`AvSdk`] standing in for a real camera.
///
/// Serves a paced stream of mock H.264 access units and silent 16-bit PCM.
pub struct SimulatedSdk {
    camera: SimulatedCamera,
    initialized: AtomicBool,
    next_session_id: AtomicI32,
    connected_at: Mutex<Option<Instant>>,
    video: Mutex<StreamClock>,
    audio: Mutex<StreamClock>,
}

impl SimulatedSdk {
    pub fn new(camera: SimulatedCamera) -> Self {
        info!("🎥 Creating simulated camera (MOCK MODE)");
        info!("  UID: {}", camera.uid);
        info!("  FPS: {}", camera.fps);
        info!("  Bitrate: {} kbps", camera.video_bitrate / 1000);
        info!("  ⚠️  Using mock data (no real device)");

        Self {
            camera,
            initialized: AtomicBool::new(false),
            next_session_id: AtomicI32::new(0),
            connected_at: Mutex::new(None),
            video: Mutex::new(StreamClock::default()),
            audio: Mutex::new(StreamClock::default()),
        }
    }

    fn frame_period(&self, kind: MediaKind) -> Duration {
        match kind {
            MediaKind::Video => Duration::from_secs_f64(1.0 / self.camera.fps.max(1) as f64),
            MediaKind::Audio => self.camera.audio_frame_duration,
        }
    }

    fn clock(&self, kind: MediaKind) -> &Mutex<StreamClock> {
        match kind {
            MediaKind::Video => &self.video,
            MediaKind::Audio => &self.audio,
        }
    }

    fn check_remote(&self) -> SdkResult<()> {
        let connected_at = self.connected_at.lock().unwrap_or_else(|e| e.into_inner());
        match (*connected_at, self.camera.session_length) {
            (None, _) => Err(SdkError::AvInvalidSessionId),
            (Some(at), Some(length)) if at.elapsed() >= length => {
                Err(SdkError::AvSessionClosedByRemote)
            }
            _ => Ok(()),
        }
    }

    fn start_clock(&self, kind: MediaKind) {
        let mut clock = self.clock(kind).lock().unwrap_or_else(|e| e.into_inner());
        if clock.started.is_none() {
            clock.started = Some(Instant::now());
            clock.delivered = 0;
        }
    }

    /// Claim the next due frame number, if any
    fn next_frame(&self, kind: MediaKind) -> Option<u64> {
        let period = self.frame_period(kind);
        let mut clock = self.clock(kind).lock().unwrap_or_else(|e| e.into_inner());
        if clock.delivered < clock.due(period) {
            let frame_no = clock.delivered;
            clock.delivered += 1;
            Some(frame_no)
        } else {
            None
        }
    }

    fn video_payload(&self, frame_no: u64, buf: &mut [u8]) -> (usize, bool) {
        let fps = self.camera.fps.max(1) as u64;
        let bytes_per_frame = self.camera.video_bitrate / fps as usize / 8;
        let is_keyframe = frame_no % fps == 0;

        let mut data = Vec::with_capacity(bytes_per_frame);
        if is_keyframe {
            // Minimal SPS/PPS for a 1280x720 baseline stream, then the IDR slice
            data.extend_from_slice(&[
                0x00, 0x00, 0x00, 0x01, 0x67, 0x42, 0xC0, 0x1E, 0xDA, 0x01, 0x40, 0x16, 0xE8,
                0x06, 0xD0, 0xA1, 0x35, 0x00, 0x00, 0x03, 0x00, 0x01, 0x00, 0x00, 0x03, 0x00,
                0x32, 0x0F, 0x16, 0x2D, 0x96,
            ]);
            data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, 0x68, 0xCE, 0x3C, 0x80]);
            data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, 0x65]);
        } else {
            data.extend_from_slice(&[0x00, 0x00, 0x00, 0x01, 0x41]);
        }

        let remaining = bytes_per_frame.saturating_sub(data.len());
        data.extend((0..remaining).map(|i| ((frame_no + i as u64) % 256) as u8));

        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        (len, is_keyframe)
    }

    fn timestamp_ms(&self, kind: MediaKind, frame_no: u64) -> u32 {
        (self.frame_period(kind).as_millis() as u64 * frame_no) as u32
    }
}

impl AvSdk for SimulatedSdk {
    fn initialize(&self, udp_port: u16, max_av_channels: u32) -> SdkResult<()> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(SdkError::AlreadyInitialized);
        }
        debug!(
            "Simulated SDK initialized (udp port {}, {} AV channels)",
            udp_port, max_av_channels
        );
        Ok(())
    }

    fn deinitialize(&self) {
        self.initialized.store(false, Ordering::SeqCst);
        debug!("Simulated SDK deinitialized");
    }

    fn api_version(&self) -> u32 {
        SIMULATED_API_VERSION
    }

    fn lan_search(&self, max_devices: usize, _timeout: Duration) -> SdkResult<Vec<LanDevice>> {
        let device = LanDevice {
            uid: self.camera.uid.clone(),
            ip: "127.0.0.1".to_string(),
            port: 32761,
        };
        Ok(std::iter::once(device).take(max_devices).collect())
    }

    fn get_session_id(&self) -> SdkResult<i32> {
        if !self.initialized.load(Ordering::SeqCst) {
            return Err(SdkError::NotInitialized);
        }
        Ok(self.next_session_id.fetch_add(1, Ordering::SeqCst))
    }

    fn connect_by_uid(&self, uid: &str, session_id: i32) -> SdkResult<i32> {
        if uid.is_empty() {
            return Err(SdkError::DeviceNotFound);
        }
        *self.connected_at.lock().unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
        info!("✓ Simulated camera {} connected (session {})", uid, session_id);
        Ok(session_id)
    }

    fn client_start(
        &self,
        _session_id: i32,
        username: &str,
        password: &str,
        _timeout: Duration,
        _channel: u8,
    ) -> SdkResult<ClientStart> {
        self.check_remote()?;
        if username.is_empty() || password.is_empty() {
            return Err(SdkError::AvWrongCredentials);
        }
        Ok(ClientStart {
            av_index: 0,
            service_type: 0,
            resend: false,
        })
    }

    fn send_ioctrl(&self, _av_index: i32, command: &IoCtrl) -> SdkResult<()> {
        self.check_remote()?;
        match command {
            IoCtrl::StartVideo { .. } => self.start_clock(MediaKind::Video),
            IoCtrl::StartAudio { .. } => self.start_clock(MediaKind::Audio),
            _ => {}
        }
        debug!("Simulated camera accepted '{}'", command);
        Ok(())
    }

    fn recv_video_frame(&self, _av_index: i32, buf: &mut [u8]) -> SdkResult<ReceivedFrame> {
        self.check_remote()?;
        let frame_no = self
            .next_frame(MediaKind::Video)
            .ok_or(SdkError::AvDataNotReady)?;
        let (len, is_keyframe) = self.video_payload(frame_no, buf);

        Ok(ReceivedFrame {
            len,
            frame_no: frame_no as u32,
            info: FrameInfo {
                codec_id: CodecId::VIDEO_H264,
                flags: if is_keyframe {
                    FrameFlags::I_FRAME
                } else {
                    FrameFlags::PB_FRAME
                },
                timestamp: self.timestamp_ms(MediaKind::Video, frame_no),
                video_width: Some(1280),
                video_height: Some(720),
                ..FrameInfo::default()
            },
        })
    }

    fn check_audio_buf(&self, _av_index: i32) -> SdkResult<u32> {
        self.check_remote()?;
        let period = self.frame_period(MediaKind::Audio);
        let clock = self.audio.lock().unwrap_or_else(|e| e.into_inner());
        Ok(clock.due(period).saturating_sub(clock.delivered) as u32)
    }

    fn recv_audio_frame(&self, _av_index: i32, buf: &mut [u8]) -> SdkResult<ReceivedFrame> {
        self.check_remote()?;
        let frame_no = self
            .next_frame(MediaKind::Audio)
            .ok_or(SdkError::AvDataNotReady)?;

        // Silence: s16le, mono
        let samples = (self.camera.audio_sample_rate as u128
            * self.camera.audio_frame_duration.as_millis()
            / 1000) as usize;
        let len = (samples * 2).min(buf.len());
        buf[..len].fill(0);

        Ok(ReceivedFrame {
            len,
            frame_no: frame_no as u32,
            info: FrameInfo {
                codec_id: CodecId::AUDIO_PCM,
                timestamp: self.timestamp_ms(MediaKind::Audio, frame_no),
                ..FrameInfo::default()
            },
        })
    }

    fn clean_video_buf(&self, _av_index: i32) {
        let period = self.frame_period(MediaKind::Video);
        let mut clock = self.video.lock().unwrap_or_else(|e| e.into_inner());
        clock.delivered = clock.delivered.max(clock.due(period));
    }

    fn clean_audio_buf(&self, _av_index: i32) {
        let period = self.frame_period(MediaKind::Audio);
        let mut clock = self.audio.lock().unwrap_or_else(|e| e.into_inner());
        clock.delivered = clock.delivered.max(clock.due(period));
    }

    fn client_exit(&self, session_id: i32, channel: u8) {
        debug!("Simulated client exit (session {}, channel {})", session_id, channel);
    }

    fn client_stop(&self, av_index: i32) {
        debug!("Simulated client stop (AV index {})", av_index);
        *self.video.lock().unwrap_or_else(|e| e.into_inner()) = StreamClock::default();
        *self.audio.lock().unwrap_or_else(|e| e.into_inner()) = StreamClock::default();
    }

    fn session_close(&self, session_id: i32) {
        *self.connected_at.lock().unwrap_or_else(|e| e.into_inner()) = None;
        info!("Simulated session {} closed", session_id);
    }
}
