//! Narrow capability interface over the vendor P2P/AV client library.
//!
//! Everything the bridge needs from the SDK goes through [`AvSdk`]. Raw vendor
//! return codes are translated into [`SdkError`] inside each implementation.

use common::{FrameInfo, IoCtrl, LanDevice, SdkError, SdkResult};
use std::time::Duration;
use tracing::{error, warn};

#[cfg(feature = "tutk")]
mod ffi;
mod simulated;

#[cfg(feature = "tutk")]
pub use ffi::TutkSdk;
pub use simulated::{SimulatedCamera, SimulatedSdk};

/// Result of a successful `client_start`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientStart {
    /// AV channel index used by every later stream call
    pub av_index: i32,
    /// Service type bitmask reported by the device
    pub service_type: u32,
    /// Whether the resend (retransmission) mode was negotiated
    pub resend: bool,
}

/// A frame copied into the caller's buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceivedFrame {
    /// Number of payload bytes written to the buffer
    pub len: usize,
    pub frame_no: u32,
    pub info: FrameInfo,
}

/// Operations consumed from the vendor SDK.
///
/// Calls are synchronous. Stream calls (`recv_*`, `check_audio_buf`) never
/// block; `connect_by_uid` and `client_start` may block for the SDK's own
/// timeouts and are run on the blocking pool by the session controller.
pub trait AvSdk: Send + Sync {
    fn initialize(&self, udp_port: u16, max_av_channels: u32) -> SdkResult<()>;

    fn deinitialize(&self);

    /// Packed AV API version, see [`common::format_api_version`]
    fn api_version(&self) -> u32;

    fn lan_search(&self, max_devices: usize, timeout: Duration) -> SdkResult<Vec<LanDevice>>;

    /// Reserve a free local session id
    fn get_session_id(&self) -> SdkResult<i32>;

    /// Connect the reserved session to the camera. Returns the session id.
    fn connect_by_uid(&self, uid: &str, session_id: i32) -> SdkResult<i32>;

    /// Authenticate and open an AV channel on the session
    fn client_start(
        &self,
        session_id: i32,
        username: &str,
        password: &str,
        timeout: Duration,
        channel: u8,
    ) -> SdkResult<ClientStart>;

    fn send_ioctrl(&self, av_index: i32, command: &IoCtrl) -> SdkResult<()>;

    fn recv_video_frame(&self, av_index: i32, buf: &mut [u8]) -> SdkResult<ReceivedFrame>;

    /// Number of audio frames buffered inside the SDK
    fn check_audio_buf(&self, av_index: i32) -> SdkResult<u32>;

    fn recv_audio_frame(&self, av_index: i32, buf: &mut [u8]) -> SdkResult<ReceivedFrame>;

    fn clean_video_buf(&self, av_index: i32);

    fn clean_audio_buf(&self, av_index: i32);

    fn client_exit(&self, session_id: i32, channel: u8);

    fn client_stop(&self, av_index: i32);

    fn session_close(&self, session_id: i32);
}

/// Log an SDK failure with its vendor code and name.
pub fn log_sdk_error(context: &str, err: &SdkError) {
    if err.is_terminal() {
        warn!("[{}] {} ({}): {}", context, err.name(), err.code(), err);
    } else {
        error!("[{}] {} ({}): {}", context, err.name(), err.code(), err);
    }
}
