//! Binding to the vendor IOTC/AV client library (`libIOTCAPIs_ALL`).

use super::{AvSdk, ClientStart, ReceivedFrame};
use common::{
    check_code, FrameInfo, IoCtrl, LanDevice, SdkError, SdkResult, FRAME_INFO_EXTENDED_SIZE,
    FRAME_INFO_SIZE,
};
use std::ffi::{c_char, c_int, c_uchar, c_uint, c_ushort, CString};
use std::time::Duration;
use tracing::debug;

#[repr(C)]
#[derive(Clone, Copy)]
#[allow(non_snake_case)]
struct st_LanSearchInfo {
    UID: [c_char; 21],
    IP: [c_char; 16],
    port: c_ushort,
    Reserved: [c_char; 1],
}

impl Default for st_LanSearchInfo {
    fn default() -> Self {
        Self {
            UID: [0; 21],
            IP: [0; 16],
            port: 0,
            Reserved: [0; 1],
        }
    }
}

#[link(name = "IOTCAPIs_ALL")]
extern "C" {
    fn IOTC_Initialize2(udp_port: c_ushort) -> c_int;
    fn IOTC_DeInitialize() -> c_int;
    fn IOTC_Lan_Search(info: *mut st_LanSearchInfo, array_len: c_int, wait_ms: c_int) -> c_int;
    fn IOTC_Get_SessionID() -> c_int;
    fn IOTC_Connect_ByUID_Parallel(uid: *const c_char, session_id: c_int) -> c_int;
    fn IOTC_Session_Close(session_id: c_int);

    fn avInitialize(max_channels: c_int) -> c_int;
    fn avDeInitialize() -> c_int;
    fn avGetAVApiVer() -> c_int;
    fn avClientStart2(
        session_id: c_int,
        account: *const c_char,
        password: *const c_char,
        timeout_secs: c_uint,
        service_type: *mut c_uint,
        channel: c_uchar,
        resend: *mut c_int,
    ) -> c_int;
    fn avSendIOCtrl(av_index: c_int, io_type: c_uint, data: *const c_char, size: c_int) -> c_int;
    fn avRecvFrameData2(
        av_index: c_int,
        data: *mut c_char,
        data_max: c_int,
        actual_size: *mut c_int,
        expected_size: *mut c_int,
        info: *mut c_char,
        info_max: c_int,
        actual_info_size: *mut c_int,
        frame_no: *mut c_uint,
    ) -> c_int;
    fn avCheckAudioBuf(av_index: c_int) -> c_int;
    fn avRecvAudioData(
        av_index: c_int,
        data: *mut c_char,
        data_max: c_int,
        info: *mut c_char,
        info_max: c_int,
        frame_no: *mut c_uint,
    ) -> c_int;
    fn avClientCleanVideoBuf(av_index: c_int);
    fn avClientCleanAudioBuf(av_index: c_int);
    fn avClientExit(session_id: c_int, channel: c_uchar);
    fn avClientStop(av_index: c_int);
}

fn c_string(value: &str) -> SdkResult<CString> {
    CString::new(value).map_err(|_| SdkError::AvInvalidArgument)
}

fn c_field(field: &[c_char]) -> String {
    let bytes: Vec<u8> = field
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

fn buffer_len(buf: &[u8]) -> c_int {
    buf.len().min(c_int::MAX as usize) as c_int
}

/// Parse the part of a header buffer the SDK actually filled.
fn frame_info(info: &[u8], filled: usize) -> FrameInfo {
    FrameInfo::parse(&info[..filled.min(info.len())]).unwrap_or_default()
}

/// The vendor library. It keeps process-global state, so only one instance
/// should be initialized at a time.
#[derive(Debug, Default)]
pub struct TutkSdk;

impl TutkSdk {
    pub fn new() -> Self {
        Self
    }
}

impl AvSdk for TutkSdk {
    fn initialize(&self, udp_port: u16, max_av_channels: u32) -> SdkResult<()> {
        // SAFETY: plain integer arguments
        check_code(unsafe { IOTC_Initialize2(udp_port) })?;
        let channels = max_av_channels.min(c_int::MAX as u32) as c_int;
        if let Err(err) = check_code(unsafe { avInitialize(channels) }) {
            unsafe { IOTC_DeInitialize() };
            return Err(err);
        }
        Ok(())
    }

    fn deinitialize(&self) {
        // SAFETY: no arguments; safe to call after a failed initialize
        unsafe {
            avDeInitialize();
            IOTC_DeInitialize();
        }
    }

    fn api_version(&self) -> u32 {
        unsafe { avGetAVApiVer() as u32 }
    }

    fn lan_search(&self, max_devices: usize, timeout: Duration) -> SdkResult<Vec<LanDevice>> {
        let mut results = vec![st_LanSearchInfo::default(); max_devices];
        let wait_ms = timeout.as_millis().min(c_int::MAX as u128) as c_int;
        // SAFETY: the array holds `max_devices` entries
        let found = check_code(unsafe {
            IOTC_Lan_Search(results.as_mut_ptr(), results.len() as c_int, wait_ms)
        })?;

        Ok(results
            .iter()
            .take(found as usize)
            .map(|info| LanDevice {
                uid: c_field(&info.UID),
                ip: c_field(&info.IP),
                port: info.port,
            })
            .collect())
    }

    fn get_session_id(&self) -> SdkResult<i32> {
        check_code(unsafe { IOTC_Get_SessionID() })
    }

    fn connect_by_uid(&self, uid: &str, session_id: i32) -> SdkResult<i32> {
        let uid = c_string(uid)?;
        // SAFETY: `uid` outlives the call
        check_code(unsafe { IOTC_Connect_ByUID_Parallel(uid.as_ptr(), session_id) })
    }

    fn client_start(
        &self,
        session_id: i32,
        username: &str,
        password: &str,
        timeout: Duration,
        channel: u8,
    ) -> SdkResult<ClientStart> {
        let account = c_string(username)?;
        let password = c_string(password)?;
        let mut service_type: c_uint = 0;
        let mut resend: c_int = -1;
        let timeout_secs = timeout.as_secs().min(c_uint::MAX as u64) as c_uint;

        // SAFETY: all pointers reference live locals
        let av_index = check_code(unsafe {
            avClientStart2(
                session_id,
                account.as_ptr(),
                password.as_ptr(),
                timeout_secs,
                &mut service_type,
                channel,
                &mut resend,
            )
        })?;

        Ok(ClientStart {
            av_index,
            service_type,
            resend: resend == 1,
        })
    }

    fn send_ioctrl(&self, av_index: i32, command: &IoCtrl) -> SdkResult<()> {
        let body = command.encode();
        debug!("avSendIOCtrl {:#06x} ({} bytes)", command.io_type().code(), body.len());
        // SAFETY: `body` outlives the call and its length is passed alongside
        check_code(unsafe {
            avSendIOCtrl(
                av_index,
                command.io_type().code(),
                body.as_ptr() as *const c_char,
                body.len() as c_int,
            )
        })?;
        Ok(())
    }

    fn recv_video_frame(&self, av_index: i32, buf: &mut [u8]) -> SdkResult<ReceivedFrame> {
        let mut info = [0u8; FRAME_INFO_EXTENDED_SIZE];
        let mut actual_size: c_int = 0;
        let mut expected_size: c_int = 0;
        let mut actual_info_size: c_int = 0;
        let mut frame_no: c_uint = 0;

        // SAFETY: buffers and their sizes come from live slices
        let len = check_code(unsafe {
            avRecvFrameData2(
                av_index,
                buf.as_mut_ptr() as *mut c_char,
                buffer_len(buf),
                &mut actual_size,
                &mut expected_size,
                info.as_mut_ptr() as *mut c_char,
                info.len() as c_int,
                &mut actual_info_size,
                &mut frame_no,
            )
        })?;

        Ok(ReceivedFrame {
            len: (len as usize).min(buf.len()),
            frame_no,
            info: frame_info(&info, actual_info_size.max(0) as usize),
        })
    }

    fn check_audio_buf(&self, av_index: i32) -> SdkResult<u32> {
        check_code(unsafe { avCheckAudioBuf(av_index) }).map(|count| count as u32)
    }

    fn recv_audio_frame(&self, av_index: i32, buf: &mut [u8]) -> SdkResult<ReceivedFrame> {
        // Audio headers never carry the resolution fields
        let mut info = [0u8; FRAME_INFO_SIZE];
        let mut frame_no: c_uint = 0;

        // SAFETY: buffers and their sizes come from live slices
        let len = check_code(unsafe {
            avRecvAudioData(
                av_index,
                buf.as_mut_ptr() as *mut c_char,
                buffer_len(buf),
                info.as_mut_ptr() as *mut c_char,
                info.len() as c_int,
                &mut frame_no,
            )
        })?;

        Ok(ReceivedFrame {
            len: (len as usize).min(buf.len()),
            frame_no,
            info: frame_info(&info, FRAME_INFO_SIZE),
        })
    }

    fn clean_video_buf(&self, av_index: i32) {
        unsafe { avClientCleanVideoBuf(av_index) }
    }

    fn clean_audio_buf(&self, av_index: i32) {
        unsafe { avClientCleanAudioBuf(av_index) }
    }

    fn client_exit(&self, session_id: i32, channel: u8) {
        unsafe { avClientExit(session_id, channel) }
    }

    fn client_stop(&self, av_index: i32) {
        unsafe { avClientStop(av_index) }
    }

    fn session_close(&self, session_id: i32) {
        unsafe { IOTC_Session_Close(session_id) }
    }
}
