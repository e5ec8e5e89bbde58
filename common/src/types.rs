use serde::{Deserialize, Serialize};
use std::fmt;

/// Which elementary stream a frame belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Video,
    Audio,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
        }
    }
}

/// Codec ids carried in the vendor frame header
pub mod CodecId {
    pub const VIDEO_MPEG4: u16 = 0x4C;
    pub const VIDEO_H263: u16 = 0x4D;
    pub const VIDEO_H264: u16 = 0x4E;
    pub const VIDEO_MJPEG: u16 = 0x4F;
    pub const VIDEO_HEVC: u16 = 0x50;

    pub const AUDIO_AAC: u16 = 0x88;
    pub const AUDIO_G711U: u16 = 0x89;
    pub const AUDIO_G711A: u16 = 0x8A;
    pub const AUDIO_ADPCM: u16 = 0x8B;
    pub const AUDIO_PCM: u16 = 0x8C;
    pub const AUDIO_SPEEX: u16 = 0x8D;
    pub const AUDIO_MP3: u16 = 0x8E;
    pub const AUDIO_G726: u16 = 0x8F;
}

/// Frame header flag bits
pub mod FrameFlags {
    pub const PB_FRAME: u8 = 0x00;
    pub const I_FRAME: u8 = 0x01;
}

/// Size of the fixed part of the vendor frame header.
pub const FRAME_INFO_SIZE: usize = 16;
/// Size of the header including the trailing width/height fields.
pub const FRAME_INFO_EXTENDED_SIZE: usize = 24;

/// Parsed vendor frame header (`FRAMEINFO_t`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameInfo {
    pub codec_id: u16,
    pub flags: u8,
    pub cam_index: u8,
    pub online_num: u8,
    pub timestamp: u32,
    pub video_width: Option<u32>,
    pub video_height: Option<u32>,
}

impl FrameInfo {
    /// Parse a little-endian header as filled in by the SDK.
    ///
    /// Returns `None` when fewer than [`FRAME_INFO_SIZE`] bytes are available.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < FRAME_INFO_SIZE {
            return None;
        }

        let u32_at = |offset: usize| {
            u32::from_le_bytes([
                bytes[offset],
                bytes[offset + 1],
                bytes[offset + 2],
                bytes[offset + 3],
            ])
        };

        let (video_width, video_height) = if bytes.len() >= FRAME_INFO_EXTENDED_SIZE {
            (Some(u32_at(16)), Some(u32_at(20)))
        } else {
            (None, None)
        };

        Some(Self {
            codec_id: u16::from_le_bytes([bytes[0], bytes[1]]),
            flags: bytes[2],
            cam_index: bytes[3],
            online_num: bytes[4],
            timestamp: u32_at(12),
            video_width,
            video_height,
        })
    }

    pub fn is_keyframe(&self) -> bool {
        self.flags & FrameFlags::I_FRAME != 0
    }

    /// Codec name for diagnostics
    pub fn codec_name(&self) -> &'static str {
        match self.codec_id {
            CodecId::VIDEO_MPEG4 => "mpeg4",
            CodecId::VIDEO_H263 => "h263",
            CodecId::VIDEO_H264 => "h264",
            CodecId::VIDEO_MJPEG => "mjpeg",
            CodecId::VIDEO_HEVC => "hevc",
            CodecId::AUDIO_AAC => "aac",
            CodecId::AUDIO_G711U => "g711u",
            CodecId::AUDIO_G711A => "g711a",
            CodecId::AUDIO_ADPCM => "adpcm",
            CodecId::AUDIO_PCM => "pcm",
            CodecId::AUDIO_SPEEX => "speex",
            CodecId::AUDIO_MP3 => "mp3",
            CodecId::AUDIO_G726 => "g726",
            _ => "unknown",
        }
    }
}

/// One unit of payload pulled from the session.
///
/// The payload borrows the receiver's read buffer; a frame lives only until it
/// has been written to its pipe.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub kind: MediaKind,
    pub frame_no: u32,
    pub info: FrameInfo,
    pub payload: &'a [u8],
}

impl<'a> Frame<'a> {
    pub fn new(kind: MediaKind, frame_no: u32, info: FrameInfo, payload: &'a [u8]) -> Self {
        Self {
            kind,
            frame_no,
            info,
            payload,
        }
    }

    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// A camera found by the LAN search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanDevice {
    pub uid: String,
    pub ip: String,
    pub port: u16,
}

impl fmt::Display for LanDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UID[{}] Addr[{}:{}]", self.uid, self.ip, self.port)
    }
}

/// Render the packed AV API version (`0xAABBCCDD`) as `AA.BB.CC.DD`.
pub fn format_api_version(version: u32) -> String {
    let [major, minor, patch, build] = version.to_be_bytes();
    format!("{}.{}.{}.{}", major, minor, patch, build)
}
