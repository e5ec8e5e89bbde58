use serde::{Deserialize, Serialize};
use std::fmt;

/// IO control message types understood by the camera
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[repr(u32)]
pub enum IoCtrlType {
    Start = 0x01FF,
    Stop = 0x02FF,
    AudioStart = 0x0300,
    SetStreamCtrlReq = 0x0320,
    SetGrayModeReq = 0x5000,
}

impl IoCtrlType {
    pub fn code(self) -> u32 {
        self as u32
    }
}

/// Night vision (gray mode) setting
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum NightVision {
    #[default]
    Off,
    On,
}

impl NightVision {
    /// `(channel, mode)` pair of the gray mode request.
    fn request_fields(self) -> (u32, u32) {
        match self {
            NightVision::Off => (1, 1),
            NightVision::On => (0, 0),
        }
    }
}

/// Stream quality presets
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum StreamQuality {
    Max = 1,
    #[default]
    High = 2,
    Middle = 3,
    Low = 4,
    Min = 5,
}

/// A control command sent over the AV channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoCtrl {
    SetNightVision(NightVision),
    SetStreamQuality { channel: u32, quality: StreamQuality },
    StartVideo { channel: u32 },
    StopVideo { channel: u32 },
    StartAudio { channel: u32 },
}

impl IoCtrl {
    pub fn io_type(&self) -> IoCtrlType {
        match self {
            IoCtrl::SetNightVision(_) => IoCtrlType::SetGrayModeReq,
            IoCtrl::SetStreamQuality { .. } => IoCtrlType::SetStreamCtrlReq,
            IoCtrl::StartVideo { .. } => IoCtrlType::Start,
            IoCtrl::StopVideo { .. } => IoCtrlType::Stop,
            IoCtrl::StartAudio { .. } => IoCtrlType::AudioStart,
        }
    }

    /// Encode the request body. Every body is eight bytes, little-endian.
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::with_capacity(8);
        match *self {
            IoCtrl::SetNightVision(mode) => {
                let (channel, mode) = mode.request_fields();
                body.extend_from_slice(&channel.to_le_bytes());
                body.extend_from_slice(&mode.to_le_bytes());
            }
            IoCtrl::SetStreamQuality { channel, quality } => {
                body.extend_from_slice(&channel.to_le_bytes());
                body.push(quality as u8);
                body.extend_from_slice(&[0u8; 3]);
            }
            IoCtrl::StartVideo { channel }
            | IoCtrl::StopVideo { channel }
            | IoCtrl::StartAudio { channel } => {
                body.extend_from_slice(&channel.to_le_bytes());
                body.extend_from_slice(&[0u8; 4]);
            }
        }
        body
    }
}

impl fmt::Display for IoCtrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoCtrl::SetNightVision(mode) => write!(f, "set night vision {:?}", mode),
            IoCtrl::SetStreamQuality { quality, .. } => write!(f, "set stream quality {:?}", quality),
            IoCtrl::StartVideo { .. } => write!(f, "start video"),
            IoCtrl::StopVideo { .. } => write!(f, "stop video"),
            IoCtrl::StartAudio { .. } => write!(f, "start audio"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_type_codes() {
        assert_eq!(IoCtrl::SetNightVision(NightVision::Off).io_type().code(), 0x5000);
        assert_eq!(
            IoCtrl::SetStreamQuality { channel: 0, quality: StreamQuality::High }
                .io_type()
                .code(),
            0x0320
        );
        assert_eq!(IoCtrl::StartVideo { channel: 0 }.io_type().code(), 0x01FF);
        assert_eq!(IoCtrl::StopVideo { channel: 0 }.io_type().code(), 0x02FF);
        assert_eq!(IoCtrl::StartAudio { channel: 0 }.io_type().code(), 0x0300);
    }

    #[test]
    fn test_night_vision_body() {
        assert_eq!(
            IoCtrl::SetNightVision(NightVision::Off).encode(),
            vec![1, 0, 0, 0, 1, 0, 0, 0]
        );
        assert_eq!(IoCtrl::SetNightVision(NightVision::On).encode(), vec![0; 8]);
    }

    #[test]
    fn test_quality_body() {
        let body = IoCtrl::SetStreamQuality {
            channel: 0,
            quality: StreamQuality::High,
        }
        .encode();
        assert_eq!(body, vec![0, 0, 0, 0, 2, 0, 0, 0]);
    }

    #[test]
    fn test_stream_body_is_zeroed_for_channel_zero() {
        assert_eq!(IoCtrl::StartVideo { channel: 0 }.encode(), vec![0; 8]);
        assert_eq!(
            IoCtrl::StopVideo { channel: 1 }.encode(),
            vec![1, 0, 0, 0, 0, 0, 0, 0]
        );
    }
}
