use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use common::{NightVision, StreamQuality};
use tracing::info;
use crate::errors::ConfigError;

/// Application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// AV login for the camera
    pub credentials: CredentialsConfig,

    /// SDK and connection settings
    pub session: SessionConfig,

    /// Camera-side stream settings sent as control commands
    pub stream: StreamConfig,

    /// Named pipes shared with the transcoder
    pub pipes: PipeConfig,

    /// Receiver loop tuning
    pub receiver: ReceiverConfig,

    /// Periodic SDK buffer cleaning
    pub maintenance: MaintenanceConfig,

    /// External transcoder process
    pub transcoder: TranscoderConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Local UDP port handed to the SDK (0 = any)
    pub udp_port: u16,

    /// Maximum number of AV channels the SDK may allocate
    pub max_av_channels: u32,

    /// Authentication / channel open timeout
    #[serde(with = "crate::serde_helpers::millis")]
    pub client_start_timeout: Duration,

    /// IOTC channel the AV client is started on
    pub av_channel: u8,

    /// Channel field carried in stream start/stop commands
    pub stream_channel: u32,

    /// Run one LAN search at startup and log the cameras found
    pub lan_search: bool,

    pub lan_search_max_devices: usize,

    #[serde(with = "crate::serde_helpers::millis")]
    pub lan_search_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct StreamConfig {
    pub night_vision: NightVision,
    pub quality: StreamQuality,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipeConfig {
    pub video_path: PathBuf,
    pub audio_path: PathBuf,

    /// How long a receiver waits for the transcoder to open the read end
    #[serde(with = "crate::serde_helpers::millis")]
    pub open_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Backoff between polls when no frame is ready
    #[serde(with = "crate::serde_helpers::millis")]
    pub poll_interval: Duration,

    pub video_buffer_size: usize,
    pub audio_buffer_size: usize,

    /// Minimum buffered audio frames before draining
    pub audio_buffer_threshold: u32,

    /// Consecutive failed pipe writes tolerated before a receiver gives up
    pub max_consecutive_write_failures: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub enabled: bool,

    /// Full cycle: the video buffer is cleared half way through, the audio
    /// buffer at the end
    #[serde(with = "crate::serde_helpers::millis")]
    pub buffer_clean_interval: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscoderConfig {
    /// Transcoder executable
    pub program: String,

    /// RTSP publish endpoint on the local media server
    pub rtsp_url: String,

    pub audio_sample_rate: u32,
    pub audio_channels: u32,
    pub audio_bitrate: u32,
    pub thread_queue_size: u32,

    /// Rotate the picture by 180 degrees (forces a video re-encode)
    pub flip: bool,

    /// Full argument list replacing the generated one. `{video}`, `{audio}`
    /// and `{rtsp_url}` are substituted.
    pub command: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "123456".to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            udp_port: 0,
            max_av_channels: 32,
            client_start_timeout: Duration::from_secs(20),
            av_channel: 0,
            stream_channel: 0,
            lan_search: true,
            lan_search_max_devices: 12,
            lan_search_timeout: Duration::from_millis(1000),
        }
    }
}

impl Default for PipeConfig {
    fn default() -> Self {
        Self {
            video_path: PathBuf::from("fifos/video_fifo"),
            audio_path: PathBuf::from("fifos/audio_fifo"),
            open_timeout: Duration::from_secs(10),
        }
    }
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            video_buffer_size: 128_000,
            audio_buffer_size: 1024,
            audio_buffer_threshold: 25,
            max_consecutive_write_failures: 50,
        }
    }
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            buffer_clean_interval: Duration::from_secs(60),
        }
    }
}

impl Default for TranscoderConfig {
    fn default() -> Self {
        Self {
            program: "ffmpeg".to_string(),
            rtsp_url: "rtsp://localhost:8554/stream".to_string(),
            audio_sample_rate: 8000,
            audio_channels: 1,
            audio_bitrate: 32000,
            thread_queue_size: 4096,
            flip: false,
            command: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration manager for loading and validating configurations
pub struct ConfigManager {
    config_path: PathBuf,
    config: AppConfig,
}

impl ConfigManager {
    /// Create a new configuration manager
    pub fn new(config_path: PathBuf) -> Self {
        Self {
            config_path,
            config: AppConfig::default(),
        }
    }

    /// Load configuration from file, then apply environment overrides.
    ///
    /// A missing file is not an error: the built-in defaults are used.
    pub async fn load(&mut self) -> Result<(), ConfigError> {
        if self.config_path.exists() {
            let content = tokio::fs::read_to_string(&self.config_path)
                .await
                .map_err(|e| ConfigError::Read {
                    path: self.config_path.clone(),
                    source: e,
                })?;
            self.config = Self::parse(&content)?;
        } else {
            info!(
                "Config file {:?} not found, using defaults",
                self.config_path
            );
        }

        EnvConfigOverride::apply_overrides(&mut self.config);
        self.validate()?;
        Ok(())
    }

    /// Parse a TOML document into an [`AppConfig`]
    pub fn parse(content: &str) -> Result<AppConfig, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            message: e.to_string(),
        })
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Get the current configuration
    pub fn get_config(&self) -> &AppConfig {
        &self.config
    }

    pub fn into_config(self) -> AppConfig {
        self.config
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate(&self.config)
    }
}

pub fn validate(config: &AppConfig) -> Result<(), ConfigError> {
    let invalid = |message: &str| {
        Err(ConfigError::Invalid {
            message: message.to_string(),
        })
    };

    if config.credentials.username.is_empty() {
        return invalid("AV username cannot be empty");
    }
    if config.credentials.password.is_empty() {
        return invalid("AV password cannot be empty");
    }

    if config.session.max_av_channels == 0 {
        return invalid("Max AV channels must be greater than 0");
    }

    if config.pipes.video_path.as_os_str().is_empty() || config.pipes.audio_path.as_os_str().is_empty() {
        return invalid("Pipe paths cannot be empty");
    }
    if config.pipes.video_path == config.pipes.audio_path {
        return invalid("Video and audio pipes must be different paths");
    }

    if config.receiver.poll_interval.is_zero() {
        return invalid("Receiver poll interval must be greater than 0");
    }
    if config.receiver.video_buffer_size == 0 || config.receiver.audio_buffer_size == 0 {
        return invalid("Receiver buffer sizes must be greater than 0");
    }
    if config.receiver.max_consecutive_write_failures == 0 {
        return invalid("Max consecutive write failures must be greater than 0");
    }

    if config.maintenance.enabled && config.maintenance.buffer_clean_interval < Duration::from_millis(2) {
        return invalid("Buffer clean interval is too short");
    }

    if config.transcoder.rtsp_url.is_empty() {
        return invalid("RTSP URL cannot be empty");
    }
    if let Some(command) = &config.transcoder.command {
        if command.is_empty() {
            return invalid("Transcoder command override cannot be empty");
        }
    } else if config.transcoder.program.is_empty() {
        return invalid("Transcoder program cannot be empty");
    }

    Ok(())
}

/// Environment-based configuration override
pub struct EnvConfigOverride;

impl EnvConfigOverride {
    /// Apply environment variable overrides to configuration
    pub fn apply_overrides(config: &mut AppConfig) {
        Self::apply_from(config, |key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_from<F>(config: &mut AppConfig, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Credentials overrides
        if let Some(username) = lookup("CAMERA_PROXY_AV_USERNAME") {
            config.credentials.username = username;
        }
        if let Some(password) = lookup("CAMERA_PROXY_AV_PASSWORD") {
            config.credentials.password = password;
        }

        // Transcoder overrides
        if let Some(url) = lookup("CAMERA_PROXY_RTSP_URL") {
            config.transcoder.rtsp_url = url;
        }

        // Pipe overrides
        if let Some(dir) = lookup("CAMERA_PROXY_FIFO_DIR") {
            let dir = PathBuf::from(dir);
            config.pipes.video_path = dir.join("video_fifo");
            config.pipes.audio_path = dir.join("audio_fifo");
        }

        // Logging overrides
        if let Some(level) = lookup("CAMERA_PROXY_LOG_LEVEL") {
            config.logging.level = level;
        }
    }
}
