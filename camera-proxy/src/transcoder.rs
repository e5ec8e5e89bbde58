use crate::config::TranscoderConfig;
use crate::errors::TranscodeError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::{info, warn};

/// A running transcoder
#[async_trait]
pub trait TranscoderProcess: Send {
    /// OS process id, if there is one
    fn id(&self) -> Option<u32>;

    /// Force the process to stop and reap it
    async fn terminate(&mut self) -> Result<(), TranscodeError>;
}

/// Starts the process that muxes both pipes and publishes them over RTSP.
///
/// Its output is never inspected; it is only started and killed.
#[async_trait]
pub trait TranscodeBridge: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn TranscoderProcess>, TranscodeError>;
}

/// Handle to a spawned transcoder child. Dropping it kills the child.
pub struct TranscoderHandle {
    program: String,
    child: Child,
}

#[async_trait]
impl TranscoderProcess for TranscoderHandle {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn terminate(&mut self) -> Result<(), TranscodeError> {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                warn!("{} already exited with status: {}", self.program, status);
                return Ok(());
            }
            Ok(None) => {}
            Err(e) => return Err(TranscodeError::TerminateFailed(e)),
        }

        self.child
            .kill()
            .await
            .map_err(TranscodeError::TerminateFailed)?;
        info!("{} process terminated", self.program);
        Ok(())
    }
}

/// ffmpeg bridge reading raw PCM and raw H.264 from the pipes
#[derive(Debug, Clone)]
pub struct FfmpegBridge {
    config: TranscoderConfig,
    video_path: PathBuf,
    audio_path: PathBuf,
}

impl FfmpegBridge {
    pub fn new(config: TranscoderConfig, video_path: &Path, audio_path: &Path) -> Self {
        Self {
            config,
            video_path: video_path.to_path_buf(),
            audio_path: audio_path.to_path_buf(),
        }
    }

    /// Arguments passed to the transcoder executable
    pub fn build_args(&self) -> Result<Vec<String>, TranscodeError> {
        let video = self.video_path.display().to_string();
        let audio = self.audio_path.display().to_string();

        if let Some(command) = &self.config.command {
            if command.is_empty() {
                return Err(TranscodeError::EmptyCommand);
            }
            return Ok(command
                .iter()
                .map(|arg| {
                    arg.replace("{video}", &video)
                        .replace("{audio}", &audio)
                        .replace("{rtsp_url}", &self.config.rtsp_url)
                })
                .collect());
        }

        let cfg = &self.config;
        let queue = cfg.thread_queue_size.to_string();
        let mut args: Vec<String> = vec![
            "-re".into(),
            "-hide_banner".into(),
            // Audio input: raw little-endian PCM
            "-thread_queue_size".into(),
            queue.clone(),
            "-f".into(),
            "s16le".into(),
            "-ar".into(),
            cfg.audio_sample_rate.to_string(),
            "-ac".into(),
            cfg.audio_channels.to_string(),
            "-i".into(),
            audio,
            // Video input: H.264 elementary stream
            "-thread_queue_size".into(),
            queue,
            "-f".into(),
            "h264".into(),
            "-i".into(),
            video,
            "-c:a".into(),
            "aac".into(),
            "-b:a".into(),
            cfg.audio_bitrate.to_string(),
        ];

        if cfg.flip {
            args.extend(
                [
                    "-vf",
                    "hflip,vflip",
                    "-c:v",
                    "libx264",
                    "-preset",
                    "ultrafast",
                    "-tune",
                    "zerolatency",
                ]
                .map(String::from),
            );
        } else {
            args.extend(["-c:v", "copy"].map(String::from));
        }

        args.extend(["-f", "rtsp", "-rtsp_transport", "tcp"].map(String::from));
        args.push(cfg.rtsp_url.clone());
        Ok(args)
    }
}

#[async_trait]
impl TranscodeBridge for FfmpegBridge {
    async fn launch(&self) -> Result<Box<dyn TranscoderProcess>, TranscodeError> {
        let args = self.build_args()?;
        let program = self.config.program.clone();

        let mut cmd = Command::new(&program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        info!("Starting transcoder with command: {:?}", cmd);

        let child = cmd.spawn().map_err(|source| TranscodeError::SpawnFailed {
            program: program.clone(),
            source,
        })?;

        info!(
            "✓ Transcoder started (pid {}), publishing to {}",
            child.id().unwrap_or_default(),
            self.config.rtsp_url
        );

        Ok(Box::new(TranscoderHandle { program, child }))
    }
}
