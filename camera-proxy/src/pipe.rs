use crate::config::PipeConfig;
use crate::errors::PipeError;
use common::MediaKind;
use nix::errno::Errno;
use nix::sys::stat::Mode;
use std::os::unix::fs::FileTypeExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::unix::pipe;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const OPEN_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// One named FIFO endpoint
#[derive(Debug, Clone)]
pub struct FramePipe {
    kind: MediaKind,
    path: PathBuf,
}

impl FramePipe {
    pub fn new(kind: MediaKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the FIFO (and its directory) if it does not exist yet.
    ///
    /// An existing FIFO is reused as is. Any other file at the path is an error.
    pub fn ensure(&self) -> Result<(), PipeError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        match std::fs::metadata(&self.path) {
            Ok(meta) if meta.file_type().is_fifo() => {
                debug!("Reusing {} FIFO {}", self.kind, self.path.display());
                return Ok(());
            }
            Ok(_) => {
                return Err(PipeError::NotAFifo {
                    path: self.path.clone(),
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        match nix::unistd::mkfifo(&self.path, Mode::from_bits_truncate(0o644)) {
            Ok(()) => {
                info!("✓ Created {} FIFO {}", self.kind, self.path.display());
                Ok(())
            }
            // Lost a race with another creator, check what is there now
            Err(Errno::EEXIST) => self.ensure(),
            Err(errno) => Err(PipeError::CreateFailed {
                path: self.path.clone(),
                reason: errno.desc().to_string(),
            }),
        }
    }

    /// Open the write end once a reader is attached.
    ///
    /// Opening a FIFO for writing fails with `ENXIO` while nobody reads it, so
    /// the open is retried until `timeout` elapses or `cancel` fires.
    pub async fn open_writer(
        &self,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<pipe::Sender, PipeError> {
        let started = Instant::now();
        let mut waiting_logged = false;

        loop {
            if cancel.is_cancelled() {
                return Err(PipeError::Cancelled {
                    path: self.path.clone(),
                });
            }

            match pipe::OpenOptions::new().open_sender(&self.path) {
                Ok(sender) => {
                    info!("✓ {} pipe {} opened for writing", self.kind, self.path.display());
                    return Ok(sender);
                }
                Err(e) if e.raw_os_error() == Some(Errno::ENXIO as i32) => {
                    if !waiting_logged {
                        debug!("Waiting for a reader on {}", self.path.display());
                        waiting_logged = true;
                    }
                }
                Err(e) => return Err(e.into()),
            }

            let waited = started.elapsed();
            if waited >= timeout {
                warn!(
                    "No reader attached to {} after {:?}",
                    self.path.display(),
                    waited
                );
                return Err(PipeError::NoReader {
                    path: self.path.clone(),
                    waited,
                });
            }

            tokio::select! {
                _ = tokio::time::sleep(OPEN_RETRY_INTERVAL) => {}
                _ = cancel.cancelled() => {
                    return Err(PipeError::Cancelled {
                        path: self.path.clone(),
                    });
                }
            }
        }
    }
}

/// The pair of FIFOs used by one session: H.264 video and PCM audio.
///
/// The receivers are the only writers and the transcoder the only reader.
#[derive(Debug, Clone)]
pub struct PipeFabric {
    video: FramePipe,
    audio: FramePipe,
    open_timeout: Duration,
}

impl PipeFabric {
    pub fn from_config(config: &PipeConfig) -> Self {
        Self {
            video: FramePipe::new(MediaKind::Video, &config.video_path),
            audio: FramePipe::new(MediaKind::Audio, &config.audio_path),
            open_timeout: config.open_timeout,
        }
    }

    /// Create both FIFOs. Must run before the transcoder is launched.
    pub fn ensure_all(&self) -> Result<(), PipeError> {
        self.video.ensure()?;
        self.audio.ensure()?;
        Ok(())
    }

    pub fn pipe(&self, kind: MediaKind) -> &FramePipe {
        match kind {
            MediaKind::Video => &self.video,
            MediaKind::Audio => &self.audio,
        }
    }

    pub fn video(&self) -> &FramePipe {
        &self.video
    }

    pub fn audio(&self) -> &FramePipe {
        &self.audio
    }

    pub fn open_timeout(&self) -> Duration {
        self.open_timeout
    }
}
