use crate::config::{
    AppConfig, CredentialsConfig, MaintenanceConfig, ReceiverConfig, SessionConfig, StreamConfig,
};
use crate::errors::{PipeError, SessionError};
use crate::maintenance::MaintenanceTask;
use crate::pipe::{FramePipe, PipeFabric};
use crate::receiver::{
    AudioReceiver, ReceiverContext, ReceiverExit, ReceiverReport, VideoReceiver,
};
use crate::sdk::{log_sdk_error, AvSdk};
use crate::transcoder::{TranscodeBridge, TranscoderProcess};
use common::IoCtrl;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Account used to open the AV channel
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl From<&CredentialsConfig> for Credentials {
    fn from(config: &CredentialsConfig) -> Self {
        Self::new(config.username.clone(), config.password.clone())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// An authenticated connection with one open AV channel
#[derive(Debug)]
pub struct Session {
    uid: String,
    session_id: i32,
    av_index: i32,
    resend: bool,
}

impl Session {
    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn session_id(&self) -> i32 {
        self.session_id
    }

    pub fn av_index(&self) -> i32 {
        self.av_index
    }

    pub fn resend(&self) -> bool {
        self.resend
    }
}

/// Outcome of a streamed session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    /// `None` when shutdown came before the pipe was open
    pub video: Option<ReceiverReport>,
    pub audio: Option<ReceiverReport>,
}

impl SessionSummary {
    pub fn frames_forwarded(&self) -> u64 {
        self.video.map_or(0, |r| r.frames) + self.audio.map_or(0, |r| r.frames)
    }

    /// True when the device side closed the session
    pub fn ended_by_remote(&self) -> bool {
        [self.video, self.audio]
            .iter()
            .flatten()
            .any(|r| matches!(r.exit, ReceiverExit::SessionEnded(_)))
    }
}

/// Connects to one camera, configures it, streams both media kinds into the
/// transcoder and tears the session down again. At most one session is active.
pub struct SessionController {
    sdk: Arc<dyn AvSdk>,
    bridge: Arc<dyn TranscodeBridge>,
    fabric: PipeFabric,
    session_config: SessionConfig,
    stream_config: StreamConfig,
    receiver_config: ReceiverConfig,
    maintenance_config: MaintenanceConfig,
    cancel: CancellationToken,
    active: AtomicBool,
}

impl SessionController {
    pub fn new(
        sdk: Arc<dyn AvSdk>,
        bridge: Arc<dyn TranscodeBridge>,
        fabric: PipeFabric,
        config: &AppConfig,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            sdk,
            bridge,
            fabric,
            session_config: config.session.clone(),
            stream_config: config.stream.clone(),
            receiver_config: config.receiver.clone(),
            maintenance_config: config.maintenance.clone(),
            cancel,
            active: AtomicBool::new(false),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Connect, authenticate and configure the camera.
    ///
    /// On failure everything acquired so far is released again.
    pub async fn start(
        &self,
        uid: &str,
        credentials: Credentials,
    ) -> Result<Session, SessionError> {
        if self.active.swap(true, Ordering::SeqCst) {
            return Err(SessionError::AlreadyActive);
        }

        let result = self.open(uid, credentials).await;
        if result.is_err() {
            self.active.store(false, Ordering::SeqCst);
        }
        result
    }

    async fn open(&self, uid: &str, credentials: Credentials) -> Result<Session, SessionError> {
        self.ensure_running()?;

        let session_id = self
            .sdk
            .get_session_id()
            .map_err(|source| SessionError::SessionIdUnavailable { source })?;

        info!("Connecting to camera {} (session {})...", uid, session_id);
        let sdk = self.sdk.clone();
        let target = uid.to_string();
        let connected =
            tokio::task::spawn_blocking(move || sdk.connect_by_uid(&target, session_id)).await?;
        let session_id = match connected {
            Ok(session_id) => session_id,
            Err(source) => {
                self.sdk.session_close(session_id);
                return Err(SessionError::ConnectFailed {
                    uid: uid.to_string(),
                    source,
                });
            }
        };
        info!("✓ Connected to camera {}", uid);

        if let Err(e) = self.ensure_running() {
            self.sdk.session_close(session_id);
            return Err(e);
        }

        let sdk = self.sdk.clone();
        let timeout = self.session_config.client_start_timeout;
        let channel = self.session_config.av_channel;
        let started = tokio::task::spawn_blocking(move || {
            sdk.client_start(
                session_id,
                &credentials.username,
                credentials.password(),
                timeout,
                channel,
            )
        })
        .await?;
        let started = match started {
            Ok(started) => started,
            Err(source) => {
                self.sdk.session_close(session_id);
                return Err(SessionError::AuthFailed { source });
            }
        };
        info!(
            "✓ AV client started (AV index {}, service type {:#x}, resend {})",
            started.av_index, started.service_type, started.resend
        );

        let session = Session {
            uid: uid.to_string(),
            session_id,
            av_index: started.av_index,
            resend: started.resend,
        };

        if let Err(e) = self.configure(&session) {
            self.teardown(&session, None).await;
            return Err(e);
        }

        Ok(session)
    }

    /// Send the stream settings, then start video and audio.
    fn configure(&self, session: &Session) -> Result<(), SessionError> {
        let channel = self.session_config.stream_channel;

        self.send_command(session, IoCtrl::SetNightVision(self.stream_config.night_vision))?;
        self.ensure_running()?;
        self.send_command(
            session,
            IoCtrl::SetStreamQuality {
                channel,
                quality: self.stream_config.quality,
            },
        )?;
        self.ensure_running()?;

        // Drop anything buffered before the camera starts streaming
        self.sdk.clean_video_buf(session.av_index);
        self.sdk.clean_audio_buf(session.av_index);

        self.send_command(session, IoCtrl::StartVideo { channel })?;
        self.ensure_running()?;
        self.send_command(session, IoCtrl::StartAudio { channel })?;
        Ok(())
    }

    fn send_command(&self, session: &Session, command: IoCtrl) -> Result<(), SessionError> {
        match self.sdk.send_ioctrl(session.av_index, &command) {
            Ok(()) => {
                info!("✓ Sent '{}'", command);
                Ok(())
            }
            Err(source) => {
                log_sdk_error("io control", &source);
                Err(SessionError::ControlRejected {
                    command: command.to_string(),
                    source,
                })
            }
        }
    }

    fn ensure_running(&self) -> Result<(), SessionError> {
        if self.cancel.is_cancelled() {
            info!("Shutdown requested, aborting session startup");
            Err(SessionError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Stream until both receivers have finished, then tear the session down.
    pub async fn run(&self, session: Session) -> Result<SessionSummary, SessionError> {
        let mut transcoder = match self.bridge.launch().await {
            Ok(transcoder) => transcoder,
            Err(e) => {
                error!("Failed to start transcoder: {}", e);
                self.teardown(&session, None).await;
                return Err(e.into());
            }
        };

        let summary = self.stream(&session).await;
        self.teardown(&session, Some(transcoder.as_mut())).await;

        if let Ok(summary) = &summary {
            info!(
                "Session with {} finished, {} frames forwarded",
                session.uid,
                summary.frames_forwarded()
            );
        }
        summary
    }

    async fn stream(&self, session: &Session) -> Result<SessionSummary, SessionError> {
        // Child token so a receiver that cannot open its pipe stops its sibling
        let ctx = ReceiverContext {
            sdk: self.sdk.clone(),
            av_index: session.av_index,
            config: self.receiver_config.clone(),
            cancel: self.cancel.child_token(),
        };

        let video = self.spawn_video(ctx.clone());
        let audio = self.spawn_audio(ctx);

        let maintenance = self.maintenance_config.enabled.then(|| {
            MaintenanceTask::new(
                self.sdk.clone(),
                session.av_index,
                self.maintenance_config.buffer_clean_interval,
            )
            .spawn()
        });

        let (video, audio) = tokio::join!(video, audio);

        if let Some(task) = maintenance {
            task.abort();
            debug!("Buffer maintenance stopped");
        }

        let mut failure = None;
        let summary = SessionSummary {
            video: settle(video?, &mut failure),
            audio: settle(audio?, &mut failure),
        };
        match failure {
            Some(err) => Err(err.into()),
            None => Ok(summary),
        }
    }

    fn spawn_video(&self, ctx: ReceiverContext) -> JoinHandle<Result<ReceiverReport, PipeError>> {
        let pipe = self.fabric.video().clone();
        let timeout = self.fabric.open_timeout();

        tokio::spawn(async move {
            let writer = open_or_abandon(&pipe, timeout, &ctx.cancel).await?;
            Ok(VideoReceiver::new(ctx).run(writer).await)
        })
    }

    fn spawn_audio(&self, ctx: ReceiverContext) -> JoinHandle<Result<ReceiverReport, PipeError>> {
        let pipe = self.fabric.audio().clone();
        let timeout = self.fabric.open_timeout();

        tokio::spawn(async move {
            let writer = open_or_abandon(&pipe, timeout, &ctx.cancel).await?;
            Ok(AudioReceiver::new(ctx).run(writer).await)
        })
    }

    /// Best-effort release of everything the session holds.
    async fn teardown(&self, session: &Session, transcoder: Option<&mut dyn TranscoderProcess>) {
        info!("Tearing down session {} with {}", session.session_id, session.uid);

        let stop = IoCtrl::StopVideo {
            channel: self.session_config.stream_channel,
        };
        match self.sdk.send_ioctrl(session.av_index, &stop) {
            Ok(()) => info!("✓ Sent '{}'", stop),
            Err(err) => log_sdk_error("stop", &err),
        }

        if let Some(transcoder) = transcoder {
            if let Err(e) = transcoder.terminate().await {
                warn!("Failed to terminate transcoder: {}", e);
            }
        }

        self.sdk
            .client_exit(session.session_id, self.session_config.av_channel);
        self.sdk.client_stop(session.av_index);
        info!("AV client stopped");

        self.sdk.session_close(session.session_id);
        info!("✓ Session {} closed", session.session_id);

        self.active.store(false, Ordering::SeqCst);
    }
}

/// Open the write end. On failure the sibling receiver is stopped too.
async fn open_or_abandon(
    pipe: &FramePipe,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<tokio::net::unix::pipe::Sender, PipeError> {
    match pipe.open_writer(timeout, cancel).await {
        Ok(writer) => Ok(writer),
        Err(err) => {
            match &err {
                PipeError::Cancelled { .. } => debug!("{}", err),
                _ => error!("{} pipe unavailable, stopping session: {}", pipe.kind(), err),
            }
            cancel.cancel();
            Err(err)
        }
    }
}

/// Keep the first real pipe failure; a cancelled open is not one.
fn settle(
    result: Result<ReceiverReport, PipeError>,
    failure: &mut Option<PipeError>,
) -> Option<ReceiverReport> {
    match result {
        Ok(report) => Some(report),
        Err(PipeError::Cancelled { .. }) => None,
        Err(err) => {
            failure.get_or_insert(err);
            None
        }
    }
}
