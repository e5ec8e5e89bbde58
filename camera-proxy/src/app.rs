use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::{self, AppConfig, ConfigManager};
use crate::errors::{ProxyError, SessionError};
use crate::pipe::PipeFabric;
use crate::sdk::{log_sdk_error, AvSdk, SimulatedCamera, SimulatedSdk};
use crate::session::{Credentials, SessionController, SessionSummary};
use crate::shutdown::ShutdownCoordinator;
use crate::transcoder::{FfmpegBridge, TranscodeBridge};
use common::format_api_version;

/// How a run of the proxy ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// Stopped by a signal, possibly before streaming began
    Interrupted { summary: Option<SessionSummary> },
    /// Both receivers finished on their own
    SessionEnded(SessionSummary),
}

/// Application builder for dependency injection and initialization
pub struct AppBuilder {
    config_path: Option<PathBuf>,
    custom_config: Option<AppConfig>,
    custom_sdk: Option<Arc<dyn AvSdk>>,
    custom_bridge: Option<Arc<dyn TranscodeBridge>>,
    shutdown: Option<Arc<ShutdownCoordinator>>,
    simulate: bool,
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            config_path: None,
            custom_config: None,
            custom_sdk: None,
            custom_bridge: None,
            shutdown: None,
            simulate: false,
        }
    }

    /// Set configuration file path
    pub fn with_config_path(mut self, path: PathBuf) -> Self {
        self.config_path = Some(path);
        self
    }

    /// Use an already loaded configuration
    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.custom_config = Some(config);
        self
    }

    pub fn with_sdk(mut self, sdk: Arc<dyn AvSdk>) -> Self {
        self.custom_sdk = Some(sdk);
        self
    }

    pub fn with_bridge(mut self, bridge: Arc<dyn TranscodeBridge>) -> Self {
        self.custom_bridge = Some(bridge);
        self
    }

    pub fn with_shutdown(mut self, shutdown: Arc<ShutdownCoordinator>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Use the built-in camera simulator instead of the vendor library
    pub fn with_simulator(mut self, simulate: bool) -> Self {
        self.simulate = simulate;
        self
    }

    pub async fn build(self) -> Result<CameraProxyApp, ProxyError> {
        let config = match self.custom_config {
            Some(config) => config,
            None => {
                let path = self
                    .config_path
                    .clone()
                    .unwrap_or_else(|| PathBuf::from("camera-proxy.toml"));
                let mut manager = ConfigManager::new(path);
                manager.load().await?;
                manager.into_config()
            }
        };
        config::validate(&config)?;
        debug!("Configuration loaded successfully");

        let sdk = match self.custom_sdk {
            Some(sdk) => sdk,
            None => default_sdk(self.simulate)?,
        };

        let fabric = PipeFabric::from_config(&config.pipes);
        let bridge: Arc<dyn TranscodeBridge> = match self.custom_bridge {
            Some(bridge) => bridge,
            None => Arc::new(FfmpegBridge::new(
                config.transcoder.clone(),
                fabric.video().path(),
                fabric.audio().path(),
            )),
        };

        Ok(CameraProxyApp {
            config,
            sdk,
            bridge,
            fabric,
            shutdown: self.shutdown.unwrap_or_else(ShutdownCoordinator::new),
        })
    }
}

fn default_sdk(simulate: bool) -> Result<Arc<dyn AvSdk>, ProxyError> {
    if simulate {
        Ok(Arc::new(SimulatedSdk::new(SimulatedCamera::default())))
    } else {
        vendor_sdk()
    }
}

#[cfg(feature = "tutk")]
fn vendor_sdk() -> Result<Arc<dyn AvSdk>, ProxyError> {
    Ok(Arc::new(crate::sdk::TutkSdk::new()))
}

#[cfg(not(feature = "tutk"))]
fn vendor_sdk() -> Result<Arc<dyn AvSdk>, ProxyError> {
    Err(ProxyError::SdkUnavailable)
}

/// Bridges one camera to the RTSP server for the lifetime of the process
pub struct CameraProxyApp {
    config: AppConfig,
    sdk: Arc<dyn AvSdk>,
    bridge: Arc<dyn TranscodeBridge>,
    fabric: PipeFabric,
    shutdown: Arc<ShutdownCoordinator>,
}

impl CameraProxyApp {
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn shutdown(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    /// Initialize the SDK, stream from `uid` until the session ends, then
    /// release the SDK.
    pub async fn run(&self, uid: &str) -> Result<RunOutcome, ProxyError> {
        let session = &self.config.session;
        self.sdk
            .initialize(session.udp_port, session.max_av_channels)
            .map_err(|source| SessionError::InitFailed { source })?;

        info!(
            "Camera proxy [{}] AVAPI version[{}]",
            env!("CARGO_PKG_VERSION"),
            format_api_version(self.sdk.api_version())
        );

        if session.lan_search {
            self.search_lan().await;
        }

        let result = self.run_session(uid).await;

        self.sdk.deinitialize();
        info!("SDK deinitialized");
        result
    }

    async fn search_lan(&self) {
        let sdk = self.sdk.clone();
        let max_devices = self.config.session.lan_search_max_devices;
        let timeout = self.config.session.lan_search_timeout;

        info!("LAN search:");
        match tokio::task::spawn_blocking(move || sdk.lan_search(max_devices, timeout)).await {
            Ok(Ok(devices)) if devices.is_empty() => info!("  no devices found"),
            Ok(Ok(devices)) => {
                for (i, device) in devices.iter().enumerate() {
                    info!("  [{}] {}", i, device);
                }
            }
            Ok(Err(err)) => log_sdk_error("lan search", &err),
            Err(e) => debug!("LAN search task failed: {}", e),
        }
    }

    async fn run_session(&self, uid: &str) -> Result<RunOutcome, ProxyError> {
        self.fabric.ensure_all()?;

        let controller = SessionController::new(
            self.sdk.clone(),
            self.bridge.clone(),
            self.fabric.clone(),
            &self.config,
            self.shutdown.token(),
        );

        let credentials = Credentials::from(&self.config.credentials);
        let session = match controller.start(uid, credentials).await {
            Ok(session) => session,
            Err(SessionError::Cancelled) => {
                return Ok(RunOutcome::Interrupted { summary: None })
            }
            Err(e) => return Err(e.into()),
        };

        let summary = controller.run(session).await?;

        if self.shutdown.is_shutting_down() {
            Ok(RunOutcome::Interrupted {
                summary: Some(summary),
            })
        } else {
            Ok(RunOutcome::SessionEnded(summary))
        }
    }
}
