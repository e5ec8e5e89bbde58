use anyhow::Context;
use clap::{value_parser, Arg, ArgAction, Command};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use camera_proxy::app::{AppBuilder, RunOutcome};
use camera_proxy::config::ConfigManager;
use camera_proxy::errors::ProxyError;

fn cli() -> Command {
    Command::new("camera-proxy")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Bridges a P2P camera's audio and video to an RTSP server")
        .arg(
            Arg::new("uid")
                .value_name("UID")
                .help("Unique device identifier of the camera")
                .required(true),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file")
                .value_parser(value_parser!(PathBuf))
                .default_value("camera-proxy.toml"),
        )
        .arg(
            Arg::new("simulate")
                .long("simulate")
                .help("Use the built-in camera simulator instead of the vendor SDK")
                .action(ArgAction::SetTrue),
        )
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    let uid = matches
        .get_one::<String>("uid")
        .cloned()
        .context("camera UID is required")?;
    let config_path = matches
        .get_one::<PathBuf>("config")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("camera-proxy.toml"));
    let simulate = matches.get_flag("simulate");

    // Loaded before logging is set up since it picks the log level
    let mut manager = ConfigManager::new(config_path);
    let config_found = manager.config_path().exists();
    manager.load().await.with_context(|| {
        format!(
            "loading configuration from {}",
            manager.config_path().display()
        )
    })?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&manager.get_config().logging.level)),
        )
        .with_target(false)
        .init();

    if !config_found {
        warn!(
            "Config file {} not found, using defaults",
            manager.config_path().display()
        );
    }
    let config = manager.into_config();

    info!("🚀 Camera proxy starting...");
    info!("  Camera UID: {}", uid);
    info!("  RTSP URL: {}", config.transcoder.rtsp_url);
    if simulate {
        warn!("⚠️  Simulated camera, no vendor SDK in use");
    }

    let app = AppBuilder::new()
        .with_config(config)
        .with_simulator(simulate)
        .build()
        .await?;

    let _signals = app
        .shutdown()
        .clone()
        .listen()
        .map_err(ProxyError::Signal)?;

    match app.run(&uid).await {
        Ok(RunOutcome::SessionEnded(summary)) => {
            info!(
                "Camera closed the session, {} frames forwarded",
                summary.frames_forwarded()
            );
        }
        Ok(RunOutcome::Interrupted { .. }) => info!("✓ Shutdown complete"),
        Err(e) => {
            error!("❌ {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
