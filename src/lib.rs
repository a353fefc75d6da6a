pub mod analysis;
pub mod archive;
pub mod blocking;
pub mod blocklist;
pub mod capture;
pub mod config;
pub mod error;
pub mod monitor;
pub mod server;
pub mod session;
pub mod speech;
mod utils;

use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info, warn};
use tokio::{io::BufReader, task::JoinHandle};

use analysis::{OpenAiVision, VisionModel};
use archive::ResultsArchive;
use blocking::{BlockingGate, HostsFile};
use blocklist::Blocklist;
use capture::CommandCapture;
use monitor::{MonitorController, MonitorDeps};
use server::AppState;
use session::{console::run_console, ConfirmationGate, ModeRequest, SessionController, SessionMode};
use speech::SpeechService;

pub use config::Config;
pub use error::DeepWorkError;

pub async fn run(config: Config) -> Result<()> {
    config.validate()?;

    let blocklist = Blocklist::load(config.blocklist.as_deref())?;
    info!(
        "Blocklist: {} site(s), {} process name(s)",
        blocklist.websites.len(),
        blocklist.processes.len()
    );

    let hosts = HostsFile::new(config.hosts_path.clone(), config.redirect_ip.clone())
        .with_dns_flush(!config.no_dns_flush);
    let gate = BlockingGate::new(hosts, blocklist, config.sweep_interval());
    gate.recover();

    let model = OpenAiVision::new(config.vision_settings())?;
    info!(
        "Vision model: {} ({})",
        model.name(),
        if model.is_local() { "local" } else { "OpenAI" }
    );

    let speech = SpeechService::new(&config.speech_settings())?;
    info!("Speech backend: {:?}", speech.backend());

    let capture = CommandCapture::new(
        config.screen_command.clone(),
        config.monitors,
        config.webcam_command(),
        config.webcam_scale,
    );

    let archive = config
        .results_dir
        .clone()
        .map(ResultsArchive::open)
        .transpose()?;

    let monitor = MonitorController::new(
        MonitorDeps {
            source: Arc::new(capture),
            model: Arc::new(model),
            speaker: Arc::new(speech),
            archive: archive.clone(),
        },
        config.monitor_settings()?,
    );

    let controller = SessionController::new(
        gate,
        monitor,
        ConfirmationGate::new(config.confirmation_phrase.clone()),
        &config.task,
    );

    // Bound before any blocking starts, so a failed bind leaves the hosts file alone.
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.bind))?;
    info!("Control panel at http://{}", config.bind);

    if config.start_on {
        if let Err(err) = controller.set_mode(ModeRequest::new(SessionMode::On)).await {
            error!("Could not start in ON mode: {err}");
        }
    }

    let console = config.console.then(|| {
        let controller = controller.clone();
        tokio::spawn(async move {
            run_console(controller, BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await
        })
    });

    let app = server::router(AppState {
        controller: controller.clone(),
        archive,
    });

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(console))
        .await
        .context("HTTP server failed");

    controller.shutdown().await;
    served
}

/// Resolves on Ctrl-C, or when the console exits.
async fn shutdown_signal(console: Option<JoinHandle<Result<()>>>) {
    let console_closed = async {
        match console {
            Some(handle) => match handle.await {
                Ok(Ok(())) => info!("Console closed"),
                Ok(Err(err)) => warn!("Console failed: {err:#}"),
                Err(err) => warn!("Console task failed: {err}"),
            },
            None => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => match result {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(err) => error!("Failed to listen for Ctrl-C: {err}"),
        },
        _ = console_closed => {}
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use clap::Parser;

    use super::*;

    #[tokio::test]
    async fn failed_bind_leaves_the_hosts_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let hosts = dir.path().join("hosts");
        fs::write(&hosts, "127.0.0.1 localhost\n").unwrap();
        let blocklist = dir.path().join("blocklist.json");
        fs::write(
            &blocklist,
            r#"{"websites": ["example.org"], "processes": ["not-a-real-app-7f3.exe"]}"#,
        )
        .unwrap();

        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap().to_string();
        let config = Config::try_parse_from([
            "deepwork",
            "--bind",
            &addr,
            "--start-on",
            "--model",
            "gemma3:4b",
            "--hosts-path",
            hosts.to_str().unwrap(),
            "--blocklist",
            blocklist.to_str().unwrap(),
            "--no-dns-flush",
            "--webcam-command",
            "",
        ])
        .unwrap();

        let err = run(config).await.unwrap_err();

        assert!(format!("{err:#}").contains("failed to bind"));
        assert_eq!(fs::read_to_string(&hosts).unwrap(), "127.0.0.1 localhost\n");
    }
}
