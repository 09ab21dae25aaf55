use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use modem_autoanswer::{
    CallSession, Monitor, MonitorExit, SerialModem, SerialSettings, SessionReport,
};

mod cli;

use cli::Cli;

#[derive(Serialize)]
struct JsonOut<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Serialize)]
struct SessionSummary {
    answered: bool,
    states: Vec<&'static str>,
    stop_reason: Option<String>,
    channel_error: Option<String>,
    playback_error: Option<String>,
}

impl From<&SessionReport> for SessionSummary {
    fn from(report: &SessionReport) -> Self {
        Self {
            answered: report.answered(),
            states: report
                .states()
                .iter()
                .map(|s| s.as_str())
                .collect(),
            stop_reason: report
                .stop_reason()
                .map(|r| r.to_string()),
            channel_error: report
                .channel_error()
                .map(|e| e.to_string()),
            playback_error: report
                .playback_error()
                .map(|e| e.to_string()),
        }
    }
}

fn print_report(json: bool, report: &SessionReport) {
    if !json {
        return;
    }
    let out = JsonOut {
        ok: report.is_clean(),
        data: SessionSummary::from(report),
    };
    match serde_json::to_string(&out) {
        Ok(line) => println!("{}", line),
        Err(e) => warn!("Failed to serialize session summary: {}", e),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_filter())),
        )
        .init();

    let config = cli
        .session_config()
        .context("invalid session configuration")?;
    let player = cli.audio_player();
    let port = cli.resolve_port()?;

    info!("Starting modem controller (port={}, baud={})", port, cli.baud);
    let modem = SerialModem::open(SerialSettings::new(&port).baud_rate(cli.baud))
        .await
        .with_context(|| format!("cannot use serial port {}", port))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c()
            .await
            .is_ok()
        {
            info!("Interrupt received, finishing current session");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut session = CallSession::new(modem, player).with_shutdown(shutdown_rx);
    session
        .initialize()
        .await
        .context("failed to initialize modem")?;

    let mut monitor = Monitor::new(session).once(cli.once);
    let exit = monitor
        .run(&config, |report| print_report(cli.json, report))
        .await
        .context("modem channel failed; reopen the port to continue")?;

    match exit {
        MonitorExit::CallHandled => info!("Call handled, exiting"),
        MonitorExit::Stopped(reason) => info!(
            "Stopped after {} call(s): {}",
            monitor.calls_handled(),
            reason
        ),
    }
    Ok(())
}
