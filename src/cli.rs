use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use modem_autoanswer::{
    available_ports,
    constants::{DEFAULT_AUDIO_FILE, DEFAULT_BAUD_RATE, DEFAULT_DTMF},
    detect_default_port, prompt_select_port, CommandPlayer, DtmfDigits, ModemError, SessionConfig,
};

#[derive(Parser, Debug)]
#[command(
    name = "modem-autoanswer",
    version,
    about = "Answer incoming calls on a USB modem, play a message, send DTMF and hang up"
)]
pub struct Cli {
    #[arg(long, env = "MODEM_PORT", help = "Serial port to use (default: auto-detect)")]
    pub port: Option<String>,
    #[arg(
        long,
        conflicts_with = "port",
        help = "Choose the serial port interactively from the detected ports"
    )]
    pub select_port: bool,
    #[arg(long, env = "MODEM_BAUD", default_value_t = DEFAULT_BAUD_RATE, help = "Baud rate")]
    pub baud: u32,
    #[arg(
        long,
        env = "MODEM_AUDIO",
        default_value = DEFAULT_AUDIO_FILE,
        help = "Audio file to play on answer"
    )]
    pub audio: PathBuf,
    #[arg(
        long,
        env = "MODEM_DTMF",
        default_value = DEFAULT_DTMF,
        help = "DTMF tones to send after playback"
    )]
    pub dtmf: String,
    #[arg(long, help = "Disable audio playback even if a player exists")]
    pub no_audio: bool,
    #[arg(long, help = "Do not send DTMF tones")]
    pub no_dtmf: bool,
    #[arg(long, env = "MODEM_PLAYER", help = "Audio player program (default: afplay, aplay or play)")]
    pub player: Option<PathBuf>,
    #[arg(long, value_name = "SECS", help = "Stop if no call arrives within this many seconds")]
    pub ring_timeout: Option<u64>,
    #[arg(long, help = "Exit after handling one call")]
    pub once: bool,
    #[arg(long, help = "Print one JSON summary per session")]
    pub json: bool,
    #[arg(long, help = "Enable debug logging")]
    pub verbose: bool,
}

impl Cli {
    /// Session configuration from the flags. Fails on an invalid DTMF sequence.
    pub fn session_config(&self) -> Result<SessionConfig, ModemError> {
        let dtmf = if self.no_dtmf {
            None
        } else {
            Some(DtmfDigits::new(&self.dtmf)?)
        };
        Ok(SessionConfig {
            audio: Some(
                self.audio
                    .clone(),
            ),
            dtmf,
            disable_playback: self.no_audio,
            ring_timeout: self
                .ring_timeout
                .map(Duration::from_secs),
        })
    }

    /// The audio player to use. Discovery is skipped when playback is off.
    pub fn audio_player(&self) -> CommandPlayer {
        match (&self.player, self.no_audio) {
            (_, true) => CommandPlayer::disabled(),
            (Some(program), false) => CommandPlayer::new(program),
            (None, false) => CommandPlayer::discover(),
        }
    }

    /// The serial port: explicit, chosen interactively, or auto-detected.
    pub fn resolve_port(&self) -> anyhow::Result<String> {
        if let Some(port) = &self.port {
            return Ok(port.clone());
        }
        if self.select_port {
            let choices = available_ports().context("failed to enumerate serial ports")?;
            if choices.is_empty() {
                return Err(ModemError::NoPortFound.into());
            }
            return match prompt_select_port(&choices, stdin_prompt) {
                Some(port) => Ok(port),
                None => bail!("no serial port selected"),
            };
        }
        detect_default_port().ok_or_else(|| ModemError::NoPortFound.into())
    }

    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> &'static str {
        if self.verbose {
            "modem_autoanswer=debug,info"
        } else {
            "info"
        }
    }
}

/// Print `prompt` and read one line from stdin; `None` at end of input.
fn stdin_prompt(prompt: &str) -> Option<String> {
    let mut stdout = io::stdout();
    let _ = write!(stdout, "{}", prompt);
    let _ = stdout.flush();

    let mut answer = String::new();
    match io::stdin()
        .lock()
        .read_line(&mut answer)
    {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(answer),
    }
}
