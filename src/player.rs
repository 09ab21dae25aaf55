//! Audio playback through an external player program.
//!
//! The call controller only sees the [`AudioPlayer`] capability. Which
//! program is used, and how it is found, is decided here.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::{
    constants::AUDIO_CANDIDATES,
    error::{ModemError, ModemResult},
};

/// How a playback run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackStatus {
    code: Option<i32>,
}

impl PlaybackStatus {
    /// Status with the given exit code (`None` = killed by a signal).
    pub fn from_code(code: Option<i32>) -> Self {
        Self { code }
    }

    /// Successful run.
    pub fn success() -> Self {
        Self { code: Some(0) }
    }

    /// `true` if the player exited with code 0.
    pub fn is_success(&self) -> bool {
        self.code == Some(0)
    }

    /// Exit code, if the player exited normally.
    pub fn code(&self) -> Option<i32> {
        self.code
    }
}

impl From<ExitStatus> for PlaybackStatus {
    fn from(status: ExitStatus) -> Self {
        Self {
            code: status.code(),
        }
    }
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {}", code),
            None => f.write_str("terminated by signal"),
        }
    }
}

/// Plays an audio file to completion.
///
/// An `Err` means playback never started. A player that starts and then
/// fails reports that through the returned status.
#[allow(async_fn_in_trait)]
pub trait AudioPlayer {
    /// Play `path`, returning once playback has finished.
    async fn play(&mut self, path: &Path) -> ModemResult<PlaybackStatus>;
}

impl<P: AudioPlayer> AudioPlayer for &mut P {
    async fn play(&mut self, path: &Path) -> ModemResult<PlaybackStatus> {
        (**self)
            .play(path)
            .await
    }
}

/// Return the first known player program found on `PATH`.
pub fn choose_audio_player() -> Option<PathBuf> {
    AUDIO_CANDIDATES
        .iter()
        .find_map(|name| which::which(name).ok())
}

/// Runs `<program> <file>` as a child process and waits for it.
#[derive(Debug, Clone, Default)]
pub struct CommandPlayer {
    program: Option<PathBuf>,
}

impl CommandPlayer {
    /// Use the given player program.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: Some(program.into()),
        }
    }

    /// Use the first available candidate. Finding none is not an error here;
    /// each playback attempt will report [`ModemError::NoAudioPlayer`].
    pub fn discover() -> Self {
        let program = choose_audio_player();
        match &program {
            Some(p) => info!("[PLAYBACK] Using audio player: {}", p.display()),
            None => warn!(
                "[PLAYBACK] No audio player found (tried: {})",
                AUDIO_CANDIDATES.join(", ")
            ),
        }
        Self { program }
    }

    /// A player that never plays. Used when playback is disabled.
    pub fn disabled() -> Self {
        Self { program: None }
    }

    /// Configured program, if any.
    pub fn program(&self) -> Option<&Path> {
        self.program
            .as_deref()
    }
}

impl AudioPlayer for CommandPlayer {
    async fn play(&mut self, path: &Path) -> ModemResult<PlaybackStatus> {
        let program = self
            .program
            .as_ref()
            .ok_or(ModemError::NoAudioPlayer)?;

        debug!(
            "[PLAYBACK] Spawning {} {}",
            program.display(),
            path.display()
        );
        let status = Command::new(program)
            .arg(path)
            .kill_on_drop(true)
            .status()
            .await
            .map_err(|source| ModemError::PlaybackLaunch {
                program: program
                    .display()
                    .to_string(),
                source,
            })?;

        let status = PlaybackStatus::from(status);
        if !status.is_success() {
            warn!(
                "[PLAYBACK] {} finished with {}",
                program.display(),
                status
            );
        }
        Ok(status)
    }
}
