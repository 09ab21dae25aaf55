//! Error types for modem control

use crate::constants::AUDIO_CANDIDATES;

/// Errors raised while talking to the modem or running a call session.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ModemError {
    /// Read or write on the serial device failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The serial driver reported an error.
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The serial device could not be opened.
    #[error("failed to open serial port {port}: {source}")]
    PortOpen {
        port: String,
        #[source]
        source: serialport::Error,
    },

    /// The background reader stopped and no more lines will arrive.
    #[error("modem channel closed")]
    ChannelClosed,

    /// A DTMF sequence contained characters the modem cannot send.
    #[error("invalid DTMF sequence {digits:?}: {reason}")]
    InvalidDtmf { digits: String, reason: String },

    /// No player program was configured or found.
    #[error("no audio player found on PATH (tried: {})", AUDIO_CANDIDATES.join(", "))]
    NoAudioPlayer,

    /// The player program could not be started.
    #[error("failed to launch audio player {program}: {source}")]
    PlaybackLaunch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Port auto-detection found nothing usable.
    #[error("no serial port found; pass --port explicitly")]
    NoPortFound,
}

impl ModemError {
    pub(crate) fn invalid_dtmf(digits: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDtmf {
            digits: digits.into(),
            reason: reason.into(),
        }
    }

    /// `true` if the serial channel can no longer be used and must be reopened.
    ///
    /// A write that merely timed out leaves the device in place; a closed
    /// reader or any other I/O failure means the device is gone.
    pub fn is_channel_fatal(&self) -> bool {
        match self {
            ModemError::Io(e) => !matches!(
                e.kind(),
                std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
                    | std::io::ErrorKind::Interrupted
            ),
            ModemError::Serial(_) | ModemError::PortOpen { .. } | ModemError::ChannelClosed => {
                true
            }
            _ => false,
        }
    }

    /// `true` for playback problems, which never abort a call.
    pub fn is_playback(&self) -> bool {
        matches!(
            self,
            ModemError::NoAudioPlayer | ModemError::PlaybackLaunch { .. }
        )
    }
}

/// Result type alias for modem operations
pub type ModemResult<T> = Result<T, ModemError>;
