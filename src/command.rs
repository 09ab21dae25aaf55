//! AT command formatting

use crate::{
    constants::{AT_ANSWER, AT_DTMF_PREFIX, AT_ECHO_OFF, AT_HANGUP, COMMAND_TERMINATOR},
    error::{ModemError, ModemResult},
};
use std::fmt;
use std::str::FromStr;

/// A validated DTMF digit sequence.
///
/// Accepts `0-9`, `*`, `#` and `A-D` (lowercase letters are normalized).
/// Anything else, including line terminators, is rejected so the sequence
/// can be spliced into an AT command without escaping.
///
/// ```
/// use modem_autoanswer::DtmfDigits;
///
/// let digits: DtmfDigits = "12#".parse().unwrap();
/// assert_eq!(digits.as_str(), "12#");
/// assert!("1\r\nATH".parse::<DtmfDigits>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DtmfDigits(String);

impl DtmfDigits {
    /// Validate and wrap a digit sequence.
    pub fn new(digits: impl AsRef<str>) -> ModemResult<Self> {
        let raw = digits.as_ref();
        if raw.is_empty() {
            return Err(ModemError::invalid_dtmf(raw, "sequence is empty"));
        }
        if let Some(bad) = raw
            .chars()
            .find(|c| !is_dtmf_char(*c))
        {
            return Err(ModemError::invalid_dtmf(
                raw,
                format!("unsupported character {:?}", bad),
            ));
        }
        Ok(Self(raw.to_ascii_uppercase()))
    }

    /// Digit sequence as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_dtmf_char(c: char) -> bool {
    c.is_ascii_digit() || matches!(c, '*' | '#' | 'A'..='D' | 'a'..='d')
}

impl FromStr for DtmfDigits {
    type Err = ModemError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for DtmfDigits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The AT commands the controller issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtCommand {
    /// Disable local echo (`ATE0`), sent once at startup
    EchoOff,
    /// Answer the ringing call (`ATA`)
    Answer,
    /// Hang up (`ATH`)
    Hangup,
    /// Send a DTMF sequence on the active call (`AT+VTS=<digits>`)
    SendDtmf(DtmfDigits),
}

impl AtCommand {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            AtCommand::EchoOff => "echo-off",
            AtCommand::Answer => "answer",
            AtCommand::Hangup => "hangup",
            AtCommand::SendDtmf(_) => "dtmf",
        }
    }

    /// Command text including the carriage-return terminator.
    pub fn to_wire_format(&self) -> String {
        let mut wire = self.to_string();
        wire.push_str(COMMAND_TERMINATOR);
        wire
    }
}

impl fmt::Display for AtCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtCommand::EchoOff => f.write_str(AT_ECHO_OFF),
            AtCommand::Answer => f.write_str(AT_ANSWER),
            AtCommand::Hangup => f.write_str(AT_HANGUP),
            AtCommand::SendDtmf(digits) => write!(f, "{}{}", AT_DTMF_PREFIX, digits),
        }
    }
}
