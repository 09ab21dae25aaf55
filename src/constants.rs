//! Protocol constants and configuration values

/// Unsolicited notification the modem emits for an incoming call.
/// Matched case-sensitively as a substring of a received line.
pub const RING_TOKEN: &str = "RING";

/// AT commands are terminated by a carriage return, not a newline.
pub const COMMAND_TERMINATOR: &str = "\r";

/// Disable local echo so our own commands do not come back as lines.
pub const AT_ECHO_OFF: &str = "ATE0";
/// Answer the incoming call.
pub const AT_ANSWER: &str = "ATA";
/// Hang up the active call.
pub const AT_HANGUP: &str = "ATH";
/// DTMF send prefix; the digit sequence follows the `=`.
pub const AT_DTMF_PREFIX: &str = "AT+VTS=";

/// Default serial line speed for USB voice modems
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Audio message played after answering when none is given
pub const DEFAULT_AUDIO_FILE: &str = "message.wav";

/// DTMF sequence sent after playback when none is given
pub const DEFAULT_DTMF: &str = "1";

/// Audio player programs tried in order when none is configured
pub const AUDIO_CANDIDATES: &[&str] = &["afplay", "aplay", "play"];

/// Wait after opening the port for the modem to finish initializing
pub const INIT_DELAY_MS: u64 = 2000;
/// Settle time after echo-disable
pub const ECHO_OFF_DELAY_MS: u64 = 500;
/// Settle time after the answer command
pub const ANSWER_DELAY_MS: u64 = 500;
/// Pause between answering and starting playback
pub const MEDIA_DELAY_MS: u64 = 1000;
/// Settle time after a DTMF send
pub const DTMF_DELAY_MS: u64 = 300;
/// Settle time after hangup
pub const HANGUP_DELAY_MS: u64 = 500;

/// Per-read timeout; also bounds how long a shutdown request waits to be noticed
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 1000;

/// Serial read chunk size. Modem lines are short.
pub const SERIAL_READ_CHUNK: usize = 256;

/// Maximum buffered line length before the partial line is discarded
pub const MAX_LINE_LENGTH: usize = 4096;

/// Maximum number of received lines queued before the reader blocks
pub const MAX_LINE_QUEUE_SIZE: usize = 256;

/// Pause after a zero-byte read before polling the port again
pub const EMPTY_READ_BACKOFF_MS: u64 = 50;
