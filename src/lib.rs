//! Automatic call answering for USB voice modems.
//!
//! Watches a modem's serial line for the `RING` notification, answers,
//! optionally plays a recorded message and sends a DTMF sequence, then hangs
//! up.
//!
//! # Architecture
//!
//! - [`classify`] maps one modem line to a [`CallEvent`]. Pure, total.
//! - [`advance`] is the call state machine's step function. Pure.
//! - [`CallSession`] drives one call over any [`ModemChannel`], delegating
//!   audio to an [`AudioPlayer`].
//! - [`Monitor`] runs sessions back to back on one channel.
//! - [`SerialModem`] and [`CommandPlayer`] are the real collaborators.
//!
//! # Examples
//!
//! ## Answer one call
//!
//! ```rust,no_run
//! use modem_autoanswer::{
//!     CallSession, CommandPlayer, DtmfDigits, ModemError, SerialModem, SerialSettings,
//!     SessionConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), ModemError> {
//!     let modem = SerialModem::open(SerialSettings::new("/dev/ttyUSB0")).await?;
//!     let mut session = CallSession::new(modem, CommandPlayer::discover());
//!     session.initialize().await?;
//!
//!     let config = SessionConfig {
//!         audio: Some("message.wav".into()),
//!         dtmf: Some(DtmfDigits::new("1")?),
//!         ..Default::default()
//!     };
//!     let report = session.start(config).await;
//!     if let Some(err) = report.channel_error() {
//!         eprintln!("call failed: {}", err);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Drive the state machine directly
//!
//! ```rust
//! use modem_autoanswer::{advance, classify, SessionInput, SessionPlan, SessionState};
//!
//! let plan = SessionPlan { play: false, dtmf: false };
//! let mut state = SessionState::Idle;
//! for line in ["OK", "RING"] {
//!     state = advance(state, SessionInput::Line(classify(line)), plan);
//! }
//! assert_eq!(state, SessionState::Ringing);
//! ```

#[macro_use]
mod macros;

pub mod channel;
pub mod command;
pub mod connection;
pub mod constants;
pub mod error;
pub mod line;
pub mod monitor;
pub mod player;
pub mod port;
pub mod session;

pub use channel::ModemChannel;
pub use command::{AtCommand, DtmfDigits};
pub use connection::{SerialModem, SerialSettings};
pub use error::{ModemError, ModemResult};
pub use line::{classify, CallEvent, ModemLine};
pub use monitor::{Monitor, MonitorExit};
pub use player::{choose_audio_player, AudioPlayer, CommandPlayer, PlaybackStatus};
pub use port::{available_ports, detect_default_port, prompt_select_port};
pub use session::{
    advance, CallSession, ModemTimings, SessionConfig, SessionInput, SessionPlan, SessionReport,
    SessionState, StopReason,
};
