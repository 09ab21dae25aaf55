//! Call session state machine and controller.
//!
//! [`advance`] holds every transition rule and performs no I/O.
//! [`CallSession`] is the driver: it performs the action each state owes
//! (read a line, write a command, play audio), turns the outcome into a
//! [`SessionInput`], and feeds it to [`advance`] until the session is
//! [`SessionState::Terminated`].

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, trace, warn};

use crate::{
    channel::ModemChannel,
    command::{AtCommand, DtmfDigits},
    constants::{
        ANSWER_DELAY_MS, DEFAULT_READ_TIMEOUT_MS, DTMF_DELAY_MS, ECHO_OFF_DELAY_MS,
        HANGUP_DELAY_MS, MEDIA_DELAY_MS,
    },
    error::{ModemError, ModemResult},
    line::CallEvent,
    player::AudioPlayer,
};

define_named_enum! {
    /// Lifecycle of a single call.
    pub enum SessionState {
        /// Waiting for a ring notification.
        Idle => "idle",
        /// Ring seen; the answer command is owed.
        Ringing => "ringing",
        /// Call answered; media has not started.
        Answered => "answered",
        /// Audio message is playing.
        Playing => "playing",
        /// DTMF sequence is owed.
        SendingDtmf => "sending_dtmf",
        /// Hangup command is owed.
        HangingUp => "hanging_up",
        /// Session over.
        Terminated => "terminated",
    }
}

impl SessionState {
    /// `true` once the call has been picked up and until the hangup is sent.
    pub fn is_call_active(&self) -> bool {
        matches!(
            self,
            SessionState::Answered | SessionState::Playing | SessionState::SendingDtmf
        )
    }
}

/// What happened while the controller served the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionInput {
    /// A line was read and classified (a read timeout counts as `NoEvent`).
    Line(CallEvent),
    /// The command, pause or playback owed by the current state finished.
    ActionCompleted,
    /// A read or write on the channel failed.
    ChannelFailed,
    /// Shutdown was requested or the idle bound expired.
    Stop,
}

/// Which optional steps a session performs. Fixed for the whole session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionPlan {
    /// Play the configured audio artifact after answering.
    pub play: bool,
    /// Send the configured DTMF sequence before hanging up.
    pub dtmf: bool,
}

impl SessionPlan {
    /// Derive the plan from a configuration.
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            play: config.playback_enabled(),
            dtmf: config
                .dtmf
                .is_some(),
        }
    }

    fn after_answer(&self) -> SessionState {
        if self.play {
            SessionState::Playing
        } else {
            self.after_playback()
        }
    }

    fn after_playback(&self) -> SessionState {
        if self.dtmf {
            SessionState::SendingDtmf
        } else {
            SessionState::HangingUp
        }
    }
}

/// Compute the next state. Pure; every transition rule lives here.
///
/// ```
/// use modem_autoanswer::{advance, CallEvent, SessionInput, SessionPlan, SessionState};
///
/// let plan = SessionPlan::default();
/// let s = advance(SessionState::Idle, SessionInput::Line(CallEvent::NoEvent), plan);
/// assert_eq!(s, SessionState::Idle);
/// let s = advance(s, SessionInput::Line(CallEvent::RingDetected), plan);
/// assert_eq!(s, SessionState::Ringing);
/// ```
pub fn advance(state: SessionState, input: SessionInput, plan: SessionPlan) -> SessionState {
    use SessionInput as In;
    use SessionState as S;

    match (state, input) {
        (S::Terminated, _) => S::Terminated,

        (S::Idle, In::Line(CallEvent::RingDetected)) => S::Ringing,
        (S::Idle, In::Line(CallEvent::NoEvent)) => S::Idle,
        (S::Idle, In::ActionCompleted) => S::Idle,
        (S::Idle, In::Stop) => S::Terminated,

        // The hangup write itself failed; nothing more can be done.
        (S::HangingUp, In::ChannelFailed) => S::Terminated,
        (_, In::ChannelFailed) => S::HangingUp,

        (S::HangingUp, In::ActionCompleted) => S::Terminated,
        (_, In::Stop) => S::HangingUp,

        // Repeated RING lines while the call is being set up coalesce into
        // this session.
        (s, In::Line(_)) => s,

        (S::Ringing, In::ActionCompleted) => S::Answered,
        (S::Answered, In::ActionCompleted) => plan.after_answer(),
        (S::Playing, In::ActionCompleted) => plan.after_playback(),
        (S::SendingDtmf, In::ActionCompleted) => S::HangingUp,
    }
}

/// Per-session configuration, fixed at session start.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionConfig {
    /// Audio artifact played after answering.
    pub audio: Option<PathBuf>,
    /// DTMF sequence sent before hanging up.
    pub dtmf: Option<DtmfDigits>,
    /// Skip playback even if `audio` is set.
    pub disable_playback: bool,
    /// Give up waiting for a ring after this long.
    pub ring_timeout: Option<Duration>,
}

impl SessionConfig {
    /// `true` if playback will be attempted.
    pub fn playback_enabled(&self) -> bool {
        !self.disable_playback
            && self
                .audio
                .is_some()
    }
}

/// Command settle delays and the per-read timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModemTimings {
    /// After echo-disable.
    pub after_echo_off: Duration,
    /// After the answer command.
    pub after_answer: Duration,
    /// Between answering and starting media.
    pub before_media: Duration,
    /// After a DTMF send.
    pub after_dtmf: Duration,
    /// After hangup.
    pub after_hangup: Duration,
    /// Bound on each line read.
    pub read_timeout: Duration,
}

impl Default for ModemTimings {
    fn default() -> Self {
        Self {
            after_echo_off: Duration::from_millis(ECHO_OFF_DELAY_MS),
            after_answer: Duration::from_millis(ANSWER_DELAY_MS),
            before_media: Duration::from_millis(MEDIA_DELAY_MS),
            after_dtmf: Duration::from_millis(DTMF_DELAY_MS),
            after_hangup: Duration::from_millis(HANGUP_DELAY_MS),
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
        }
    }
}

impl ModemTimings {
    /// No settle delays. For simulated channels.
    pub fn immediate() -> Self {
        Self {
            after_echo_off: Duration::ZERO,
            after_answer: Duration::ZERO,
            before_media: Duration::ZERO,
            after_dtmf: Duration::ZERO,
            after_hangup: Duration::ZERO,
            read_timeout: Duration::from_millis(10),
        }
    }
}

/// Why a session ended without completing a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Shutdown was requested.
    Shutdown,
    /// No ring arrived within the configured bound.
    RingTimeout,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Shutdown => f.write_str("shutdown requested"),
            StopReason::RingTimeout => f.write_str("no ring before timeout"),
        }
    }
}

/// Outcome of one session.
#[derive(Debug, Default)]
pub struct SessionReport {
    states: Vec<SessionState>,
    channel_error: Option<ModemError>,
    playback_error: Option<ModemError>,
    stop: Option<StopReason>,
}

impl SessionReport {
    fn enter(&mut self, state: SessionState) {
        self.states
            .push(state);
    }

    fn record_channel_error(&mut self, err: ModemError) {
        if self
            .channel_error
            .is_none()
        {
            self.channel_error = Some(err);
        } else {
            warn!("[SESSION] Further channel error after first failure: {}", err);
        }
    }

    /// States in the order they were entered, starting with `Idle`.
    pub fn states(&self) -> &[SessionState] {
        &self.states
    }

    /// Last state entered.
    pub fn final_state(&self) -> Option<SessionState> {
        self.states
            .last()
            .copied()
    }

    /// `true` if the call was answered.
    pub fn answered(&self) -> bool {
        self.states
            .contains(&SessionState::Answered)
    }

    /// The channel failure that forced the session down, if any.
    pub fn channel_error(&self) -> Option<&ModemError> {
        self.channel_error
            .as_ref()
    }

    /// Take ownership of the channel failure.
    pub fn take_channel_error(&mut self) -> Option<ModemError> {
        self.channel_error
            .take()
    }

    /// The playback failure, if playback was attempted and could not start.
    pub fn playback_error(&self) -> Option<&ModemError> {
        self.playback_error
            .as_ref()
    }

    /// Set when the session ended before any call arrived.
    pub fn stop_reason(&self) -> Option<StopReason> {
        self.stop
    }

    /// `true` if the session ran to completion without a channel failure.
    pub fn is_clean(&self) -> bool {
        self.channel_error
            .is_none()
            && self.final_state() == Some(SessionState::Terminated)
    }
}

/// Drives one call at a time over a [`ModemChannel`].
///
/// ```rust,no_run
/// use modem_autoanswer::{CallSession, CommandPlayer, SerialModem, SerialSettings, SessionConfig};
///
/// # async fn example() -> Result<(), modem_autoanswer::ModemError> {
/// let modem = SerialModem::open(SerialSettings::new("/dev/ttyUSB0")).await?;
/// let mut session = CallSession::new(modem, CommandPlayer::discover());
/// session.initialize().await?;
///
/// let report = session.start(SessionConfig {
///     audio: Some("message.wav".into()),
///     ..Default::default()
/// }).await;
/// println!("answered: {}", report.answered());
/// # Ok(())
/// # }
/// ```
pub struct CallSession<C, P> {
    channel: C,
    player: P,
    timings: ModemTimings,
    shutdown: Option<watch::Receiver<bool>>,
}

impl<C, P> fmt::Debug for CallSession<C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallSession")
            .field("timings", &self.timings)
            .field("shutdown_requested", &self.shutdown_requested())
            .finish()
    }
}

impl<C, P> CallSession<C, P> {
    /// Controller over `channel` using `player` for audio, default timings.
    pub fn new(channel: C, player: P) -> Self {
        Self {
            channel,
            player,
            timings: ModemTimings::default(),
            shutdown: None,
        }
    }

    /// Replace the settle delays and read timeout.
    pub fn with_timings(mut self, timings: ModemTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Observe a shutdown flag between read cycles.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Current timings.
    pub fn timings(&self) -> &ModemTimings {
        &self.timings
    }

    /// Borrow the channel.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Borrow the player.
    pub fn player(&self) -> &P {
        &self.player
    }

    /// Give back the channel and player.
    pub fn into_parts(self) -> (C, P) {
        (self.channel, self.player)
    }

    /// `true` once the shutdown flag has been raised.
    pub fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(false)
    }
}

impl<C: ModemChannel, P: AudioPlayer> CallSession<C, P> {
    /// Disable local echo. Sent once at startup, before any session.
    pub async fn initialize(&mut self) -> ModemResult<()> {
        self.channel
            .send(&AtCommand::EchoOff)
            .await?;
        sleep(self.timings.after_echo_off).await;
        debug!("[SESSION] Modem echo disabled");
        Ok(())
    }

    /// Run one session: wait for a ring, answer, play, send DTMF, hang up.
    ///
    /// Returns once the session is `Terminated`. Channel failures force a
    /// hangup attempt and are recorded in the report rather than returned.
    /// After an answered call, lines still queued from that call are dropped.
    pub async fn start(&mut self, config: SessionConfig) -> SessionReport {
        let plan = SessionPlan::from_config(&config);
        let mut report = SessionReport::default();
        let mut state = SessionState::Idle;
        let idle_since = Instant::now();

        report.enter(state);
        info!("[SESSION] Waiting for incoming call");

        while state != SessionState::Terminated {
            let input = self
                .serve(state, &config, idle_since, &mut report)
                .await;
            let next = advance(state, input, plan);
            if next != state {
                debug!("[SESSION] {} -> {} on {:?}", state, next, input);
                report.enter(next);
            }
            state = next;
        }

        // RINGs for a call that was already answered must not start another
        // session.
        if report.answered() {
            let dropped = self
                .channel
                .discard_pending()
                .await;
            if dropped > 0 {
                debug!("[SESSION] Dropped {} line(s) queued during the call", dropped);
            }
        }

        match (report.channel_error(), report.stop_reason()) {
            (Some(e), _) => error!("[SESSION] Session ended after channel failure: {}", e),
            (None, Some(reason)) => info!("[SESSION] Session stopped: {}", reason),
            (None, None) => info!("[SESSION] Call ended"),
        }
        report
    }

    /// Perform whatever the current state owes and report how it went.
    async fn serve(
        &mut self,
        state: SessionState,
        config: &SessionConfig,
        idle_since: Instant,
        report: &mut SessionReport,
    ) -> SessionInput {
        match state {
            SessionState::Idle => self
                .wait_for_ring(config, idle_since, report)
                .await,
            SessionState::Ringing => {
                info!("[SESSION] Incoming call, answering");
                let input = self
                    .write(&AtCommand::Answer, self.timings.after_answer, report)
                    .await;
                if input == SessionInput::ActionCompleted {
                    info!("[SESSION] Call answered");
                }
                input
            }
            SessionState::Answered => {
                if self.shutdown_requested() {
                    return SessionInput::Stop;
                }
                sleep(self.timings.before_media).await;
                SessionInput::ActionCompleted
            }
            SessionState::Playing => {
                if let Some(path) = &config.audio {
                    info!("[PLAYBACK] Playing {}", path.display());
                    match self
                        .player
                        .play(path)
                        .await
                    {
                        Ok(status) => debug!("[PLAYBACK] Finished with {}", status),
                        Err(e) => {
                            warn!("[PLAYBACK] Skipping playback: {}", e);
                            report.playback_error = Some(e);
                        }
                    }
                }
                SessionInput::ActionCompleted
            }
            SessionState::SendingDtmf => match &config.dtmf {
                Some(digits) => {
                    let input = self
                        .write(
                            &AtCommand::SendDtmf(digits.clone()),
                            self.timings.after_dtmf,
                            report,
                        )
                        .await;
                    if input == SessionInput::ActionCompleted {
                        info!("[SESSION] Sent DTMF: {}", digits);
                    }
                    input
                }
                None => SessionInput::ActionCompleted,
            },
            SessionState::HangingUp => {
                let input = self
                    .write(&AtCommand::Hangup, self.timings.after_hangup, report)
                    .await;
                if input == SessionInput::ActionCompleted {
                    info!("[SESSION] Hangup sent");
                }
                input
            }
            SessionState::Terminated => SessionInput::ActionCompleted,
        }
    }

    async fn wait_for_ring(
        &mut self,
        config: &SessionConfig,
        idle_since: Instant,
        report: &mut SessionReport,
    ) -> SessionInput {
        if self.shutdown_requested() {
            report.stop = Some(StopReason::Shutdown);
            return SessionInput::Stop;
        }

        let mut read_timeout = self.timings.read_timeout;
        if let Some(bound) = config.ring_timeout {
            let elapsed = idle_since.elapsed();
            if elapsed >= bound {
                report.stop = Some(StopReason::RingTimeout);
                return SessionInput::Stop;
            }
            read_timeout = read_timeout.min(bound - elapsed);
        }

        match self
            .channel
            .read_line(read_timeout)
            .await
        {
            Ok(Some(line)) => {
                trace!("[SERIAL] Got line: {:?}", line.as_str());
                SessionInput::Line(line.event())
            }
            Ok(None) => SessionInput::Line(CallEvent::NoEvent),
            Err(e) => {
                error!("[SERIAL] Read failed: {}", e);
                report.record_channel_error(e);
                SessionInput::ChannelFailed
            }
        }
    }

    async fn write(
        &mut self,
        command: &AtCommand,
        settle: Duration,
        report: &mut SessionReport,
    ) -> SessionInput {
        match self
            .channel
            .send(command)
            .await
        {
            Ok(()) => {
                sleep(settle).await;
                SessionInput::ActionCompleted
            }
            Err(e) => {
                error!("[SERIAL] Failed to send {} command: {}", command.name(), e);
                report.record_channel_error(e);
                SessionInput::ChannelFailed
            }
        }
    }
}
