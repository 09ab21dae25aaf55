#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use modem_autoanswer::{
    AudioPlayer, CallSession, ModemChannel, ModemError, ModemLine, ModemResult, ModemTimings,
    PlaybackStatus,
};
use tokio::sync::watch;

/// Something a collaborator did, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Write(String),
    Play(PathBuf),
}

impl Action {
    pub fn write(s: &str) -> Self {
        Action::Write(s.to_string())
    }

    pub fn play(p: &str) -> Self {
        Action::Play(PathBuf::from(p))
    }
}

/// Shared, ordered record of channel writes and playbacks.
#[derive(Debug, Clone, Default)]
pub struct Transcript(Arc<Mutex<Vec<Action>>>);

impl Transcript {
    pub fn push(&self, action: Action) {
        self.0
            .lock()
            .unwrap()
            .push(action);
    }

    pub fn actions(&self) -> Vec<Action> {
        self.0
            .lock()
            .unwrap()
            .clone()
    }

    pub fn writes(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|a| match a {
                Action::Write(w) => Some(w),
                Action::Play(_) => None,
            })
            .collect()
    }
}

enum Step {
    Line(String),
    Silence,
    ReadError(io::ErrorKind),
}

/// A modem that replays a fixed script of lines.
///
/// Once the script runs out, reads fail with `ChannelClosed`, unless
/// `then_silence` was set, in which case every read times out.
pub struct ScriptedChannel {
    script: VecDeque<Step>,
    silence_after: bool,
    write_failures: VecDeque<(String, io::ErrorKind)>,
    shutdown_on_answer: Option<watch::Sender<bool>>,
    transcript: Transcript,
    pub reads: usize,
}

impl ScriptedChannel {
    pub fn new(lines: &[&str], transcript: &Transcript) -> Self {
        Self {
            script: lines
                .iter()
                .map(|l| Step::Line(l.to_string()))
                .collect(),
            silence_after: false,
            write_failures: VecDeque::new(),
            shutdown_on_answer: None,
            transcript: transcript.clone(),
            reads: 0,
        }
    }

    pub fn then_silence(mut self) -> Self {
        self.silence_after = true;
        self
    }

    pub fn then_silent_read(mut self) -> Self {
        self.script
            .push_back(Step::Silence);
        self
    }

    pub fn then_read_error(mut self, kind: io::ErrorKind) -> Self {
        self.script
            .push_back(Step::ReadError(kind));
        self
    }

    pub fn then_line(mut self, line: &str) -> Self {
        self.script
            .push_back(Step::Line(line.to_string()));
        self
    }

    /// Fail the next write whose command starts with `prefix`.
    pub fn fail_write(mut self, prefix: &str, kind: io::ErrorKind) -> Self {
        self.write_failures
            .push_back((prefix.to_string(), kind));
        self
    }

    /// Raise the shutdown flag as soon as the answer command is written.
    pub fn shutdown_on_answer(mut self, tx: watch::Sender<bool>) -> Self {
        self.shutdown_on_answer = Some(tx);
        self
    }
}

impl ModemChannel for ScriptedChannel {
    async fn write_bytes(&mut self, data: &[u8]) -> ModemResult<()> {
        let text = String::from_utf8_lossy(data)
            .trim_end_matches('\r')
            .to_string();

        let fail = self
            .write_failures
            .iter()
            .position(|(prefix, _)| text.starts_with(prefix.as_str()));
        if let Some(i) = fail {
            let (_, kind) = self
                .write_failures
                .remove(i)
                .unwrap();
            return Err(ModemError::Io(io::Error::new(kind, "scripted write failure")));
        }

        if text == "ATA" {
            if let Some(tx) = &self.shutdown_on_answer {
                let _ = tx.send(true);
            }
        }
        self.transcript
            .push(Action::Write(text));
        Ok(())
    }

    async fn read_line(&mut self, timeout: Duration) -> ModemResult<Option<ModemLine>> {
        self.reads += 1;
        match self
            .script
            .pop_front()
        {
            Some(Step::Line(line)) => Ok(Some(ModemLine::new(line))),
            Some(Step::Silence) => {
                tokio::time::sleep(timeout).await;
                Ok(None)
            }
            Some(Step::ReadError(kind)) => Err(ModemError::Io(io::Error::new(
                kind,
                "scripted read failure",
            ))),
            None if self.silence_after => {
                tokio::time::sleep(timeout).await;
                Ok(None)
            }
            None => Err(ModemError::ChannelClosed),
        }
    }
}

/// A player that records what it was asked to play.
pub struct RecordingPlayer {
    transcript: Transcript,
    fail_launch: bool,
    exit_code: Option<i32>,
}

impl RecordingPlayer {
    pub fn new(transcript: &Transcript) -> Self {
        Self {
            transcript: transcript.clone(),
            fail_launch: false,
            exit_code: Some(0),
        }
    }

    pub fn failing(transcript: &Transcript) -> Self {
        Self {
            fail_launch: true,
            ..Self::new(transcript)
        }
    }

    pub fn exiting_with(transcript: &Transcript, code: i32) -> Self {
        Self {
            exit_code: Some(code),
            ..Self::new(transcript)
        }
    }
}

impl AudioPlayer for RecordingPlayer {
    async fn play(&mut self, path: &Path) -> ModemResult<PlaybackStatus> {
        if self.fail_launch {
            return Err(ModemError::PlaybackLaunch {
                program: "fake-player".to_string(),
                source: io::Error::new(io::ErrorKind::NotFound, "no such program"),
            });
        }
        self.transcript
            .push(Action::Play(path.to_path_buf()));
        Ok(PlaybackStatus::from_code(self.exit_code))
    }
}

pub fn session(
    channel: ScriptedChannel,
    player: RecordingPlayer,
) -> CallSession<ScriptedChannel, RecordingPlayer> {
    CallSession::new(channel, player).with_timings(ModemTimings::immediate())
}
