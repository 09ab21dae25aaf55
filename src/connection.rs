//! Serial connection to the modem.
//!
//! The port is split the same way as a socket: a background reader thread
//! owns one handle, assembles lines and queues them on an mpsc channel; the
//! [`SerialModem`] keeps the other handle for writes.

use std::io::{self, ErrorKind, Read, Write};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serialport::SerialPort;
use tokio::sync::mpsc;
use tokio::task;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, trace, warn};

use crate::{
    channel::ModemChannel,
    constants::{
        DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT_MS, EMPTY_READ_BACKOFF_MS, INIT_DELAY_MS,
        MAX_LINE_LENGTH, MAX_LINE_QUEUE_SIZE, SERIAL_READ_CHUNK,
    },
    error::{ModemError, ModemResult},
    line::ModemLine,
};

/// Serial port parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialSettings {
    /// Device path, e.g. `/dev/ttyUSB0` or `COM3`.
    pub port: String,
    /// Line speed. Default: 9600.
    pub baud_rate: u32,
    /// Driver-level read timeout for the reader thread. Default: 1 s.
    pub read_timeout: Duration,
    /// Wait after opening before the modem accepts commands. Default: 2 s.
    pub init_delay: Duration,
    /// Capacity of the received-line queue. Default: 256.
    pub line_queue_size: usize,
}

impl SerialSettings {
    /// Defaults for the given device.
    pub fn new(port: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(DEFAULT_READ_TIMEOUT_MS),
            init_delay: Duration::from_millis(INIT_DELAY_MS),
            line_queue_size: MAX_LINE_QUEUE_SIZE,
        }
    }

    /// Override the line speed.
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }
}

/// Hint logged alongside a permission failure on open.
fn permission_hint(os: &str) -> Option<&'static str> {
    match os {
        "linux" => Some(
            "Try: add a udev rule, add your user to the 'dialout' group, or run with sudo.",
        ),
        "macos" => Some("Check device permissions or try running with sudo."),
        _ => None,
    }
}

fn is_permission_error(err: &serialport::Error) -> bool {
    matches!(
        err.kind(),
        serialport::ErrorKind::Io(ErrorKind::PermissionDenied)
    ) || err
        .to_string()
        .to_lowercase()
        .contains("permission")
}

/// A modem on a serial port.
pub struct SerialModem {
    port_name: String,
    writer: Arc<Mutex<Box<dyn SerialPort>>>,
    lines: mpsc::Receiver<ModemResult<ModemLine>>,
}

impl std::fmt::Debug for SerialModem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialModem")
            .field("port", &self.port_name)
            .finish()
    }
}

impl SerialModem {
    /// Open the device, wait for the modem to initialize, start the reader.
    pub async fn open(settings: SerialSettings) -> ModemResult<Self> {
        info!(
            "[SERIAL] Opening {} at {} baud",
            settings.port, settings.baud_rate
        );

        let writer = serialport::new(&settings.port, settings.baud_rate)
            .timeout(settings.read_timeout)
            .open()
            .map_err(|source| {
                error!(
                    "[SERIAL] Failed to open serial port {}: {}",
                    settings.port, source
                );
                if is_permission_error(&source) {
                    if let Some(hint) = permission_hint(std::env::consts::OS) {
                        error!("[SERIAL] Permission denied opening {}. {}", settings.port, hint);
                    }
                }
                ModemError::PortOpen {
                    port: settings
                        .port
                        .clone(),
                    source,
                }
            })?;
        let modem = Self::from_port(writer, settings.line_queue_size)?;

        sleep(settings.init_delay).await;
        info!("[SERIAL] Listening for incoming calls on {}", modem.port_name);
        Ok(modem)
    }

    /// Wrap an already-open port and start the reader thread.
    pub fn from_port(port: Box<dyn SerialPort>, line_queue_size: usize) -> ModemResult<Self> {
        let port_name = port
            .name()
            .unwrap_or_else(|| "<unnamed>".to_string());
        let reader = port.try_clone()?;

        let (line_tx, line_rx) = mpsc::channel(line_queue_size.max(1));
        thread::Builder::new()
            .name(format!("modem-reader {}", port_name))
            .spawn(move || reader_loop(reader, line_tx))?;

        Ok(Self {
            port_name,
            writer: Arc::new(Mutex::new(port)),
            lines: line_rx,
        })
    }

    /// Device path this modem was opened on.
    pub fn port_name(&self) -> &str {
        &self.port_name
    }
}

impl ModemChannel for SerialModem {
    async fn write_bytes(&mut self, data: &[u8]) -> ModemResult<()> {
        let writer = Arc::clone(&self.writer);
        let data = data.to_vec();
        let len = data.len();

        // The port timeout bounds the blocking write.
        task::spawn_blocking(move || -> ModemResult<()> {
            let mut port = writer
                .lock()
                .map_err(|_| ModemError::ChannelClosed)?;
            port.write_all(&data)?;
            port.flush()?;
            Ok(())
        })
        .await
        .map_err(|e| ModemError::Io(io::Error::other(e)))??;

        trace!("[SERIAL] Wrote {} bytes", len);
        Ok(())
    }

    async fn read_line(&mut self, wait: Duration) -> ModemResult<Option<ModemLine>> {
        match timeout(wait, self.lines.recv()).await {
            Ok(Some(Ok(line))) => Ok(Some(line)),
            Ok(Some(Err(e))) => Err(e),
            Ok(None) => Err(ModemError::ChannelClosed),
            Err(_) => Ok(None),
        }
    }
}

/// Splits a byte stream into non-empty lines on `\n`.
///
/// A line longer than `MAX_LINE_LENGTH` is dropped whole, up to and
/// including its terminator.
#[derive(Debug, Default)]
struct LineAssembler {
    pending: Vec<u8>,
    discarding: bool,
}

impl LineAssembler {
    fn push(&mut self, data: &[u8], mut emit: impl FnMut(ModemLine)) {
        for &byte in data {
            if byte == b'\n' {
                if self.discarding {
                    self.discarding = false;
                    continue;
                }
                let line = ModemLine::from_bytes(&self.pending);
                self.pending
                    .clear();
                if !line.is_empty() {
                    emit(line);
                }
            } else if self.discarding {
                continue;
            } else if self
                .pending
                .len()
                < MAX_LINE_LENGTH
            {
                self.pending
                    .push(byte);
            } else {
                warn!("[SERIAL] Discarding over-long line");
                self.pending
                    .clear();
                self.discarding = true;
            }
        }
    }
}

/// Background reader. Exits when the receiver is dropped or the port fails.
fn reader_loop<R: Read>(mut port: R, line_tx: mpsc::Sender<ModemResult<ModemLine>>) {
    let mut buf = [0u8; SERIAL_READ_CHUNK];
    let mut assembler = LineAssembler::default();

    loop {
        match port.read(&mut buf) {
            // Some drivers report an idle port as a zero-byte read.
            Ok(0) => thread::sleep(Duration::from_millis(EMPTY_READ_BACKOFF_MS)),
            Ok(n) => {
                let mut open = true;
                assembler.push(&buf[..n], |line| {
                    if open && line_tx
                        .blocking_send(Ok(line))
                        .is_err()
                    {
                        open = false;
                    }
                });
                if !open {
                    debug!("[SERIAL] Line channel closed, reader exiting");
                    return;
                }
            }
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {}
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => {
                warn!("[SERIAL] Read error: {}", e);
                let _ = line_tx.blocking_send(Err(ModemError::Io(e)));
                return;
            }
        }

        if line_tx.is_closed() {
            debug!("[SERIAL] Line channel closed, reader exiting");
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assemble(chunks: &[&[u8]]) -> Vec<String> {
        let mut assembler = LineAssembler::default();
        let mut out = Vec::new();
        for chunk in chunks {
            assembler.push(chunk, |line| out.push(line.to_string()));
        }
        out
    }

    #[test]
    fn splits_crlf_lines_and_drops_blanks() {
        let lines = assemble(&[b"\r\nOK\r\n\r\nRING\r\n"]);
        assert_eq!(lines, ["OK", "RING"]);
    }

    #[test]
    fn joins_lines_split_across_reads() {
        let lines = assemble(&[b"RI", b"NG\r", b"\n+CLIP: \"555\"", b"\r\n"]);
        assert_eq!(lines, ["RING", "+CLIP: \"555\""]);
    }

    #[test]
    fn holds_partial_line() {
        let lines = assemble(&[b"OK\r\nRIN"]);
        assert_eq!(lines, ["OK"]);
    }

    #[test]
    fn over_long_line_is_discarded() {
        let long = vec![b'x'; MAX_LINE_LENGTH + 10];
        let lines = assemble(&[&long, b"\nRING\n"]);
        assert_eq!(lines, ["RING"]);
    }

    #[test]
    fn over_long_line_tail_does_not_leak_into_next_read() {
        let long = vec![b'x'; MAX_LINE_LENGTH + 3];
        let lines = assemble(&[&long, b"OK\r\n", b"RING\r\n"]);
        assert_eq!(lines, ["RING"]);
    }

    #[test]
    fn line_at_length_limit_is_kept() {
        let mut exact = vec![b'x'; MAX_LINE_LENGTH];
        exact.push(b'\n');
        let lines = assemble(&[&exact]);
        assert_eq!(lines, ["x".repeat(MAX_LINE_LENGTH)]);
    }

    /// Serves a fixed list of read results, then reports a broken pipe.
    struct ScriptedReader(std::collections::VecDeque<io::Result<Vec<u8>>>);

    impl Read for ScriptedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self
                .0
                .pop_front()
            {
                Some(Ok(chunk)) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                Some(Err(e)) => Err(e),
                None => Err(io::Error::from(ErrorKind::BrokenPipe)),
            }
        }
    }

    #[test]
    fn reader_backs_off_on_empty_reads() {
        let reader = ScriptedReader(
            [
                Ok(Vec::new()),
                Ok(Vec::new()),
                Err(io::Error::from(ErrorKind::TimedOut)),
                Ok(b"RING\r\n".to_vec()),
            ]
            .into_iter()
            .collect(),
        );
        let (tx, mut rx) = mpsc::channel(8);

        let started = std::time::Instant::now();
        reader_loop(reader, tx);

        assert!(started.elapsed() >= Duration::from_millis(2 * EMPTY_READ_BACKOFF_MS));
        let line = rx
            .try_recv()
            .unwrap()
            .unwrap();
        assert_eq!(line.as_str(), "RING");
        match rx.try_recv() {
            Ok(Err(ModemError::Io(e))) => assert_eq!(e.kind(), ErrorKind::BrokenPipe),
            other => panic!("unexpected queue item: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn pty_round_trip() {
        use crate::command::AtCommand;

        let (modem_side, mut far_side) = serialport::TTYPort::pair().unwrap();
        let mut modem = SerialModem::from_port(Box::new(modem_side), MAX_LINE_QUEUE_SIZE).unwrap();

        modem
            .send(&AtCommand::Answer)
            .await
            .unwrap();
        let mut wire = [0u8; 4];
        far_side
            .read_exact(&mut wire)
            .unwrap();
        assert_eq!(&wire, b"ATA\r");

        far_side
            .write_all(b"OK\r\nRING\r\n")
            .unwrap();
        let first = modem
            .read_line(Duration::from_secs(2))
            .await
            .unwrap();
        let second = modem
            .read_line(Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(first.map(|l| l.to_string()).as_deref(), Some("OK"));
        assert_eq!(second.map(|l| l.to_string()).as_deref(), Some("RING"));

        assert_eq!(modem.discard_pending().await, 0);
    }

    #[test]
    fn settings_defaults() {
        let settings = SerialSettings::new("/dev/ttyUSB0").baud_rate(115200);
        assert_eq!(settings.port, "/dev/ttyUSB0");
        assert_eq!(settings.baud_rate, 115200);
        assert_eq!(settings.read_timeout, Duration::from_secs(1));
        assert_eq!(settings.init_delay, Duration::from_secs(2));
    }

    #[test]
    fn permission_hints_per_platform() {
        assert!(permission_hint("linux")
            .unwrap()
            .contains("dialout"));
        assert!(permission_hint("macos").is_some());
        assert!(permission_hint("windows").is_none());
    }

    #[tokio::test]
    async fn open_missing_device_fails() {
        let mut settings = SerialSettings::new("/dev/modem-autoanswer-does-not-exist");
        settings.init_delay = Duration::ZERO;
        let err = SerialModem::open(settings)
            .await
            .unwrap_err();
        assert!(matches!(err, ModemError::PortOpen { .. }));
        assert!(err.is_channel_fatal());
    }
}
