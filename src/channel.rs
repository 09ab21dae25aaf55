//! The line-oriented channel the call controller talks to.
//!
//! [`SerialModem`](crate::SerialModem) is the real implementation; tests
//! drive the controller through scripted in-memory channels.

use std::time::Duration;

use tracing::{debug, trace};

use crate::{command::AtCommand, error::ModemResult, line::ModemLine};

/// Bidirectional text channel to a modem.
///
/// Lines are delivered in the order the device produced them. Reads are
/// bounded by the caller's timeout; `Ok(None)` means nothing arrived in time.
#[allow(async_fn_in_trait)]
pub trait ModemChannel {
    /// Write raw bytes to the device.
    async fn write_bytes(&mut self, data: &[u8]) -> ModemResult<()>;

    /// Wait up to `timeout` for the next complete line.
    async fn read_line(&mut self, timeout: Duration) -> ModemResult<Option<ModemLine>>;

    /// Write one AT command in wire format.
    async fn send(&mut self, command: &AtCommand) -> ModemResult<()> {
        let wire = command.to_wire_format();
        debug!("[SERIAL] Sending command: {}", command);
        self.write_bytes(wire.as_bytes())
            .await
    }

    /// Drop lines already received without waiting for new ones.
    ///
    /// Stops at the first empty read or error; a broken channel shows up
    /// again on the next [`read_line`](Self::read_line). Returns the number
    /// of lines dropped.
    async fn discard_pending(&mut self) -> usize {
        let mut dropped = 0;
        while let Ok(Some(line)) = self
            .read_line(Duration::ZERO)
            .await
        {
            trace!("[SERIAL] Discarding queued line: {:?}", line.as_str());
            dropped += 1;
        }
        dropped
    }
}

impl<C: ModemChannel> ModemChannel for &mut C {
    async fn write_bytes(&mut self, data: &[u8]) -> ModemResult<()> {
        (**self)
            .write_bytes(data)
            .await
    }

    async fn read_line(&mut self, timeout: Duration) -> ModemResult<Option<ModemLine>> {
        (**self)
            .read_line(timeout)
            .await
    }

    async fn discard_pending(&mut self) -> usize {
        (**self)
            .discard_pending()
            .await
    }
}
