//! Modem line decoding and classification.
//!
//! Classification is a pure function of one line: it never fails and never
//! looks at anything but the text it is given.

use std::fmt;

use crate::constants::RING_TOKEN;

/// A single line received from the modem, terminator and surrounding
/// whitespace removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ModemLine(String);

impl ModemLine {
    /// Wrap already-decoded text, trimming the line terminator and padding.
    pub fn new(text: impl AsRef<str>) -> Self {
        Self(
            text.as_ref()
                .trim()
                .to_string(),
        )
    }

    /// Decode raw serial bytes. Invalid UTF-8 sequences are dropped rather
    /// than replaced, so binary noise never produces a spurious token.
    pub fn from_bytes(raw: &[u8]) -> Self {
        let mut text = String::with_capacity(raw.len());
        for chunk in raw.utf8_chunks() {
            text.push_str(chunk.valid());
        }
        Self::new(text)
    }

    /// Line text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` if nothing but whitespace was received.
    pub fn is_empty(&self) -> bool {
        self.0
            .is_empty()
    }

    /// Classify this line. See [`classify`].
    pub fn event(&self) -> CallEvent {
        classify(&self.0)
    }
}

impl fmt::Display for ModemLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ModemLine {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ModemLine {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ModemLine {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

define_named_enum! {
    /// Semantic meaning of a modem line.
    pub enum CallEvent {
        /// The line carries the ring notification.
        RingDetected => "ring_detected",
        /// Anything else: result codes, echoes, noise, empty lines.
        NoEvent => "no_event",
    }
}

/// Map a raw modem line to a [`CallEvent`].
///
/// `RingDetected` if and only if the line contains `RING` as a
/// case-sensitive substring. Total over all inputs.
///
/// ```
/// use modem_autoanswer::{classify, CallEvent};
///
/// assert_eq!(classify("RING"), CallEvent::RingDetected);
/// assert_eq!(classify("+CRING: VOICE"), CallEvent::RingDetected);
/// assert_eq!(classify("ring"), CallEvent::NoEvent);
/// assert_eq!(classify(""), CallEvent::NoEvent);
/// ```
pub fn classify(line: &str) -> CallEvent {
    if line.contains(RING_TOKEN) {
        CallEvent::RingDetected
    } else {
        CallEvent::NoEvent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_alone() {
        assert_eq!(classify("RING"), CallEvent::RingDetected);
    }

    #[test]
    fn ring_embedded_in_other_text() {
        assert_eq!(classify("  RING  "), CallEvent::RingDetected);
        assert_eq!(
            classify("+CMTI: \"SM\",1\r\nRING\r\n"),
            CallEvent::RingDetected
        );
        assert_eq!(classify("+CRING: VOICE"), CallEvent::RingDetected);
        assert_eq!(classify("xxRINGxx"), CallEvent::RingDetected);
    }

    #[test]
    fn other_lines_are_no_event() {
        assert_eq!(classify("OK"), CallEvent::NoEvent);
        assert_eq!(classify("NO CARRIER"), CallEvent::NoEvent);
        assert_eq!(classify("some other text"), CallEvent::NoEvent);
        assert_eq!(classify("RIN"), CallEvent::NoEvent);
        assert_eq!(classify("R I N G"), CallEvent::NoEvent);
    }

    #[test]
    fn empty_whitespace_and_control_are_no_event() {
        assert_eq!(classify(""), CallEvent::NoEvent);
        assert_eq!(classify("   \t  "), CallEvent::NoEvent);
        assert_eq!(classify("\r\n"), CallEvent::NoEvent);
        assert_eq!(classify("\u{0}\u{7}\u{1b}[0m"), CallEvent::NoEvent);
    }

    #[test]
    fn classification_is_case_sensitive() {
        assert_eq!(classify("ring"), CallEvent::NoEvent);
        assert_eq!(classify("  ring  "), CallEvent::NoEvent);
        assert_eq!(classify("Ring"), CallEvent::NoEvent);
        assert_eq!(classify("rInG"), CallEvent::NoEvent);
    }

    #[test]
    fn classify_is_total_over_odd_input() {
        let long = "x".repeat(10_000);
        let samples = [
            "\u{fffd}\u{fffd}RING",
            "\u{0}RING\u{0}",
            "ÄÖÜ",
            "日本語RING",
            long.as_str(),
        ];
        let expected = [
            CallEvent::RingDetected,
            CallEvent::RingDetected,
            CallEvent::NoEvent,
            CallEvent::RingDetected,
            CallEvent::NoEvent,
        ];
        for (line, want) in samples
            .iter()
            .zip(expected)
        {
            assert_eq!(classify(line), want, "line {:?}", line);
        }
    }

    #[test]
    fn modem_line_trims_terminators() {
        let line = ModemLine::from_bytes(b"RING\r\n");
        assert_eq!(line.as_str(), "RING");
        assert_eq!(line.event(), CallEvent::RingDetected);
    }

    #[test]
    fn modem_line_drops_invalid_utf8() {
        let line = ModemLine::from_bytes(b"\xffRI\xfeNG\r");
        assert_eq!(line.as_str(), "RING");

        let noise = ModemLine::from_bytes(&[0xff, 0xfe, 0x80]);
        assert!(noise.is_empty());
        assert_eq!(noise.event(), CallEvent::NoEvent);
    }

    #[test]
    fn call_event_names() {
        assert_eq!(CallEvent::RingDetected.to_string(), "ring_detected");
        assert_eq!(CallEvent::NoEvent.as_ref(), "no_event");
    }
}
