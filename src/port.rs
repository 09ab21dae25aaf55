//! Serial port discovery and selection.

use tracing::debug;

use crate::error::ModemResult;

/// Device patterns probed on macOS, most specific first.
const MACOS_PATTERNS: &[&str] = &[
    "/dev/cu.usbserial*",
    "/dev/tty.usbserial*",
    "/dev/cu.usbmodem*",
    "/dev/tty.usbmodem*",
    "/dev/cu.*usb*",
];

/// Device patterns probed on Linux.
const LINUX_PATTERNS: &[&str] = &["/dev/ttyUSB*", "/dev/ttyACM*"];

const NO_PATTERNS: &[&str] = &[];

const LINUX_FALLBACK: &str = "/dev/ttyUSB0";
const WINDOWS_FALLBACK: &str = "COM1";

/// Detect a reasonable default serial port for the running platform.
pub fn detect_default_port() -> Option<String> {
    detect_default_port_with(std::env::consts::OS, first_glob_match)
}

/// Port detection with the platform name and glob lookup supplied.
///
/// `find` returns the first path matching a glob pattern. macOS has no
/// fallback: guessing a device name there is worse than asking.
pub fn detect_default_port_with(
    os: &str,
    find: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    let (patterns, fallback): (&[&str], Option<&str>) = match os {
        "macos" => (MACOS_PATTERNS, None),
        "linux" => (LINUX_PATTERNS, Some(LINUX_FALLBACK)),
        "windows" => (NO_PATTERNS, Some(WINDOWS_FALLBACK)),
        _ => (NO_PATTERNS, None),
    };

    patterns
        .iter()
        .find_map(|pattern| find(*pattern))
        .or_else(|| fallback.map(str::to_string))
}

fn first_glob_match(pattern: &str) -> Option<String> {
    let found = glob::glob(pattern)
        .ok()?
        .filter_map(Result::ok)
        .next()
        .map(|path| {
            path.display()
                .to_string()
        });
    debug!("[PORT] {} -> {:?}", pattern, found);
    found
}

/// Serial ports known to the operating system.
pub fn available_ports() -> ModemResult<Vec<String>> {
    Ok(serialport::available_ports()?
        .into_iter()
        .map(|info| info.port_name)
        .collect())
}

/// Ask the user to pick one of `choices` by 1-based number.
///
/// `input` is called with a prompt and returns the user's answer, or `None`
/// at end of input. An empty answer cancels. Invalid or out-of-range answers
/// prompt again.
pub fn prompt_select_port(
    choices: &[String],
    mut input: impl FnMut(&str) -> Option<String>,
) -> Option<String> {
    if choices.is_empty() {
        return None;
    }

    let mut prompt = String::from("Select a serial port:\n");
    for (i, choice) in choices
        .iter()
        .enumerate()
    {
        prompt.push_str(&format!("  {}) {}\n", i + 1, choice));
    }
    prompt.push_str(&format!("Enter number [1-{}] (empty to cancel): ", choices.len()));

    loop {
        let answer = input(&prompt)?;
        let answer = answer.trim();
        if answer.is_empty() {
            return None;
        }
        match answer.parse::<usize>() {
            Ok(n) if (1..=choices.len()).contains(&n) => return Some(choices[n - 1].clone()),
            _ => debug!("[PORT] Invalid selection {:?}", answer),
        }
    }
}
