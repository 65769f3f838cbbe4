//! Colour and layout for stock and request reports.
//!
//! Colour is only emitted when stdout is a terminal that supports it, so
//! piped output and JSON stay plain.

use std::sync::OnceLock;

use bloodbank::RequestStatus;
use owo_colors::{colors::css, OwoColorize};

/// Below this many columns the status table switches to one line per type.
const NARROW_COLUMNS: u16 = 60;

/// What a piece of output means to the reader.
#[derive(Debug, Clone, Copy)]
enum Tone {
    Success,
    Warning,
    Failure,
    Muted,
}

fn colour_enabled() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| supports_color::on(supports_color::Stream::Stdout).is_some())
}

fn paint(text: &str, tone: Tone) -> String {
    if !colour_enabled() {
        return text.to_string();
    }
    match tone {
        Tone::Success => text.fg::<css::Green>().to_string(),
        Tone::Warning => text.fg::<css::Orange>().to_string(),
        Tone::Failure => text.fg::<css::Crimson>().to_string(),
        Tone::Muted => text.dimmed().to_string(),
    }
}

/// Whether the terminal is too narrow for the tabular status layout.
pub fn is_narrow() -> bool {
    terminal_size::terminal_size().is_some_and(|(width, _)| width.0 < NARROW_COLUMNS)
}

/// Colouring for report text.
pub trait Colorize {
    /// A completed action, or stock that covers demand.
    fn success(&self) -> String;
    /// Something that needs attention soon, such as a shortfall.
    fn warning(&self) -> String;
    /// A rejected action or expired stock.
    fn failure(&self) -> String;
    /// Secondary detail.
    fn dim(&self) -> String;
}

impl<T: AsRef<str> + ?Sized> Colorize for T {
    fn success(&self) -> String {
        paint(self.as_ref(), Tone::Success)
    }

    fn warning(&self) -> String {
        paint(self.as_ref(), Tone::Warning)
    }

    fn failure(&self) -> String {
        paint(self.as_ref(), Tone::Failure)
    }

    fn dim(&self) -> String {
        paint(self.as_ref(), Tone::Muted)
    }
}

/// A request status, padded to `width` and coloured by how final it is.
///
/// Padding is applied before colouring so escape codes don't skew columns.
pub fn status_label(status: RequestStatus, width: usize) -> String {
    let text = format!("{:<width$}", status.as_str());
    let tone = match status {
        RequestStatus::Pending => Tone::Warning,
        RequestStatus::Fulfilled => Tone::Success,
        RequestStatus::Cancelled => Tone::Muted,
    };
    paint(&text, tone)
}

/// Usable stock of one type, right-aligned to `width`, in amber when it does
/// not cover the pending demand for that type.
pub fn stock_label(available: u64, demand: u64, width: usize) -> String {
    let text = format!("{available:>width$}");
    if available < demand {
        paint(&text, Tone::Warning)
    } else {
        text
    }
}

/// A use-by date padded to `width`, in red once the unit has expired.
pub fn use_by_label(text: &str, expired: bool, width: usize) -> String {
    let text = format!("{text:<width$}");
    if expired {
        paint(&text, Tone::Failure)
    } else {
        text
    }
}
