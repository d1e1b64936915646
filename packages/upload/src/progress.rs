//! Progress reporting capability for the upload pipeline.
//!
//! Defines a [`ProgressSink`] trait that decouples status output from any
//! specific rendering backend (e.g., `indicatif` spinners, plain log lines,
//! or silence). The sink is always passed in explicitly; nothing in the
//! pipeline reaches for a global UI object.

use strum_macros::{AsRefStr, Display};

/// Semantic tone of a status line. Renderers map these to colors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Tone {
    /// Neutral information.
    Info,
    /// A step completed.
    Success,
    /// A step failed.
    Error,
    /// Something worth a second look.
    Warning,
}

/// Trait for reporting progress from the deploy pipeline.
///
/// Implementations must be `Send + Sync` to support sharing across tokio
/// tasks.
pub trait ProgressSink: Send + Sync {
    /// Start an activity indicator with a label. `tick` is the character the
    /// indicator animates with.
    fn start(&self, label: &str, tick: char);

    /// Stop the current activity indicator, if any.
    fn stop(&self);

    /// Write one status line.
    fn write_line(&self, tone: Tone, line: &str);
}

/// Sink for callers that only care about the returned result.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn start(&self, _label: &str, _tick: char) {}
    fn stop(&self) {}
    fn write_line(&self, _tone: Tone, _line: &str) {}
}

/// Formats an elapsed duration the way status lines show it, e.g. `[1.204s]`.
#[must_use]
pub fn format_elapsed(elapsed: std::time::Duration) -> String {
    format!("[{:.3}s]", elapsed.as_secs_f64())
}
