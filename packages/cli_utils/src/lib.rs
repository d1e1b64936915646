#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal output for the static deploy CLI.
//!
//! Provides an `indicatif`-backed spinner behind the [`ProgressSink`] trait,
//! plus [`init_logger`] which sets up `indicatif-log-bridge` so that
//! `log::info!` and friends are suspended while the spinner redraws.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use static_deploy_upload::{ProgressSink, Tone};

pub use indicatif::MultiProgress;

/// Number of tick characters the spinner grows to before wrapping.
const TICK_FRAMES: usize = 3;

/// A terminal [`ProgressSink`]: one spinner at a time plus colored status
/// lines printed above it.
pub struct IndicatifProgress {
    multi: MultiProgress,
    spinner: Mutex<Option<ProgressBar>>,
}

impl IndicatifProgress {
    /// Creates a sink drawing into `multi`, which should be the instance
    /// returned by [`init_logger`].
    #[must_use]
    pub fn new(multi: &MultiProgress) -> Self {
        Self {
            multi: multi.clone(),
            spinner: Mutex::new(None),
        }
    }
}

impl ProgressSink for IndicatifProgress {
    fn start(&self, label: &str, tick: char) {
        // Frames grow ".", "..", "..." and the last entry is shown once
        // finished.
        let frames: Vec<String> = (1..=TICK_FRAMES)
            .map(|n| tick.to_string().repeat(n))
            .chain(std::iter::once(String::new()))
            .collect();
        let frames: Vec<&str> = frames.iter().map(String::as_str).collect();

        let bar = self.multi.add(ProgressBar::new_spinner());
        bar.set_style(
            ProgressStyle::with_template("{msg} {spinner:.green} {elapsed:.cyan}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&frames),
        );
        bar.set_message(label.to_string());
        bar.enable_steady_tick(Duration::from_millis(250));

        let previous = self
            .spinner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(bar);
        if let Some(previous) = previous {
            previous.finish_and_clear();
        }
    }

    fn stop(&self) {
        let current = self
            .spinner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(bar) = current {
            bar.finish_and_clear();
            self.multi.remove(&bar);
        }
    }

    fn write_line(&self, tone: Tone, line: &str) {
        let styled = match tone {
            Tone::Info => style(line),
            Tone::Success => style(line).green(),
            Tone::Error => style(line).red(),
            Tone::Warning => style(line).yellow(),
        };
        self.multi.suspend(|| println!("{styled}"));
    }
}

/// Initializes the global logger wrapped in `indicatif-log-bridge` so that
/// `log::info!` and friends are suspended while the spinner redraws.
///
/// Returns the [`MultiProgress`] the progress sink must draw into.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok(); // already set, e.g. in tests

    log::set_max_level(level);

    multi
}
