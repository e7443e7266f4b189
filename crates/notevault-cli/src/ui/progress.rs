//! Progress indicators for long-running operations.

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

use super::context::UiContext;

/// A spinner for indeterminate progress. Hidden unless the terminal
/// allows animation.
pub struct Spinner {
    bar: Option<ProgressBar>,
}

impl Spinner {
    /// Start a spinner with the given message.
    pub fn start(ctx: &UiContext, message: &str) -> Self {
        if !ctx.allows_animation() {
            return Self { bar: None };
        }
        let bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}...") {
            bar.set_style(style);
        }
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(100));
        Self { bar: Some(bar) }
    }

    /// Remove the spinner line.
    pub fn finish(self) {
        if let Some(bar) = self.bar {
            bar.finish_and_clear();
        }
    }
}
