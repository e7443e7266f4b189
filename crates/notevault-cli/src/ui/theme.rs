//! Badges and color roles.

use owo_colors::OwoColorize;

/// Badge types for status indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Badge {
    Ok,
    Warn,
    Err,
    Info,
}

impl Badge {
    /// Get badge text (e.g., "[OK]")
    pub fn text(&self) -> &'static str {
        match self {
            Self::Ok => "[OK]",
            Self::Warn => "[WARN]",
            Self::Err => "[ERR]",
            Self::Info => "[INFO]",
        }
    }

    /// Badge text, colored when `color` is set.
    pub fn styled(&self, color: bool) -> String {
        let text = self.text();
        if !color {
            return text.to_string();
        }
        match self {
            Self::Ok => text.green().bold().to_string(),
            Self::Warn => text.yellow().bold().to_string(),
            Self::Err => text.red().bold().to_string(),
            Self::Info => text.cyan().to_string(),
        }
    }
}

/// Dim secondary text such as hints and labels.
pub fn dim(text: &str, color: bool) -> String {
    if color {
        text.dimmed().to_string()
    } else {
        text.to_string()
    }
}

/// Bold text for headers.
pub fn bold(text: &str, color: bool) -> String {
    if color {
        text.bold().to_string()
    } else {
        text.to_string()
    }
}
