//! UI context for environment detection and configuration.

use std::io::IsTerminal;

use super::mode::OutputMode;

/// Terminal and environment context for UI decisions.
#[derive(Debug, Clone)]
pub struct UiContext {
    /// Whether stdout is a TTY
    pub is_tty: bool,
    /// Whether color output is enabled
    pub color: bool,
    /// Resolved output mode
    pub mode: OutputMode,
}

impl UiContext {
    /// Create context from environment and CLI flags.
    pub fn from_env(json_flag: bool, no_color_flag: bool) -> Self {
        let is_tty = std::io::stdout().is_terminal();
        let term_is_dumb = std::env::var("TERM").map(|v| v == "dumb").unwrap_or(false);
        let no_color_env = std::env::var("NO_COLOR").is_ok();

        // Disabled by NO_COLOR, --no-color or TERM=dumb
        let color = is_tty && !no_color_flag && !no_color_env && !term_is_dumb;
        let mode = OutputMode::resolve(json_flag, is_tty, term_is_dumb);

        Self {
            is_tty,
            color,
            mode,
        }
    }

    /// Check if interactive prompts are allowed.
    pub fn is_interactive(&self) -> bool {
        self.is_tty && std::io::stdin().is_terminal()
    }

    /// Check if animations (spinners) are allowed.
    pub fn allows_animation(&self) -> bool {
        self.is_tty && self.mode == OutputMode::Pretty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_mode_from_flag() {
        let ctx = UiContext::from_env(true, false);
        assert_eq!(ctx.mode, OutputMode::Json);
        assert!(!ctx.allows_animation());
    }

    #[test]
    fn test_no_color_disables_color() {
        let ctx = UiContext::from_env(false, true);
        assert!(!ctx.color);
    }
}
