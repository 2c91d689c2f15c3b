//! Shared colored output utilities for CLI commands.
//!
//! Uses `termcolor` for cross-platform colored terminal output.
//! Respects `NO_COLOR`, the `--color` flag and the `[output]` config table.

use std::io::Write;
use specula_mirrors::ColorMode;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

/// Resolve `ColorChoice` from CLI flag, config and environment.
///
/// Priority: `NO_COLOR` env > `--color` flag > config > auto-detect TTY.
pub fn resolve_color_choice(flag: Option<&str>, configured: ColorMode) -> ColorChoice {
    if std::env::var_os("NO_COLOR").is_some() {
        return ColorChoice::Never;
    }
    match flag {
        Some("always") => ColorChoice::Always,
        Some("never") => ColorChoice::Never,
        Some(_) => ColorChoice::Auto,
        None => match configured {
            ColorMode::Always => ColorChoice::Always,
            ColorMode::Never => ColorChoice::Never,
            ColorMode::Auto => ColorChoice::Auto,
        },
    }
}

/// Styled output writer for terminal.
pub struct StyledOutput {
    stdout: StandardStream,
}

impl StyledOutput {
    /// Create a new styled output with the given color choice.
    pub fn new(choice: ColorChoice) -> Self {
        Self {
            stdout: StandardStream::stdout(choice),
        }
    }

    // ── Generic styled writes ────────────────────────────────────────

    /// Write text with a specific color and style.
    pub fn write_styled(&mut self, text: &str, color: Option<Color>, bold: bool) {
        let mut spec = ColorSpec::new();
        spec.set_fg(color).set_bold(bold);
        let _ = self.stdout.set_color(&spec);
        let _ = write!(self.stdout, "{}", text);
        let _ = self.stdout.reset();
    }

    // ── Convenience helpers ──────────────────────────────────────────

    /// Cyan bold text, for section labels.
    pub fn heading(&mut self, text: &str) {
        self.write_styled(text, Some(Color::Cyan), true);
    }

    /// Green text, for class and module names.
    pub fn name(&mut self, text: &str) {
        self.write_styled(text, Some(Color::Green), false);
    }

    /// Yellow text, for visibility and kind markers.
    pub fn marker(&mut self, text: &str) {
        self.write_styled(text, Some(Color::Yellow), false);
    }

    /// Dim/gray text.
    pub fn dim(&mut self, text: &str) {
        self.write_styled(text, Some(Color::White), false);
    }

    /// Bold white text.
    pub fn bold(&mut self, text: &str) {
        self.write_styled(text, None, true);
    }

    /// Plain text (no color).
    pub fn plain(&mut self, text: &str) {
        let _ = write!(self.stdout, "{}", text);
    }

    /// Newline.
    pub fn newline(&mut self) {
        let _ = writeln!(self.stdout);
    }

    /// Flush stdout.
    pub fn flush(&mut self) {
        let _ = self.stdout.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_beats_config() {
        if std::env::var_os("NO_COLOR").is_some() {
            return;
        }
        assert_eq!(resolve_color_choice(Some("never"), ColorMode::Always), ColorChoice::Never);
        assert_eq!(resolve_color_choice(None, ColorMode::Always), ColorChoice::Always);
        assert_eq!(resolve_color_choice(None, ColorMode::Auto), ColorChoice::Auto);
    }
}
