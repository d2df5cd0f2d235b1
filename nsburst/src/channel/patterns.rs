//! Pattern matching utilities for prompt detection.

use once_cell::sync::Lazy;
use regex::Regex;

/// ScreenOS shell prompt: any line ending in `->`.
pub static SHELL_PROMPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"->\s*$").expect("shell prompt pattern is valid"));

/// Asked on `exit` when the running configuration has unsaved changes.
pub static SAVE_CONFIRM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Configuration modified, save\? \[y\]/n").expect("confirm pattern is valid")
});

/// What a framed line means to the protocol engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    /// A shell prompt; the device is waiting for the next command.
    Prompt,
    /// The save-configuration confirmation prompt.
    Confirm,
    /// Anything else.
    Output,
}

/// Classify a line. The confirmation prompt wins over the shell prompt.
pub fn classify(line: &str) -> LineKind {
    if SAVE_CONFIRM.is_match(line) {
        LineKind::Confirm
    } else if SHELL_PROMPT.is_match(line) {
        LineKind::Prompt
    } else {
        LineKind::Output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_prompt() {
        assert_eq!(classify("fw-edge-1->"), LineKind::Prompt);
        assert_eq!(classify("fw-edge-1(M)-> "), LineKind::Prompt);
        assert_eq!(classify("->"), LineKind::Prompt);
    }

    #[test]
    fn test_echo_after_prompt_is_output() {
        assert_eq!(classify("fw-edge-1->get system"), LineKind::Output);
        assert_eq!(classify("Product Name: NetScreen-2000"), LineKind::Output);
        assert_eq!(classify(""), LineKind::Output);
    }

    #[test]
    fn test_confirm_prompt() {
        assert_eq!(
            classify("Configuration modified, save? [y]/n "),
            LineKind::Confirm
        );
    }
}
