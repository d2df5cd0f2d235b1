//! Channel layer: line framing, prompt detection, and the command/response
//! protocol engine.

mod framer;
mod patterns;
mod pty;

pub use framer::LineFramer;
pub use patterns::{LineKind, SAVE_CONFIRM, SHELL_PROMPT, classify};
pub use pty::{PtyChannel, PtyConfig, Teardown};
