// UI Layer (terminal)
pub mod progress;
pub mod prompt;

pub use progress::ExtractProgressBar;
pub use prompt::{TerminalMode, TerminalPrompt};
