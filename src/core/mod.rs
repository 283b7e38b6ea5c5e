//! Core session components.
//!
//! - **pty**: pseudo-terminal transport (ConPTY on Windows, portable-pty elsewhere)
//! - **term**: escape sequence decoder and screen model
//! - **automation**: pattern rules that answer prompts in the output stream
//! - **session**: coordinator tying the above to one child process
//!
//! # Architecture
//!
//! ```text
//! Session
//! ├── Transport (reader/writer threads over a PtyBackend)
//! ├── Decoder → ScreenModel (grid, cursor, modes, replies)
//! ├── AutomationEngine (MatchWindow + rules)
//! └── ResponseSchedule (delayed responses)
//! ```

pub mod automation;
pub mod pty;
pub mod session;
pub mod term;
