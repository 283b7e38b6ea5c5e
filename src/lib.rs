//! autotty - host an interactive program behind a pseudo-terminal and answer
//! its prompts automatically.
//!
//! The library exposes the pieces the `autotty` binary is built from:
//!
//! - [`core::pty`]: byte transport over ConPTY or a POSIX pseudo-terminal
//! - [`core::term`]: escape sequence decoder and screen model
//! - [`core::automation`]: pattern rules evaluated against the output stream
//! - [`core::session`]: the coordinator that ties them together
//! - [`config`]: TOML configuration
//! - [`ui`]: crossterm front end pieces

pub mod config;
pub mod core;
pub mod ui;
