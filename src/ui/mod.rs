//! User interface rendering and input handling.
//!
//! - **renderer**: draws screen snapshots and the status bar with crossterm
//! - **keymapper**: keyboard input to PTY byte sequences and front end bindings
//! - **clipboard**: copy and paste through the system clipboard

pub mod clipboard;
pub mod keymapper;
pub mod renderer;

pub use clipboard::Clipboard;
pub use keymapper::*;
pub use renderer::*;
