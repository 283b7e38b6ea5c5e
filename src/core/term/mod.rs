//! Terminal emulation
//!
//! - **utf8**: incremental permissive UTF-8 assembly
//! - **parser**: escape-sequence decoder producing [`DecoderEvent`]s
//! - **state**: cell grid, cursor and grid mutations
//! - **screen**: applies decoder events to the grid and takes snapshots

pub mod parser;
pub mod screen;
pub mod state;
pub mod utf8;

pub use parser::{ControlFunction, CsiSequence, Decoder, DecoderEvent, EscSequence};
pub use screen::{Reply, ScreenModel, ScreenSnapshot};
pub use state::{AttrFlags, Cell, CellAttrs, Color, Row, TerminalModes};
