//! Location stream wire protocol
//!
//! Frames are JSON text of the form `{"event": "<name>", "data": {...}}`.

mod messages;

pub use messages::*;
