//! External event protocol and the chunk-to-event translator.

pub mod events;
pub mod translator;

pub use events::{Event, EventKind, ToolCallRecord};
pub use translator::{EventStreamTranslator, Step, StreamState};
