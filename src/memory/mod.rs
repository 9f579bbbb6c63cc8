pub mod store;
pub mod types;

pub use store::MemoryStore;
pub use types::{AddOutcome, MemoryKind, MemoryMetadata, MemoryRecord};
