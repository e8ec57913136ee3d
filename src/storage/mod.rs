//! Persistence primitives: storage media and typed collections over them.

mod backend;
mod collection;

pub use backend::{FileBackend, MemoryBackend, StorageBackend};
pub use collection::{Collection, Singleton};
