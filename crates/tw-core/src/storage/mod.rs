//! Storage backends for the persisted roster

mod file;
mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;
