//! Checkpoint backends:
//! - `file`: a single decimal value on disk, replaced atomically
//! - `memory`: in-process, with write recording and failure injection for tests

pub mod file;
pub mod memory;

pub use file::FileProgressStore;
pub use memory::MemoryProgressStore;
