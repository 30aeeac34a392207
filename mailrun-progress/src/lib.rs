pub mod backends;
pub mod error;
pub mod lock;
pub mod store;

pub use backends::{FileProgressStore, MemoryProgressStore};
pub use error::{ProgressError, Result};
pub use lock::RunLock;
pub use store::ProgressStore;
