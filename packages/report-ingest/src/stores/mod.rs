//! `DatasetStore` implementations.

pub mod drive;
pub mod local;
pub mod memory;

pub use drive::DriveStore;
pub use local::LocalStore;
pub use memory::MemoryStore;
