//! Seams to the two external collaborators: the browser session that renders
//! report pages, and the object store that holds dataset snapshots.

pub mod browser;
pub mod store;

pub use browser::BrowserDriver;
pub use store::{DatasetStore, ObjectId};
