//! Content-addressed storage for uploaded files (entry files, sources,
//! screenshots, event uploads).

mod error;
mod hash;
mod traits;

pub mod filesystem;

pub use error::StorageError;
pub use hash::ContentHash;
pub use traits::{BoxReader, FileStore, StoredFile};
