//! Shared repository index and the registrar that writes to it.

pub mod fetcher;
pub mod lock;
pub mod registrar;
pub mod schema;
pub mod store;

pub use fetcher::{FetchCancelled, HttpIndexFetcher, IndexFetcher};
pub use lock::{CancelToken, IndexLock, LockPolicy, lock_path_for};
pub use registrar::RepositoryRegistrar;
pub use schema::{RepositoryEntry, RepositoryIndexFile};
pub use store::IndexStore;
