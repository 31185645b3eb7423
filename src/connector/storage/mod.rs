mod ltr_store;
mod metadata_store;
mod repository_store;
mod response_cache;
mod snapshot_store;

pub use ltr_store::LtrStore;
pub use metadata_store::{atomic_write, MetadataStore};
pub use repository_store::{JobStore, RepositoryStore};
pub use response_cache::ResponseCache;
pub use snapshot_store::SnapshotStore;
