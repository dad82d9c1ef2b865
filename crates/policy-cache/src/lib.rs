pub mod api;
pub mod errors;
pub mod loader;
pub mod metrics;
pub mod model;
pub mod retry;
pub mod store;

pub use api::{CacheOptions, InMemoryPolicyCache, PolicyCache};
pub use errors::{CacheError, Resource, StoreError};
pub use loader::FileBackingStore;
pub use model::{CacheSnapshot, CacheStats, PolicyDocument, PolicyRecord, SecretRecord};
pub use store::{BackingStore, InMemoryBackingStore};
