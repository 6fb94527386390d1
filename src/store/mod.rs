pub mod base;
pub mod file_store;
pub mod memory_store;
pub mod token_store;

// Re-export the primary storage items so code outside can do
// "use crate::store::{StorageBackend, TokenStore, create_backend};"
pub use base::{create_backend, StorageBackend, StorageEvent};
pub use file_store::FileStorage;
pub use memory_store::MemoryStorage;
pub use token_store::TokenStore;
