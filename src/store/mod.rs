pub mod base;
pub mod firestore;
pub mod memory;

pub use base::{DocumentStore, StoreError};
pub use firestore::{FirestoreConfig, FirestoreStore};
pub use memory::MemoryStore;
