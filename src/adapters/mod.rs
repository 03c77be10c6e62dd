// Adapters layer: concrete implementations of the domain ports for external
// systems (comics HTTP API, document store, local file storage).

pub mod memory_store;
pub mod otruyen;
pub mod storage;

pub use memory_store::{MemoryDocumentStore, PersistedStore};
pub use otruyen::{image_url, OTruyenClient, DEFAULT_API_BASE};
pub use storage::{FileLock, LocalStorage};
