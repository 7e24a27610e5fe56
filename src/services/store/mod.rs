// External stores the pipeline depends on: key/value (quota + cache),
// documents (metadata records) and object storage (audio bytes).

pub mod documents;
pub mod kv;
pub mod storage;

pub use documents::{Collection, Direction, DocumentStore, MemoryDocumentStore, Query};
pub use kv::{KeyValueStore, MemoryKvStore};
pub use storage::{BasicAdjustments, LocalObjectStorage, ObjectStorage, StoredObject};
