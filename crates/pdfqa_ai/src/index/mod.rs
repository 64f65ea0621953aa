pub mod lock;
pub mod model;
pub mod store;

pub use lock::{IndexLock, LockStatus};
pub use model::{IndexEntry, IndexManifest, IndexStatus, VectorIndex, INDEX_FORMAT_VERSION};
pub use store::{build_with_embedder, IndexStore};
