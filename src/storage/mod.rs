pub mod error;
pub mod memory;
pub mod models;
pub mod traits;

pub use error::{BackendError, codes};
pub use memory::MemoryObjectStore;
pub use models::*;
#[cfg(any(test, feature = "mockall"))]
pub use traits::MockObjectStoreClient;
pub use traits::ObjectStoreClient;
