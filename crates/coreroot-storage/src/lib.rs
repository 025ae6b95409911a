//! # coreroot-storage
//!
//! Storage abstraction for CoreRoot: the resource and user store traits, the
//! identifier translator that keeps surrogate keys out of the public
//! interface, and an in-memory backend.
//!
//! ## Example
//!
//! ```ignore
//! use coreroot_storage::{IdentifierTranslator, InMemoryStore, ResourceStore};
//!
//! let store = Arc::new(InMemoryStore::new());
//! let translator = IdentifierTranslator::new(store.clone());
//! let key = translator.resolve(ResourceKind::Post, raw_id).await?;
//! let post = store.get(ResourceKind::Post, key).await?;
//! ```

mod error;
mod memory;
mod traits;
mod translator;
mod types;

pub use error::{ErrorCategory, StorageError};
pub use memory::InMemoryStore;
pub use traits::{Deleted, IdentifierDirectory, ResourceStore, UserStore};
pub use translator::IdentifierTranslator;
pub use types::{
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, NewResource, NewUser, Page, Paginated, ResourceUpdate,
    UserPatch, UserRecord,
};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Shared handle to a resource store.
pub type DynResourceStore = std::sync::Arc<dyn ResourceStore>;

/// Shared handle to a user store.
pub type DynUserStore = std::sync::Arc<dyn UserStore>;
