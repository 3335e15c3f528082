//! Typed Storage Collections
//!
//! The runtime stores JSON text addressed by (collection, key, owner id).
//! A `CollectionDescriptor<T>` pins one record type to one (collection,
//! key) and adds:
//! - typed reads that fall back to a fresh default for missing owners
//! - batched reads that cover many owners in one storage call
//! - typed writes that fully replace the owner's previous record
//!
//! A corrupt record is always an error, never silently defaulted.
//!
//! # Example
//!
//! ```rust
//! use poseidon_host::{CancellationToken, MemoryModule};
//! use poseidon_storage::CollectionDescriptor;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
//! struct Progress {
//!     level: u32,
//! }
//!
//! # tokio_test();
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn tokio_test() {
//! let module = MemoryModule::new();
//! let cancel = CancellationToken::new();
//! let progress = CollectionDescriptor::<Progress>::new("progress", "campaign");
//!
//! progress.write(&cancel, &module, "u1", &Progress { level: 4 }).await.unwrap();
//!
//! let all = progress
//!     .get_or_default_bulk(&cancel, &module, &["u1", "u2"])
//!     .await
//!     .unwrap();
//! assert_eq!(all["u1"], Progress { level: 4 });
//! assert_eq!(all["u2"], Progress::default());
//! # }
//! ```

mod collection;
mod error;

pub use collection::{CollectionDescriptor, WritePermissions};
pub use error::StorageError;
