//! Poseidon Host: the Runtime Seam
//!
//! This is the narrow waist between application code and the multiplayer
//! backend runtime. Everything here is untyped: route payloads are plain
//! strings and stored records are plain JSON text.
//!
//! - `Initializer`: the runtime's named remote-call registration
//! - `Module`: the runtime's capability surface (storage, users)
//! - `Logger`, `DbHandle`: handles the runtime passes into every call
//! - `InvocationContext`: the per-call bundle of all of the above plus a
//!   cancellation signal
//! - `MemoryHost`: an in-memory runtime for tests and local tooling
//!
//! Typed routes live in `poseidon-rpc`, typed storage in `poseidon-storage`.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use poseidon_host::{Initializer, InvocationContext, MemoryHost, RpcFn, RpcFuture};
//!
//! let mut host = MemoryHost::new();
//! let echo: RpcFn = Arc::new(|_ctx: InvocationContext, payload: String| -> RpcFuture {
//!     Box::pin(async move { Ok(payload) })
//! });
//! host.register_rpc("echo", echo).unwrap();
//! ```

mod context;
mod error;
mod initializer;
mod logger;
mod memory;
mod module;

pub use context::{cancellable, DbHandle, InvocationContext};
pub use error::{CallError, HostError, StatusCode};
pub use initializer::{Initializer, RpcFn, RpcFuture};
pub use logger::{Level, Logger, TracingLogger};
pub use memory::{LogLine, MemoryHost, MemoryLogger, MemoryModule};
pub use module::{
    Module, ReadPermission, StorageObject, StorageObjectAck, StorageRead, StorageWrite, User,
    WritePermission,
};

// Re-exported so downstream crates name one cancellation type.
pub use tokio_util::sync::CancellationToken;
