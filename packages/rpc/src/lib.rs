//! Typed Routes over the Runtime's Untyped Remote Calls
//!
//! The runtime only knows "call name X with string payload Y". This layer
//! adds types on top:
//! - `PayloadCodec` (`JsonCodec`, `RawCodec`): payload text <-> typed value
//! - `Route`: a name, an empty-value factory, a codec, and a typed handler
//! - `RouteRegistry`: startup-time table, rejects duplicate names
//! - `Dispatcher`: the frozen table that runs one call per invocation
//!
//! # Example
//!
//! ```rust
//! use poseidon_host::{InvocationContext, MemoryHost};
//! use poseidon_rpc::{register_routes, HandlerError, Route};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! struct Add {
//!     a: i64,
//!     b: i64,
//! }
//!
//! async fn add(_ctx: InvocationContext, req: Add) -> Result<i64, HandlerError> {
//!     Ok(req.a + req.b)
//! }
//!
//! # tokio_test();
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn tokio_test() {
//! let mut host = MemoryHost::new();
//! register_routes(&mut host, [Route::json("add", Add::default, add)]).unwrap();
//!
//! assert_eq!(host.invoke("add", r#"{"a":2,"b":3}"#).await.unwrap(), "5");
//! # }
//! ```

mod codec;
mod dispatch;
mod error;
mod registry;

pub use codec::{Decode, Encode, JsonCodec, PayloadCodec, PayloadKind, RawCodec};
pub use dispatch::{CallPhase, DispatchConfig, Dispatcher};
pub use error::{CodecError, ErrorKind, HandlerError, RegistryError, RpcError};
pub use registry::{register_routes, Route, RouteRegistry};
