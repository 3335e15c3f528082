//! Named remote-call registration.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::{CallError, HostError, InvocationContext};

/// The future a remote-call callback returns.
pub type RpcFuture = BoxFuture<'static, Result<String, CallError>>;

/// An untyped remote-call callback.
///
/// The runtime builds a fresh `InvocationContext` for every call and hands
/// it over together with the raw payload string.
pub type RpcFn = Arc<dyn Fn(InvocationContext, String) -> RpcFuture + Send + Sync>;

/// The runtime's registration surface, available only during startup.
pub trait Initializer {
    /// Expose `callback` under `name`.
    ///
    /// Fails with `HostError::RouteClaimed` when the name is already taken.
    fn register_rpc(&mut self, name: &str, callback: RpcFn) -> Result<(), HostError>;
}

impl<T: Initializer + ?Sized> Initializer for &mut T {
    fn register_rpc(&mut self, name: &str, callback: RpcFn) -> Result<(), HostError> {
        (**self).register_rpc(name, callback)
    }
}

impl<T: Initializer + ?Sized> Initializer for Box<T> {
    fn register_rpc(&mut self, name: &str, callback: RpcFn) -> Result<(), HostError> {
        self.as_mut().register_rpc(name, callback)
    }
}
