//! Route registration.
//!
//! Routes are collected during startup, checked for duplicate names, then
//! handed to the runtime in one pass. After `install` the table is frozen
//! inside a `Dispatcher`.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use poseidon_host::{Initializer, InvocationContext};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{Decode, Encode, JsonCodec, PayloadKind, RawCodec};
use crate::dispatch::{forwarding_callback, DispatchConfig, Dispatcher, RouteCall, TypedRoute};
use crate::{HandlerError, RegistryError};

/// A named, typed remote operation.
///
/// # Example
///
/// ```rust
/// use poseidon_host::InvocationContext;
/// use poseidon_rpc::{HandlerError, Route};
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Default, Serialize, Deserialize)]
/// struct Join {
///     lobby: String,
/// }
///
/// async fn join(_ctx: InvocationContext, request: Join) -> Result<String, HandlerError> {
///     Ok(format!("joined {}", request.lobby))
/// }
///
/// let route = Route::json("lobby_join", Join::default, join);
/// assert_eq!(route.name(), "lobby_join");
/// ```
#[derive(Clone)]
pub struct Route {
    name: String,
    kind: PayloadKind,
    call: Arc<dyn RouteCall>,
}

impl Route {
    /// A route with an explicit codec.
    ///
    /// `empty` produces the instance each payload is decoded into.
    pub fn new<Req, Resp, C, E, F, Fut>(
        name: impl Into<String>,
        codec: C,
        empty: E,
        handler: F,
    ) -> Self
    where
        Req: std::fmt::Debug + Send + 'static,
        Resp: Send + 'static,
        C: Decode<Req> + Encode<Resp>,
        E: Fn() -> Req + Send + Sync + 'static,
        F: Fn(InvocationContext, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, HandlerError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            kind: codec.kind(),
            call: Arc::new(TypedRoute::new(codec, empty, handler)),
        }
    }

    /// A JSON route.
    pub fn json<Req, Resp, E, F, Fut>(name: impl Into<String>, empty: E, handler: F) -> Self
    where
        Req: Serialize + DeserializeOwned + std::fmt::Debug + Send + 'static,
        Resp: Serialize + Send + 'static,
        E: Fn() -> Req + Send + Sync + 'static,
        F: Fn(InvocationContext, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Resp, HandlerError>> + Send + 'static,
    {
        Self::new(name, JsonCodec, empty, handler)
    }

    /// A string-in, string-out route.
    pub fn raw<F, Fut>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(InvocationContext, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<String, HandlerError>> + Send + 'static,
    {
        Self::new(name, RawCodec, String::new, handler)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PayloadKind {
        self.kind
    }

    pub(crate) fn call(&self) -> &dyn RouteCall {
        self.call.as_ref()
    }
}

impl std::fmt::Debug for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Startup-time route table.
#[derive(Debug, Default)]
pub struct RouteRegistry {
    routes: Vec<Route>,
}

impl RouteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one route.
    ///
    /// A second route under an existing name is rejected with
    /// `DuplicateRoute`; the first registration stays in place.
    pub fn register(&mut self, route: Route) -> Result<(), RegistryError> {
        if self.get(route.name()).is_some() {
            return Err(RegistryError::DuplicateRoute { name: route.name });
        }
        self.routes.push(route);
        Ok(())
    }

    /// Add a batch of routes, all or nothing.
    pub fn register_all(
        &mut self,
        routes: impl IntoIterator<Item = Route>,
    ) -> Result<(), RegistryError> {
        let batch: Vec<Route> = routes.into_iter().collect();

        for (i, route) in batch.iter().enumerate() {
            let earlier_in_batch = batch[..i].iter().any(|r| r.name == route.name);
            if earlier_in_batch || self.get(route.name()).is_some() {
                return Err(RegistryError::DuplicateRoute {
                    name: route.name.clone(),
                });
            }
        }

        self.routes.extend(batch);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.name == name)
    }

    /// Route names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.routes.iter().map(Route::name)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Freeze the table without touching a runtime.
    pub fn into_dispatcher(self, config: DispatchConfig) -> Dispatcher {
        let routes: BTreeMap<String, Route> = self
            .routes
            .into_iter()
            .map(|route| (route.name.clone(), route))
            .collect();
        Dispatcher::new(routes, config)
    }

    /// Freeze the table and register every route with the runtime, in
    /// registration order.
    ///
    /// The first refusal from the runtime aborts the remaining
    /// registrations; startup is expected to fail on that error.
    pub fn install<I>(
        self,
        init: &mut I,
        config: DispatchConfig,
    ) -> Result<Arc<Dispatcher>, RegistryError>
    where
        I: Initializer + ?Sized,
    {
        let names: Vec<String> = self.routes.iter().map(|r| r.name.clone()).collect();
        let dispatcher = Arc::new(self.into_dispatcher(config));

        for name in names {
            let callback = forwarding_callback(Arc::clone(&dispatcher), name.clone());
            init.register_rpc(&name, callback)
                .map_err(|source| RegistryError::HostRegistrationFailed {
                    name: name.clone(),
                    source,
                })?;
            tracing::debug!(route = %name, "registered route");
        }

        Ok(dispatcher)
    }
}

/// Register a batch of routes with the runtime using the default config.
pub fn register_routes<I>(
    init: &mut I,
    routes: impl IntoIterator<Item = Route>,
) -> Result<Arc<Dispatcher>, RegistryError>
where
    I: Initializer + ?Sized,
{
    let mut registry = RouteRegistry::new();
    registry.register_all(routes)?;
    registry.install(init, DispatchConfig::default())
}
