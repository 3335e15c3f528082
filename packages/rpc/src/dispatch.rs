//! The per-call bridge between the runtime and a typed handler.
//!
//! One call moves through these phases:
//!
//! ```text
//! Received -> Decoded -> HandlerExecuting -> Succeeded
//!     |                        |         \-> EncodeFailed
//!     \-> DecodeFailed         \-> HandlerFailed
//! ```
//!
//! A handler never sees a payload that failed to decode.

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use futures::future::BoxFuture;
use poseidon_host::{CallError, InvocationContext, RpcFn, RpcFuture};

use crate::codec::{Decode, Encode, PayloadKind};
use crate::registry::Route;
use crate::{CodecError, ErrorKind, HandlerError, RpcError};

/// Dispatch configuration.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Emit a `tracing` debug event for every phase of every call.
    pub log_requests: bool,
    /// Log failed handler calls through the call's logger, together with
    /// the decoded request.
    pub log_handler_failures: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            log_requests: false,
            log_handler_failures: true,
        }
    }
}

/// Where a call is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    Received,
    Decoded,
    HandlerExecuting,
    Succeeded,
    HandlerFailed,
    DecodeFailed,
    EncodeFailed,
    Cancelled,
}

fn trace_phase(config: &DispatchConfig, route: &str, phase: CallPhase) {
    if config.log_requests {
        tracing::debug!(route, ?phase, "dispatch");
    }
}

/// A route with its types erased.
pub(crate) trait RouteCall: Send + Sync {
    fn call<'a>(
        &'a self,
        route: &'a str,
        payload: &'a str,
        ctx: InvocationContext,
        config: &'a DispatchConfig,
    ) -> BoxFuture<'a, Result<String, RpcError>>;
}

pub(crate) struct TypedRoute<Req, Resp, C, E, F> {
    codec: C,
    empty: E,
    handler: F,
    _types: PhantomData<fn(Req) -> Resp>,
}

impl<Req, Resp, C, E, F> TypedRoute<Req, Resp, C, E, F> {
    pub(crate) fn new(codec: C, empty: E, handler: F) -> Self {
        Self {
            codec,
            empty,
            handler,
            _types: PhantomData,
        }
    }
}

impl<Req, Resp, C, E, F, Fut> RouteCall for TypedRoute<Req, Resp, C, E, F>
where
    Req: Debug + Send + 'static,
    Resp: Send + 'static,
    C: Decode<Req> + Encode<Resp>,
    E: Fn() -> Req + Send + Sync + 'static,
    F: Fn(InvocationContext, Req) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Resp, HandlerError>> + Send + 'static,
{
    fn call<'a>(
        &'a self,
        route: &'a str,
        payload: &'a str,
        ctx: InvocationContext,
        config: &'a DispatchConfig,
    ) -> BoxFuture<'a, Result<String, RpcError>> {
        Box::pin(async move {
            let logger = Arc::clone(ctx.logger());
            let cancel = ctx.cancellation().clone();
            trace_phase(config, route, CallPhase::Received);

            if cancel.is_cancelled() {
                trace_phase(config, route, CallPhase::Cancelled);
                return Err(RpcError::Cancelled {
                    route: route.to_string(),
                });
            }

            let request = match self.codec.decode(payload, (self.empty)()) {
                Ok(request) => request,
                Err(error) => {
                    trace_phase(config, route, CallPhase::DecodeFailed);
                    let error = RpcError::decode(route, error);
                    if error.kind() == ErrorKind::Internal {
                        logger.error(&format!(
                            "route `{}` cannot build its empty request: {}",
                            route, error
                        ));
                    } else {
                        // Caller input problem, not a server defect.
                        logger.debug(&format!("route `{}` rejected payload: {}", route, error));
                    }
                    return Err(error);
                }
            };
            trace_phase(config, route, CallPhase::Decoded);

            trace_phase(config, route, CallPhase::HandlerExecuting);
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    trace_phase(config, route, CallPhase::Cancelled);
                    return Err(RpcError::Cancelled {
                        route: route.to_string(),
                    });
                }
                outcome = (self.handler)(ctx, request) => outcome,
            };

            let response = match outcome {
                Ok(response) => response,
                Err(source) => {
                    trace_phase(config, route, CallPhase::HandlerFailed);
                    if config.log_handler_failures {
                        // Decoding is deterministic: this is the request the
                        // handler was given.
                        let request = self
                            .codec
                            .decode(payload, (self.empty)())
                            .map(|request| format!("{:?}", request))
                            .unwrap_or_else(|_| payload.to_string());
                        logger.error(&format!(
                            "route `{}` handler failed: {}; request: {}",
                            route, source, request
                        ));
                    }
                    return Err(RpcError::HandlerFailed {
                        route: route.to_string(),
                        source,
                    });
                }
            };

            match self.codec.encode(&response) {
                Ok(raw) => {
                    trace_phase(config, route, CallPhase::Succeeded);
                    Ok(raw)
                }
                Err(error) => {
                    trace_phase(config, route, CallPhase::EncodeFailed);
                    let message = match error {
                        CodecError::Encode { message } => message,
                        other => other.to_string(),
                    };
                    logger.error(&format!(
                        "route `{}` produced a result its codec cannot encode: {}",
                        route, message
                    ));
                    tracing::error!(route, %message, "route output does not match its codec");
                    Err(RpcError::EncodeFailed {
                        route: route.to_string(),
                        message,
                    })
                }
            }
        })
    }
}

/// The frozen route table.
///
/// Built once by `RouteRegistry::install` and read-only afterwards, so it is
/// shared between concurrent calls without locking.
pub struct Dispatcher {
    routes: BTreeMap<String, Route>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub(crate) fn new(routes: BTreeMap<String, Route>, config: DispatchConfig) -> Self {
        Self { routes, config }
    }

    /// Run one call.
    ///
    /// `ctx` must be fresh for this call; it is consumed here.
    pub async fn invoke(
        &self,
        name: &str,
        payload: &str,
        ctx: InvocationContext,
    ) -> Result<String, RpcError> {
        let Some(route) = self.routes.get(name) else {
            tracing::debug!(route = name, "no such route");
            return Err(RpcError::NotFound {
                route: name.to_string(),
            });
        };

        route.call().call(name, payload, ctx, &self.config).await
    }

    pub fn contains(&self, name: &str) -> bool {
        self.routes.contains_key(name)
    }

    pub fn payload_kind(&self, name: &str) -> Option<PayloadKind> {
        self.routes.get(name).map(Route::kind)
    }

    /// Route names, sorted.
    pub fn route_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.routes.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }
}

impl Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("routes", &self.routes.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish()
    }
}

/// The callback handed to the runtime for one route name.
pub(crate) fn forwarding_callback(dispatcher: Arc<Dispatcher>, name: String) -> RpcFn {
    Arc::new(move |ctx: InvocationContext, payload: String| -> RpcFuture {
        let dispatcher = Arc::clone(&dispatcher);
        let name = name.clone();
        Box::pin(async move {
            dispatcher
                .invoke(&name, &payload, ctx)
                .await
                .map_err(CallError::from)
        })
    })
}
