//! The `graphql` remote procedure.

use std::sync::Arc;

use async_graphql::{Request, Response, Variables};
use poseidon_host::{Initializer, InvocationContext};
use poseidon_rpc::{register_routes, Dispatcher, HandlerError, RegistryError, Route};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::schema::{build_schema, GraphQlSchema, QueryContext};

/// Name the query route is registered under.
pub const GRAPHQL_ROUTE: &str = "graphql";

/// The request body of the query route.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlRequest {
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub variables: Map<String, Value>,
}

impl GraphQlRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    fn into_engine_request(self, ctx: QueryContext) -> Request {
        let mut request = Request::new(self.query)
            .variables(Variables::from_json(Value::Object(self.variables)))
            .data(ctx);
        if let Some(name) = self.operation_name {
            request = request.operation_name(name);
        }
        request
    }
}

/// Build the `graphql` route over `schema`.
///
/// Query errors are embedded in the returned response; the call itself
/// only fails on a bad payload.
pub fn graphql_route(schema: GraphQlSchema) -> Route {
    Route::json(
        GRAPHQL_ROUTE,
        GraphQlRequest::default,
        move |ctx: InvocationContext, request: GraphQlRequest| {
            let schema = schema.clone();
            async move { Ok::<_, HandlerError>(execute(&schema, ctx, request).await) }
        },
    )
}

async fn execute(
    schema: &GraphQlSchema,
    ctx: InvocationContext,
    request: GraphQlRequest,
) -> Response {
    ctx.logger().info(&format!("query: {:?}", request));

    let query_ctx = QueryContext::new(Arc::clone(ctx.module()), ctx.cancellation().clone());
    let response = schema.execute(request.into_engine_request(query_ctx)).await;

    if response.is_err() {
        ctx.logger().error(&format!(
            "failed to execute graphql operation, errors: {:?}",
            response.errors
        ));
        tracing::debug!(
            target: "poseidon::graphql",
            errors = response.errors.len(),
            "query returned errors"
        );
    }
    response
}

/// Build the schema and register the `graphql` route on `init`.
pub fn register_graphql<I>(init: &mut I) -> Result<Arc<Dispatcher>, RegistryError>
where
    I: Initializer + ?Sized,
{
    register_routes(init, [graphql_route(build_schema())])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_request_fields_default() {
        let request: GraphQlRequest = serde_json::from_str(r#"{"query":"{ a }"}"#).unwrap();
        assert_eq!(request, GraphQlRequest::new("{ a }"));
    }

    #[test]
    fn request_reads_camel_case() {
        let request: GraphQlRequest = serde_json::from_str(
            r#"{"query":"q","operationName":"Lookup","variables":{"name":"alice"}}"#,
        )
        .unwrap();
        assert_eq!(request.operation_name.as_deref(), Some("Lookup"));
        assert_eq!(request.variables["name"], "alice");
    }
}
