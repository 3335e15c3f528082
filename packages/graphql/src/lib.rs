//! Graph Query Route
//!
//! Registers a single `graphql` remote procedure that takes
//! `{"query": "..."}` and returns the query result as JSON.
//!
//! - Queries run on async-graphql against a schema with a `User` type and
//!   a `userByUsername` root field
//! - Resolvers reach the runtime through the call's module handle
//! - Execution errors are logged and embedded in the response; the call
//!   itself still succeeds
//!
//! # Example
//!
//! ```rust
//! use poseidon_graphql::register_graphql;
//! use poseidon_host::MemoryHost;
//!
//! # tokio_test();
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn tokio_test() {
//! let mut host = MemoryHost::new();
//! host.module().add_user("alice");
//! register_graphql(&mut host).unwrap();
//!
//! let raw = host
//!     .invoke(
//!         "graphql",
//!         r#"{"query":"{ userByUsername(username: \"alice\") { username } }"}"#,
//!     )
//!     .await
//!     .unwrap();
//! let body: serde_json::Value = serde_json::from_str(&raw).unwrap();
//! assert_eq!(body["data"]["userByUsername"]["username"], "alice");
//! # }
//! ```

mod route;
mod schema;

pub use route::{graphql_route, register_graphql, GraphQlRequest, GRAPHQL_ROUTE};
pub use schema::{
    build_schema, user_by_username, GraphQlSchema, QueryContext, RootQuery, UserObject,
};
