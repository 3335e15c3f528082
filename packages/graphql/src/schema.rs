//! The query schema: the `User` object and the root `userByUsername` field.

use std::sync::Arc;

use async_graphql::{Context, EmptyMutation, EmptySubscription, Object};
use poseidon_host::{cancellable, CancellationToken, Module, User};

/// The executable schema served by the `graphql` route.
pub type GraphQlSchema = async_graphql::Schema<RootQuery, EmptyMutation, EmptySubscription>;

/// Build the schema. Done once, at registration.
pub fn build_schema() -> GraphQlSchema {
    async_graphql::Schema::build(RootQuery, EmptyMutation, EmptySubscription).finish()
}

/// Per-execution data handed to resolvers.
#[derive(Clone)]
pub struct QueryContext {
    module: Arc<dyn Module>,
    cancel: CancellationToken,
}

impl QueryContext {
    pub fn new(module: Arc<dyn Module>, cancel: CancellationToken) -> Self {
        Self { module, cancel }
    }

    pub fn module(&self) -> &dyn Module {
        self.module.as_ref()
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }
}

impl std::fmt::Debug for QueryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryContext")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// A registered user.
pub struct UserObject(pub User);

#[Object(name = "User")]
impl UserObject {
    /// The id of the user.
    async fn id(&self) -> String {
        self.0.id.clone()
    }

    /// The username of the user.
    async fn username(&self) -> Option<String> {
        Some(self.0.username.clone())
    }
}

/// Root query type.
pub struct RootQuery;

#[Object(name = "RootQuery")]
impl RootQuery {
    /// Look up a user by username.
    async fn user_by_username(
        &self,
        ctx: &Context<'_>,
        username: String,
    ) -> async_graphql::Result<Option<UserObject>> {
        let query_ctx = ctx.data::<QueryContext>()?;
        let user = user_by_username(query_ctx, &username).await?;
        Ok(Some(UserObject(user)))
    }
}

/// Look up exactly one user by username.
pub async fn user_by_username(
    ctx: &QueryContext,
    username: &str,
) -> async_graphql::Result<User> {
    let wanted = [username.to_string()];
    let users = cancellable(ctx.cancellation(), ctx.module().users_get_username(&wanted))
        .await
        .map_err(|e| async_graphql::Error::new(e.to_string()))?;

    users
        .into_iter()
        .find(|u| u.username == username)
        .ok_or_else(|| {
            async_graphql::Error::new(format!("no user with username `{}`", username))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_graphql::Request;
    use poseidon_host::{HostError, MemoryModule};
    use serde_json::json;

    fn context(module: MemoryModule) -> QueryContext {
        QueryContext::new(Arc::new(module), CancellationToken::new())
    }

    async fn run(query: &str, ctx: QueryContext) -> serde_json::Value {
        let response = build_schema().execute(Request::new(query).data(ctx)).await;
        serde_json::to_value(&response).unwrap()
    }

    #[tokio::test]
    async fn only_id_is_non_null() {
        let body = run(
            r#"{ __type(name: "User") { fields { name type { kind } } } }"#,
            context(MemoryModule::new()),
        )
        .await;

        assert_eq!(
            body["data"]["__type"]["fields"],
            json!([
                { "name": "id", "type": { "kind": "NON_NULL" } },
                { "name": "username", "type": { "kind": "SCALAR" } },
            ])
        );
    }

    #[tokio::test]
    async fn resolves_user_by_username() {
        let module = MemoryModule::new();
        let id = module.add_user("alice");

        let body = run(
            r#"{ userByUsername(username: "alice") { id username } }"#,
            context(module),
        )
        .await;

        assert_eq!(
            body["data"],
            json!({ "userByUsername": { "id": id, "username": "alice" } })
        );
        assert!(body.get("errors").is_none());
    }

    #[tokio::test]
    async fn selection_is_respected() {
        let module = MemoryModule::new();
        module.add_user("alice");

        let body = run(
            r#"{ userByUsername(username: "alice") { username } }"#,
            context(module),
        )
        .await;

        assert_eq!(body["data"], json!({ "userByUsername": { "username": "alice" } }));
    }

    #[tokio::test]
    async fn missing_user_is_a_field_error() {
        let body = run(
            r#"{ userByUsername(username: "bob") { id } }"#,
            context(MemoryModule::new()),
        )
        .await;

        assert_eq!(body["data"]["userByUsername"], serde_json::Value::Null);
        assert_eq!(body["errors"][0]["message"], "no user with username `bob`");
        assert_eq!(body["errors"][0]["path"], json!(["userByUsername"]));
    }

    #[tokio::test]
    async fn missing_argument_is_rejected() {
        let body = run("{ userByUsername { id } }", context(MemoryModule::new())).await;
        assert!(body["errors"][0]["message"]
            .as_str()
            .is_some_and(|m| m.contains("username")));
    }

    #[tokio::test]
    async fn cancelled_lookup_is_reported() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let ctx = QueryContext::new(Arc::new(MemoryModule::new()), cancel);

        let err = user_by_username(&ctx, "alice").await.unwrap_err();
        assert_eq!(err.message, HostError::Cancelled.to_string());
    }
}
