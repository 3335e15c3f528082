//! In-memory runtime for tests and local tooling.
//!
//! `MemoryHost` plays the runtime's registration role and can invoke the
//! callbacks registered with it. `MemoryModule` plays the capability role:
//! storage in a map, users in a table.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::{
    CallError, DbHandle, HostError, Initializer, InvocationContext, Level, Logger, Module, RpcFn,
    StatusCode, StorageObject, StorageObjectAck, StorageRead, StorageWrite, User,
};

type RecordKey = (String, String, String);

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    version: String,
}

#[derive(Debug, Default)]
struct ModuleState {
    records: BTreeMap<RecordKey, StoredValue>,
    users: BTreeMap<String, User>,
    next_version: u64,
}

/// In-memory `Module`.
///
/// Records are keyed by (collection, key, owner id). Every write bumps a
/// process-wide version counter.
#[derive(Debug, Default)]
pub struct MemoryModule {
    state: Mutex<ModuleState>,
    read_batches: AtomicUsize,
    write_batches: AtomicUsize,
}

impl MemoryModule {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, ModuleState>, HostError> {
        self.state.lock().map_err(|_| HostError::Other {
            message: "lock poisoned".into(),
        })
    }

    /// The state for test helpers, which keep working after a panic
    /// elsewhere poisoned the lock.
    fn state(&self) -> MutexGuard<'_, ModuleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an account and return its generated id.
    pub fn add_user(&self, username: impl Into<String>) -> String {
        let username = username.into();
        let id = uuid::Uuid::new_v4().to_string();
        self.state().users.insert(
            username.clone(),
            User {
                id: id.clone(),
                username,
            },
        );
        id
    }

    /// Number of registered accounts.
    pub fn user_count(&self) -> usize {
        self.state().users.len()
    }

    /// Store raw text under a key, bypassing any encoding.
    ///
    /// Lets tests plant records that do not decode.
    pub fn put_raw(&self, collection: &str, key: &str, user_id: &str, value: &str) {
        let mut state = self.state();
        state.next_version += 1;
        let version = state.next_version.to_string();
        state.records.insert(
            (collection.to_string(), key.to_string(), user_id.to_string()),
            StoredValue {
                value: value.to_string(),
                version,
            },
        );
    }

    /// Raw text stored under a key, if any.
    pub fn get_raw(&self, collection: &str, key: &str, user_id: &str) -> Option<String> {
        self.state()
            .records
            .get(&(collection.to_string(), key.to_string(), user_id.to_string()))
            .map(|stored| stored.value.clone())
    }

    /// Number of records currently stored.
    pub fn record_count(&self) -> usize {
        self.state().records.len()
    }

    /// Number of `storage_read` batches served so far.
    pub fn read_batches(&self) -> usize {
        self.read_batches.load(Ordering::SeqCst)
    }

    /// Number of `storage_write` batches served so far.
    pub fn write_batches(&self) -> usize {
        self.write_batches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Module for MemoryModule {
    async fn storage_read(&self, reads: &[StorageRead]) -> Result<Vec<StorageObject>, HostError> {
        self.read_batches.fetch_add(1, Ordering::SeqCst);
        let state = self.lock()?;

        let mut seen = BTreeSet::new();
        let mut objects = Vec::new();
        for read in reads {
            let key = (
                read.collection.clone(),
                read.key.clone(),
                read.user_id.clone(),
            );
            if !seen.insert(key.clone()) {
                continue;
            }
            if let Some(stored) = state.records.get(&key) {
                objects.push(StorageObject {
                    collection: read.collection.clone(),
                    key: read.key.clone(),
                    user_id: read.user_id.clone(),
                    value: stored.value.clone(),
                    version: stored.version.clone(),
                });
            }
        }
        Ok(objects)
    }

    async fn storage_write(
        &self,
        writes: &[StorageWrite],
    ) -> Result<Vec<StorageObjectAck>, HostError> {
        self.write_batches.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock()?;

        // Check every condition first so a batch applies fully or not at all.
        for write in writes {
            let key = (
                write.collection.clone(),
                write.key.clone(),
                write.user_id.clone(),
            );
            let current = state.records.get(&key).map(|s| s.version.as_str());
            let accepted = match (write.version.as_deref(), current) {
                (None, _) => true,
                (Some("*"), existing) => existing.is_none(),
                (Some(expected), Some(existing)) => expected == existing,
                (Some(_), None) => false,
            };
            if !accepted {
                return Err(HostError::storage(format!(
                    "version check failed for {}/{}/{}",
                    write.collection, write.key, write.user_id
                )));
            }
        }

        let mut acks = Vec::with_capacity(writes.len());
        for write in writes {
            state.next_version += 1;
            let version = state.next_version.to_string();
            state.records.insert(
                (
                    write.collection.clone(),
                    write.key.clone(),
                    write.user_id.clone(),
                ),
                StoredValue {
                    value: write.value.clone(),
                    version: version.clone(),
                },
            );
            acks.push(StorageObjectAck {
                collection: write.collection.clone(),
                key: write.key.clone(),
                user_id: write.user_id.clone(),
                version,
            });
        }
        Ok(acks)
    }

    async fn users_get_username(&self, usernames: &[String]) -> Result<Vec<User>, HostError> {
        let state = self.lock()?;
        Ok(usernames
            .iter()
            .filter_map(|name| state.users.get(name).cloned())
            .collect())
    }
}

/// One captured log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub level: Level,
    pub message: String,
}

/// A logger that keeps every line for later inspection.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    lines: Mutex<Vec<LogLine>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// All lines logged so far.
    pub fn lines(&self) -> Vec<LogLine> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Messages logged at exactly `level`.
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter(|line| line.level == level)
            .map(|line| line.message)
            .collect()
    }
}

impl Logger for MemoryLogger {
    fn log(&self, level: Level, message: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(LogLine {
                level,
                message: message.to_string(),
            });
    }
}

/// In-memory runtime.
///
/// Use this for testing routes without a real backend. Callbacks are kept
/// by name; `invoke` plays the part of a client call.
pub struct MemoryHost {
    module: Arc<MemoryModule>,
    logger: Arc<MemoryLogger>,
    db: Arc<DbHandle>,
    rpcs: HashMap<String, RpcFn>,
    claimed: BTreeSet<String>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self {
            module: Arc::new(MemoryModule::new()),
            logger: Arc::new(MemoryLogger::new()),
            db: Arc::new(DbHandle::new("memory")),
            rpcs: HashMap::new(),
            claimed: BTreeSet::new(),
        }
    }

    pub fn module(&self) -> &Arc<MemoryModule> {
        &self.module
    }

    pub fn logger(&self) -> &Arc<MemoryLogger> {
        &self.logger
    }

    /// Mark a name as owned by some other subsystem.
    pub fn claim(&mut self, name: impl Into<String>) {
        self.claimed.insert(name.into());
    }

    /// Names registered through `register_rpc`, sorted.
    pub fn rpc_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.rpcs.keys().cloned().collect();
        names.sort();
        names
    }

    /// Build the context a real runtime would pass to one call.
    pub fn context(&self, cancel: CancellationToken) -> InvocationContext {
        InvocationContext::new(
            cancel,
            self.logger.clone(),
            self.db.clone(),
            self.module.clone(),
        )
    }

    /// Call a registered callback with a fresh context.
    pub async fn invoke(&self, name: &str, payload: &str) -> Result<String, CallError> {
        self.invoke_with(name, payload, CancellationToken::new())
            .await
    }

    /// Call a registered callback, cancelling through `cancel`.
    pub async fn invoke_with(
        &self,
        name: &str,
        payload: &str,
        cancel: CancellationToken,
    ) -> Result<String, CallError> {
        let Some(callback) = self.rpcs.get(name).cloned() else {
            return Err(CallError::new(
                StatusCode::NotFound,
                format!("rpc function not found: {}", name),
            ));
        };
        callback(self.context(cancel), payload.to_string()).await
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Initializer for MemoryHost {
    fn register_rpc(&mut self, name: &str, callback: RpcFn) -> Result<(), HostError> {
        if self.claimed.contains(name) || self.rpcs.contains_key(name) {
            return Err(HostError::RouteClaimed {
                name: name.to_string(),
            });
        }
        self.rpcs.insert(name.to_string(), callback);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ReadPermission, RpcFuture, WritePermission};

    fn write(user_id: &str, value: &str, version: Option<&str>) -> StorageWrite {
        StorageWrite {
            collection: "stats".to_string(),
            key: "summary".to_string(),
            user_id: user_id.to_string(),
            value: value.to_string(),
            version: version.map(str::to_string),
            permission_read: ReadPermission::OwnerRead,
            permission_write: WritePermission::OwnerWrite,
        }
    }

    fn read(user_id: &str) -> StorageRead {
        StorageRead {
            collection: "stats".to_string(),
            key: "summary".to_string(),
            user_id: user_id.to_string(),
        }
    }

    #[tokio::test]
    async fn read_returns_only_existing_records() {
        let module = MemoryModule::new();
        module
            .storage_write(&[write("u1", "{}", None)])
            .await
            .unwrap();

        let objects = module.storage_read(&[read("u1"), read("u2")]).await.unwrap();

        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].user_id, "u1");
        assert_eq!(module.read_batches(), 1);
    }

    #[tokio::test]
    async fn writes_overwrite_and_bump_version() {
        let module = MemoryModule::new();
        let first = module
            .storage_write(&[write("u1", "1", None)])
            .await
            .unwrap();
        let second = module
            .storage_write(&[write("u1", "2", None)])
            .await
            .unwrap();

        assert_ne!(first[0].version, second[0].version);
        assert_eq!(module.get_raw("stats", "summary", "u1").as_deref(), Some("2"));
        assert_eq!(module.record_count(), 1);
    }

    #[tokio::test]
    async fn conditional_write_rejects_stale_version() {
        let module = MemoryModule::new();
        let ack = module
            .storage_write(&[write("u1", "1", Some("*"))])
            .await
            .unwrap();

        let again = module.storage_write(&[write("u1", "2", Some("*"))]).await;
        assert!(matches!(again, Err(HostError::Storage { .. })));

        module
            .storage_write(&[write("u1", "3", Some(ack[0].version.as_str()))])
            .await
            .unwrap();
        assert_eq!(module.get_raw("stats", "summary", "u1").as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn users_lookup_skips_unknown() {
        let module = MemoryModule::new();
        let id = module.add_user("alice");

        let users = module
            .users_get_username(&["alice".to_string(), "bob".to_string()])
            .await
            .unwrap();

        assert_eq!(users.len(), 1);
        assert_eq!(users[0].id, id);
    }

    #[tokio::test]
    async fn host_rejects_claimed_names() {
        let mut host = MemoryHost::new();
        host.claim("taken");

        let noop: RpcFn = Arc::new(|_ctx: InvocationContext, p: String| -> RpcFuture {
            Box::pin(async move { Ok(p) })
        });

        let err = host.register_rpc("taken", noop.clone()).unwrap_err();
        assert_eq!(
            err,
            HostError::RouteClaimed {
                name: "taken".to_string()
            }
        );

        host.register_rpc("echo", noop.clone()).unwrap();
        assert!(host.register_rpc("echo", noop).is_err());
        assert_eq!(host.invoke("echo", "hi").await.unwrap(), "hi");
    }

    #[tokio::test]
    async fn invoking_unknown_name_is_not_found() {
        let host = MemoryHost::new();
        let err = host.invoke("missing", "").await.unwrap_err();
        assert_eq!(err.code, StatusCode::NotFound);
    }

    #[test]
    fn memory_logger_captures_levels() {
        let logger = MemoryLogger::new();
        logger.info("hello");
        logger.error("oops");

        assert_eq!(logger.lines().len(), 2);
        assert_eq!(logger.messages(Level::Error), vec!["oops".to_string()]);
    }

    #[tokio::test]
    async fn helpers_survive_a_poisoned_lock() {
        let module = Arc::new(MemoryModule::new());
        let holder = module.clone();
        let _ = std::thread::spawn(move || {
            let _guard = holder.state.lock().unwrap();
            panic!("poison the state lock");
        })
        .join();
        assert!(module.state.is_poisoned());

        module.add_user("alice");
        module.put_raw("stats", "summary", "u1", "{}");

        assert_eq!(module.user_count(), 1);
        assert_eq!(module.get_raw("stats", "summary", "u1").as_deref(), Some("{}"));
        assert_eq!(module.record_count(), 1);

        // Capability calls still report the poisoned lock.
        let err = module.users_get_username(&["alice".to_string()]).await.unwrap_err();
        assert!(matches!(err, HostError::Other { .. }));
    }
}
