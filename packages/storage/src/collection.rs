//! Collection descriptors and their accessors.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use poseidon_host::{
    cancellable, CancellationToken, Module, ReadPermission, StorageObject, StorageObjectAck,
    StorageRead, StorageWrite, WritePermission,
};
use poseidon_rpc::{Decode, Encode, JsonCodec};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::StorageError;

type Factory<T> = Arc<dyn Fn() -> T + Send + Sync>;

/// Permissions stamped on every record a descriptor writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WritePermissions {
    pub read: ReadPermission,
    pub write: WritePermission,
}

/// One record type stored under a fixed (collection, key), one record per
/// owner.
///
/// Holds no mutable state; share it freely between concurrent calls.
///
/// # Example
///
/// ```rust
/// use poseidon_storage::CollectionDescriptor;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Default, Serialize, Deserialize)]
/// #[serde(rename_all = "camelCase")]
/// struct PlayerStats {
///     matches_played: u32,
///     winning_streak: u32,
/// }
///
/// let stats = CollectionDescriptor::<PlayerStats>::new("stats", "summary");
/// assert_eq!(stats.collection(), "stats");
/// assert_eq!(stats.default_value().matches_played, 0);
/// ```
pub struct CollectionDescriptor<T> {
    collection: String,
    key: String,
    model: Factory<T>,
    default: Factory<T>,
    permissions: WritePermissions,
}

impl<T> Clone for CollectionDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection.clone(),
            key: self.key.clone(),
            model: Arc::clone(&self.model),
            default: Arc::clone(&self.default),
            permissions: self.permissions,
        }
    }
}

impl<T> std::fmt::Debug for CollectionDescriptor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollectionDescriptor")
            .field("collection", &self.collection)
            .field("key", &self.key)
            .field("permissions", &self.permissions)
            .finish_non_exhaustive()
    }
}

impl<T> CollectionDescriptor<T>
where
    T: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    /// A descriptor whose model and default are both `T::default()`.
    pub fn new(collection: impl Into<String>, key: impl Into<String>) -> Self
    where
        T: Default,
    {
        Self::with_factories(collection, key, T::default, T::default)
    }

    /// A descriptor with explicit factories.
    ///
    /// `model` produces the instance stored text is decoded into; fields
    /// missing from the stored text keep the model's values. `default`
    /// produces the value returned for owners with no record. Both are
    /// called once per use, so no two callers share an instance.
    pub fn with_factories(
        collection: impl Into<String>,
        key: impl Into<String>,
        model: impl Fn() -> T + Send + Sync + 'static,
        default: impl Fn() -> T + Send + Sync + 'static,
    ) -> Self {
        Self {
            collection: collection.into(),
            key: key.into(),
            model: Arc::new(model),
            default: Arc::new(default),
            permissions: WritePermissions::default(),
        }
    }

    /// Replace the default-value factory.
    pub fn default_with(mut self, default: impl Fn() -> T + Send + Sync + 'static) -> Self {
        self.default = Arc::new(default);
        self
    }

    /// Replace the model-value factory.
    pub fn model_with(mut self, model: impl Fn() -> T + Send + Sync + 'static) -> Self {
        self.model = Arc::new(model);
        self
    }

    pub fn with_permissions(mut self, permissions: WritePermissions) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn permissions(&self) -> WritePermissions {
        self.permissions
    }

    /// A fresh default value.
    pub fn default_value(&self) -> T {
        (self.default)()
    }

    fn read_request(&self, owner_id: &str) -> StorageRead {
        StorageRead {
            collection: self.collection.clone(),
            key: self.key.clone(),
            user_id: owner_id.to_string(),
        }
    }

    fn decode(&self, object: &StorageObject) -> Result<T, StorageError> {
        JsonCodec
            .decode(&object.value, (self.model)())
            .map_err(|e| StorageError::RecordCorrupt {
                collection: self.collection.clone(),
                key: self.key.clone(),
                owner_id: object.user_id.clone(),
                message: e.to_string(),
            })
    }

    fn write_request(&self, owner_id: &str, value: &T) -> Result<StorageWrite, StorageError> {
        let text = JsonCodec.encode(value).map_err(|e| StorageError::Encode {
            collection: self.collection.clone(),
            key: self.key.clone(),
            owner_id: owner_id.to_string(),
            message: e.to_string(),
        })?;

        Ok(StorageWrite {
            collection: self.collection.clone(),
            key: self.key.clone(),
            user_id: owner_id.to_string(),
            value: text,
            version: None,
            permission_read: self.permissions.read,
            permission_write: self.permissions.write,
        })
    }

    fn belongs_here(&self, object: &StorageObject) -> bool {
        object.collection == self.collection && object.key == self.key
    }

    /// Read one owner's record.
    ///
    /// # Returns
    ///
    /// * `Ok(None)` - No record stored for this owner.
    /// * `Ok(Some(value))` - The decoded record.
    /// * `Err(StorageError::RecordCorrupt)` - The record does not decode.
    pub async fn read(
        &self,
        cancel: &CancellationToken,
        module: &dyn Module,
        owner_id: &str,
    ) -> Result<Option<T>, StorageError> {
        let reads = [self.read_request(owner_id)];
        let objects = cancellable(cancel, module.storage_read(&reads)).await?;

        objects
            .iter()
            .find(|object| self.belongs_here(object) && object.user_id == owner_id)
            .map(|object| self.decode(object))
            .transpose()
    }

    /// Read one owner's record, or a fresh default when none is stored.
    ///
    /// A missing record is not created.
    pub async fn get_or_default(
        &self,
        cancel: &CancellationToken,
        module: &dyn Module,
        owner_id: &str,
    ) -> Result<T, StorageError> {
        Ok(self
            .read(cancel, module, owner_id)
            .await?
            .unwrap_or_else(|| self.default_value()))
    }

    /// Read many owners' records in one batched storage call.
    ///
    /// The result holds exactly one entry per distinct requested owner.
    /// Owners without a record map to a fresh default. If any stored record
    /// fails to decode the whole call fails with `RecordCorrupt` naming that
    /// owner; no partial result is returned.
    pub async fn get_or_default_bulk<S>(
        &self,
        cancel: &CancellationToken,
        module: &dyn Module,
        owner_ids: &[S],
    ) -> Result<HashMap<String, T>, StorageError>
    where
        S: AsRef<str> + Sync,
    {
        let mut requested: Vec<&str> = Vec::with_capacity(owner_ids.len());
        let mut seen: HashSet<&str> = HashSet::with_capacity(owner_ids.len());
        for owner_id in owner_ids {
            let owner_id = owner_id.as_ref();
            if seen.insert(owner_id) {
                requested.push(owner_id);
            }
        }

        if requested.is_empty() {
            return Ok(HashMap::new());
        }

        let reads: Vec<StorageRead> = requested
            .iter()
            .map(|owner_id| self.read_request(owner_id))
            .collect();
        let objects = cancellable(cancel, module.storage_read(&reads)).await?;

        tracing::debug!(
            collection = %self.collection,
            key = %self.key,
            requested = requested.len(),
            found = objects.len(),
            "bulk read"
        );

        let mut values = HashMap::with_capacity(requested.len());
        for object in &objects {
            if !self.belongs_here(object) || !seen.contains(object.user_id.as_str()) {
                tracing::warn!(
                    collection = %object.collection,
                    key = %object.key,
                    owner_id = %object.user_id,
                    "storage returned a record that was not requested"
                );
                continue;
            }
            values.insert(object.user_id.clone(), self.decode(object)?);
        }

        for owner_id in requested {
            values
                .entry(owner_id.to_string())
                .or_insert_with(|| self.default_value());
        }

        Ok(values)
    }

    /// Store one owner's record, replacing any previous value.
    pub async fn write(
        &self,
        cancel: &CancellationToken,
        module: &dyn Module,
        owner_id: &str,
        value: &T,
    ) -> Result<StorageObjectAck, StorageError> {
        let writes = [self.write_request(owner_id, value)?];
        let mut acks = cancellable(cancel, module.storage_write(&writes)).await?;

        acks.pop().ok_or_else(|| {
            StorageError::Host(poseidon_host::HostError::storage(format!(
                "no acknowledgement for {}/{}/{}",
                self.collection, self.key, owner_id
            )))
        })
    }

    /// Store many owners' records in one batched storage call.
    ///
    /// Every value is encoded before anything is sent, so an encode
    /// failure writes nothing.
    pub async fn write_bulk<S>(
        &self,
        cancel: &CancellationToken,
        module: &dyn Module,
        entries: &[(S, T)],
    ) -> Result<Vec<StorageObjectAck>, StorageError>
    where
        S: AsRef<str> + Sync,
    {
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let writes = entries
            .iter()
            .map(|(owner_id, value)| self.write_request(owner_id.as_ref(), value))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(cancellable(cancel, module.storage_write(&writes)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use poseidon_host::MemoryModule;
    use serde::Deserialize;

    #[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
    struct Wallet {
        coins: u64,
        gems: u64,
    }

    fn wallets() -> CollectionDescriptor<Wallet> {
        CollectionDescriptor::new("economy", "wallet")
    }

    #[tokio::test]
    async fn empty_request_skips_storage() {
        let module = MemoryModule::new();
        let none: [&str; 0] = [];

        let values = wallets()
            .get_or_default_bulk(&CancellationToken::new(), &module, &none)
            .await
            .unwrap();

        assert!(values.is_empty());
        assert_eq!(module.read_batches(), 0);
    }

    #[tokio::test]
    async fn duplicate_owner_ids_collapse() {
        let module = MemoryModule::new();
        let cancel = CancellationToken::new();
        wallets()
            .write(&cancel, &module, "a", &Wallet { coins: 5, gems: 0 })
            .await
            .unwrap();

        let values = wallets()
            .get_or_default_bulk(&cancel, &module, &["a", "b", "a"])
            .await
            .unwrap();

        assert_eq!(values.len(), 2);
        assert_eq!(values["a"].coins, 5);
        assert_eq!(values["b"], Wallet::default());
    }

    #[tokio::test]
    async fn model_fills_fields_missing_from_stored_text() {
        let module = MemoryModule::new();
        module.put_raw("economy", "wallet", "a", r#"{"coins":9}"#);
        let descriptor = wallets().model_with(|| Wallet { coins: 0, gems: 3 });

        let wallet = descriptor
            .get_or_default(&CancellationToken::new(), &module, "a")
            .await
            .unwrap();

        assert_eq!(wallet, Wallet { coins: 9, gems: 3 });
    }

    #[tokio::test]
    async fn read_distinguishes_missing_from_default() {
        let module = MemoryModule::new();
        let cancel = CancellationToken::new();

        assert_eq!(wallets().read(&cancel, &module, "a").await.unwrap(), None);

        wallets()
            .write(&cancel, &module, "a", &Wallet::default())
            .await
            .unwrap();
        assert_eq!(
            wallets().read(&cancel, &module, "a").await.unwrap(),
            Some(Wallet::default())
        );
    }

    #[tokio::test]
    async fn writes_carry_permissions() {
        let module = MemoryModule::new();
        let descriptor = wallets().with_permissions(WritePermissions {
            read: ReadPermission::PublicRead,
            write: WritePermission::NoWrite,
        });
        let request = descriptor.write_request("a", &Wallet::default()).unwrap();

        assert_eq!(request.permission_read, ReadPermission::PublicRead);
        assert_eq!(request.permission_write, WritePermission::NoWrite);
        assert_eq!(request.version, None);
        assert_eq!(module.write_batches(), 0);
    }

    #[tokio::test]
    async fn cancelled_read_issues_no_storage_call() {
        let module = MemoryModule::new();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = wallets()
            .get_or_default_bulk(&cancel, &module, &["a"])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StorageError::Host(poseidon_host::HostError::Cancelled)
        ));
        assert_eq!(module.read_batches(), 0);
    }

    #[test]
    fn clones_share_factories() {
        let descriptor = wallets().default_with(|| Wallet { coins: 1, gems: 1 });
        let copy = descriptor.clone();
        assert_eq!(copy.default_value(), Wallet { coins: 1, gems: 1 });
        assert_eq!(copy.key(), "wallet");
    }
}
