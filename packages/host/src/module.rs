//! The runtime's capability surface and its storage wire types.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::HostError;

/// Who may read a stored record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReadPermission {
    NoRead = 0,
    #[default]
    OwnerRead = 1,
    PublicRead = 2,
}

/// Who may write a stored record from a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WritePermission {
    NoWrite = 0,
    #[default]
    OwnerWrite = 1,
}

/// One key in a batched storage read.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StorageRead {
    pub collection: String,
    pub key: String,
    pub user_id: String,
}

/// A record returned from storage. `value` is raw JSON text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageObject {
    pub collection: String,
    pub key: String,
    pub user_id: String,
    pub value: String,
    pub version: String,
}

/// One record in a batched storage write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageWrite {
    pub collection: String,
    pub key: String,
    pub user_id: String,
    pub value: String,
    /// Conditional write: `Some("*")` requires the record to be absent,
    /// `Some(v)` requires the stored version to equal `v`.
    pub version: Option<String>,
    pub permission_read: ReadPermission,
    pub permission_write: WritePermission,
}

/// Acknowledgement for a written record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageObjectAck {
    pub collection: String,
    pub key: String,
    pub user_id: String,
    pub version: String,
}

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
}

/// The runtime's module capability handle.
///
/// # Object Safety
///
/// This trait is object-safe: the context carries it as `Arc<dyn Module>`.
#[async_trait]
pub trait Module: Send + Sync {
    /// Read many records in one batch.
    ///
    /// # Returns
    ///
    /// Only the records that exist. Missing keys are absent from the
    /// result, never represented as empty entries.
    async fn storage_read(&self, reads: &[StorageRead]) -> Result<Vec<StorageObject>, HostError>;

    /// Upsert many records in one batch.
    async fn storage_write(
        &self,
        writes: &[StorageWrite],
    ) -> Result<Vec<StorageObjectAck>, HostError>;

    /// Look up accounts by username. Unknown usernames are skipped.
    async fn users_get_username(&self, usernames: &[String]) -> Result<Vec<User>, HostError>;
}

// Blanket implementations for shared and boxed handles

#[async_trait]
impl<T: Module + ?Sized> Module for Arc<T> {
    async fn storage_read(&self, reads: &[StorageRead]) -> Result<Vec<StorageObject>, HostError> {
        self.as_ref().storage_read(reads).await
    }

    async fn storage_write(
        &self,
        writes: &[StorageWrite],
    ) -> Result<Vec<StorageObjectAck>, HostError> {
        self.as_ref().storage_write(writes).await
    }

    async fn users_get_username(&self, usernames: &[String]) -> Result<Vec<User>, HostError> {
        self.as_ref().users_get_username(usernames).await
    }
}

#[async_trait]
impl<T: Module + ?Sized> Module for Box<T> {
    async fn storage_read(&self, reads: &[StorageRead]) -> Result<Vec<StorageObject>, HostError> {
        self.as_ref().storage_read(reads).await
    }

    async fn storage_write(
        &self,
        writes: &[StorageWrite],
    ) -> Result<Vec<StorageObjectAck>, HostError> {
        self.as_ref().storage_write(writes).await
    }

    async fn users_get_username(&self, usernames: &[String]) -> Result<Vec<User>, HostError> {
        self.as_ref().users_get_username(usernames).await
    }
}
