//! Per-user remote collections.
//!
//! Each user's uploads are filed under one Bunny collection named
//! `{prefix}{user_id}`. The id is cached in the metadata store and created
//! lazily under an advisory lock so concurrent uploads for the same user do
//! not create duplicates.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use bunny_client::{BunnyClient, DeleteOutcome};
use bunny_models::{CollectionId, UserId};

use crate::config::OffloadConfig;
use crate::error::{OffloadError, OffloadResult};
use crate::store::{LockStore, MetadataStore, Stores};

/// Lock key guarding collection creation for a user.
pub fn collection_lock_key(prefix: &str, user: UserId) -> String {
    format!("{}collection_lock_{}", prefix, user)
}

/// Resolves and maintains the collection of each user.
#[derive(Clone)]
pub struct CollectionManager {
    client: BunnyClient,
    metadata: Arc<dyn MetadataStore>,
    locks: Arc<dyn LockStore>,
    prefix: String,
    lock_ttl: Duration,
}

impl CollectionManager {
    pub fn new(client: BunnyClient, stores: &Stores, config: &OffloadConfig) -> Self {
        Self {
            client,
            metadata: stores.metadata.clone(),
            locks: stores.locks.clone(),
            prefix: config.collection_prefix.clone(),
            lock_ttl: config.collection_lock_ttl,
        }
    }

    /// Remote collection name for a user.
    pub fn collection_name(&self, user: UserId) -> String {
        format!("{}{}", self.prefix, user)
    }

    /// Cached collection id, without touching the remote API.
    pub async fn cached_collection(&self, user: UserId) -> OffloadResult<Option<CollectionId>> {
        self.metadata.user_collection(user).await
    }

    /// Return the user's collection, creating it when missing or stale.
    pub async fn ensure_user_collection(&self, user: UserId) -> OffloadResult<CollectionId> {
        if let Some(cached) = self.metadata.user_collection(user).await? {
            match self.client.get_collection(&cached).await {
                Ok(Some(_)) => {
                    debug!(user_id = %user, collection_id = %cached, "Using cached collection");
                    return Ok(cached);
                }
                Ok(None) => {
                    warn!(user_id = %user, collection_id = %cached, "Cached collection no longer exists");
                }
                Err(e) => {
                    warn!(
                        user_id = %user,
                        collection_id = %cached,
                        error = %e,
                        "Could not confirm cached collection"
                    );
                }
            }
            self.metadata.delete_user_collection(user).await?;
        }

        self.create_user_collection(user).await
    }

    /// Create (or adopt) the user's collection and cache its id.
    ///
    /// Fails with `CollectionLocked` while another caller holds the
    /// creation lock for this user.
    pub async fn create_user_collection(&self, user: UserId) -> OffloadResult<CollectionId> {
        if self.client.library_id().is_none() {
            return Err(OffloadError::MissingLibraryId);
        }

        let lock_key = collection_lock_key(&self.prefix, user);
        let Some(token) = self.locks.try_acquire(&lock_key, self.lock_ttl).await? else {
            info!(user_id = %user, "Collection creation already in progress");
            return Err(OffloadError::CollectionLocked(user));
        };

        let result = self.create_locked(user).await;

        if let Err(e) = self.locks.release(&lock_key, &token).await {
            warn!(lock_key = %lock_key, error = %e, "Failed to release collection lock");
        }

        result
    }

    async fn create_locked(&self, user: UserId) -> OffloadResult<CollectionId> {
        let name = self.collection_name(user);

        let existing = self
            .client
            .find_collection_by_name(&name)
            .await
            .map_err(|source| OffloadError::CollectionCreationFailed { user, source })?;

        let collection = match existing {
            Some(collection) => {
                info!(user_id = %user, collection_id = %collection.guid, "Adopting existing collection");
                collection
            }
            None => self
                .client
                .create_collection(&name)
                .await
                .map_err(|source| OffloadError::CollectionCreationFailed { user, source })?,
        };

        self.metadata
            .set_user_collection(user, &collection.guid)
            .await?;
        Ok(collection.guid)
    }

    /// Remove the user's collection remotely and forget the mapping.
    ///
    /// Returns `None` when the user never had a collection.
    pub async fn delete_user_collection(&self, user: UserId) -> OffloadResult<Option<DeleteOutcome>> {
        let Some(collection) = self.metadata.user_collection(user).await? else {
            debug!(user_id = %user, "No collection to delete");
            return Ok(None);
        };

        let outcome = self.client.delete_collection(&collection).await?;
        self.metadata.delete_user_collection(user).await?;

        info!(user_id = %user, collection_id = %collection, outcome = ?outcome, "Removed user collection");
        Ok(Some(outcome))
    }
}
