//! Backing store for user rows.
//!
//! The reconciler only needs three operations keyed by the external user id.
//! Uniqueness of that id is the store's job, not the caller's.

pub mod memory;
pub mod postgrest;

use async_trait::async_trait;
use thiserror::Error;

use crate::sync::{UserRecord, UserSnapshot, UserUpdate};

pub use memory::MemoryStore;
pub use postgrest::PostgrestStore;

/// Store failure, tagged with the operation that failed.
///
/// "No such row" is not an error for lookups, which return `Ok(None)`.
/// An update that matches no row is `NotFound`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("lookup failed: {0}")]
    Lookup(String),

    #[error("insert failed: {0}")]
    Insert(String),

    #[error("update failed: {0}")]
    Update(String),

    #[error("user {0} already exists")]
    Conflict(String),

    #[error("no row for user {0}")]
    NotFound(String),
}

#[async_trait]
pub trait UserStore: Send + Sync + 'static {
    /// Fetch the id and `updated_at` of the row for `external_user_id`,
    /// or `None` if there is none.
    async fn find_by_external_id(
        &self,
        external_user_id: &str,
    ) -> Result<Option<UserSnapshot>, StoreError>;

    /// Insert a new row. Fails with `Conflict` if the id is already present.
    async fn insert(&self, record: &UserRecord) -> Result<(), StoreError>;

    /// Apply `update` to the row for `external_user_id`. Fails with
    /// `NotFound` if no row matched.
    async fn update(&self, external_user_id: &str, update: &UserUpdate) -> Result<(), StoreError>;
}
