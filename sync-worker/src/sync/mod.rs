//! Reconciliation of verified user events against the store.
//!
//! Per event: one lookup, then at most one write.
//!
//! - unknown user, `user.created` or `user.updated`: insert a new row
//! - known user, `user.created` or `user.updated`: update identity columns
//! - any other event type: nothing
//!
//! A replayed `user.created` therefore takes the update path. It never
//! duplicates the row and never fails because the row already exists.
//!
//! Two concurrent deliveries for the same user are not ordered against each
//! other. The last write wins on `updated_at`; if both miss the lookup, the
//! store's unique constraint rejects the second insert with a conflict and
//! the sender's redelivery lands on the update path. A row that disappears
//! between the lookup and the update fails with `NotFound`; the redelivery
//! then inserts it again.

pub mod record;

use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info};

use crate::config::RecordProfile;
use crate::store::{StoreError, UserStore};
use crate::webhook::VerifiedEvent;

pub use record::{next_updated_at, ExtendedProfile, UserRecord, UserSnapshot, UserUpdate};

/// What a reconcile call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    Inserted,
    Updated,
    /// Event type we do not act on; the store was not touched
    Ignored,
}

impl ReconcileOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Inserted => "inserted",
            ReconcileOutcome::Updated => "updated",
            ReconcileOutcome::Ignored => "ignored",
        }
    }
}

/// Applies user events to a store using one row shape policy.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn UserStore>,
    profile: RecordProfile,
}

impl Reconciler {
    pub fn new(store: Arc<dyn UserStore>, profile: RecordProfile) -> Self {
        Self { store, profile }
    }

    pub async fn reconcile(&self, event: &VerifiedEvent) -> Result<ReconcileOutcome, StoreError> {
        let user = match event.user() {
            Some(user) => user,
            None => {
                info!(event_type = event.event_type(), "reconcile_skipped");
                return Ok(ReconcileOutcome::Ignored);
            }
        };

        let existing = self
            .store
            .find_by_external_id(&user.external_user_id)
            .await
            .map_err(|e| {
                error!(user_id = %user.external_user_id, error = %e, "user_lookup_failed");
                e
            })?;

        match existing {
            None => {
                let record = UserRecord::new_user(user, self.profile, Utc::now());
                self.store.insert(&record).await.map_err(|e| {
                    error!(user_id = %user.external_user_id, error = %e, "user_insert_failed");
                    e
                })?;

                info!(
                    user_id = %user.external_user_id,
                    event_type = event.event_type(),
                    extended = record.extended.is_some(),
                    "user_inserted"
                );
                Ok(ReconcileOutcome::Inserted)
            }
            Some(current) => {
                let update = UserUpdate::from_event(user, current.updated_at, Utc::now());
                self.store
                    .update(&user.external_user_id, &update)
                    .await
                    .map_err(|e| {
                        error!(user_id = %user.external_user_id, error = %e, "user_update_failed");
                        e
                    })?;

                info!(
                    user_id = %user.external_user_id,
                    event_type = event.event_type(),
                    "user_updated"
                );
                Ok(ReconcileOutcome::Updated)
            }
        }
    }
}
