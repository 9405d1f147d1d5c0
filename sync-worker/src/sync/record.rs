//! User row shapes as stored in the `users` table.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::config::RecordProfile;
use crate::webhook::UserData;

pub const DEFAULT_USER_STATE: &str = "Active";
pub const DEFAULT_SUBSCRIPTION_PLAN: &str = "Basic";
pub const DEFAULT_PAYMENT_METHOD: &str = "Credit Card";
pub const REFERRAL_PREFIX: &str = "REF";

/// Columns selected when looking up an existing row.
pub const SNAPSHOT_COLUMNS: &str = "user_id,updated_at";

/// A persisted user, keyed by the identity provider's user id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// External (identity provider) user id, unique
    pub user_id: String,
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub user_state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_date: DateTime<Utc>,
    /// Subscription, billing and referral columns; absent in the basic shape
    #[serde(flatten)]
    pub extended: Option<ExtendedProfile>,
}

/// Columns only present in the extended table shape.
///
/// Nothing in this struct is touched after the first insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedProfile {
    pub shop_name: Option<String>,
    pub last_payment_date: Option<DateTime<Utc>>,
    pub next_billing_date: Option<DateTime<Utc>>,
    pub trial_start_date: Option<DateTime<Utc>>,
    pub trial_end_date: Option<DateTime<Utc>>,
    pub cancellation_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub additional_notes: String,
    pub subscription_plan: String,
    pub payment_method: String,
    pub profile_completed: bool,
    pub referral_code: String,
}

impl ExtendedProfile {
    fn for_new_user() -> Self {
        Self {
            shop_name: None,
            last_payment_date: None,
            next_billing_date: None,
            trial_start_date: None,
            trial_end_date: None,
            cancellation_date: None,
            additional_notes: String::new(),
            subscription_plan: DEFAULT_SUBSCRIPTION_PLAN.to_string(),
            payment_method: DEFAULT_PAYMENT_METHOD.to_string(),
            profile_completed: false,
            referral_code: new_referral_code(),
        }
    }
}

impl UserRecord {
    /// Row for a user seen for the first time.
    pub fn new_user(user: &UserData, profile: RecordProfile, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user.external_user_id.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            user_state: DEFAULT_USER_STATE.to_string(),
            created_at: now,
            updated_at: now,
            last_login_date: now,
            extended: match profile {
                RecordProfile::Basic => None,
                RecordProfile::Extended => Some(ExtendedProfile::for_new_user()),
            },
        }
    }

    pub fn snapshot(&self) -> UserSnapshot {
        UserSnapshot {
            user_id: self.user_id.clone(),
            updated_at: Some(self.updated_at),
        }
    }

    /// Apply an update in place, as the store would.
    pub fn apply(&mut self, update: &UserUpdate) {
        self.email = update.email.clone();
        self.first_name = update.first_name.clone();
        self.last_name = update.last_name.clone();
        self.updated_at = update.updated_at;
    }
}

/// The part of an existing row the reconciler reads.
///
/// Rows written by older handlers may hold nulls in any other column, so
/// lookups never decode more than this.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserSnapshot {
    pub user_id: String,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Accepts RFC 3339, offset-less `timestamp` text (read as UTC), or null.
/// Anything unparseable reads as `None`.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|text| {
        DateTime::parse_from_rfc3339(&text)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(&text, "%Y-%m-%dT%H:%M:%S%.f")
                    .or_else(|_| NaiveDateTime::parse_from_str(&text, "%Y-%m-%d %H:%M:%S%.f"))
                    .ok()
                    .map(|naive| Utc.from_utc_datetime(&naive))
            })
    }))
}

/// The mutable identity columns plus the update timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserUpdate {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub updated_at: DateTime<Utc>,
}

impl UserUpdate {
    pub fn from_event(
        user: &UserData,
        previous_updated_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            updated_at: match previous_updated_at {
                Some(previous) => next_updated_at(previous, now),
                None => now,
            },
        }
    }
}

/// `now`, or one microsecond past `previous` if the clock has not moved past it.
///
/// Microseconds match the resolution of Postgres `timestamptz`.
pub fn next_updated_at(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

/// Unpredictable referral code, `REF` followed by a random UUID.
pub fn new_referral_code() -> String {
    format!("{REFERRAL_PREFIX}{}", Uuid::new_v4())
}
