//! Configuration module for environment variable parsing.
//!
//! All settings come from the process environment once at startup and are
//! then passed explicitly into the verifier, the store and the reconciler.

use std::env;
use std::str::FromStr;
use tracing::warn;

/// Which backing store implementation to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Supabase / PostgREST over HTTP
    Postgrest,
    /// Process-local map, for local development
    Memory,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgrest" | "supabase" => Ok(StoreBackend::Postgrest),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(format!("unknown store backend: {other}")),
        }
    }
}

/// Which columns a freshly inserted user row carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordProfile {
    /// Identity and lifecycle columns only
    Basic,
    /// Identity, lifecycle, subscription, billing and referral columns
    Extended,
}

impl FromStr for RecordProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(RecordProfile::Basic),
            "extended" => Ok(RecordProfile::Extended),
            other => Err(format!("unknown record profile: {other}")),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Webhook signing secret, `<prefix>_<base64 key>`
    pub signing_secret: Option<String>,

    /// Maximum age in seconds for `svix-timestamp`; `None` disables the check
    pub signature_max_age: Option<u64>,

    /// Backing store implementation
    pub store_backend: StoreBackend,

    /// PostgREST base URL (Supabase project URL)
    pub supabase_url: Option<String>,

    /// Service role key sent as `apikey` and bearer token
    pub supabase_service_key: Option<String>,

    /// Table holding user rows
    pub users_table: String,

    /// Shape policy for inserted rows
    pub record_profile: RecordProfile,

    /// Per-call store timeout in milliseconds
    pub store_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            port: parse_or("PORT", 8080),

            signing_secret: non_empty("CLERK_SIGNING_SECRET"),

            signature_max_age: env::var("SIGNATURE_MAX_AGE").ok().and_then(|raw| {
                match raw.trim().parse::<u64>() {
                    Ok(v) => Some(v),
                    Err(_) => {
                        warn!(env_var = "SIGNATURE_MAX_AGE", value = %raw, "Invalid value, timestamp check disabled");
                        None
                    }
                }
            }),

            store_backend: parse_or("STORE_BACKEND", StoreBackend::Postgrest),

            supabase_url: non_empty("SUPABASE_URL"),

            supabase_service_key: non_empty("SUPABASE_SERVICE_ROLE_KEY"),

            users_table: non_empty("USERS_TABLE").unwrap_or_else(|| "users".to_string()),

            record_profile: parse_or("USER_RECORD_PROFILE", RecordProfile::Extended),

            store_timeout_ms: parse_or("STORE_TIMEOUT_MS", 8000),
        }
    }

    /// Configuration suitable for tests and local runs against the memory store.
    pub fn for_memory_store(signing_secret: impl Into<String>) -> Self {
        Config {
            port: 0,
            signing_secret: Some(signing_secret.into()),
            signature_max_age: None,
            store_backend: StoreBackend::Memory,
            supabase_url: None,
            supabase_service_key: None,
            users_table: "users".to_string(),
            record_profile: RecordProfile::Extended,
            store_timeout_ms: 8000,
        }
    }
}

/// Read a variable, treating blank values as unset.
fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a variable, falling back to `default` when unset or invalid.
fn parse_or<T>(name: &str, default: T) -> T
where
    T: FromStr,
{
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse::<T>() {
        Ok(v) => v,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}
