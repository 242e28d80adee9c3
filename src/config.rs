#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::sync::{Arc, Mutex, OnceLock};

use anyhow::{Context, Result};
use reqwest::Client;
use state::InitCell;

use crate::{store::SupabaseStore, types::UserId};

/// Supabase credentials loaded from the environment, if available.
#[derive(Clone)]
struct SupabaseEnv {
    /// Fully qualified PostgREST endpoint.
    rest_endpoint: String,
    /// API key used for PostgREST requests.
    api_key:       String,
    /// Session token of the signed-in user, sent as the bearer token when set.
    access_token:  Option<String>,
}

impl SupabaseEnv {
    /// Builds a Supabase credential bundle from environment-provided values.
    fn new(url: String, key: String, access_token: Option<String>) -> Self {
        let rest_endpoint = format!("{}/rest/v1", url.trim_end_matches('/'));
        Self {
            rest_endpoint,
            api_key: key,
            access_token,
        }
    }
}

/// Runtime configuration shared across the crate.
pub struct ConfigState {
    /// Supabase credentials, if configured.
    supabase:       Option<SupabaseEnv>,
    /// Lazily constructed Supabase store.
    supabase_store: InitCell<SupabaseStore>,
    /// Shared reqwest HTTP client reused across network helpers.
    http_client:    Client,
    /// User the CLI acts on behalf of.
    user_id:        UserId,
    /// Operation budget for one evaluation of submitted code, if any.
    max_operations: Option<u64>,
}

impl ConfigState {
    /// Construct a new configuration instance by reading the environment.
    fn new() -> Result<Self> {
        let supabase =
            match (std::env::var("SUPABASE_URL").ok(), std::env::var("SUPABASE_ANON_KEY").ok()) {
                (Some(url), Some(key)) if !url.trim().is_empty() && !key.trim().is_empty() => {
                    let token = std::env::var("SUPABASE_ACCESS_TOKEN")
                        .ok()
                        .map(|t| t.trim().to_owned())
                        .filter(|t| !t.is_empty());
                    Some(SupabaseEnv::new(url.trim().to_owned(), key.trim().to_owned(), token))
                }
                _ => None,
            };

        let http_client = Client::builder()
            // Avoid macOS dynamic store lookups that fail in sandboxed environments.
            .no_proxy()
            .build()
            .context("Failed to construct shared HTTP client")?;

        let user_id = std::env::var("RETOS_USER_ID")
            .map(|value| value.trim().to_owned())
            .ok()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "local".to_string());

        Ok(Self {
            supabase,
            supabase_store: InitCell::new(),
            http_client,
            user_id: UserId::new(user_id),
            max_operations: read_limit("RETOS_MAX_OPERATIONS"),
        })
    }

    /// Returns the configured Supabase store if credentials are available.
    pub fn supabase_store(&self) -> Option<SupabaseStore> {
        if let Some(store) = self.supabase_store.try_get() {
            return Some(store.clone());
        }

        let creds = self.supabase.as_ref()?;
        let store = SupabaseStore::new(
            self.http_client.clone(),
            creds.rest_endpoint.clone(),
            creds.api_key.clone(),
            creds.access_token.clone(),
        );
        self.supabase_store.set(store);
        Some(self.supabase_store.get().clone())
    }

    /// Returns the user the CLI acts on behalf of.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// Returns the operation budget for submitted code, if one is set.
    pub fn max_operations(&self) -> Option<u64> {
        self.max_operations
    }
}

/// Shared configuration handle used throughout the crate.
#[derive(Clone)]
pub struct ConfigHandle(Arc<ConfigState>);

impl std::ops::Deref for ConfigHandle {
    type Target = ConfigState;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Global storage for the lazily constructed configuration state.
static CONFIG_SLOT: OnceLock<Mutex<Option<Arc<ConfigState>>>> = OnceLock::new();

/// Returns the mutex guarding the global configuration slot.
fn slot() -> &'static Mutex<Option<Arc<ConfigState>>> {
    CONFIG_SLOT.get_or_init(|| Mutex::new(None))
}

/// Ensure the global configuration has been initialized and return a handle.
pub fn ensure_initialized() -> Result<ConfigHandle> {
    let mut guard = slot()
        .lock()
        .map_err(|_| anyhow::anyhow!("config slot poisoned"))?;
    if let Some(cfg) = guard.as_ref() {
        return Ok(ConfigHandle(Arc::clone(cfg)));
    }

    let cfg = ConfigState::new().map(Arc::new)?;
    *guard = Some(Arc::clone(&cfg));
    Ok(ConfigHandle(cfg))
}

/// Returns the active configuration, initializing it on demand.
pub fn get() -> ConfigHandle {
    ensure_initialized().expect("configuration initialization failed")
}

/// Returns the configured Supabase store, if Supabase has been configured.
pub fn supabase_store() -> Option<SupabaseStore> {
    get().supabase_store()
}

/// Returns the configured user identifier.
pub fn user_id() -> UserId {
    get().user_id().clone()
}

/// Returns the operation budget for submitted code, if one is set.
pub fn max_operations() -> Option<u64> {
    get().max_operations()
}

/// Parses an optional positive limit from the environment. Missing, zero or
/// unparsable values mean "no limit".
fn read_limit(env: &str) -> Option<u64> {
    std::env::var(env)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
}
