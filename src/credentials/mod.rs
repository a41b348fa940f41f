use async_trait::async_trait;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

pub mod cookies;
pub mod store;

pub use store::{RestCredentialStore, StaticCredentialStore};

use crate::Result;

/// Default staleness window for cached credentials
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Remote source of authentication material (a Netscape cookie jar per scope)
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Fetch the payload stored under `scope`. `Ok(None)` means the row does not exist.
    async fn fetch(&self, scope: &str) -> Result<Option<String>>;

    /// Short name for logs
    fn name(&self) -> &'static str;
}

/// A payload together with the moment it was fetched
#[derive(Debug, Clone)]
pub struct CachedCredential {
    pub payload: String,
    pub fetched_at: Instant,
}

type Refresh = Shared<BoxFuture<'static, Option<String>>>;

#[derive(Default)]
struct Slot {
    cached: Option<CachedCredential>,
    refresh: Option<Refresh>,
}

/// Process-wide, TTL-based credential cache.
///
/// Entries go `Empty -> Fresh -> Stale -> Fresh`. A caller that finds its scope
/// empty or stale either starts the refresh or joins the one already in flight, so
/// the store sees at most one fetch per scope at a time. A failed refresh reports
/// "not found" and leaves the previous entry untouched.
pub struct CredentialCache {
    store: Arc<dyn CredentialStore>,
    ttl: Duration,
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

impl CredentialCache {
    pub fn new(store: Arc<dyn CredentialStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Return the credential for `scope`, refreshing it from the store when it is
    /// missing or older than the TTL. `None` means no credential is available.
    pub async fn get_credential(&self, scope: &str) -> Option<String> {
        let refresh = {
            let mut slots = self.slots.lock();
            let slot = slots.entry(scope.to_string()).or_default();

            if let Some(cached) = &slot.cached {
                if cached.fetched_at.elapsed() <= self.ttl {
                    return Some(cached.payload.clone());
                }
            }

            match &slot.refresh {
                Some(in_flight) => {
                    tracing::debug!(scope, "Joining in-flight credential refresh");
                    in_flight.clone()
                }
                None => {
                    let refresh = self.start_refresh(scope);
                    slot.refresh = Some(refresh.clone());
                    refresh
                }
            }
        };

        refresh.await
    }

    /// Forget the cached value so the next caller refetches
    pub fn invalidate(&self, scope: &str) {
        if let Some(slot) = self.slots.lock().get_mut(scope) {
            if slot.cached.take().is_some() {
                tracing::info!(scope, "Invalidated cached credential");
            }
        }
    }

    /// Snapshot of the cached entry without triggering a refresh
    pub fn peek(&self, scope: &str) -> Option<CachedCredential> {
        self.slots.lock().get(scope).and_then(|slot| slot.cached.clone())
    }

    // The fetch runs on its own task so that it completes and updates the slot even
    // if every waiting caller is cancelled.
    fn start_refresh(&self, scope: &str) -> Refresh {
        let store = Arc::clone(&self.store);
        let slots = Arc::clone(&self.slots);
        let scope = scope.to_string();

        tracing::debug!(scope = %scope, store = store.name(), "Refreshing credential");

        let task = tokio::spawn(async move {
            let _clear = ClearRefresh {
                slots: Arc::clone(&slots),
                scope: scope.clone(),
            };

            let payload = match store.fetch(&scope).await {
                Ok(Some(payload)) => {
                    tracing::info!(scope = %scope, bytes = payload.len(), "Credential refreshed");
                    Some(payload)
                }
                Ok(None) => {
                    tracing::warn!(scope = %scope, "No credential stored for scope");
                    None
                }
                Err(e) => {
                    tracing::warn!(scope = %scope, error = %e, "Credential refresh failed");
                    None
                }
            };

            if let Some(payload) = &payload {
                let mut slots = slots.lock();
                slots.entry(scope.clone()).or_default().cached = Some(CachedCredential {
                    payload: payload.clone(),
                    fetched_at: Instant::now(),
                });
            }
            payload
        });

        task.map(|joined| joined.ok().flatten()).boxed().shared()
    }
}

/// Marks the scope's refresh as finished when the refresh task ends, including
/// when the store panics or the task is aborted.
struct ClearRefresh {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
    scope: String,
}

impl Drop for ClearRefresh {
    fn drop(&mut self) {
        if let Some(slot) = self.slots.lock().get_mut(&self.scope) {
            slot.refresh = None;
        }
    }
}
