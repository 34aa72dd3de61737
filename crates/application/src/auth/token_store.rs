//! Session credential store with change notification.
//!
//! The [`TokenStore`] is the only mutator of credential state. Writes are
//! total replacements (`save`/`clear`), persisted through the
//! [`CredentialStorage`] port and then published to observers. Readers get
//! an `Arc` snapshot, so a credential is never observed half-written.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use neocrm_domain::Credential;
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::ports::{CredentialStorage, StorageError};

type Listener = Arc<dyn Fn(Option<&Credential>) + Send + Sync>;

struct Listeners {
    next_id: u64,
    callbacks: BTreeMap<u64, Listener>,
}

struct StoreInner {
    storage: Arc<dyn CredentialStorage>,
    current: watch::Sender<Option<Arc<Credential>>>,
    /// Serializes writers so persistence order equals publication order.
    write_lock: tokio::sync::Mutex<()>,
    /// Publication lock: the value swap and listener delivery happen under it.
    listeners: Mutex<Listeners>,
}

/// Thread-safe store of the current session credential.
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone)]
pub struct TokenStore {
    inner: Arc<StoreInner>,
}

impl TokenStore {
    /// Create an empty store backed by `storage`. Call [`TokenStore::restore`]
    /// to load a previously persisted credential.
    #[must_use]
    pub fn new(storage: Arc<dyn CredentialStorage>) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            inner: Arc::new(StoreInner {
                storage,
                current,
                write_lock: tokio::sync::Mutex::new(()),
                listeners: Mutex::new(Listeners {
                    next_id: 0,
                    callbacks: BTreeMap::new(),
                }),
            }),
        }
    }

    /// Current credential snapshot.
    #[must_use]
    pub fn get(&self) -> Option<Arc<Credential>> {
        self.inner.current.borrow().clone()
    }

    /// Current access token, if logged in.
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        self.inner
            .current
            .borrow()
            .as_ref()
            .map(|credential| credential.access_token.clone())
    }

    /// Whether a credential is held.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.inner.current.borrow().is_some()
    }

    /// Replace the credential: persist, then notify observers.
    ///
    /// # Errors
    ///
    /// Returns an error if persistence fails; the in-memory credential is
    /// left unchanged in that case.
    pub async fn save(&self, credential: Credential) -> Result<(), StorageError> {
        let _write = self.inner.write_lock.lock().await;
        self.inner.storage.save(&credential).await?;
        debug!(user_id = %credential.user.id, "credential saved");
        self.publish(Some(Arc::new(credential)));
        Ok(())
    }

    /// Remove the credential: persist the removal, then notify observers.
    ///
    /// # Errors
    ///
    /// Returns the persistence error, if any. The in-memory credential is
    /// cleared regardless, so the session fails toward logged out.
    pub async fn clear(&self) -> Result<(), StorageError> {
        let _write = self.inner.write_lock.lock().await;
        let persisted = self.inner.storage.clear().await;
        if let Err(error) = &persisted {
            warn!(%error, "failed to clear persisted credential");
        }
        self.publish(None);
        debug!("credential cleared");
        persisted
    }

    /// Load the persisted credential at startup.
    ///
    /// Returns `true` if a credential was found and published.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage cannot be read.
    pub async fn restore(&self) -> Result<bool, StorageError> {
        let _write = self.inner.write_lock.lock().await;
        match self.inner.storage.load().await? {
            Some(credential) => {
                debug!(user_id = %credential.user.id, "credential restored");
                self.publish(Some(Arc::new(credential)));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Observe credential changes.
    ///
    /// Every call returns an independent, infinite stream whose first item is
    /// the current value. Intermediate values may be skipped, but the last
    /// item seen always matches the most recent completed write.
    #[must_use]
    pub fn observe(&self) -> CredentialStream {
        CredentialStream {
            receiver: self.inner.current.subscribe(),
            primed: false,
        }
    }

    /// Register a listener called with the current value immediately and
    /// after every completed write, in completion order.
    ///
    /// Listeners run inside the store's publication lock: they must be quick
    /// and must not subscribe or unsubscribe from within the callback.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(Option<&Credential>) + Send + Sync + 'static,
    {
        let mut listeners = self.inner.listeners.lock();
        let id = listeners.next_id;
        listeners.next_id += 1;

        let callback: Listener = Arc::new(callback);
        let current = self.inner.current.borrow().clone();
        callback(current.as_deref());
        listeners.callbacks.insert(id, callback);

        Subscription {
            id,
            store: Arc::downgrade(&self.inner),
        }
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.listeners.lock().callbacks.len()
    }

    fn publish(&self, value: Option<Arc<Credential>>) {
        let listeners = self.inner.listeners.lock();
        self.inner.current.send_replace(value.clone());
        for callback in listeners.callbacks.values() {
            callback(value.as_deref());
        }
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore")
            .field("logged_in", &self.is_logged_in())
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// Handle returned by [`TokenStore::subscribe`]; dropping it unsubscribes.
#[must_use = "dropping the subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    store: Weak<StoreInner>,
}

impl Subscription {
    /// Detach the listener.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.listeners.lock().callbacks.remove(&self.id);
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

/// Stream of credential values returned by [`TokenStore::observe`].
#[derive(Debug)]
pub struct CredentialStream {
    receiver: watch::Receiver<Option<Arc<Credential>>>,
    primed: bool,
}

impl CredentialStream {
    /// Wait for the next value. The first call resolves immediately with the
    /// current value. Returns `None` once the store has been dropped.
    pub async fn next(&mut self) -> Option<Option<Arc<Credential>>> {
        if self.primed {
            self.receiver.changed().await.ok()?;
        } else {
            self.primed = true;
        }
        Some(self.receiver.borrow_and_update().clone())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::test_support::{MemoryStorage, credential};
    use pretty_assertions::assert_eq;

    fn store() -> (TokenStore, Arc<MemoryStorage>) {
        let storage = Arc::new(MemoryStorage::default());
        (TokenStore::new(storage.clone()), storage)
    }

    #[tokio::test]
    async fn test_save_persists_and_publishes() {
        let (store, storage) = store();
        assert!(store.get().is_none());

        store.save(credential("tok1", "ref1")).await.unwrap();

        assert_eq!(store.access_token().as_deref(), Some("tok1"));
        assert_eq!(storage.snapshot().unwrap().refresh_token, "ref1");
        assert!(store.is_logged_in());
    }

    #[tokio::test]
    async fn test_save_is_total_replacement() {
        let (store, _) = store();
        store.save(credential("tok1", "ref1")).await.unwrap();
        store.save(credential("tok2", "ref2")).await.unwrap();

        let current = store.get().unwrap();
        assert_eq!(current.access_token, "tok2");
        assert_eq!(current.refresh_token, "ref2");
    }

    #[tokio::test]
    async fn test_clear_removes_credential() {
        let (store, storage) = store();
        store.save(credential("tok1", "ref1")).await.unwrap();
        store.clear().await.unwrap();

        assert!(store.get().is_none());
        assert!(storage.snapshot().is_none());
    }

    #[tokio::test]
    async fn test_failed_save_leaves_state_untouched() {
        let (store, storage) = store();
        store.save(credential("tok1", "ref1")).await.unwrap();
        storage.fail_writes(true);

        assert!(store.save(credential("tok2", "ref2")).await.is_err());
        assert_eq!(store.access_token().as_deref(), Some("tok1"));
    }

    #[tokio::test]
    async fn test_failed_clear_still_logs_out_in_memory() {
        let (store, storage) = store();
        store.save(credential("tok1", "ref1")).await.unwrap();
        storage.fail_writes(true);

        assert!(store.clear().await.is_err());
        assert!(store.get().is_none());
    }

    #[tokio::test]
    async fn test_restore_loads_persisted_credential() {
        let storage = Arc::new(MemoryStorage::with(credential("persisted", "ref")));
        let store = TokenStore::new(storage);

        assert!(store.restore().await.unwrap());
        assert_eq!(store.access_token().as_deref(), Some("persisted"));
    }

    #[tokio::test]
    async fn test_subscribe_receives_current_then_changes() {
        let (store, _) = store();
        store.save(credential("tok1", "ref1")).await.unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let subscription = store.subscribe(move |credential| {
            sink.lock()
                .push(credential.map(|c| c.access_token.clone()));
        });

        store.save(credential("tok2", "ref2")).await.unwrap();
        store.clear().await.unwrap();

        assert_eq!(
            *seen.lock(),
            vec![Some("tok1".to_string()), Some("tok2".to_string()), None]
        );

        subscription.unsubscribe();
        assert_eq!(store.subscriber_count(), 0);
        store.save(credential("tok3", "ref3")).await.unwrap();
        assert_eq!(seen.lock().len(), 3);
    }

    #[tokio::test]
    async fn test_observe_starts_with_current_and_ends_on_latest() {
        let (store, _) = store();
        let mut stream = store.observe();
        assert_eq!(stream.next().await, Some(None));

        store.save(credential("tok1", "ref1")).await.unwrap();
        let next = stream.next().await.unwrap().unwrap();
        assert_eq!(next.access_token, "tok1");

        store.clear().await.unwrap();
        assert_eq!(stream.next().await, Some(None));

        // A fresh observer restarts from the current value.
        let mut restarted = store.observe();
        assert_eq!(restarted.next().await, Some(None));
    }
}
