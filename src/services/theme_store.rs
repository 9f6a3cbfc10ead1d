//! Process-wide mood-theme state.
//!
//! [`ThemeStore`] owns the active theme and the ambient-sound flag, hydrates
//! them once from durable storage, persists every change in the background
//! and notifies subscribers synchronously.
//!
//! Lifecycle: `Uninitialized -> Initializing -> Hydrated`. Until the store is
//! hydrated the active theme is the built-in default and must not be treated
//! as the user's choice.
//!
//! ```ignore
//! let store = ThemeStore::new(ThemeRegistry::built_in(), Arc::new(MemoryStorage::new()));
//! store.initialize().await;
//! let sub = store.subscribe(|state| println!("now {}", state.active_theme));
//! store.set_theme("fury")?;
//! sub.unsubscribe();
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use serde::Serialize;
use tokio::sync::{mpsc, oneshot, OnceCell};
use tracing::{debug, info, warn};

use crate::config::StorageKeys;
use crate::error::ThemeError;
use crate::services::storage::KeyValueStorage;
use crate::ui::class_names::ClassRewriter;
use crate::ui::theme::{ThemeId, ThemeRegistry, DEFAULT_THEME};

/// Snapshot of the store's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThemeState {
    pub active_theme: ThemeId,
    pub ambient_sounds_enabled: bool,
    pub hydrated: bool,
}

impl Default for ThemeState {
    fn default() -> Self {
        Self {
            active_theme: DEFAULT_THEME,
            ambient_sounds_enabled: false,
            hydrated: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Uninitialized,
    Initializing,
    Hydrated,
}

type Listener = Arc<dyn Fn(&ThemeState) + Send + Sync>;

enum WriteOp {
    Set { key: String, value: String },
    Flush(oneshot::Sender<()>),
}

struct Inner {
    registry: Arc<ThemeRegistry>,
    rewriter: ClassRewriter,
    storage: Arc<dyn KeyValueStorage>,
    keys: StorageKeys,
    state: Mutex<ThemeState>,
    lifecycle: Mutex<Lifecycle>,
    // set once a field is changed locally; hydration must not clobber it
    theme_touched: AtomicBool,
    sounds_touched: AtomicBool,
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_listener_id: AtomicU64,
    hydration: OnceCell<()>,
    writer: Mutex<Option<mpsc::UnboundedSender<WriteOp>>>,
}

/// Shared handle to the theme state. Cloning is cheap; clones see the same state.
#[derive(Clone)]
pub struct ThemeStore {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for ThemeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThemeStore")
            .field("state", &self.state())
            .field("lifecycle", &self.lifecycle())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ThemeStore {
    pub fn new(registry: ThemeRegistry, storage: Arc<dyn KeyValueStorage>) -> Self {
        Self::with_keys(registry, storage, StorageKeys::default())
    }

    pub fn with_keys(
        registry: ThemeRegistry,
        storage: Arc<dyn KeyValueStorage>,
        keys: StorageKeys,
    ) -> Self {
        let rewriter = ClassRewriter::new(&registry);
        Self {
            inner: Arc::new(Inner {
                registry: Arc::new(registry),
                rewriter,
                storage,
                keys,
                state: Mutex::new(ThemeState::default()),
                lifecycle: Mutex::new(Lifecycle::Uninitialized),
                theme_touched: AtomicBool::new(false),
                sounds_touched: AtomicBool::new(false),
                listeners: Mutex::new(Vec::new()),
                next_listener_id: AtomicU64::new(0),
                hydration: OnceCell::new(),
                writer: Mutex::new(None),
            }),
        }
    }

    pub fn registry(&self) -> &ThemeRegistry {
        &self.inner.registry
    }

    pub fn rewriter(&self) -> &ClassRewriter {
        &self.inner.rewriter
    }

    pub fn state(&self) -> ThemeState {
        *lock(&self.inner.state)
    }

    pub fn active_theme(&self) -> ThemeId {
        self.state().active_theme
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *lock(&self.inner.lifecycle)
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Hydration
    // ═══════════════════════════════════════════════════════════════════════════

    /// Load persisted settings. Runs the storage reads at most once per store;
    /// concurrent callers wait on the same load. Never fails.
    pub async fn initialize(&self) {
        self.inner.hydration.get_or_init(|| self.hydrate()).await;
    }

    async fn hydrate(&self) {
        *lock(&self.inner.lifecycle) = Lifecycle::Initializing;
        let keys = &self.inner.keys;

        let stored_theme = self.read(&keys.theme).await.and_then(|raw| {
            match self.inner.registry.resolve(&raw) {
                Ok(theme) => Some(theme),
                Err(e) => {
                    warn!(error = %e, "ignoring stored theme");
                    None
                }
            }
        });
        let stored_sounds = self.read(&keys.ambient_sounds).await.and_then(|raw| {
            match serde_json::from_str::<bool>(&raw) {
                Ok(enabled) => Some(enabled),
                Err(e) => {
                    warn!(value = %raw, error = %e, "ignoring stored ambient sound flag");
                    None
                }
            }
        });

        let snapshot = {
            let mut state = lock(&self.inner.state);
            if let Some(theme) = stored_theme {
                if !self.inner.theme_touched.load(Ordering::SeqCst) {
                    state.active_theme = theme;
                }
            }
            if let Some(enabled) = stored_sounds {
                if !self.inner.sounds_touched.load(Ordering::SeqCst) {
                    state.ambient_sounds_enabled = enabled;
                }
            }
            state.hydrated = true;
            *state
        };
        *lock(&self.inner.lifecycle) = Lifecycle::Hydrated;

        info!(
            theme = %snapshot.active_theme,
            ambient_sounds = snapshot.ambient_sounds_enabled,
            "theme state hydrated"
        );
        self.notify(&snapshot);
    }

    async fn read(&self, key: &str) -> Option<String> {
        match self.inner.storage.get(key).await {
            Ok(value) => value,
            Err(e) => {
                warn!(key, error = %e, "storage read failed; treating as unset");
                None
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Mutations
    // ═══════════════════════════════════════════════════════════════════════════

    /// Select a theme by name. Unknown names leave the state untouched.
    pub fn set_theme(&self, name: &str) -> Result<ThemeId, ThemeError> {
        let theme = self.inner.registry.resolve(name)?;
        self.select_theme(theme);
        Ok(theme)
    }

    /// Select a theme. Subscribers have been notified when this returns;
    /// the storage write happens in the background. Without a tokio runtime
    /// the change is applied in memory only and nothing is persisted.
    pub fn select_theme(&self, theme: ThemeId) {
        self.inner.theme_touched.store(true, Ordering::SeqCst);
        let snapshot = {
            let mut state = lock(&self.inner.state);
            state.active_theme = theme;
            // queued before listeners run, so their own writes land after this one
            self.persist(&self.inner.keys.theme, theme.as_str().to_string());
            *state
        };
        debug!(%theme, "theme selected");
        self.notify(&snapshot);
    }

    /// Same contract as [`select_theme`](Self::select_theme).
    pub fn set_ambient_sounds(&self, enabled: bool) {
        self.inner.sounds_touched.store(true, Ordering::SeqCst);
        let snapshot = {
            let mut state = lock(&self.inner.state);
            state.ambient_sounds_enabled = enabled;
            self.persist(&self.inner.keys.ambient_sounds, enabled.to_string());
            *state
        };
        debug!(enabled, "ambient sounds toggled");
        self.notify(&snapshot);
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Subscribers
    // ═══════════════════════════════════════════════════════════════════════════

    /// Register `listener`; it runs after every state change, in registration order.
    #[must_use = "dropping the subscription keeps the listener registered forever"]
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&ThemeState) + Send + Sync + 'static,
    {
        let id = self.inner.next_listener_id.fetch_add(1, Ordering::SeqCst);
        lock(&self.inner.listeners).push((id, Arc::new(listener)));
        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.inner.listeners).len()
    }

    fn notify(&self, state: &ThemeState) {
        // Listeners may (un)subscribe or mutate the store, so no lock is held while they run.
        let round: Vec<(u64, Listener)> = lock(&self.inner.listeners).clone();
        for (id, listener) in round {
            let still_registered = lock(&self.inner.listeners)
                .iter()
                .any(|(registered, _)| *registered == id);
            if still_registered {
                listener(state);
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Persistence
    // ═══════════════════════════════════════════════════════════════════════════

    fn persist(&self, key: &str, value: String) {
        let op = WriteOp::Set {
            key: key.to_string(),
            value,
        };
        let Some(writer) = self.writer() else {
            warn!(key, "no async runtime; change not persisted");
            return;
        };
        if writer.send(op).is_err() {
            warn!(key, "storage writer stopped; change not persisted");
        }
    }

    /// Wait until every write queued so far has been attempted.
    pub async fn flush(&self) {
        let writer = lock(&self.inner.writer).clone();
        let Some(writer) = writer else {
            return;
        };
        let (done_tx, done_rx) = oneshot::channel();
        if writer.send(WriteOp::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }

    /// Sender for the writer task, starting it on first use.
    fn writer(&self) -> Option<mpsc::UnboundedSender<WriteOp>> {
        let mut writer = lock(&self.inner.writer);
        if let Some(tx) = writer.as_ref().filter(|tx| !tx.is_closed()) {
            return Some(tx.clone());
        }

        let handle = tokio::runtime::Handle::try_current().ok()?;
        let (tx, rx) = mpsc::unbounded_channel();
        handle.spawn(run_writer(Arc::clone(&self.inner.storage), rx));
        *writer = Some(tx.clone());
        Some(tx)
    }
}

async fn run_writer(storage: Arc<dyn KeyValueStorage>, mut rx: mpsc::UnboundedReceiver<WriteOp>) {
    while let Some(op) = rx.recv().await {
        match op {
            WriteOp::Set { key, value } => {
                if let Err(e) = storage.set(&key, &value).await {
                    warn!(%key, error = %e, "failed to persist setting");
                }
            }
            WriteOp::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

/// Handle returned by [`ThemeStore::subscribe`].
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    inner: Weak<Inner>,
}

impl Subscription {
    /// Remove the listener. Safe to call repeatedly and from inside a listener.
    pub fn unsubscribe(&self) {
        if let Some(inner) = self.inner.upgrade() {
            lock(&inner.listeners).retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::services::storage::MemoryStorage;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;

    /// Storage whose reads and/or writes always fail
    struct FailingStorage {
        fail_reads: bool,
        fail_writes: bool,
        inner: MemoryStorage,
        reads: AtomicUsize,
    }

    impl FailingStorage {
        fn new(fail_reads: bool, fail_writes: bool) -> Self {
            Self {
                fail_reads,
                fail_writes,
                inner: MemoryStorage::new(),
                reads: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl KeyValueStorage for FailingStorage {
        async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.fail_reads {
                return Err(StorageError::Unavailable("simulated read failure".to_string()));
            }
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if self.fail_writes {
                return Err(StorageError::Unavailable("simulated write failure".to_string()));
            }
            self.inner.set(key, value).await
        }
    }

    fn store_with(storage: Arc<dyn KeyValueStorage>) -> ThemeStore {
        ThemeStore::new(ThemeRegistry::built_in(), storage)
    }

    #[tokio::test]
    async fn test_initialize_without_stored_values() {
        let store = store_with(Arc::new(MemoryStorage::new()));
        assert_eq!(store.lifecycle(), Lifecycle::Uninitialized);
        assert!(!store.state().hydrated);

        store.initialize().await;

        assert_eq!(
            store.state(),
            ThemeState {
                active_theme: ThemeId::Sorrow,
                ambient_sounds_enabled: false,
                hydrated: true,
            }
        );
        assert_eq!(store.lifecycle(), Lifecycle::Hydrated);
    }

    #[tokio::test]
    async fn test_initialize_loads_stored_values() {
        let storage = MemoryStorage::with_entries([("theme", "serenity"), ("ambientSounds", "true")]);
        let store = store_with(Arc::new(storage));
        store.initialize().await;

        let state = store.state();
        assert_eq!(state.active_theme, ThemeId::Serenity);
        assert!(state.ambient_sounds_enabled);
        assert!(state.hydrated);
    }

    #[tokio::test]
    async fn test_initialize_ignores_invalid_stored_values() {
        let storage = MemoryStorage::with_entries([("theme", "euphoria"), ("ambientSounds", "loud")]);
        let store = store_with(Arc::new(storage));
        store.initialize().await;

        let state = store.state();
        assert_eq!(state.active_theme, ThemeId::Sorrow);
        assert!(!state.ambient_sounds_enabled);
        assert!(state.hydrated);
    }

    #[tokio::test]
    async fn test_initialize_survives_read_failure() {
        let store = store_with(Arc::new(FailingStorage::new(true, false)));
        store.initialize().await;

        let state = store.state();
        assert_eq!(state.active_theme, ThemeId::Sorrow);
        assert!(state.hydrated);
    }

    #[tokio::test]
    async fn test_concurrent_initialize_shares_one_load() {
        let storage = Arc::new(FailingStorage::new(false, false));
        storage.inner.set("theme", "haze").await.unwrap();
        let store = store_with(storage.clone());

        tokio::join!(store.initialize(), store.initialize());
        store.initialize().await;

        // one read per key, once
        assert_eq!(storage.reads.load(Ordering::SeqCst), 2);
        assert_eq!(store.active_theme(), ThemeId::Haze);
    }

    #[tokio::test]
    async fn test_initialize_notifies_subscribers() {
        let store = store_with(Arc::new(MemoryStorage::with_entries([("theme", "joy")])));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = store.subscribe(move |state| sink.lock().unwrap().push(*state));

        store.initialize().await;
        store.initialize().await;

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].active_theme, ThemeId::Joy);
        assert!(seen[0].hydrated);
    }

    #[tokio::test]
    async fn test_set_theme_persists() {
        let storage = Arc::new(MemoryStorage::new());
        let store = store_with(storage.clone());
        store.initialize().await;

        assert_eq!(store.set_theme("fury").unwrap(), ThemeId::Fury);
        assert_eq!(store.active_theme(), ThemeId::Fury);

        store.flush().await;
        assert_eq!(storage.snapshot("theme"), Some("fury".to_string()));
    }

    #[tokio::test]
    async fn test_set_theme_rejects_unknown_theme() {
        let storage = Arc::new(MemoryStorage::new());
        let store = store_with(storage.clone());
        store.initialize().await;
        store.set_theme("joy").unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let _sub = store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(
            store.set_theme("euphoria"),
            Err(ThemeError::UnknownTheme("euphoria".to_string()))
        );
        assert_eq!(store.active_theme(), ThemeId::Joy);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        store.flush().await;
        assert_eq!(storage.snapshot("theme"), Some("joy".to_string()));
    }

    #[tokio::test]
    async fn test_subscribers_run_in_order_before_return() {
        let store = store_with(Arc::new(MemoryStorage::new()));
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = order.clone();
        let _a = store.subscribe(move |state| first.lock().unwrap().push(("a", state.active_theme)));
        let second = order.clone();
        let _b = store.subscribe(move |state| second.lock().unwrap().push(("b", state.active_theme)));

        store.set_theme("fury").unwrap();

        assert_eq!(
            *order.lock().unwrap(),
            vec![("a", ThemeId::Fury), ("b", ThemeId::Fury)]
        );
    }

    #[tokio::test]
    async fn test_listener_observes_new_state_through_store() {
        let store = store_with(Arc::new(MemoryStorage::new()));
        let observed = Arc::new(Mutex::new(None));
        let (probe, sink) = (store.clone(), observed.clone());
        let _sub = store.subscribe(move |_| *sink.lock().unwrap() = Some(probe.active_theme()));

        store.select_theme(ThemeId::Tension);
        assert_eq!(*observed.lock().unwrap(), Some(ThemeId::Tension));
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let store = store_with(Arc::new(MemoryStorage::new()));
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let sub = store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.set_ambient_sounds(true);
        sub.unsubscribe();
        sub.unsubscribe();
        store.set_ambient_sounds(false);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_from_inside_listener() {
        let store = store_with(Arc::new(MemoryStorage::new()));
        let calls = Arc::new(Mutex::new(Vec::new()));

        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let (own, log) = (slot.clone(), calls.clone());
        let sub = store.subscribe(move |_| {
            log.lock().unwrap().push("once");
            if let Some(sub) = own.lock().unwrap().as_ref() {
                sub.unsubscribe();
                sub.unsubscribe();
            }
        });
        *slot.lock().unwrap() = Some(sub);

        let log = calls.clone();
        let _other = store.subscribe(move |_| log.lock().unwrap().push("always"));

        store.select_theme(ThemeId::Joy);
        store.select_theme(ThemeId::Haze);

        assert_eq!(*calls.lock().unwrap(), vec!["once", "always", "always"]);
        assert_eq!(store.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_listener_removed_mid_round_is_skipped() {
        let store = store_with(Arc::new(MemoryStorage::new()));
        let calls = Arc::new(AtomicUsize::new(0));

        let victim_slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));
        let slot = victim_slot.clone();
        let _killer = store.subscribe(move |_| {
            if let Some(victim) = slot.lock().unwrap().as_ref() {
                victim.unsubscribe();
            }
        });
        let counter = calls.clone();
        let victim = store.subscribe(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        *victim_slot.lock().unwrap() = Some(victim);

        store.select_theme(ThemeId::Fury);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_write_failure_keeps_in_memory_state() {
        let store = store_with(Arc::new(FailingStorage::new(false, true)));
        store.initialize().await;

        store.set_theme("tension").unwrap();
        store.set_ambient_sounds(true);
        store.flush().await;

        let state = store.state();
        assert_eq!(state.active_theme, ThemeId::Tension);
        assert!(state.ambient_sounds_enabled);
    }

    #[tokio::test]
    async fn test_writes_land_in_mutation_order() {
        let storage = Arc::new(MemoryStorage::new());
        let store = store_with(storage.clone());

        for theme in ThemeId::ALL {
            store.select_theme(theme);
        }
        store.set_ambient_sounds(true);
        store.flush().await;

        assert_eq!(storage.snapshot("theme"), Some("haze".to_string()));
        assert_eq!(storage.snapshot("ambientSounds"), Some("true".to_string()));
    }

    #[tokio::test]
    async fn test_change_made_by_listener_is_the_one_stored() {
        let storage = Arc::new(MemoryStorage::new());
        let store = store_with(storage.clone());

        let follower = store.clone();
        let _sub = store.subscribe(move |state| {
            if state.active_theme == ThemeId::Joy {
                follower.select_theme(ThemeId::Haze);
            }
            if !state.ambient_sounds_enabled && state.active_theme == ThemeId::Haze {
                follower.set_ambient_sounds(true);
            }
        });

        store.select_theme(ThemeId::Joy);
        store.flush().await;

        assert_eq!(store.active_theme(), ThemeId::Haze);
        assert!(store.state().ambient_sounds_enabled);
        assert_eq!(storage.snapshot("theme"), Some("haze".to_string()));
        assert_eq!(storage.snapshot("ambientSounds"), Some("true".to_string()));
    }

    #[tokio::test]
    async fn test_local_change_during_hydration_wins() {
        let storage = Arc::new(FailingStorage::new(false, false));
        storage.inner.set("theme", "joy").await.unwrap();
        storage.inner.set("ambientSounds", "true").await.unwrap();
        let store = store_with(storage.clone());

        let hydrating = {
            let store = store.clone();
            tokio::spawn(async move { store.initialize().await })
        };
        // let hydration start and park on its first read
        tokio::task::yield_now().await;
        store.select_theme(ThemeId::Fury);
        hydrating.await.unwrap();

        let state = store.state();
        assert_eq!(state.active_theme, ThemeId::Fury);
        assert!(state.ambient_sounds_enabled);
        assert!(state.hydrated);
    }

    #[test]
    fn test_mutation_without_runtime_still_updates_state() {
        let storage = Arc::new(MemoryStorage::new());
        let store = store_with(storage.clone());

        store.select_theme(ThemeId::Joy);
        store.set_ambient_sounds(true);

        assert_eq!(store.active_theme(), ThemeId::Joy);
        assert!(store.state().ambient_sounds_enabled);
        assert_eq!(storage.snapshot("theme"), None);
    }

    #[tokio::test]
    async fn test_custom_storage_keys() {
        let storage = Arc::new(MemoryStorage::new());
        let keys = StorageKeys {
            theme: "serava.theme".to_string(),
            ambient_sounds: "serava.ambient".to_string(),
        };
        let store = ThemeStore::with_keys(ThemeRegistry::built_in(), storage.clone(), keys);

        store.select_theme(ThemeId::Serenity);
        store.set_ambient_sounds(false);
        store.flush().await;

        assert_eq!(storage.snapshot("serava.theme"), Some("serenity".to_string()));
        assert_eq!(storage.snapshot("serava.ambient"), Some("false".to_string()));
    }
}
