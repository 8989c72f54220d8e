//! Local ledger cache with debounced file persistence.
//!
//! The cache holds the client's working copy of the player ledger.
//! Reads always come from memory, so the UI never waits on disk.
//! Writes coalesce: every change arms a short timer and only the last
//! state within the window reaches the file. The `authoritative` flag
//! records whether the cached state is a verbatim server snapshot or
//! carries provisional local changes awaiting the next resync.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use apiary_types::PlayerLedger;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::ClientError;

/// Default for how long a dirty cache waits for further changes before
/// it is written to disk.
pub const PERSIST_DEBOUNCE: Duration = Duration::from_millis(250);

/// The client's working copy of the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedLedger {
    /// The ledger state the client renders from.
    pub ledger: PlayerLedger,
    /// Server time of the last authoritative snapshot, if any.
    pub last_synced: Option<DateTime<Utc>>,
    /// True when the state is a verbatim server snapshot with no
    /// provisional local changes on top.
    pub authoritative: bool,
}

/// In-memory ledger cache with optional debounced file persistence.
pub struct LedgerCache {
    state: RwLock<CachedLedger>,
    path: Option<PathBuf>,
    debounce: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl LedgerCache {
    /// Create a memory-only cache seeded with the given ledger.
    pub fn new(ledger: PlayerLedger) -> Self {
        Self {
            state: RwLock::new(CachedLedger {
                ledger,
                last_synced: None,
                authoritative: false,
            }),
            path: None,
            debounce: PERSIST_DEBOUNCE,
            pending: Mutex::new(None),
        }
    }

    /// Create a cache that persists to `path` on change.
    pub fn with_file(ledger: PlayerLedger, path: PathBuf) -> Self {
        let mut cache = Self::new(ledger);
        cache.path = Some(path);
        cache
    }

    /// Override the debounce window. Call before sharing the cache.
    pub const fn set_debounce(&mut self, window: Duration) {
        self.debounce = window;
    }

    /// Load a previously persisted cache state from `path`.
    ///
    /// A missing file is not an error; it yields `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Persistence`] on read failures other than
    /// a missing file, and [`ClientError::Serialization`] for a
    /// corrupt file.
    pub fn load(path: &PathBuf) -> Result<Option<CachedLedger>, ClientError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(ClientError::Persistence(err)),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// The current cached state.
    pub async fn read(&self) -> CachedLedger {
        self.state.read().await.clone()
    }

    /// Replace the cache with an authoritative server snapshot.
    ///
    /// Any provisional local state is discarded wholesale; the server
    /// is the source of truth.
    pub async fn overwrite(self: &Arc<Self>, ledger: PlayerLedger, as_of: DateTime<Utc>) {
        {
            let mut state = self.state.write().await;
            *state = CachedLedger {
                ledger,
                last_synced: Some(as_of),
                authoritative: true,
            };
        }
        self.schedule_persist().await;
    }

    /// Run `f` against a scratch copy of the ledger and throw the
    /// result away. This is the optimistic precondition check: it fails
    /// exactly where a committed apply would, without touching state.
    ///
    /// # Errors
    ///
    /// Propagates whatever `f` returns.
    pub async fn dry_run<T, E>(
        &self,
        f: impl FnOnce(&mut PlayerLedger) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut scratch = self.state.read().await.ledger.clone();
        f(&mut scratch)
    }

    /// Apply a provisional local change. All-or-nothing: if `f` fails
    /// the cache is untouched. On success the cache is marked
    /// non-authoritative until the next server snapshot lands.
    ///
    /// # Errors
    ///
    /// Propagates whatever `f` returns.
    pub async fn apply_provisional<T, E>(
        self: &Arc<Self>,
        f: impl FnOnce(&mut PlayerLedger) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut state = self.state.write().await;
        let mut scratch = state.ledger.clone();
        let value = f(&mut scratch)?;
        state.ledger = scratch;
        state.authoritative = false;
        drop(state);
        self.schedule_persist().await;
        Ok(value)
    }

    /// Apply a derivable change, such as the periodic accrual tick,
    /// without demoting an authoritative cache. All-or-nothing like
    /// [`Self::apply_provisional`].
    ///
    /// # Errors
    ///
    /// Propagates whatever `f` returns.
    pub async fn advance<T, E>(
        self: &Arc<Self>,
        f: impl FnOnce(&mut PlayerLedger) -> Result<T, E>,
    ) -> Result<T, E> {
        let mut state = self.state.write().await;
        let mut scratch = state.ledger.clone();
        let value = f(&mut scratch)?;
        state.ledger = scratch;
        drop(state);
        self.schedule_persist().await;
        Ok(value)
    }

    /// Write the current state to disk immediately, cancelling any
    /// armed debounce timer.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Persistence`] on write failure.
    pub async fn flush(&self) -> Result<(), ClientError> {
        let mut pending = self.pending.lock().await;
        if let Some(handle) = pending.take() {
            handle.abort();
        }
        drop(pending);
        self.persist_now().await
    }

    /// Arm (or re-arm) the debounce timer. Rapid successive changes
    /// collapse into a single write of the final state.
    async fn schedule_persist(self: &Arc<Self>) {
        if self.path.is_none() {
            return;
        }
        let mut pending = self.pending.lock().await;
        if let Some(handle) = pending.take() {
            handle.abort();
        }
        let cache = Arc::clone(self);
        let window = self.debounce;
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            if let Err(err) = cache.persist_now().await {
                warn!(error = %err, "ledger cache persist failed");
            }
        }));
    }

    async fn persist_now(&self) -> Result<(), ClientError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let snapshot = self.state.read().await.clone();
        let raw = serde_json::to_string_pretty(&snapshot)?;
        tokio::fs::write(path, raw).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiary_types::{Currency, PlayerId};
    use rust_decimal::Decimal;

    fn fresh() -> PlayerLedger {
        PlayerLedger::new(PlayerId::new(), Utc::now())
    }

    fn temp_path(tag: &str) -> PathBuf {
        let unique = format!(
            "apiary_cache_{tag}_{}_{:?}.json",
            std::process::id(),
            std::thread::current().id(),
        );
        std::env::temp_dir().join(unique)
    }

    #[tokio::test]
    async fn failed_provisional_apply_leaves_cache_untouched() {
        let cache = Arc::new(LedgerCache::new(fresh()));
        let before = cache.read().await;

        let result: Result<(), &str> = cache
            .apply_provisional(|ledger| {
                ledger.flowers = Decimal::from(999);
                Err("validation failed")
            })
            .await;

        assert!(result.is_err());
        assert_eq!(cache.read().await, before);
    }

    #[tokio::test]
    async fn overwrite_discards_provisional_state() {
        let cache = Arc::new(LedgerCache::new(fresh()));
        let ok: Result<(), ClientError> = cache
            .apply_provisional(|ledger| {
                ledger.flowers = Decimal::from(50);
                Ok(())
            })
            .await;
        assert!(ok.is_ok());
        assert!(!cache.read().await.authoritative);

        let mut server_copy = fresh();
        server_copy.flowers = Decimal::from(30);
        let as_of = Utc::now();
        cache.overwrite(server_copy, as_of).await;

        let state = cache.read().await;
        assert!(state.authoritative);
        assert_eq!(state.ledger.balance(Currency::Flowers), Decimal::from(30));
        assert_eq!(state.last_synced, Some(as_of));
    }

    #[tokio::test]
    async fn advance_preserves_the_authoritative_flag() {
        let cache = Arc::new(LedgerCache::new(fresh()));
        cache.overwrite(fresh(), Utc::now()).await;

        let ok: Result<(), ClientError> = cache
            .advance(|ledger| {
                ledger.honey = Decimal::from(5);
                Ok(())
            })
            .await;
        assert!(ok.is_ok());

        let state = cache.read().await;
        assert!(state.authoritative);
        assert_eq!(state.ledger.balance(Currency::Honey), Decimal::from(5));
    }

    #[tokio::test]
    async fn flush_round_trips_through_the_file() {
        let path = temp_path("flush");
        let cache = Arc::new(LedgerCache::with_file(fresh(), path.clone()));
        let ok: Result<(), ClientError> = cache
            .apply_provisional(|ledger| {
                ledger.tickets = 3;
                Ok(())
            })
            .await;
        assert!(ok.is_ok());
        assert!(cache.flush().await.is_ok());

        let loaded = LedgerCache::load(&path).ok().flatten();
        assert_eq!(loaded.as_ref().map(|s| s.ledger.tickets), Some(3));
        assert_eq!(loaded.map(|s| s.authoritative), Some(false));

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn rapid_changes_coalesce_into_the_final_state() {
        let path = temp_path("debounce");
        let cache = Arc::new(LedgerCache::with_file(fresh(), path.clone()));

        for tickets in 1..=5u32 {
            let ok: Result<(), ClientError> = cache
                .apply_provisional(|ledger| {
                    ledger.tickets = tickets;
                    Ok(())
                })
                .await;
            assert!(ok.is_ok());
        }
        // Only the debounced write should land, carrying the last value.
        tokio::time::sleep(Duration::from_millis(800)).await;

        let loaded = LedgerCache::load(&path).ok().flatten();
        assert_eq!(loaded.map(|s| s.ledger.tickets), Some(5));

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn loading_a_missing_file_yields_none() {
        let path = temp_path("missing");
        assert!(matches!(LedgerCache::load(&path), Ok(None)));
    }
}
