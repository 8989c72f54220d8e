//! Offline-capable game client for the Apiary economy.
//!
//! The client keeps a local copy of the player ledger so the game stays
//! playable when the server is slow or gone: reads come from memory,
//! mutations are checked optimistically against the cached state, and
//! the authoritative answer always overwrites the cache wholesale.
//! Cosmetic operations degrade to provisional local applies; anything
//! only the server can decide, such as the prize wheel or an escrowed
//! withdrawal, fails honestly instead of pretending.
//!
//! # Modules
//!
//! - [`transport`] -- HTTP and in-process paths to the authority
//! - [`cache`] -- the local ledger copy with debounced persistence
//! - [`reconcile`] -- the optimistic mutation flow and background timers
//! - [`error`] -- the [`ClientError`] taxonomy

pub mod cache;
pub mod error;
pub mod reconcile;
pub mod transport;

pub use cache::{CachedLedger, LedgerCache, PERSIST_DEBOUNCE};
pub use error::ClientError;
pub use reconcile::{ACCRUAL_INTERVAL, ClientTimers, GameClient, RESYNC_INTERVAL};
pub use transport::{HttpTransport, LocalTransport, SpinResult, Transport};
