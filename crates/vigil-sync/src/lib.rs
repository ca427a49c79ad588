//! Offline-first decision synchronization and realtime alert reconciliation.
//!
//! The three moving parts, wired together through the `vigil-core` event bus
//! and effect seams:
//!
//! - [`SyncEngine`] drains the encrypted decision queue to the remote
//!   authority with single-flight execution and bounded, jittered backoff.
//! - [`RealtimeChannel`] owns the one streaming connection per session, fans
//!   inbound alerts out as typed events, merges them into the durable cache,
//!   and opportunistically nudges the engine (inbound traffic is itself a
//!   sync signal).
//! - [`AlertReconciler`] is the read path: remote snapshot (or cache, or
//!   placeholder set) overlaid with pending optimistic decisions, newest
//!   first.
//!
//! # Composition
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use url::Url;
//! # use vigil_core::{effects::SecureBlobStore, EventBus};
//! # use vigil_store::{AlertCache, CryptoStore, DecisionQueue};
//! # use vigil_session::{ApiClient, SessionManager};
//! # use vigil_sync::{ws::WsConnector, AlertReconciler, RealtimeChannel, SyncEngine};
//! # fn wire(blobs: Arc<dyn SecureBlobStore>, base_url: Url) {
//! let crypto = Arc::new(CryptoStore::new(blobs.clone()));
//! let queue = Arc::new(DecisionQueue::new(crypto.clone()));
//! let cache = Arc::new(AlertCache::new(crypto));
//! let session = Arc::new(SessionManager::new(blobs, base_url.clone()));
//! let api = Arc::new(ApiClient::new(base_url.clone(), session.clone()));
//! let bus = Arc::new(EventBus::new());
//!
//! let engine = Arc::new(SyncEngine::new(
//!     queue.clone(), session.clone(), api.clone(), bus.clone(),
//! ));
//! let channel = RealtimeChannel::new(
//!     base_url, Arc::new(WsConnector::new()), session.clone(),
//!     cache.clone(), engine.clone(), bus.clone(),
//! );
//! let reconciler = AlertReconciler::new(api, session, cache, queue, bus);
//! # let _ = (channel, reconciler, engine);
//! # }
//! ```
//!
//! Logout is explicit composition, in order: drop the channel subscriptions
//! (tears the stream down), `SyncEngine::reset`, `DecisionQueue::clear` (also
//! rotates the sealing salt), `SessionManager::logout`.

pub mod backoff;
pub mod engine;
pub mod realtime;
pub mod reconcile;
pub mod retry;
pub mod sample;
pub mod ws;

pub use engine::SyncEngine;
pub use realtime::{stream_url, RealtimeChannel, RealtimeSubscription};
pub use reconcile::{overlay_pending, AlertReconciler};
pub use retry::RetryTimer;
