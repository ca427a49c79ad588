//! Encrypted local persistence for the Vigil review client.
//!
//! Everything Vigil keeps on device flows through [`CryptoStore`], which
//! seals whole-document records with AES-256-GCM under a key derived from a
//! per-install random salt. On top of it sit the two durable records of the
//! sync core:
//!
//! - [`DecisionQueue`] — the append-only queue of not-yet-acknowledged
//!   review decisions
//! - [`AlertCache`] — the most recent alert snapshot, merged in place by the
//!   realtime channel
//!
//! Records are rewritten in full on every mutation; there are no partial
//! updates. Mutation is assumed to be serialized by the caller (a single
//! reviewing actor per device).

pub mod cache;
pub mod crypto;
pub mod queue;

pub use cache::{merge_by_id, sort_newest_first, AlertCache};
pub use crypto::{CryptoStore, DerivedKey, EncryptedBlob};
pub use queue::DecisionQueue;
