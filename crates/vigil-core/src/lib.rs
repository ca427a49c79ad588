//! Core domain model for the Vigil field-review client.
//!
//! This crate holds the pieces every other Vigil crate builds on:
//!
//! - [`types`] — alerts, review decisions, and connection state as they move
//!   over the wire and through local storage
//! - [`error`] — the unified [`VigilError`] type and `Result` alias
//! - [`events`] — the in-process typed [`EventBus`]
//! - [`effects`] — the trait seams to external collaborators (secure blob
//!   store, credential provider, remote authority, alert stream)
//!
//! Nothing here performs I/O; implementations of the effect traits live in
//! `vigil-store`, `vigil-session`, and `vigil-sync`.

pub mod effects;
pub mod error;
pub mod events;
pub mod types;

pub use error::{Result, VigilError};
pub use events::{Event, EventBus, EventKind, Subscription};
pub use types::{
    Alert, AlertDetail, AlertStatus, CameraInfo, ConnectionState, Decision, StoreInfo,
};
