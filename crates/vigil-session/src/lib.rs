//! Session credentials and the authenticated REST client.
//!
//! [`SessionManager`] owns the two token records in the secure blob store
//! and implements the `CredentialProvider` seam: the rest of the system only
//! ever asks it for the current token or for a refresh. [`ApiClient`] is the
//! REST path to the remote authority; it injects the bearer token on every
//! request and transparently refreshes-and-replays once on a 401.

pub mod client;
pub mod manager;

pub use client::ApiClient;
pub use manager::SessionManager;
