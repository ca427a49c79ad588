//! Deterministic test doubles and fixtures for Vigil crates.
//!
//! Production crates implement the `vigil-core` effect traits against real
//! platforms; tests implement them against the doubles in here. Nothing in
//! this crate belongs in a shipping binary.

pub mod fixtures;
pub mod mock_effects;

pub use fixtures::{init_test_logging, sample_alert, sample_alert_at, sample_decision};
pub use mock_effects::{
    MemoryBlobStore, RecordingSink, ScriptedConnector, ScriptedSession, StaticCredentials,
    StaticGateway,
};
