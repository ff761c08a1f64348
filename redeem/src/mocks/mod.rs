//! Mock provider implementations for testing.
//!
//! In-memory implementations of every provider trait, for unit and
//! integration tests. Enabled by the `test-utils` feature.

pub mod clock;
pub mod invite;
pub mod kv_store;

pub use clock::{FixedClock, test_time};
pub use invite::MockInviteSender;
pub use kv_store::MockKeyValueStore;
