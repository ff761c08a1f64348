//! Redemption providers.
//!
//! Traits for every external dependency of the redemption core. The lock,
//! registry, coordinator and log depend only on these; production wires in
//! Redis and the HTTP invite service, tests wire in the in-memory mocks.
//!
//! ```text
//! ┌────────────────────────┐
//! │ RedemptionCoordinator  │
//! └──┬─────────┬────────┬──┘
//!    │         │        │
//!    ▼         ▼        ▼
//! KeyValueStore  InviteSender  Clock
//!  (Redis)        (HTTP)      (system)
//! ```

pub mod clock;
pub mod invite;
pub mod store;

pub use clock::{Clock, SystemClock};
pub use invite::{InviteFailure, InviteReceipt, InviteSender};
pub use store::{KeyValueStore, ScanPage};
