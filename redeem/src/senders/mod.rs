//! Invite sender implementations.

pub mod http_invite;

pub use http_invite::{DEFAULT_INVITE_API_BASE_URL, HttpInviteSender};
