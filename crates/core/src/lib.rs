//! Core types for the Agora governance toolkit.
//!
//! This crate provides the primitives shared by the governance and economic
//! crates: member identities, role sets, token amounts, and the block-clock
//! abstraction that stands in for the host ledger's notion of time.

pub mod amount;
pub mod identity;
pub mod time;

pub use amount::Amount;
pub use identity::{MemberId, RoleSet};
pub use time::{Clock, ManualClock, SystemClock};
