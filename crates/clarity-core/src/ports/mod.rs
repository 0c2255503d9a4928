//! Abstraction layer between the engines and their collaborators.

pub mod clock;
pub mod store;

pub use clock::{Clock, FixedClock, SystemClock};
pub use store::{GovernanceStore, TaskSeed};
