//! Task governance and progress aggregation.
//!
//! Workflow components layered over a shared task/project read-model:
//! - permission gate: may a sensitive field be edited directly right now?
//! - change requests: propose -> approve/reject, approval applies the value;
//! - weekly recurrence: patterns plus lazily materialized dated instances;
//! - monthly progress: percent-per-month entries folded into one cumulative;
//! - phase groups: a task split into sequentially numbered child phases.
//!
//! Layout:
//! - [`domain`]: records, state machines, the cumulative fold;
//! - [`ports`]: store and clock seams;
//! - [`store`]: the in-memory adapter;
//! - [`engine`]: the components and the builder that wires them;
//! - [`api`]: the JSON request/response boundary.

pub mod api;
pub mod domain;
pub mod engine;
pub mod ports;
pub mod store;

pub use domain::{ErrorKind, GovernanceError};
pub use engine::{Governance, GovernanceBuilder};
