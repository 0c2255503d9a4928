//! Domain model (IDs, records, state machines, the cumulative fold).

pub mod change_request;
pub mod errors;
pub mod ids;
pub mod monthly;
pub mod project;
pub mod recurrence;
pub mod task;

pub use change_request::{ChangeRequest, RequestStatus, ResolveAction, Resolution};
pub use errors::{ErrorKind, GovernanceError};
pub use ids::{ProjectId, RequestId, TaskId};
pub use monthly::{MonthlyEntry, MonthlyHistory, recompute_accumulated};
pub use project::{Project, ProjectType};
pub use recurrence::{InstanceState, RecurrenceInstance, RecurrencePattern, WeekdaySet};
pub use task::{Task, TaskBehavior, TaskField, TaskStatus};
