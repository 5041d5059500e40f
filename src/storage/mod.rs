pub mod enrollment_store;
pub mod session_log;
pub mod snapshot;

pub use enrollment_store::{EnrollmentRecord, EnrollmentStore};
pub use session_log::{Direction, SessionLog};
pub use snapshot::SnapshotGuard;
