//! AutoScaling group control: capacity updates and rolling migration.

mod capacity;
mod clock;
mod migration;
mod state;

pub use capacity::{CapacityField, CapacityRequest, CapacityUpdater, Limits, describe_changes};
pub use clock::{Clock, RecordingClock, TokioClock};
pub use migration::{
    CapacitySnapshot, Convergence, DEFAULT_MAX_POLLS, DEFAULT_POLL_INTERVAL, LogObserver, MIGRATION_TERMINATION_POLICIES,
    MigrationConfig, MigrationController, MigrationEvent, MigrationObserver, MigrationReport, MigrationTarget, NotYet,
    PollLimit, RestoreOutcome, check_convergence, check_stable,
};
pub use state::{GroupInstance, GroupState, GroupUpdate, HEALTHY, IN_SERVICE, LbInstanceHealth};
