//! Status transition rules.
//!
//! The table below is the authoritative rulebook for worker-driven status
//! changes. Cancellation is deliberately not an edge here: the cancel
//! operation is a privileged escape hatch handled by the service layer, and
//! requeue-from-CANCELLED is the single non-table edge it accepts.

use super::JobStatus;

/// Whether the table admits the edge `from -> to`.
pub fn can_transition(from: JobStatus, to: JobStatus) -> bool {
    match from {
        JobStatus::Pending => matches!(to, JobStatus::Running),
        JobStatus::Running => matches!(to, JobStatus::Succeeded | JobStatus::Failed),
        JobStatus::Failed => matches!(to, JobStatus::Pending | JobStatus::DeadLettered),
        // Terminal states
        JobStatus::Succeeded | JobStatus::DeadLettered => false,
        // Not part of the table; see JobService::cancel / requeue
        JobStatus::Cancelled => false,
    }
}

/// The transitions the HTTP transition endpoint will even consider.
/// Everything else is reserved for the worker and rejected with 403.
/// Note that passing this filter does not make an edge legal: the service
/// layer still applies the table (DEAD_LETTERED -> PENDING fails there).
pub fn ui_transition_allowed(from: JobStatus, to: JobStatus) -> bool {
    matches!(
        (from, to),
        (JobStatus::Pending, JobStatus::Cancelled)
            | (JobStatus::Failed, JobStatus::Pending)
            | (JobStatus::DeadLettered, JobStatus::Pending)
            | (JobStatus::Cancelled, JobStatus::Pending)
    )
}
