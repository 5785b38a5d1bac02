//! Capability contract of the objects driven by a workflow.

use crate::error::EvalError;
use crate::status::Status;

/// A domain object whose status is driven by a workflow.
///
/// The engine never mutates the caller's value: every guard, condition and
/// process runs against copies produced by [`try_clone`](Self::try_clone).
pub trait WorkflowObject: Sized {
    fn status(&self) -> &Status;

    fn set_status(&mut self, status: Status);

    /// Name of the workflow this object follows.
    fn workflow_name(&self) -> &str;

    /// Produces a value-independent copy. A failure aborts the transition
    /// with a technical error.
    fn try_clone(&self) -> Result<Self, EvalError>;
}
