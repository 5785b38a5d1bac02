//! Workflow statuses.

use crate::workflow::Workflow;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of status node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusKind {
    /// A user-visible status.
    Regular,
    /// A generated choice point of a conditional action.
    Pseudo,
}

/// A status in a workflow.
///
/// Identity is the pair (name, owning workflow name) plus the kind, so a
/// status of one workflow never equals a same-named status of another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Status {
    name: String,
    workflow: String,
    kind: StatusKind,
}

impl Status {
    /// Creates a status and registers it in `workflow`.
    pub fn new<O>(workflow: &mut Workflow<O>, name: impl Into<String>) -> Self {
        let status = Self::reference(workflow.name(), name);
        workflow.register_status(status.clone());
        status
    }

    /// Refers to a regular status of the named workflow without registering it.
    ///
    /// Useful to restore the status of a domain object loaded from elsewhere.
    pub fn reference(workflow: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            workflow: workflow.into(),
            kind: StatusKind::Regular,
        }
    }

    /// Creates a choice point with a process-unique opaque name.
    pub(crate) fn pseudo(workflow: impl Into<String>) -> Self {
        Self {
            name: uuid::Uuid::new_v4().to_string(),
            workflow: workflow.into(),
            kind: StatusKind::Pseudo,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name of the owning workflow.
    pub fn workflow(&self) -> &str {
        &self.workflow
    }

    pub fn kind(&self) -> StatusKind {
        self.kind
    }

    pub fn is_pseudo(&self) -> bool {
        self.kind == StatusKind::Pseudo
    }

    /// Returns true if the status is owned by the named workflow.
    pub fn belongs_to(&self, workflow: &str) -> bool {
        self.workflow == workflow
    }

    pub fn is_initial_status<O>(&self, workflow: &Workflow<O>) -> bool {
        workflow.is_initial_status(self)
    }

    pub fn is_final_status<O>(&self, workflow: &Workflow<O>) -> bool {
        workflow.is_final_status(self)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
