//! Name-keyed registry of callback implementations.
//!
//! Stored workflows only carry callback names. The registry rebinds those
//! names to live implementations when a workflow is materialized again.

use crate::action::Action;
use crate::callback::{CallbackKind, ConditionRef, GuardRef, ProcessRef};
use crate::error::FlowError;
use crate::workflow::Workflow;
use dashmap::DashMap;

/// Callback registry shared by stores.
pub struct Registry<O> {
    guards: DashMap<String, GuardRef<O>>,
    conditions: DashMap<String, ConditionRef<O>>,
    processes: DashMap<String, ProcessRef<O>>,
}

impl<O> Default for Registry<O> {
    fn default() -> Self {
        Self::new()
    }
}

impl<O> Registry<O> {
    pub fn new() -> Self {
        Self {
            guards: DashMap::new(),
            conditions: DashMap::new(),
            processes: DashMap::new(),
        }
    }

    /// Registers a guard under its name, replacing any previous binding.
    pub fn register_guard(&self, guard: GuardRef<O>) {
        self.guards.insert(guard.name().to_string(), guard);
    }

    /// Registers a condition under its name, replacing any previous binding.
    pub fn register_condition(&self, condition: ConditionRef<O>) {
        self.conditions
            .insert(condition.name().to_string(), condition);
    }

    /// Registers a process under its name, replacing any previous binding.
    pub fn register_process(&self, process: ProcessRef<O>) {
        self.processes.insert(process.name().to_string(), process);
    }

    /// Registers every callback referenced by `workflow`.
    pub fn absorb(&self, workflow: &Workflow<O>) {
        for action in workflow.actions() {
            match action {
                Action::Simple(simple) => {
                    simple
                        .guards()
                        .iter()
                        .for_each(|g| self.register_guard(g.clone()));
                    simple
                        .processes()
                        .iter()
                        .for_each(|p| self.register_process(p.clone()));
                }
                Action::Conditional(conditional) => {
                    for entry in conditional.entries() {
                        entry
                            .guards()
                            .iter()
                            .for_each(|g| self.register_guard(g.clone()));
                    }
                    self.register_condition(conditional.condition().clone());
                    for process in conditional.processes().values() {
                        self.register_process(process.clone());
                    }
                }
            }
        }
    }

    pub fn guard(&self, name: &str) -> Result<GuardRef<O>, FlowError> {
        self.guards
            .get(name)
            .map(|r| r.clone())
            .ok_or_else(|| unknown(CallbackKind::Guard, name))
    }

    pub fn condition(&self, name: &str) -> Result<ConditionRef<O>, FlowError> {
        self.conditions
            .get(name)
            .map(|r| r.clone())
            .ok_or_else(|| unknown(CallbackKind::Condition, name))
    }

    pub fn process(&self, name: &str) -> Result<ProcessRef<O>, FlowError> {
        self.processes
            .get(name)
            .map(|r| r.clone())
            .ok_or_else(|| unknown(CallbackKind::Process, name))
    }

    /// Returns true if a callback of the given kind is bound to `name`.
    pub fn contains(&self, kind: CallbackKind, name: &str) -> bool {
        match kind {
            CallbackKind::Guard => self.guards.contains_key(name),
            CallbackKind::Condition => self.conditions.contains_key(name),
            CallbackKind::Process => self.processes.contains_key(name),
        }
    }
}

fn unknown(kind: CallbackKind, name: &str) -> FlowError {
    FlowError::UnknownCallback {
        kind,
        name: name.to_string(),
    }
}
