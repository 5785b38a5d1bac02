//! Transition engine.
//!
//! Applying an action never touches the caller's object. Guards run on
//! disposable copies of the original, the condition and processes run on a
//! single working copy, and the working copy is handed back only when the
//! whole transition succeeds.

use crate::action::Action;
use crate::callback::CallbackKind;
use crate::error::{EvalError, FlowError};
use crate::object::WorkflowObject;
use crate::registry::Registry;
use crate::status::Status;
use crate::store::{MemoryStore, WorkflowId, WorkflowStore};
use crate::workflow::Workflow;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Outcome of applying an action.
#[derive(Debug)]
pub enum Transition<O> {
    /// The action went through; `object` is the updated copy.
    Applied { object: O, from: Status, to: Status },
    /// A guard returned false. The caller keeps its original object.
    Blocked { guard: String },
}

impl<O> Transition<O> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied { .. })
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Transition::Blocked { .. })
    }

    /// Returns the updated object, if the transition was applied.
    pub fn object(&self) -> Option<&O> {
        match self {
            Transition::Applied { object, .. } => Some(object),
            Transition::Blocked { .. } => None,
        }
    }

    pub fn into_object(self) -> Option<O> {
        match self {
            Transition::Applied { object, .. } => Some(object),
            Transition::Blocked { .. } => None,
        }
    }
}

/// Applies `action_name` to a copy of `object` within `workflow`.
pub fn transition<O>(
    workflow: &Workflow<O>,
    object: &O,
    action_name: &str,
) -> Result<Transition<O>, FlowError>
where
    O: WorkflowObject,
{
    if action_name.is_empty() {
        return Err(FlowError::MissingArgument {
            reason: "the action name is mandatory".to_string(),
        });
    }

    let from = object.status();
    let resolved = workflow
        .resolve(from, action_name)
        .ok_or_else(|| FlowError::InvalidAction {
            action: action_name.to_string(),
            status: from.name().to_string(),
            workflow: workflow.name().to_string(),
        })?;

    let guards = resolved
        .action
        .guards()
        .iter()
        .chain(resolved.entry.into_iter().flat_map(|entry| entry.guards()));
    for guard in guards {
        let mut probe = working_copy(object)?;
        let passed = invoke(CallbackKind::Guard, guard.name(), || guard.test(&mut probe))?;
        if !passed {
            tracing::debug!(
                "Action {} from {} in workflow {} blocked by guard {}",
                action_name,
                from,
                workflow.name(),
                guard.name()
            );
            return Ok(Transition::Blocked {
                guard: guard.name().to_string(),
            });
        }
    }

    let mut working = working_copy(object)?;
    let to = match resolved.action {
        Action::Simple(simple) => {
            for process in simple.processes() {
                invoke(CallbackKind::Process, process.name(), || {
                    process.apply(&mut working)
                })?;
            }
            resolved.target.clone()
        }
        Action::Conditional(conditional) => {
            let condition = conditional.condition();
            let outcome = invoke(CallbackKind::Condition, condition.name(), || {
                condition.apply(&mut working)
            })?;
            let arrival = conditional
                .arrival_status_by_result(outcome)
                .ok_or_else(|| FlowError::UnroutedOutcome {
                    action: action_name.to_string(),
                    outcome,
                })?;
            if let Some(process) = conditional.process_for(arrival) {
                invoke(CallbackKind::Process, process.name(), || {
                    process.apply(&mut working)
                })?;
            }
            arrival.clone()
        }
    };

    working.set_status(to.clone());
    tracing::debug!(
        "Applied action {} in workflow {}: {} -> {}",
        action_name,
        workflow.name(),
        from,
        to
    );

    Ok(Transition::Applied {
        object: working,
        from: from.clone(),
        to,
    })
}

/// Runs one callback, reclassifying its failure or panic.
fn invoke<T>(
    kind: CallbackKind,
    name: &str,
    f: impl FnOnce() -> Result<T, EvalError>,
) -> Result<T, FlowError> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(EvalError::Business(reason))) => {
            tracing::warn!("{} {} rejected the transition: {}", kind, name, reason);
            Err(FlowError::Rejected {
                kind,
                callback: name.to_string(),
                reason,
            })
        }
        Ok(Err(EvalError::Technical(source))) => {
            tracing::warn!("{} {} failed: {}", kind, name, source);
            Err(FlowError::CallbackFailed {
                kind,
                callback: name.to_string(),
                source,
            })
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            tracing::warn!("{} {} panicked: {}", kind, name, message);
            Err(FlowError::CallbackPanicked {
                kind,
                callback: name.to_string(),
                message,
            })
        }
    }
}

fn working_copy<O: WorkflowObject>(object: &O) -> Result<O, FlowError> {
    match panic::catch_unwind(AssertUnwindSafe(|| object.try_clone())) {
        Ok(result) => result.map_err(|source| FlowError::CloneFailed { source }),
        Err(payload) => Err(FlowError::CloneFailed {
            source: EvalError::technical(panic_message(payload.as_ref())),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Engine façade over a workflow store.
pub struct WorkflowEngine<O> {
    store: Arc<dyn WorkflowStore<O>>,
}

impl<O> WorkflowEngine<O>
where
    O: WorkflowObject + 'static,
{
    pub fn new(store: Arc<dyn WorkflowStore<O>>) -> Self {
        Self { store }
    }

    /// Creates an engine backed by a [`MemoryStore`].
    pub fn in_memory(registry: Arc<Registry<O>>) -> Self {
        Self::new(Arc::new(MemoryStore::new(registry)))
    }

    pub fn store(&self) -> &Arc<dyn WorkflowStore<O>> {
        &self.store
    }

    /// Stores a workflow. Invalid workflows are rejected with a business error.
    pub fn save_workflow(&self, workflow: &Workflow<O>) -> Result<WorkflowId, FlowError> {
        self.store.save(workflow)
    }

    pub fn delete_workflow(&self, id: WorkflowId) -> Result<(), FlowError> {
        self.store.delete(id)
    }

    pub fn workflow_by_name(&self, name: &str) -> Result<Workflow<O>, FlowError> {
        if name.is_empty() {
            return Err(FlowError::MissingArgument {
                reason: "the workflow name is mandatory".to_string(),
            });
        }
        self.store.load_by_name(name)
    }

    pub fn list_workflows(&self) -> Result<Vec<Workflow<O>>, FlowError> {
        self.store.list()
    }

    pub fn is_valid(&self, workflow: &Workflow<O>) -> bool {
        workflow.is_valid()
    }

    /// Applies `action_name` to a copy of `object`.
    ///
    /// The object's workflow is loaded from the store on every call.
    pub fn apply_action(&self, object: &O, action_name: &str) -> Result<Transition<O>, FlowError> {
        if action_name.is_empty() {
            return Err(FlowError::MissingArgument {
                reason: "the action name is mandatory".to_string(),
            });
        }
        let workflow = self.workflow_by_name(object.workflow_name())?;
        transition(&workflow, object, action_name)
    }

    /// Applies `action_name` and commits the result into `object`.
    ///
    /// Returns false if a guard blocked the transition. On error `object` is
    /// left unchanged.
    pub fn apply_action_in_place(
        &self,
        object: &mut O,
        action_name: &str,
    ) -> Result<bool, FlowError> {
        match self.apply_action(object, action_name)? {
            Transition::Applied { object: next, .. } => {
                *object = next;
                Ok(true)
            }
            Transition::Blocked { .. } => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{ConditionalAction, SimpleAction};
    use crate::callback::{condition_fn, guard_fn, process_fn, ConditionRef, GuardRef, ProcessRef};
    use crate::error::ErrorKind;

    #[derive(Debug, Clone, PartialEq)]
    struct Parcel {
        status: Status,
        workflow: String,
        stamps: Vec<String>,
        fail_clone: bool,
    }

    impl Parcel {
        fn at(status: &Status) -> Self {
            Self {
                status: status.clone(),
                workflow: status.workflow().to_string(),
                stamps: Vec::new(),
                fail_clone: false,
            }
        }
    }

    impl WorkflowObject for Parcel {
        fn status(&self) -> &Status {
            &self.status
        }

        fn set_status(&mut self, status: Status) {
            self.status = status;
        }

        fn workflow_name(&self) -> &str {
            &self.workflow
        }

        fn try_clone(&self) -> Result<Self, EvalError> {
            if self.fail_clone {
                return Err(EvalError::technical("clone not supported"));
            }
            Ok(self.clone())
        }
    }

    fn guard_ok() -> GuardRef<Parcel> {
        guard_fn("GuardOK", |_| Ok(true))
    }

    fn guard_ko() -> GuardRef<Parcel> {
        guard_fn("GuardKO", |p: &mut Parcel| {
            p.stamps.push("guard".to_string());
            Ok(false)
        })
    }

    fn guard_ok_update_object() -> GuardRef<Parcel> {
        guard_fn("GuardOKUpdateObject", |p: &mut Parcel| {
            p.workflow = "AAA".to_string();
            Ok(true)
        })
    }

    fn stamp(name: &'static str) -> ProcessRef<Parcel> {
        process_fn(name, move |p: &mut Parcel| {
            p.stamps.push(name.to_string());
            Ok(())
        })
    }

    fn process_ko() -> ProcessRef<Parcel> {
        process_fn("ProcessKO", |p: &mut Parcel| {
            p.stamps.push("partial".to_string());
            Err(EvalError::business("Process KO"))
        })
    }

    fn process_ko_technical() -> ProcessRef<Parcel> {
        process_fn("ProcessKOTechnical", |p: &mut Parcel| {
            p.stamps.push("partial".to_string());
            Err(EvalError::technical(std::io::Error::new(
                std::io::ErrorKind::Other,
                "ledger offline",
            )))
        })
    }

    fn process_ko_panic() -> ProcessRef<Parcel> {
        process_fn("ProcessKOPanic", |p: &mut Parcel| {
            p.stamps.push("partial".to_string());
            panic!("index out of bounds");
        })
    }

    /// Routes on the digit in the status name, "s2" -> 2.
    fn status_digit() -> ConditionRef<Parcel> {
        condition_fn("StatusDigit", |p: &mut Parcel| {
            p.status
                .name()
                .get(1..2)
                .and_then(|d| d.parse().ok())
                .ok_or_else(|| {
                    EvalError::business(format!(
                        "could not parse the second letter of the object status: '{}'",
                        p.status
                    ))
                })
        })
    }

    fn simple_workflow(
        name: &str,
        action: impl FnOnce(&Status, &Status) -> SimpleAction<Parcel>,
    ) -> (Workflow<Parcel>, Status, Status) {
        let mut wkf = Workflow::new(name);
        let s1 = Status::new(&mut wkf, "s1");
        let s2 = Status::new(&mut wkf, "s2");
        wkf.add_action(action(&s1, &s2)).unwrap();
        (wkf, s1, s2)
    }

    #[test]
    fn test_apply_valid_action() {
        let (wkf, s1, s2) =
            simple_workflow("testApplyValidAction", |a, b| SimpleAction::new("a1", a, b));
        let obj = Parcel::at(&s1);

        let result = transition(&wkf, &obj, "a1").unwrap();
        match result {
            Transition::Applied { object, from, to } => {
                assert_eq!(from, s1);
                assert_eq!(to, s2);
                assert_eq!(object.status, s2);
                assert_eq!(object.stamps, obj.stamps);
                assert_eq!(object.workflow, obj.workflow);
            }
            Transition::Blocked { .. } => panic!("transition was blocked"),
        }
        assert_eq!(obj.status, s1);
    }

    #[test]
    fn test_apply_invalid_action() {
        let (wkf, _, s2) =
            simple_workflow("testApplyInvalidAction", |a, b| SimpleAction::new("a1", a, b));
        let obj = Parcel::at(&s2);

        let err = transition(&wkf, &obj, "a1").unwrap_err();
        assert!(err.is_business());
        assert_eq!(
            err.to_string(),
            "action 'a1' is not a valid one from status 's2' in workflow 'testApplyInvalidAction'"
        );
        assert_eq!(obj.status, s2);
    }

    #[test]
    fn test_empty_action_name() {
        let (wkf, s1, _) = simple_workflow("W", |a, b| SimpleAction::new("a1", a, b));
        let err = transition(&wkf, &Parcel::at(&s1), "").unwrap_err();
        assert!(matches!(err, FlowError::MissingArgument { .. }));
    }

    #[test]
    fn test_status_of_other_workflow() {
        let (wkf, _, _) = simple_workflow("W", |a, b| SimpleAction::new("a1", a, b));
        let obj = Parcel::at(&Status::reference("Other", "s1"));

        let err = transition(&wkf, &obj, "a1").unwrap_err();
        assert!(matches!(err, FlowError::InvalidAction { .. }));
    }

    #[test]
    fn test_guard_ok() {
        let (wkf, s1, s2) =
            simple_workflow("W", |a, b| SimpleAction::new("a1", a, b).with_guard(guard_ok()));
        let result = transition(&wkf, &Parcel::at(&s1), "a1").unwrap();

        assert!(result.is_applied());
        assert_eq!(result.object().unwrap().status, s2);
    }

    #[test]
    fn test_guard_ko_blocks_and_discards_mutation() {
        let (wkf, s1, _) = simple_workflow("W", |a, b| {
            SimpleAction::new("a1", a, b)
                .with_guard(guard_ok())
                .with_guard(guard_ko())
        });
        let obj = Parcel::at(&s1);

        let result = transition(&wkf, &obj, "a1").unwrap();
        assert!(result.is_blocked());
        assert!(matches!(result, Transition::Blocked { ref guard } if guard == "GuardKO"));
        assert!(obj.stamps.is_empty());
        assert_eq!(obj.status, s1);
    }

    #[test]
    fn test_first_false_guard_stops_evaluation() {
        let (wkf, s1, _) = simple_workflow("W", |a, b| {
            SimpleAction::new("a1", a, b)
                .with_guard(guard_ko())
                .with_guard(guard_fn("Unreachable", |_: &mut Parcel| panic!("evaluated")))
        });

        let result = transition(&wkf, &Parcel::at(&s1), "a1").unwrap();
        assert!(result.is_blocked());
    }

    #[test]
    fn test_guard_mutation_does_not_survive() {
        let (wkf, s1, s2) = simple_workflow("W", |a, b| {
            SimpleAction::new("a1", a, b)
                .with_guard(guard_ok_update_object())
                .with_guard(guard_fn("WorkflowUntouched", |p: &mut Parcel| Ok(p.workflow == "W")))
        });

        let object = transition(&wkf, &Parcel::at(&s1), "a1")
            .unwrap()
            .into_object()
            .unwrap();
        assert_eq!(object.workflow, "W");
        assert_eq!(object.status, s2);
    }

    #[test]
    fn test_guard_failures_are_classified() {
        let (wkf, s1, _) = simple_workflow("W", |a, b| {
            SimpleAction::new("a1", a, b).with_guard(guard_fn("Checked", |_: &mut Parcel| {
                Err(EvalError::business("no credit"))
            }))
        });
        let err = transition(&wkf, &Parcel::at(&s1), "a1").unwrap_err();
        assert!(matches!(
            err,
            FlowError::Rejected {
                kind: CallbackKind::Guard,
                ..
            }
        ));
        assert!(err.is_business());

        let (wkf, s1, _) = simple_workflow("W", |a, b| {
            SimpleAction::new("a1", a, b)
                .with_guard(guard_fn("Boom", |_: &mut Parcel| panic!("boom")))
        });
        let err = transition(&wkf, &Parcel::at(&s1), "a1").unwrap_err();
        assert!(
            matches!(err, FlowError::CallbackPanicked { ref message, .. } if message == "boom")
        );
        assert!(err.is_technical());
    }

    #[test]
    fn test_processes_run_in_order() {
        let (wkf, s1, s2) = simple_workflow("W", |a, b| {
            SimpleAction::new("a1", a, b)
                .with_processes([stamp("ProcessOKOne"), stamp("ProcessOKTwo")])
        });

        let object = transition(&wkf, &Parcel::at(&s1), "a1")
            .unwrap()
            .into_object()
            .unwrap();
        assert_eq!(object.stamps, vec!["ProcessOKOne", "ProcessOKTwo"]);
        assert_eq!(object.status, s2);
    }

    #[test]
    fn test_process_business_failure_leaves_object_untouched() {
        let (wkf, s1, _) = simple_workflow("W", |a, b| {
            SimpleAction::new("a1", a, b).with_processes([stamp("ProcessOKOne"), process_ko()])
        });
        let obj = Parcel::at(&s1);

        let err = transition(&wkf, &obj, "a1").unwrap_err();
        assert!(matches!(
            err,
            FlowError::Rejected {
                kind: CallbackKind::Process,
                ref reason,
                ..
            } if reason == "Process KO"
        ));
        assert_eq!(err.kind(), ErrorKind::Business);
        assert_eq!(obj, Parcel::at(&s1));
    }

    #[test]
    fn test_process_technical_failure_leaves_object_untouched() {
        let (wkf, s1, _) = simple_workflow("W", |a, b| {
            SimpleAction::new("a1", a, b).with_process(process_ko_technical())
        });
        let obj = Parcel::at(&s1);

        let err = transition(&wkf, &obj, "a1").unwrap_err();
        assert!(matches!(err, FlowError::CallbackFailed { .. }));
        assert!(err.is_technical());
        assert_eq!(err.to_string(), "process 'ProcessKOTechnical' failed: ledger offline");
        assert_eq!(obj, Parcel::at(&s1));
    }

    #[test]
    fn test_process_panic_is_technical() {
        let (wkf, s1, _) = simple_workflow("W", |a, b| {
            SimpleAction::new("a1", a, b).with_process(process_ko_panic())
        });
        let obj = Parcel::at(&s1);

        let err = transition(&wkf, &obj, "a1").unwrap_err();
        assert!(matches!(
            err,
            FlowError::CallbackPanicked {
                kind: CallbackKind::Process,
                ..
            }
        ));
        assert!(err.is_technical());
        assert_eq!(obj, Parcel::at(&s1));
    }

    #[test]
    fn test_clone_failure_is_technical() {
        let (wkf, s1, _) = simple_workflow("W", |a, b| SimpleAction::new("a1", a, b));
        let mut obj = Parcel::at(&s1);
        obj.fail_clone = true;

        let err = transition(&wkf, &obj, "a1").unwrap_err();
        assert!(matches!(err, FlowError::CloneFailed { .. }));
        assert!(err.is_technical());
        assert_eq!(obj.status, s1);
    }

    fn conditional_workflow() -> (Workflow<Parcel>, Status, Status, Status) {
        let mut wkf = Workflow::new("Cond");
        let start = Status::new(&mut wkf, "s2");
        let s2 = Status::new(&mut wkf, "S2");
        let s3 = Status::new(&mut wkf, "S3");
        let action = ConditionalAction::new(&wkf, "route", &start, status_digit())
            .with_guard(guard_ok())
            .route(1, &s2)
            .route(2, &s3)
            .with_process(&s2, stamp("ToS2"))
            .with_process(&s3, stamp("ToS3"));
        wkf.add_action(action).unwrap();
        (wkf, start, s2, s3)
    }

    #[test]
    fn test_conditional_routing() {
        let (wkf, start, _, s3) = conditional_workflow();
        let obj = Parcel::at(&start);

        let object = transition(&wkf, &obj, "route")
            .unwrap()
            .into_object()
            .unwrap();
        assert_eq!(object.status, s3);
        assert_eq!(object.stamps, vec!["ToS3"]);
        assert_eq!(obj.status, start);
    }

    #[test]
    fn test_conditional_entry_guard_blocks() {
        let mut wkf: Workflow<Parcel> = Workflow::new("Cond");
        let s1 = Status::new(&mut wkf, "s1");
        let s2 = Status::new(&mut wkf, "s2");
        let action = ConditionalAction::new(&wkf, "route", &s1, status_digit())
            .with_guard(guard_ko())
            .route(1, &s2);
        wkf.add_action(action).unwrap();

        let result = transition(&wkf, &Parcel::at(&s1), "route").unwrap();
        assert!(result.is_blocked());
    }

    #[test]
    fn test_unrouted_outcome_is_technical() {
        let mut wkf: Workflow<Parcel> = Workflow::new("Cond");
        let s7 = Status::new(&mut wkf, "s7");
        let s2 = Status::new(&mut wkf, "s2");
        let action = ConditionalAction::new(&wkf, "route", &s7, status_digit()).route(1, &s2);
        wkf.add_action(action).unwrap();
        let obj = Parcel::at(&s7);

        let err = transition(&wkf, &obj, "route").unwrap_err();
        assert!(matches!(err, FlowError::UnroutedOutcome { outcome: 7, .. }));
        assert!(err.is_technical());
        assert_eq!(obj.status, s7);
    }

    #[test]
    fn test_condition_business_failure() {
        let mut wkf: Workflow<Parcel> = Workflow::new("Cond");
        let sx = Status::new(&mut wkf, "sx");
        let s2 = Status::new(&mut wkf, "s2");
        let action = ConditionalAction::new(&wkf, "route", &sx, status_digit()).route(1, &s2);
        wkf.add_action(action).unwrap();

        let err = transition(&wkf, &Parcel::at(&sx), "route").unwrap_err();
        assert!(matches!(
            err,
            FlowError::Rejected {
                kind: CallbackKind::Condition,
                ..
            }
        ));
    }

    #[test]
    fn test_condition_panic_is_technical() {
        let mut wkf: Workflow<Parcel> = Workflow::new("Cond");
        let s1 = Status::new(&mut wkf, "s1");
        let s2 = Status::new(&mut wkf, "s2");
        let condition = condition_fn(
            "ConditionKORuntime",
            |_: &mut Parcel| -> Result<i32, EvalError> { panic!("division by zero") },
        );
        wkf.add_action(ConditionalAction::new(&wkf, "route", &s1, condition).route(1, &s2))
            .unwrap();

        let err = transition(&wkf, &Parcel::at(&s1), "route").unwrap_err();
        assert!(matches!(
            err,
            FlowError::CallbackPanicked {
                kind: CallbackKind::Condition,
                ..
            }
        ));
    }

    #[test]
    fn test_junction_entries_share_routing() {
        let mut wkf: Workflow<Parcel> = Workflow::new("Junction");
        let s0 = Status::new(&mut wkf, "s0");
        let s1 = Status::new(&mut wkf, "s1");
        let s1b = Status::new(&mut wkf, "s2");
        let s2 = Status::new(&mut wkf, "S2");
        let s3 = Status::new(&mut wkf, "S3");
        wkf.add_action(SimpleAction::new("split", &s0, &s1)).unwrap();
        wkf.add_action(SimpleAction::new("splitb", &s0, &s1b)).unwrap();
        let junction = ConditionalAction::junction(
            &wkf,
            status_digit(),
            [
                SimpleAction::entry("join", &s1).with_guard(guard_ok()),
                SimpleAction::entry("joinb", &s1b),
            ],
        )
        .route(1, &s2)
        .route(2, &s3)
        .with_process(&s3, stamp("ToS3"));
        wkf.add_action(junction).unwrap();
        assert!(wkf.is_valid());

        let from_s1 = transition(&wkf, &Parcel::at(&s1), "join")
            .unwrap()
            .into_object()
            .unwrap();
        assert_eq!(from_s1.status, s2);
        assert!(from_s1.stamps.is_empty());

        let from_s1b = transition(&wkf, &Parcel::at(&s1b), "joinb")
            .unwrap()
            .into_object()
            .unwrap();
        assert_eq!(from_s1b.status, s3);
        assert_eq!(from_s1b.stamps, vec!["ToS3"]);

        let err = transition(&wkf, &Parcel::at(&s1), "joinb").unwrap_err();
        assert!(matches!(err, FlowError::InvalidAction { .. }));
    }

    fn registry() -> Arc<Registry<Parcel>> {
        Arc::new(Registry::new())
    }

    #[test]
    fn test_engine_apply_action() {
        let engine = WorkflowEngine::in_memory(registry());
        let (wkf, s1, s2) = simple_workflow("W", |a, b| {
            SimpleAction::new("a1", a, b)
                .with_guard(guard_ok())
                .with_process(stamp("ProcessOKOne"))
        });
        engine.save_workflow(&wkf).unwrap();

        let mut obj = Parcel::at(&s1);
        assert!(engine.apply_action_in_place(&mut obj, "a1").unwrap());
        assert_eq!(obj.status, s2);
        assert_eq!(obj.stamps, vec!["ProcessOKOne"]);

        let err = engine.apply_action_in_place(&mut obj, "a1").unwrap_err();
        assert!(err.is_business());
        assert_eq!(obj.status, s2);
    }

    #[test]
    fn test_engine_blocked_in_place_keeps_object() {
        let engine = WorkflowEngine::in_memory(registry());
        let (wkf, s1, _) =
            simple_workflow("W", |a, b| SimpleAction::new("a1", a, b).with_guard(guard_ko()));
        engine.save_workflow(&wkf).unwrap();

        let mut obj = Parcel::at(&s1);
        assert!(!engine.apply_action_in_place(&mut obj, "a1").unwrap());
        assert_eq!(obj, Parcel::at(&s1));
    }

    #[test]
    fn test_engine_unknown_workflow() {
        let engine = WorkflowEngine::in_memory(registry());
        let obj = Parcel::at(&Status::reference("Missing", "s1"));

        let err = engine.apply_action(&obj, "a1").unwrap_err();
        assert!(matches!(err, FlowError::WorkflowNotFound { .. }));
        assert!(err.is_business());

        let mut nameless = obj.clone();
        nameless.workflow.clear();
        let err = engine.apply_action(&nameless, "a1").unwrap_err();
        assert!(matches!(err, FlowError::MissingArgument { .. }));
    }

    #[test]
    fn test_engine_workflow_management() {
        let engine = WorkflowEngine::in_memory(registry());
        let (wkf, _, _) = simple_workflow("W", |a, b| SimpleAction::new("a1", a, b));
        assert!(engine.is_valid(&wkf));

        let id = engine.save_workflow(&wkf).unwrap();
        assert_eq!(engine.workflow_by_name("W").unwrap().name(), "W");
        assert_eq!(engine.list_workflows().unwrap().len(), 1);
        assert!(matches!(
            engine.workflow_by_name(""),
            Err(FlowError::MissingArgument { .. })
        ));

        engine.delete_workflow(id).unwrap();
        assert!(engine.list_workflows().unwrap().is_empty());
        assert!(engine.delete_workflow(id).unwrap_err().is_business());
    }

    #[test]
    fn test_engine_conditional_after_reload() {
        let engine = WorkflowEngine::in_memory(registry());
        let (wkf, _, s2, _) = conditional_workflow();
        engine.save_workflow(&wkf).unwrap();

        let obj = Parcel::at(&Status::reference("Cond", "s2"));
        let result = engine.apply_action(&obj, "route").unwrap();
        let Transition::Applied { to, .. } = result else {
            panic!("transition was blocked");
        };
        assert_ne!(to, s2);
        assert_eq!(to.name(), "S3");
    }
}
