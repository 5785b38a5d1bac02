//! Guard, condition and process contracts.
//!
//! Each contract wraps one user function over the domain object:
//!
//! - [`Guard`] - predicate deciding whether a transition may proceed
//! - [`Condition`] - integer outcome selecting a branch of a conditional action
//! - [`Process`] - side effect performed as part of a transition
//!
//! Identity is nominal: two implementations with the same [`name`](Guard::name)
//! are the same callback. Stored workflows refer to callbacks by that name and
//! rebind them through a [`Registry`](crate::registry::Registry).

use crate::error::EvalError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Kind of callback, used in errors and registry lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallbackKind {
    Guard,
    Condition,
    Process,
}

impl fmt::Display for CallbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallbackKind::Guard => f.write_str("guard"),
            CallbackKind::Condition => f.write_str("condition"),
            CallbackKind::Process => f.write_str("process"),
        }
    }
}

/// Pre-transition predicate.
///
/// The object handed to `test` is a disposable copy: mutations are discarded.
pub trait Guard<O>: Send + Sync {
    fn name(&self) -> &str;

    fn test(&self, object: &mut O) -> Result<bool, EvalError>;
}

/// Routing function of a conditional action.
pub trait Condition<O>: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, object: &mut O) -> Result<i32, EvalError>;
}

/// Side effect of a transition.
pub trait Process<O>: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, object: &mut O) -> Result<(), EvalError>;
}

pub type GuardRef<O> = Arc<dyn Guard<O>>;
pub type ConditionRef<O> = Arc<dyn Condition<O>>;
pub type ProcessRef<O> = Arc<dyn Process<O>>;

/// Guard backed by a closure.
pub struct GuardFn<O, F> {
    name: String,
    f: F,
    _object: PhantomData<fn(&mut O)>,
}

impl<O, F> Guard<O> for GuardFn<O, F>
where
    F: Fn(&mut O) -> Result<bool, EvalError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn test(&self, object: &mut O) -> Result<bool, EvalError> {
        (self.f)(object)
    }
}

/// Condition backed by a closure.
pub struct ConditionFn<O, F> {
    name: String,
    f: F,
    _object: PhantomData<fn(&mut O)>,
}

impl<O, F> Condition<O> for ConditionFn<O, F>
where
    F: Fn(&mut O) -> Result<i32, EvalError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, object: &mut O) -> Result<i32, EvalError> {
        (self.f)(object)
    }
}

/// Process backed by a closure.
pub struct ProcessFn<O, F> {
    name: String,
    f: F,
    _object: PhantomData<fn(&mut O)>,
}

impl<O, F> Process<O> for ProcessFn<O, F>
where
    F: Fn(&mut O) -> Result<(), EvalError> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(&self, object: &mut O) -> Result<(), EvalError> {
        (self.f)(object)
    }
}

/// Wraps a closure into a named guard.
pub fn guard_fn<O, F>(name: impl Into<String>, f: F) -> GuardRef<O>
where
    O: 'static,
    F: Fn(&mut O) -> Result<bool, EvalError> + Send + Sync + 'static,
{
    Arc::new(GuardFn {
        name: name.into(),
        f,
        _object: PhantomData,
    })
}

/// Wraps a closure into a named condition.
pub fn condition_fn<O, F>(name: impl Into<String>, f: F) -> ConditionRef<O>
where
    O: 'static,
    F: Fn(&mut O) -> Result<i32, EvalError> + Send + Sync + 'static,
{
    Arc::new(ConditionFn {
        name: name.into(),
        f,
        _object: PhantomData,
    })
}

/// Wraps a closure into a named process.
pub fn process_fn<O, F>(name: impl Into<String>, f: F) -> ProcessRef<O>
where
    O: 'static,
    F: Fn(&mut O) -> Result<(), EvalError> + Send + Sync + 'static,
{
    Arc::new(ProcessFn {
        name: name.into(),
        f,
        _object: PhantomData,
    })
}
