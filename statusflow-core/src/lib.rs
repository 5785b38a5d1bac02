//! # statusflow-core
//!
//! Workflow engine for statusflow.
//!
//! This crate provides:
//! - Statuses, simple and conditional actions, and the workflow graph
//! - Graph validity checks and structural queries
//! - Guard, condition and process contracts with a name-keyed registry
//! - The transition engine and its error classification
//! - Serializable workflow definitions and an in-memory store

pub mod action;
pub mod callback;
pub mod definition;
pub mod engine;
pub mod error;
pub mod object;
pub mod registry;
pub mod status;
pub mod store;
pub mod workflow;

pub use action::{Action, ConditionalAction, SimpleAction};
pub use callback::{
    condition_fn, guard_fn, process_fn, CallbackKind, Condition, ConditionRef, Guard, GuardRef,
    Process, ProcessRef,
};
pub use definition::{ActionDefinition, EntryDefinition, RouteDefinition, WorkflowDefinition};
pub use engine::{transition, Transition, WorkflowEngine};
pub use error::{BoxError, ErrorKind, EvalError, FlowError};
pub use object::WorkflowObject;
pub use registry::Registry;
pub use status::{Status, StatusKind};
pub use store::{MemoryStore, WorkflowId, WorkflowStore};
pub use workflow::Workflow;
