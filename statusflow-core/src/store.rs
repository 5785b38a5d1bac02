//! Workflow persistence contract and an in-memory implementation.

use crate::definition::WorkflowDefinition;
use crate::error::FlowError;
use crate::registry::Registry;
use crate::workflow::Workflow;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identifier assigned to a stored workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkflowId(pub u64);

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persistence collaborator of the engine.
///
/// A workflow is saved and loaded as one unit. Every load materializes a
/// fresh [`Workflow`] with its graph rebuilt from the stored definition.
pub trait WorkflowStore<O>: Send + Sync {
    /// Loads a workflow by name, or fails with [`FlowError::WorkflowNotFound`].
    fn load_by_name(&self, name: &str) -> Result<Workflow<O>, FlowError>;

    /// Stores a valid workflow and returns its id.
    ///
    /// Saving an identical definition again returns the existing id; a
    /// different definition under an existing name is rejected.
    fn save(&self, workflow: &Workflow<O>) -> Result<WorkflowId, FlowError>;

    /// Deletes a workflow, or fails with [`FlowError::WorkflowIdNotFound`].
    fn delete(&self, id: WorkflowId) -> Result<(), FlowError>;

    /// Loads every stored workflow, ordered by id.
    fn list(&self) -> Result<Vec<Workflow<O>>, FlowError>;
}

struct StoredDefinition {
    definition: WorkflowDefinition,
    checksum: String,
}

/// Store keeping definitions in concurrent maps.
pub struct MemoryStore<O> {
    registry: Arc<Registry<O>>,
    workflows: DashMap<WorkflowId, StoredDefinition>,
    names: DashMap<String, WorkflowId>,
    next_id: AtomicU64,
}

impl<O> MemoryStore<O> {
    /// Creates an empty store binding callbacks through `registry`.
    pub fn new(registry: Arc<Registry<O>>) -> Self {
        Self {
            registry,
            workflows: DashMap::new(),
            names: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn registry(&self) -> &Arc<Registry<O>> {
        &self.registry
    }

    /// Returns the number of stored workflows.
    pub fn len(&self) -> usize {
        self.workflows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workflows.is_empty()
    }
}

impl<O> WorkflowStore<O> for MemoryStore<O>
where
    O: 'static,
{
    fn load_by_name(&self, name: &str) -> Result<Workflow<O>, FlowError> {
        let definition = self
            .names
            .get(name)
            .and_then(|id| self.workflows.get(&*id).map(|s| s.definition.clone()))
            .ok_or_else(|| FlowError::WorkflowNotFound {
                workflow: name.to_string(),
            })?;

        Workflow::from_definition(&definition, &self.registry)
    }

    fn save(&self, workflow: &Workflow<O>) -> Result<WorkflowId, FlowError> {
        workflow.validate()?;

        let definition = workflow.to_definition();
        let checksum = definition.checksum()?;

        match self.names.entry(definition.name.clone()) {
            Entry::Occupied(entry) => {
                let id = *entry.get();
                let unchanged = self
                    .workflows
                    .get(&id)
                    .is_some_and(|stored| stored.checksum == checksum);
                if !unchanged {
                    return Err(FlowError::WorkflowExists {
                        workflow: definition.name,
                    });
                }
                self.registry.absorb(workflow);
                Ok(id)
            }
            Entry::Vacant(entry) => {
                self.registry.absorb(workflow);
                let id = WorkflowId(self.next_id.fetch_add(1, Ordering::SeqCst));
                tracing::info!("Saved workflow {} with id {}", definition.name, id);
                self.workflows
                    .insert(id, StoredDefinition { definition, checksum });
                entry.insert(id);
                Ok(id)
            }
        }
    }

    fn delete(&self, id: WorkflowId) -> Result<(), FlowError> {
        let not_found = || FlowError::WorkflowIdNotFound { id: id.0 };
        let name = self
            .workflows
            .get(&id)
            .map(|s| s.definition.name.clone())
            .ok_or_else(not_found)?;

        // The name entry stays locked until both maps agree again.
        match self.names.entry(name) {
            Entry::Occupied(entry) if *entry.get() == id => {
                self.workflows.remove(&id).ok_or_else(not_found)?;
                let (name, _) = entry.remove_entry();
                tracing::info!("Deleted workflow {} (id {})", name, id);
                Ok(())
            }
            _ => Err(not_found()),
        }
    }

    fn list(&self) -> Result<Vec<Workflow<O>>, FlowError> {
        let mut definitions: Vec<(WorkflowId, WorkflowDefinition)> = self
            .workflows
            .iter()
            .map(|r| (*r.key(), r.value().definition.clone()))
            .collect();
        definitions.sort_by_key(|(id, _)| *id);

        definitions
            .iter()
            .map(|(_, definition)| Workflow::from_definition(definition, &self.registry))
            .collect()
    }
}
