//! File-backed workflow store.
//!
//! Each workflow is one JSON file `<id>.json` under the workflows directory,
//! holding the definition and its checksum. All files are read and verified
//! on open; the in-memory index then serves reads.

use crate::config::StorageConfig;
use crate::error::StorageError;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use statusflow_core::{
    FlowError, Registry, Workflow, WorkflowDefinition, WorkflowId, WorkflowStore,
};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Workflow file contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredWorkflow {
    id: WorkflowId,
    name: String,
    definition: WorkflowDefinition,
    checksum: String,
}

/// Workflow store persisting definitions to a data directory.
pub struct FileStore<O> {
    config: StorageConfig,
    registry: Arc<Registry<O>>,
    workflows: RwLock<BTreeMap<WorkflowId, StoredWorkflow>>,
    next_id: AtomicU64,
}

impl<O> FileStore<O> {
    /// Opens or creates a store in `config.data_dir`.
    pub fn open(config: StorageConfig, registry: Arc<Registry<O>>) -> Result<Self, StorageError> {
        fs::create_dir_all(config.workflows_dir())?;

        let workflows = load_workflows(&config.workflows_dir())?;
        let next_id = workflows.keys().next_back().map_or(1, |id| id.0 + 1);

        tracing::info!(
            "Opened file store at {} with {} workflows",
            config.data_dir.display(),
            workflows.len()
        );

        Ok(Self {
            config,
            registry,
            workflows: RwLock::new(workflows),
            next_id: AtomicU64::new(next_id),
        })
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<Registry<O>> {
        &self.registry
    }

    /// Returns the stored definitions, ordered by id.
    pub fn definitions(&self) -> Vec<(WorkflowId, WorkflowDefinition)> {
        self.workflows
            .read()
            .values()
            .map(|s| (s.id, s.definition.clone()))
            .collect()
    }

    fn path_for(&self, id: WorkflowId) -> PathBuf {
        self.config.workflows_dir().join(format!("{}.json", id))
    }

    /// Writes a workflow file through a temporary file and a rename.
    fn write_file(&self, stored: &StoredWorkflow) -> Result<(), StorageError> {
        let path = self.path_for(stored.id);
        let tmp_path = path.with_extension("json.tmp");

        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        if self.config.pretty {
            serde_json::to_writer_pretty(&mut writer, stored)?;
        } else {
            serde_json::to_writer(&mut writer, stored)?;
        }
        writer.flush()?;
        fs::rename(&tmp_path, &path)?;
        Ok(())
    }
}

fn load_workflows(dir: &Path) -> Result<BTreeMap<WorkflowId, StoredWorkflow>, StorageError> {
    let mut workflows = BTreeMap::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.extension().map(|e| e == "json").unwrap_or(false) {
            tracing::warn!("Skipping unexpected file {}", path.display());
            continue;
        }

        let reader = BufReader::new(File::open(&path)?);
        let stored: StoredWorkflow = serde_json::from_reader(reader)?;

        let checksum = stored.definition.checksum()?;
        if checksum != stored.checksum {
            return Err(StorageError::Corruption(format!(
                "checksum mismatch in {}: expected {}, computed {}",
                path.display(),
                stored.checksum,
                checksum
            )));
        }
        let stem = path.file_stem().and_then(|s| s.to_str());
        if stem != Some(stored.id.to_string().as_str()) {
            return Err(StorageError::Corruption(format!(
                "workflow id {} does not match file {}",
                stored.id,
                path.display()
            )));
        }
        if workflows.contains_key(&stored.id) {
            return Err(StorageError::Corruption(format!("workflow id {} stored twice", stored.id)));
        }
        if stored.name != stored.definition.name {
            return Err(StorageError::Corruption(format!(
                "workflow name mismatch in {}",
                path.display()
            )));
        }
        if workflows.values().any(|w: &StoredWorkflow| w.name == stored.name) {
            return Err(StorageError::Corruption(format!("workflow {} stored twice", stored.name)));
        }

        workflows.insert(stored.id, stored);
    }

    Ok(workflows)
}

impl<O> WorkflowStore<O> for FileStore<O>
where
    O: 'static,
{
    fn load_by_name(&self, name: &str) -> Result<Workflow<O>, FlowError> {
        let definition = self
            .workflows
            .read()
            .values()
            .find(|s| s.name == name)
            .map(|s| s.definition.clone())
            .ok_or_else(|| FlowError::WorkflowNotFound {
                workflow: name.to_string(),
            })?;

        Workflow::from_definition(&definition, &self.registry)
    }

    fn save(&self, workflow: &Workflow<O>) -> Result<WorkflowId, FlowError> {
        workflow.validate()?;

        let definition = workflow.to_definition();
        let checksum = definition.checksum()?;

        let mut workflows = self.workflows.write();
        if let Some(existing) = workflows.values().find(|s| s.name == definition.name) {
            if existing.checksum != checksum {
                return Err(FlowError::WorkflowExists {
                    workflow: definition.name,
                });
            }
            self.registry.absorb(workflow);
            return Ok(existing.id);
        }

        let id = WorkflowId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let stored = StoredWorkflow {
            id,
            name: definition.name.clone(),
            definition,
            checksum,
        };
        self.write_file(&stored)?;
        self.registry.absorb(workflow);

        tracing::info!("Saved workflow {} with id {}", stored.name, id);
        workflows.insert(id, stored);
        Ok(id)
    }

    fn delete(&self, id: WorkflowId) -> Result<(), FlowError> {
        let mut workflows = self.workflows.write();
        if !workflows.contains_key(&id) {
            return Err(FlowError::WorkflowIdNotFound { id: id.0 });
        }

        fs::remove_file(self.path_for(id)).map_err(StorageError::from)?;
        if let Some(stored) = workflows.remove(&id) {
            tracing::info!("Deleted workflow {} (id {})", stored.name, id);
        }
        Ok(())
    }

    fn list(&self) -> Result<Vec<Workflow<O>>, FlowError> {
        self.definitions()
            .iter()
            .map(|(_, definition)| Workflow::from_definition(definition, &self.registry))
            .collect()
    }
}
