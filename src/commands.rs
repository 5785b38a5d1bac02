//! Command execution.

use crate::Commands;
use colored::Colorize;
use statusflow_core::{
    condition_fn, guard_fn, process_fn, Action, ActionDefinition, FlowError, Registry, Workflow,
    WorkflowDefinition, WorkflowId, WorkflowStore,
};
use statusflow_storage::{FileStore, StorageConfig};
use std::path::Path;
use std::sync::Arc;

/// Formatted command output.
pub struct Output {
    pub text: String,
    /// False when the command found invalid input; the process exits with 1.
    pub success: bool,
}

impl Output {
    fn ok(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            success: true,
        }
    }
}

/// Executes a command and returns the formatted output.
pub fn execute(
    config: &StorageConfig,
    cmd: Commands,
) -> Result<Output, Box<dyn std::error::Error>> {
    match cmd {
        Commands::Check { files } => {
            let mut lines = Vec::with_capacity(files.len());
            let mut success = true;

            for path in &files {
                let result = read_definition(path).and_then(|def| {
                    let workflow = materialize(&def)?;
                    workflow.validate()?;
                    Ok(def.name)
                });
                match result {
                    Ok(name) => lines.push(format!(
                        "{} {} ({})",
                        "valid".green(),
                        name.cyan(),
                        path.display()
                    )),
                    Err(e) => {
                        success = false;
                        lines.push(format!("{} {}: {}", "invalid".red(), path.display(), e));
                    }
                }
            }

            Ok(Output {
                text: lines.join("\n"),
                success,
            })
        }

        Commands::Inspect { file } => {
            let def = read_definition(&file)?;
            let workflow = materialize(&def)?;
            Ok(Output::ok(describe(&workflow)))
        }

        Commands::List => {
            let store = FileStore::<()>::open(config.clone(), Arc::new(Registry::new()))?;
            let definitions = store.definitions();
            if definitions.is_empty() {
                return Ok(Output::ok("No workflows stored".yellow().to_string()));
            }

            let mut output = format!("{}\n", "Workflows:".bold());
            for (id, def) in definitions {
                output.push_str(&format!(
                    "  {} {} [statuses: {}, actions: {}, checksum: {}]\n",
                    id.to_string().cyan(),
                    def.name,
                    def.statuses.len(),
                    def.actions.len(),
                    def.checksum()?
                ));
            }
            Ok(Output::ok(output.trim_end()))
        }

        Commands::Import { files } => {
            let mut definitions = Vec::with_capacity(files.len());
            for path in &files {
                definitions.push(read_definition(path)?);
            }

            let store = FileStore::open(config.clone(), Arc::new(inert_registry(&definitions)))?;
            let mut lines = Vec::with_capacity(definitions.len());
            let mut success = true;
            for def in &definitions {
                let result = Workflow::from_definition(def, store.registry())
                    .and_then(|workflow| store.save(&workflow));
                match result {
                    Ok(id) => lines.push(format!(
                        "{} workflow {} (id: {})",
                        "Stored".green(),
                        def.name.cyan(),
                        id
                    )),
                    Err(e) => {
                        success = false;
                        lines.push(format!("{} {}: {}", "Rejected".red(), def.name.cyan(), e));
                    }
                }
            }

            Ok(Output {
                text: lines.join("\n"),
                success,
            })
        }

        Commands::Delete { id } => {
            let store = FileStore::<()>::open(config.clone(), Arc::new(Registry::new()))?;
            store.delete(WorkflowId(id))?;
            Ok(Output::ok(format!("{} workflow {}", "Deleted".green(), id)))
        }
    }
}

/// Reads a definition file, as YAML for `.yaml`/`.yml` and JSON otherwise.
pub fn read_definition(path: &Path) -> Result<WorkflowDefinition, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(path)?;
    let is_yaml = path
        .extension()
        .map(|e| e == "yaml" || e == "yml")
        .unwrap_or(false);
    let def = if is_yaml {
        WorkflowDefinition::from_yaml_str(&content)?
    } else {
        WorkflowDefinition::from_json_str(&content)?
    };
    Ok(def)
}

/// Builds the workflow structure of a definition without real callbacks.
fn materialize(def: &WorkflowDefinition) -> Result<Workflow<()>, FlowError> {
    let registry = inert_registry(std::slice::from_ref(def));
    Workflow::from_definition(def, &registry)
}

/// Binds every callback name to a stand-in: guards pass, processes do
/// nothing, conditions pick the first routed outcome.
fn inert_registry(definitions: &[WorkflowDefinition]) -> Registry<()> {
    let registry = Registry::new();
    let register_guards = |guards: &[String]| {
        for guard in guards {
            registry.register_guard(guard_fn(guard.clone(), |_: &mut ()| Ok(true)));
        }
    };

    for def in definitions {
        for action in &def.actions {
            match action {
                ActionDefinition::Simple {
                    guards, processes, ..
                } => {
                    register_guards(guards.as_slice());
                    for process in processes {
                        registry.register_process(process_fn(process.clone(), |_: &mut ()| Ok(())));
                    }
                }
                ActionDefinition::Conditional {
                    entries,
                    condition,
                    routing,
                    processes,
                    ..
                } => {
                    for entry in entries {
                        register_guards(entry.guards.as_slice());
                    }
                    let outcome = routing.first().map(|r| r.outcome).unwrap_or_default();
                    registry.register_condition(condition_fn(condition.clone(), move |_: &mut ()| {
                        Ok(outcome)
                    }));
                    for process in processes.values() {
                        registry.register_process(process_fn(process.clone(), |_: &mut ()| Ok(())));
                    }
                }
            }
        }
    }
    registry
}

fn describe(workflow: &Workflow<()>) -> String {
    let mut output = format!("{}\n", format!("Workflow {}", workflow.name().cyan()).bold());
    if let Some(description) = workflow.description() {
        output.push_str(&format!("  {}\n", description));
    }

    match workflow.validate() {
        Ok(()) => output.push_str(&format!("  Valid: {}\n", "yes".green())),
        Err(e) => output.push_str(&format!("  Valid: {} ({})\n", "no".red(), e)),
    }
    if let Ok(initial) = workflow.initial_status() {
        output.push_str(&format!("  Initial: {}\n", initial.name().yellow()));
    }

    let mut finals: Vec<&str> = workflow.final_statuses().iter().map(|s| s.name()).collect();
    finals.sort_unstable();
    output.push_str(&format!("  Final: {}\n", finals.join(", ")));

    let mut statuses: Vec<_> = workflow.statuses().collect();
    statuses.sort();
    output.push_str("  Actions:\n");
    for status in statuses {
        let actions: Vec<String> = workflow
            .available_actions_from_status(status)
            .into_iter()
            .map(|name| {
                let target = match workflow.action_by_departure_status_and_name(status, &name) {
                    Some(Action::Conditional(conditional)) => conditional
                        .arrival_statuses()
                        .iter()
                        .map(|s| s.name())
                        .collect::<Vec<_>>()
                        .join("|"),
                    _ => workflow
                        .target_status(status, &name)
                        .map(|s| s.name().to_string())
                        .unwrap_or_default(),
                };
                format!("{} -> {}", name, target)
            })
            .collect();
        if actions.is_empty() {
            output.push_str(&format!("    {}: -\n", status.name().yellow()));
        } else {
            output.push_str(&format!("    {}: {}\n", status.name().yellow(), actions.join(", ")));
        }
    }

    output.trim_end().to_string()
}
