//! Serializable workflow definitions.
//!
//! Workflows are stored and exchanged as definitions that refer to callbacks
//! by name. JSON and YAML are both accepted:
//!
//! ```yaml
//! name: order
//! statuses: [created, validated, rejected]
//! actions:
//!   - type: simple
//!     name: submit
//!     from: created
//!     to: validated
//!     guards: AmountPositive
//!   - type: conditional
//!     name: review
//!     entries:
//!       - { name: review, from: validated }
//!     condition: RiskScore
//!     routing:
//!       - { outcome: 1, to: created }
//!       - { outcome: 2, to: rejected }
//!     processes: { rejected: Notify }
//! ```
//!
//! Materializing a definition rebinds every callback name through a
//! [`Registry`] and rebuilds the status graph.

use crate::action::{Action, ConditionalAction, SimpleAction};
use crate::error::{ErrorKind, FlowError};
use crate::registry::Registry;
use crate::status::Status;
use crate::workflow::Workflow;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// A workflow as stored or transmitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Regular status names.
    pub statuses: Vec<String>,

    #[serde(default)]
    pub actions: Vec<ActionDefinition>,
}

/// One action of a [`WorkflowDefinition`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionDefinition {
    Simple {
        name: String,
        from: String,
        to: String,
        #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
        guards: Vec<String>,
        #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
        processes: Vec<String>,
    },
    Conditional {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
        entries: Vec<EntryDefinition>,
        condition: String,
        routing: Vec<RouteDefinition>,
        /// Arrival status name -> process name.
        #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
        processes: BTreeMap<String, String>,
    },
}

/// Entry of a conditional action into its choice point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDefinition {
    pub name: String,
    pub from: String,
    #[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Vec::is_empty")]
    pub guards: Vec<String>,
}

/// Routing table row of a conditional action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDefinition {
    pub outcome: i32,
    pub to: String,
}

/// Accepts either a single callback name or a list of names.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::{self, Visitor};
    use std::fmt;

    struct NamesVisitor;

    impl<'de> Visitor<'de> for NamesVisitor {
        type Value = Vec<String>;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a callback name or a list of callback names")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(vec![v.to_string()])
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Vec::new())
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: de::SeqAccess<'de>,
        {
            let mut names = Vec::new();
            while let Some(name) = seq.next_element::<String>()? {
                names.push(name);
            }
            Ok(names)
        }
    }

    deserializer.deserialize_any(NamesVisitor)
}

impl WorkflowDefinition {
    pub fn from_json_str(s: &str) -> Result<Self, FlowError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_yaml_str(s: &str) -> Result<Self, FlowError> {
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn to_json(&self) -> Result<serde_json::Value, FlowError> {
        Ok(serde_json::to_value(self)?)
    }

    /// CRC32C of the canonical JSON encoding, as 8 hex digits.
    pub fn checksum(&self) -> Result<String, FlowError> {
        let json_bytes = serde_json::to_vec(self)?;
        Ok(format!("{:08x}", crc32c::crc32c(&json_bytes)))
    }
}

impl<O> Workflow<O> {
    /// Captures this workflow as a definition. Choice points are implied by
    /// the conditional actions and not listed.
    pub fn to_definition(&self) -> WorkflowDefinition {
        let mut statuses: Vec<String> = self.statuses().map(|s| s.name().to_string()).collect();
        statuses.sort();

        let actions = self
            .actions()
            .iter()
            .map(|action| match action {
                Action::Simple(simple) => ActionDefinition::Simple {
                    name: simple.name().to_string(),
                    from: simple.departure().name().to_string(),
                    to: simple
                        .arrival()
                        .map(|s| s.name().to_string())
                        .unwrap_or_default(),
                    guards: simple.guards().iter().map(|g| g.name().to_string()).collect(),
                    processes: simple
                        .processes()
                        .iter()
                        .map(|p| p.name().to_string())
                        .collect(),
                },
                Action::Conditional(conditional) => ActionDefinition::Conditional {
                    name: conditional.name().map(str::to_string),
                    entries: conditional
                        .entries()
                        .iter()
                        .map(|entry| EntryDefinition {
                            name: entry.name().to_string(),
                            from: entry.departure().name().to_string(),
                            guards: entry.guards().iter().map(|g| g.name().to_string()).collect(),
                        })
                        .collect(),
                    condition: conditional.condition().name().to_string(),
                    routing: conditional
                        .routing()
                        .iter()
                        .map(|(outcome, to)| RouteDefinition {
                            outcome: *outcome,
                            to: to.name().to_string(),
                        })
                        .collect(),
                    processes: conditional
                        .processes()
                        .iter()
                        .map(|(arrival, p)| (arrival.name().to_string(), p.name().to_string()))
                        .collect(),
                },
            })
            .collect();

        WorkflowDefinition {
            name: self.name().to_string(),
            description: self.description().map(str::to_string),
            statuses,
            actions,
        }
    }

    /// Materializes a definition, binding callback names through `registry`.
    ///
    /// Structural problems are reported as [`FlowError::InvalidDefinition`];
    /// a callback missing from the registry as [`FlowError::UnknownCallback`].
    pub fn from_definition(
        definition: &WorkflowDefinition,
        registry: &Registry<O>,
    ) -> Result<Self, FlowError> {
        if definition.name.is_empty() {
            return Err(invalid("workflow name is empty"));
        }

        let mut workflow = Workflow::new(definition.name.clone());
        workflow.set_description(definition.description.clone());

        let mut statuses: HashMap<&str, Status> = HashMap::new();
        for name in &definition.statuses {
            if statuses.contains_key(name.as_str()) {
                return Err(invalid(format!("duplicate status '{}'", name)));
            }
            statuses.insert(name.as_str(), Status::new(&mut workflow, name.clone()));
        }
        let status = |name: &String| lookup(&statuses, name);

        for action in &definition.actions {
            let action: Action<O> = match action {
                ActionDefinition::Simple {
                    name,
                    from,
                    to,
                    guards,
                    processes,
                } => {
                    let mut simple = SimpleAction::new(name.clone(), status(from)?, status(to)?);
                    for guard in guards {
                        simple = simple.with_guard(registry.guard(guard)?);
                    }
                    for process in processes {
                        simple = simple.with_process(registry.process(process)?);
                    }
                    simple.into()
                }
                ActionDefinition::Conditional {
                    name,
                    entries,
                    condition,
                    routing,
                    processes,
                } => {
                    let mut simple_entries = Vec::with_capacity(entries.len());
                    for entry in entries {
                        let mut simple =
                            SimpleAction::entry(entry.name.clone(), status(&entry.from)?);
                        for guard in &entry.guards {
                            simple = simple.with_guard(registry.guard(guard)?);
                        }
                        simple_entries.push(simple);
                    }

                    let mut conditional = ConditionalAction::junction(
                        &workflow,
                        registry.condition(condition)?,
                        simple_entries,
                    );
                    if let Some(name) = name {
                        conditional = conditional.named(name.clone());
                    }
                    for route in routing {
                        if conditional.routing().contains_key(&route.outcome) {
                            return Err(invalid(format!("duplicate outcome {}", route.outcome)));
                        }
                        conditional = conditional.route(route.outcome, status(&route.to)?);
                    }
                    for (arrival, process) in processes {
                        conditional =
                            conditional.with_process(status(arrival)?, registry.process(process)?);
                    }
                    conditional.into()
                }
            };

            workflow.add_action(action).map_err(|e| match e.kind() {
                ErrorKind::Argument => invalid(e.to_string()),
                _ => e,
            })?;
        }

        Ok(workflow)
    }
}

fn lookup<'a>(statuses: &'a HashMap<&str, Status>, name: &str) -> Result<&'a Status, FlowError> {
    statuses
        .get(name)
        .ok_or_else(|| invalid(format!("status '{}' not in statuses list", name)))
}

fn invalid(reason: impl Into<String>) -> FlowError {
    FlowError::InvalidDefinition {
        reason: reason.into(),
    }
}
