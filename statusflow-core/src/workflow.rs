//! Workflow model and its derived status graph.
//!
//! The statuses and actions are the source of truth. The graph is an index
//! rebuilt from them (vertices = statuses, edges = simple actions and the
//! entry/exit legs of conditional actions). It is a directed multigraph:
//! parallel edges and self-loops are allowed.

use crate::action::{Action, ConditionalAction, SimpleAction};
use crate::error::FlowError;
use crate::status::Status;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::fmt;

/// Which part of an action an edge stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leg {
    Simple,
    Entry(usize),
    Exit(usize),
}

/// Edge weight: index into `Workflow::actions` plus the leg.
#[derive(Debug, Clone, Copy)]
struct ActionEdge {
    action: usize,
    leg: Leg,
}

/// An action resolved from a (status, name) pair.
pub(crate) struct Resolved<'a, O> {
    pub action: &'a Action<O>,
    /// Entry leg taken, for conditional actions.
    pub entry: Option<&'a SimpleAction<O>>,
    /// Arrival of the edge: the choice status for conditional entries.
    pub target: &'a Status,
}

/// A workflow: statuses, actions and the graph derived from them.
pub struct Workflow<O> {
    name: String,
    description: Option<String>,
    statuses: HashSet<Status>,
    actions: Vec<Action<O>>,
    graph: DiGraph<Status, ActionEdge>,
    vertices: HashMap<Status, NodeIndex>,
}

impl<O> Workflow<O> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            statuses: HashSet::new(),
            actions: Vec::new(),
            graph: DiGraph::new(),
            vertices: HashMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn set_description(&mut self, description: Option<String>) {
        self.description = description;
    }

    // =========================================================================
    // Statuses and actions
    // =========================================================================

    /// Adds a status created for this workflow.
    pub fn add_status(&mut self, status: Status) -> Result<(), FlowError> {
        self.check_member(&status)?;
        self.register_status(status);
        Ok(())
    }

    /// Inserts a status and its vertex. Membership is the caller's concern.
    pub(crate) fn register_status(&mut self, status: Status) {
        if self.statuses.insert(status.clone()) {
            let index = self.graph.add_node(status.clone());
            self.vertices.insert(status, index);
        }
    }

    /// Adds an action and its edges.
    ///
    /// Fails with an argument error if a status belongs to another workflow,
    /// is not registered here, or if the action is ill-formed.
    pub fn add_action(&mut self, action: impl Into<Action<O>>) -> Result<(), FlowError> {
        let action = match action.into() {
            Action::Simple(simple) => {
                self.check_simple(&simple)?;
                Action::Simple(simple)
            }
            Action::Conditional(mut conditional) => {
                self.check_conditional(&conditional)?;
                self.register_status(conditional.choice.clone());
                conditional.build_exits();
                Action::Conditional(conditional)
            }
        };

        self.actions.push(action);
        self.connect(self.actions.len() - 1);
        Ok(())
    }

    fn check_member(&self, status: &Status) -> Result<(), FlowError> {
        if status.belongs_to(&self.name) {
            Ok(())
        } else {
            Err(FlowError::ForeignStatus {
                status: status.name().to_string(),
                owner: status.workflow().to_string(),
                workflow: self.name.clone(),
            })
        }
    }

    fn check_endpoint(&self, action: &str, status: &Status) -> Result<(), FlowError> {
        self.check_member(status)?;
        if !self.statuses.contains(status) {
            return Err(FlowError::MalformedAction {
                action: action.to_string(),
                reason: format!("status '{}' is not part of workflow '{}'", status, self.name),
            });
        }
        Ok(())
    }

    fn check_unique_name(&self, action: &str, departure: &Status) -> Result<(), FlowError> {
        if self.available_actions_from_status(departure).contains(action) {
            return Err(FlowError::MalformedAction {
                action: action.to_string(),
                reason: format!("duplicate action from status '{}'", departure),
            });
        }
        Ok(())
    }

    fn check_simple(&self, simple: &SimpleAction<O>) -> Result<(), FlowError> {
        let arrival = simple
            .arrival()
            .ok_or_else(|| FlowError::MalformedAction {
                action: simple.name().to_string(),
                reason: "no arrival status".to_string(),
            })?;
        self.check_endpoint(simple.name(), simple.departure())?;
        self.check_endpoint(simple.name(), arrival)?;
        self.check_unique_name(simple.name(), simple.departure())
    }

    fn check_conditional(&self, conditional: &ConditionalAction<O>) -> Result<(), FlowError> {
        let label = conditional.label();
        let malformed = |reason: &str| FlowError::MalformedAction {
            action: label.to_string(),
            reason: reason.to_string(),
        };

        self.check_member(conditional.choice_pseudo_status())?;
        if conditional.entries().is_empty() {
            return Err(malformed("no entry action"));
        }
        if conditional.routing().is_empty() {
            return Err(malformed("empty routing table"));
        }

        let mut seen = HashSet::new();
        for entry in conditional.entries() {
            self.check_endpoint(entry.name(), entry.departure())?;
            self.check_unique_name(entry.name(), entry.departure())?;
            if !entry.processes().is_empty() {
                return Err(FlowError::MalformedAction {
                    action: entry.name().to_string(),
                    reason: "entry actions cannot carry processes".to_string(),
                });
            }
            if !seen.insert((entry.departure(), entry.name())) {
                return Err(FlowError::MalformedAction {
                    action: entry.name().to_string(),
                    reason: format!("duplicate action from status '{}'", entry.departure()),
                });
            }
        }
        for arrival in conditional.routing().values() {
            self.check_endpoint(label, arrival)?;
        }
        for status in conditional.processes().keys() {
            self.check_member(status)?;
            if !conditional.routing().values().any(|a| a == status) {
                return Err(malformed(&format!(
                    "process bound to status '{}' which is not a routing target",
                    status
                )));
            }
        }
        Ok(())
    }

    /// Adds the edges of the action at `index`.
    fn connect(&mut self, index: usize) {
        let mut edges = Vec::new();
        match &self.actions[index] {
            Action::Simple(simple) => {
                if let Some(arrival) = simple.arrival() {
                    edges.push((simple.departure().clone(), arrival.clone(), Leg::Simple));
                }
            }
            Action::Conditional(conditional) => {
                let choice = conditional.choice_pseudo_status();
                for (i, entry) in conditional.entries().iter().enumerate() {
                    edges.push((entry.departure().clone(), choice.clone(), Leg::Entry(i)));
                }
                for (i, exit) in conditional.exits().iter().enumerate() {
                    if let Some(arrival) = exit.arrival() {
                        edges.push((choice.clone(), arrival.clone(), Leg::Exit(i)));
                    }
                }
            }
        }

        for (from, to, leg) in edges {
            let from = self.vertex(from);
            let to = self.vertex(to);
            self.graph.add_edge(from, to, ActionEdge { action: index, leg });
        }
    }

    fn vertex(&mut self, status: Status) -> NodeIndex {
        if let Some(index) = self.vertices.get(&status) {
            return *index;
        }
        let index = self.graph.add_node(status.clone());
        self.vertices.insert(status, index);
        index
    }

    /// Rebuilds the graph from the status and action sets.
    pub fn rebuild_graph(&mut self) {
        self.graph = DiGraph::with_capacity(self.statuses.len(), self.actions.len());
        self.vertices.clear();

        let statuses: Vec<Status> = self.statuses.iter().cloned().collect();
        for status in statuses {
            self.vertex(status);
        }
        for index in 0..self.actions.len() {
            self.connect(index);
        }

        tracing::debug!(
            "Rebuilt graph for workflow {}: {} statuses, {} edges",
            self.name,
            self.graph.node_count(),
            self.graph.edge_count()
        );
    }

    /// Looks up a regular status by name.
    pub fn status(&self, name: &str) -> Option<&Status> {
        self.statuses
            .iter()
            .find(|s| !s.is_pseudo() && s.name() == name)
    }

    /// Regular statuses, in no particular order.
    pub fn statuses(&self) -> impl Iterator<Item = &Status> {
        self.statuses.iter().filter(|s| !s.is_pseudo())
    }

    pub fn actions(&self) -> &[Action<O>] {
        &self.actions
    }

    // =========================================================================
    // Structural queries
    // =========================================================================

    fn in_degree(&self, index: NodeIndex) -> usize {
        self.graph.edges_directed(index, Direction::Incoming).count()
    }

    fn out_degree(&self, index: NodeIndex) -> usize {
        self.graph.edges_directed(index, Direction::Outgoing).count()
    }

    /// Returns true if no action arrives at `status`.
    ///
    /// Statuses outside this workflow are never initial.
    pub fn is_initial_status(&self, status: &Status) -> bool {
        self.vertices
            .get(status)
            .is_some_and(|i| self.in_degree(*i) == 0)
    }

    /// Returns true if no action departs from `status`.
    ///
    /// Statuses outside this workflow are never final.
    pub fn is_final_status(&self, status: &Status) -> bool {
        self.vertices
            .get(status)
            .is_some_and(|i| self.out_degree(*i) == 0)
    }

    fn roots(&self) -> Vec<&Status> {
        self.graph
            .node_indices()
            .filter(|i| self.in_degree(*i) == 0)
            .map(|i| &self.graph[i])
            .collect()
    }

    /// Returns the unique status without incoming action.
    pub fn initial_status(&self) -> Result<&Status, FlowError> {
        match self.roots().as_slice() {
            [root] => Ok(*root),
            roots => Err(FlowError::InvalidWorkflow {
                workflow: self.name.clone(),
                reason: format!("expected exactly one initial status, found {}", roots.len()),
            }),
        }
    }

    /// Returns every regular status without outgoing action.
    pub fn final_statuses(&self) -> HashSet<&Status> {
        self.graph
            .node_indices()
            .filter(|i| self.out_degree(*i) == 0)
            .map(|i| &self.graph[i])
            .filter(|s| !s.is_pseudo())
            .collect()
    }

    /// Names of the actions a caller may apply from `status`.
    ///
    /// For conditional actions this is the name of each entry departing from
    /// `status`. Empty for unknown and pseudo statuses.
    pub fn available_actions_from_status(&self, status: &Status) -> BTreeSet<String> {
        if status.is_pseudo() {
            return BTreeSet::new();
        }
        let Some(index) = self.vertices.get(status) else {
            return BTreeSet::new();
        };

        self.graph
            .edges_directed(*index, Direction::Outgoing)
            .filter_map(|edge| self.edge_name(edge.weight()))
            .map(str::to_string)
            .collect()
    }

    fn edge_name(&self, edge: &ActionEdge) -> Option<&str> {
        match (&self.actions[edge.action], edge.leg) {
            (Action::Simple(simple), Leg::Simple) => Some(simple.name()),
            (Action::Conditional(conditional), Leg::Entry(i)) => {
                conditional.entries().get(i).map(SimpleAction::name)
            }
            _ => None,
        }
    }

    pub(crate) fn resolve(&self, status: &Status, name: &str) -> Option<Resolved<'_, O>> {
        if status.is_pseudo() {
            return None;
        }
        let index = self.vertices.get(status)?;

        self.graph
            .edges_directed(*index, Direction::Outgoing)
            .find(|edge| self.edge_name(edge.weight()) == Some(name))
            .map(|edge| {
                let weight = edge.weight();
                let action = &self.actions[weight.action];
                let entry = match (action, weight.leg) {
                    (Action::Conditional(conditional), Leg::Entry(i)) => {
                        conditional.entries().get(i)
                    }
                    _ => None,
                };
                Resolved {
                    action,
                    entry,
                    target: &self.graph[edge.target()],
                }
            })
    }

    /// Returns the public action reached by applying `name` from `status`.
    pub fn action_by_departure_status_and_name(
        &self,
        status: &Status,
        name: &str,
    ) -> Option<&Action<O>> {
        self.resolve(status, name).map(|r| r.action)
    }

    /// Returns the arrival of the edge named `name` departing from `status`.
    ///
    /// For a conditional entry this is the choice pseudo-status.
    pub fn target_status(&self, status: &Status, name: &str) -> Option<&Status> {
        self.resolve(status, name).map(|r| r.target)
    }

    /// Returns true if the graph is weakly connected and has exactly one
    /// initial status. Cycles are allowed.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Like [`is_valid`](Self::is_valid), naming the rule that failed.
    pub fn validate(&self) -> Result<(), FlowError> {
        let components = petgraph::algo::connected_components(&self.graph);
        if components != 1 {
            return Err(FlowError::InvalidWorkflow {
                workflow: self.name.clone(),
                reason: format!("graph has {} connected components, expected 1", components),
            });
        }
        self.initial_status().map(|_| ())
    }
}

impl<O> fmt::Debug for Workflow<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Workflow")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("statuses", &self.statuses)
            .field("actions", &self.actions)
            .finish()
    }
}
