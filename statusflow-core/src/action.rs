//! Workflow actions.
//!
//! An [`Action`] is either a [`SimpleAction`], one edge from a departure to an
//! arrival status, or a [`ConditionalAction`], a small sub-graph:
//!
//! ```text
//!   departure ──entry──▶ (choice) ──exit──▶ arrival 1
//!   departure'──entry──▶    │     ──exit──▶ arrival 2
//! ```
//!
//! Entry actions carry their own guards and are the names callers use. The
//! condition picks an exit through the routing table.

use crate::callback::{ConditionRef, GuardRef, ProcessRef};
use crate::status::Status;
use crate::workflow::Workflow;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// A direct transition between two statuses.
pub struct SimpleAction<O> {
    pub(crate) name: String,
    pub(crate) departure: Status,
    pub(crate) arrival: Option<Status>,
    pub(crate) guards: Vec<GuardRef<O>>,
    pub(crate) processes: Vec<ProcessRef<O>>,
}

impl<O> SimpleAction<O> {
    pub fn new(name: impl Into<String>, departure: &Status, arrival: &Status) -> Self {
        Self {
            name: name.into(),
            departure: departure.clone(),
            arrival: Some(arrival.clone()),
            guards: Vec::new(),
            processes: Vec::new(),
        }
    }

    /// Creates an action without arrival, to be folded into a junction.
    ///
    /// [`ConditionalAction::junction`] points its arrival at the choice status.
    pub fn entry(name: impl Into<String>, departure: &Status) -> Self {
        Self {
            name: name.into(),
            departure: departure.clone(),
            arrival: None,
            guards: Vec::new(),
            processes: Vec::new(),
        }
    }

    /// Appends a guard. A guard already present under the same name is ignored.
    pub fn with_guard(mut self, guard: GuardRef<O>) -> Self {
        push_unique_guard(&mut self.guards, guard);
        self
    }

    pub fn with_guards(mut self, guards: impl IntoIterator<Item = GuardRef<O>>) -> Self {
        for guard in guards {
            push_unique_guard(&mut self.guards, guard);
        }
        self
    }

    /// Appends a process. A process already present under the same name is ignored.
    pub fn with_process(mut self, process: ProcessRef<O>) -> Self {
        if !self.processes.iter().any(|p| p.name() == process.name()) {
            self.processes.push(process);
        }
        self
    }

    pub fn with_processes(self, processes: impl IntoIterator<Item = ProcessRef<O>>) -> Self {
        processes.into_iter().fold(self, |a, p| a.with_process(p))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn departure(&self) -> &Status {
        &self.departure
    }

    /// Arrival status, `None` for an entry not yet folded into a junction.
    pub fn arrival(&self) -> Option<&Status> {
        self.arrival.as_ref()
    }

    /// Guards in evaluation order.
    pub fn guards(&self) -> &[GuardRef<O>] {
        &self.guards
    }

    /// Processes in execution order.
    pub fn processes(&self) -> &[ProcessRef<O>] {
        &self.processes
    }

    pub fn is_departure_status(&self, status: &Status) -> bool {
        &self.departure == status
    }

    pub fn is_connected_to_pseudo_status(&self) -> bool {
        self.departure.is_pseudo() || self.arrival.as_ref().is_some_and(Status::is_pseudo)
    }
}

fn push_unique_guard<O>(guards: &mut Vec<GuardRef<O>>, guard: GuardRef<O>) {
    if !guards.iter().any(|g| g.name() == guard.name()) {
        guards.push(guard);
    }
}

impl<O> fmt::Debug for SimpleAction<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimpleAction")
            .field("name", &self.name)
            .field("departure", &self.departure.name())
            .field("arrival", &self.arrival.as_ref().map(Status::name))
            .field(
                "guards",
                &self.guards.iter().map(|g| g.name()).collect::<Vec<_>>(),
            )
            .field(
                "processes",
                &self.processes.iter().map(|p| p.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// A transition whose arrival is chosen by a condition.
pub struct ConditionalAction<O> {
    pub(crate) name: Option<String>,
    pub(crate) choice: Status,
    pub(crate) entries: Vec<SimpleAction<O>>,
    pub(crate) condition: ConditionRef<O>,
    pub(crate) routing: BTreeMap<i32, Status>,
    pub(crate) processes: HashMap<Status, ProcessRef<O>>,
    pub(crate) exits: Vec<SimpleAction<O>>,
}

impl<O> ConditionalAction<O> {
    /// Creates a conditional action with a single departure status.
    ///
    /// The entry edge into the choice status carries the action's name.
    pub fn new(
        workflow: &Workflow<O>,
        name: impl Into<String>,
        departure: &Status,
        condition: ConditionRef<O>,
    ) -> Self {
        let name = name.into();
        Self::junction(
            workflow,
            condition,
            [SimpleAction::entry(name.clone(), departure)],
        )
        .named(name)
    }

    /// Creates a conditional action joining several entry actions.
    ///
    /// Each entry keeps its own name and guards; its arrival is repointed to
    /// the choice status.
    pub fn junction(
        workflow: &Workflow<O>,
        condition: ConditionRef<O>,
        entries: impl IntoIterator<Item = SimpleAction<O>>,
    ) -> Self {
        let choice = Status::pseudo(workflow.name());
        let entries = entries
            .into_iter()
            .map(|mut entry| {
                entry.arrival = Some(choice.clone());
                entry
            })
            .collect();

        Self {
            name: None,
            choice,
            entries,
            condition,
            routing: BTreeMap::new(),
            processes: HashMap::new(),
            exits: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Adds a guard to every entry action.
    pub fn with_guard(mut self, guard: GuardRef<O>) -> Self {
        for entry in &mut self.entries {
            push_unique_guard(&mut entry.guards, guard.clone());
        }
        self
    }

    /// Routes a condition outcome to an arrival status.
    pub fn route(mut self, outcome: i32, arrival: &Status) -> Self {
        self.routing.insert(outcome, arrival.clone());
        self
    }

    /// Runs `process` when the condition routes to `arrival`.
    pub fn with_process(mut self, arrival: &Status, process: ProcessRef<O>) -> Self {
        self.processes.insert(arrival.clone(), process);
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Name used in messages: the action name, or the choice status name for
    /// anonymous junctions.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or_else(|| self.choice.name())
    }

    pub fn choice_pseudo_status(&self) -> &Status {
        &self.choice
    }

    pub fn condition(&self) -> &ConditionRef<O> {
        &self.condition
    }

    pub fn routing(&self) -> &BTreeMap<i32, Status> {
        &self.routing
    }

    pub fn processes(&self) -> &HashMap<Status, ProcessRef<O>> {
        &self.processes
    }

    /// Entry actions, from departure statuses into the choice status.
    pub fn entries(&self) -> &[SimpleAction<O>] {
        &self.entries
    }

    /// Looks up an entry action by name.
    pub fn entry(&self, name: &str) -> Option<&SimpleAction<O>> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Exit actions, from the choice status to each arrival.
    ///
    /// Empty until the action is added to its workflow.
    pub fn exits(&self) -> &[SimpleAction<O>] {
        &self.exits
    }

    /// Distinct routing targets, in outcome order.
    pub fn arrival_statuses(&self) -> Vec<&Status> {
        let mut arrivals: Vec<&Status> = Vec::new();
        for status in self.routing.values() {
            if !arrivals.contains(&status) {
                arrivals.push(status);
            }
        }
        arrivals
    }

    pub fn arrival_status_by_result(&self, outcome: i32) -> Option<&Status> {
        self.routing.get(&outcome)
    }

    pub fn process_for(&self, arrival: &Status) -> Option<&ProcessRef<O>> {
        self.processes.get(arrival)
    }

    pub fn is_departure_status(&self, status: &Status) -> bool {
        self.entries.iter().any(|e| e.is_departure_status(status))
    }

    /// Builds one exit action per arrival status.
    pub(crate) fn build_exits(&mut self) {
        let exits = self
            .arrival_statuses()
            .into_iter()
            .map(|arrival| SimpleAction {
                name: uuid::Uuid::new_v4().to_string(),
                departure: self.choice.clone(),
                arrival: Some(arrival.clone()),
                guards: Vec::new(),
                processes: self.processes.get(arrival).cloned().into_iter().collect(),
            })
            .collect();
        self.exits = exits;
    }
}

impl<O> fmt::Debug for ConditionalAction<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionalAction")
            .field("name", &self.name)
            .field("choice", &self.choice.name())
            .field("entries", &self.entries)
            .field("condition", &self.condition.name())
            .field(
                "routing",
                &self
                    .routing
                    .iter()
                    .map(|(k, v)| (*k, v.name()))
                    .collect::<BTreeMap<_, _>>(),
            )
            .finish()
    }
}

/// A workflow action.
pub enum Action<O> {
    Simple(SimpleAction<O>),
    Conditional(ConditionalAction<O>),
}

impl<O> fmt::Debug for Action<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Simple(simple) => fmt::Debug::fmt(simple, f),
            Action::Conditional(conditional) => fmt::Debug::fmt(conditional, f),
        }
    }
}

impl<O> Action<O> {
    /// Public name. Anonymous junctions have none; their entries are named.
    pub fn name(&self) -> Option<&str> {
        match self {
            Action::Simple(simple) => Some(simple.name()),
            Action::Conditional(conditional) => conditional.name(),
        }
    }

    /// Guards evaluated before any entry guard.
    ///
    /// Conditional actions keep their guards on the entry actions.
    pub fn guards(&self) -> &[GuardRef<O>] {
        match self {
            Action::Simple(simple) => simple.guards(),
            Action::Conditional(_) => &[],
        }
    }

    pub fn is_departure_status(&self, status: &Status) -> bool {
        match self {
            Action::Simple(simple) => simple.is_departure_status(status),
            Action::Conditional(conditional) => conditional.is_departure_status(status),
        }
    }

    pub fn as_simple(&self) -> Option<&SimpleAction<O>> {
        match self {
            Action::Simple(simple) => Some(simple),
            Action::Conditional(_) => None,
        }
    }

    pub fn as_conditional(&self) -> Option<&ConditionalAction<O>> {
        match self {
            Action::Simple(_) => None,
            Action::Conditional(conditional) => Some(conditional),
        }
    }
}

impl<O> From<SimpleAction<O>> for Action<O> {
    fn from(action: SimpleAction<O>) -> Self {
        Action::Simple(action)
    }
}

impl<O> From<ConditionalAction<O>> for Action<O> {
    fn from(action: ConditionalAction<O>) -> Self {
        Action::Conditional(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callback::{condition_fn, guard_fn, process_fn};

    fn statuses() -> (Workflow<u32>, Status, Status, Status) {
        let mut wkf = Workflow::new("W");
        let s1 = Status::new(&mut wkf, "s1");
        let s2 = Status::new(&mut wkf, "s2");
        let s3 = Status::new(&mut wkf, "s3");
        (wkf, s1, s2, s3)
    }

    fn always_one() -> crate::callback::ConditionRef<u32> {
        condition_fn("C", |_: &mut u32| Ok(1))
    }

    #[test]
    fn test_guards_keep_insertion_order_and_dedupe_by_name() {
        let (_wkf, s1, s2, _) = statuses();
        let action = SimpleAction::new("a1", &s1, &s2)
            .with_guard(guard_fn("B", |_: &mut u32| Ok(true)))
            .with_guard(guard_fn("A", |_: &mut u32| Ok(true)))
            .with_guard(guard_fn("B", |_: &mut u32| Ok(false)));

        let names: Vec<_> = action.guards().iter().map(|g| g.name()).collect();
        assert_eq!(names, vec!["B", "A"]);
    }

    #[test]
    fn test_processes_keep_insertion_order() {
        let (_wkf, s1, s2, _) = statuses();
        let action = SimpleAction::new("a1", &s1, &s2)
            .with_processes([
                process_fn("One", |_: &mut u32| Ok(())),
                process_fn("Two", |_: &mut u32| Ok(())),
            ]);

        let names: Vec<_> = action.processes().iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["One", "Two"]);
    }

    #[test]
    fn test_single_departure_conditional() {
        let (wkf, s1, s2, s3) = statuses();
        let action = ConditionalAction::new(&wkf, "route", &s1, always_one())
            .with_guard(guard_fn("G", |_: &mut u32| Ok(true)))
            .route(1, &s2)
            .route(2, &s3)
            .route(3, &s2);

        assert_eq!(action.name(), Some("route"));
        assert!(action.choice_pseudo_status().is_pseudo());
        assert_eq!(action.entries().len(), 1);

        let entry = action.entry("route").unwrap();
        assert_eq!(entry.departure(), &s1);
        assert_eq!(entry.arrival(), Some(action.choice_pseudo_status()));
        assert_eq!(entry.guards().len(), 1);
        assert!(entry.is_connected_to_pseudo_status());

        assert_eq!(action.arrival_statuses(), vec![&s2, &s3]);
        assert_eq!(action.arrival_status_by_result(2), Some(&s3));
        assert_eq!(action.arrival_status_by_result(9), None);
        assert!(action.is_departure_status(&s1));
        assert!(!action.is_departure_status(&s2));
    }

    #[test]
    fn test_junction_repoints_entries() {
        let (wkf, s1, s2, s3) = statuses();
        let action = ConditionalAction::junction(
            &wkf,
            condition_fn("C", |_: &mut u32| Ok(1)),
            [SimpleAction::entry("x", &s1), SimpleAction::entry("y", &s2)],
        )
        .route(1, &s3);

        assert_eq!(action.name(), None);
        assert_eq!(action.label(), action.choice_pseudo_status().name());
        for entry in action.entries() {
            assert_eq!(entry.arrival(), Some(action.choice_pseudo_status()));
        }
        assert!(action.is_departure_status(&s1));
        assert!(action.is_departure_status(&s2));
    }

    #[test]
    fn test_exits_carry_arrival_process() {
        let (wkf, s1, s2, s3) = statuses();
        let mut action = ConditionalAction::new(&wkf, "route", &s1, always_one())
            .route(1, &s2)
            .route(2, &s3)
            .with_process(&s3, process_fn("P3", |_: &mut u32| Ok(())));
        action.build_exits();

        assert_eq!(action.exits().len(), 2);
        let to_s3 = action
            .exits()
            .iter()
            .find(|e| e.arrival() == Some(&s3))
            .unwrap();
        assert_eq!(to_s3.departure(), action.choice_pseudo_status());
        assert_eq!(to_s3.processes()[0].name(), "P3");

        let to_s2 = action
            .exits()
            .iter()
            .find(|e| e.arrival() == Some(&s2))
            .unwrap();
        assert!(to_s2.processes().is_empty());
    }
}
