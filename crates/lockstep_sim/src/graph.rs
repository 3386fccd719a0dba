//! Dependency graph over processes and the schedule derived from it.
//!
//! An edge A→B exists when a signal written by A is read by B. Signal
//! ownership is checked first (one writer per signal), then the reactive
//! subgraph is checked for combinational loops, and finally the reactive
//! processes are grouped into topological levels.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use lockstep_ir::{ArenaId, Design, ProcessId, ProcessKind, SignalId};
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use crate::error::SimError;

/// How processes within one topological level are ordered.
///
/// Any choice yields the same committed state; the options exist so that
/// this can be checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TieBreak {
    /// Registration order.
    #[default]
    Declaration,
    /// Reverse registration order.
    Reverse,
    /// Pseudo-random permutation from the given seed.
    Seeded(u64),
}

impl fmt::Display for TieBreak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TieBreak::Declaration => write!(f, "declaration"),
            TieBreak::Reverse => write!(f, "reverse"),
            TieBreak::Seeded(seed) => write!(f, "seed {seed}"),
        }
    }
}

/// Process graph with one node per process, indexed by process ID.
#[derive(Debug)]
pub struct DependencyGraph {
    graph: DiGraph<ProcessId, ()>,
}

impl DependencyGraph {
    /// Builds the graph, rejecting signals with more than one writer.
    pub fn build(design: &Design) -> Result<Self, SimError> {
        let owners = signal_owners(design)?;

        let mut graph = DiGraph::with_capacity(design.processes().len(), 0);
        for id in design.processes().ids() {
            graph.add_node(id);
        }

        for (consumer, decl) in design.processes().iter() {
            let producers: BTreeSet<ProcessId> = decl
                .inputs
                .iter()
                .filter_map(|s| owners.get(s).copied())
                .filter(|&p| p != consumer)
                .collect();
            for producer in producers {
                graph.add_edge(node(producer), node(consumer), ());
            }
        }
        Ok(Self { graph })
    }

    /// Every edge as `(producer, consumer)`, ordered by producer then consumer.
    pub fn edges(&self) -> Vec<(ProcessId, ProcessId)> {
        let mut edges: Vec<_> = self
            .graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
            .map(|(a, b)| (self.graph[a], self.graph[b]))
            .collect();
        edges.sort_unstable();
        edges
    }

    /// Processes whose outputs `process` reads.
    pub fn producers(&self, process: ProcessId) -> Vec<ProcessId> {
        let mut out: Vec<_> = self
            .graph
            .neighbors_directed(node(process), Direction::Incoming)
            .map(|n| self.graph[n])
            .collect();
        out.sort_unstable();
        out
    }

    /// Checks for reactive loops and groups reactive processes into levels.
    pub fn schedule(&self, design: &Design, tie_break: TieBreak) -> Result<Schedule, SimError> {
        let is_reactive = |p: ProcessId| design.process(p).kind == ProcessKind::Reactive;

        // Subgraph of reactive processes only: driven processes see committed
        // state and cannot close a same-cycle loop.
        let mut sub: DiGraph<ProcessId, ()> = DiGraph::new();
        let mut sub_index = HashMap::new();
        for p in design.processes().ids().filter(|&p| is_reactive(p)) {
            sub_index.insert(p, sub.add_node(p));
        }
        for (a, b) in self.edges() {
            if let (Some(&na), Some(&nb)) = (sub_index.get(&a), sub_index.get(&b)) {
                sub.add_edge(na, nb, ());
            }
        }

        if let Some(scc) = first_loop(&sub) {
            let processes = scc
                .into_iter()
                .map(|p| design.process_name(p).to_string())
                .collect();
            return Err(SimError::StructuralCycle { processes });
        }

        let order = toposort(&sub, None).map_err(|cycle| SimError::StructuralCycle {
            processes: vec![design.process_name(sub[cycle.node_id()]).to_string()],
        })?;

        let mut level_of: HashMap<NodeIndex, usize> = HashMap::new();
        let mut levels: Vec<Vec<ProcessId>> = Vec::new();
        for n in order {
            let level = sub
                .neighbors_directed(n, Direction::Incoming)
                .filter_map(|pred| level_of.get(&pred))
                .map(|l| l + 1)
                .max()
                .unwrap_or(0);
            level_of.insert(n, level);
            if levels.len() <= level {
                levels.resize_with(level + 1, Vec::new);
            }
            levels[level].push(sub[n]);
        }
        for level in &mut levels {
            level.sort_unstable();
        }
        apply_tie_break(&mut levels, tie_break);

        let driven = design
            .processes()
            .iter()
            .filter(|(_, d)| d.kind == ProcessKind::Driven)
            .map(|(id, _)| id)
            .collect::<Vec<_>>();

        let schedule = Schedule {
            levels,
            driven,
            edges: self.edges(),
            tie_break,
        };
        debug!(
            levels = schedule.levels.len(),
            reactive = schedule.reactive_count(),
            driven = schedule.driven.len(),
            edges = schedule.edges.len(),
            %tie_break,
            "schedule built"
        );
        Ok(schedule)
    }
}

fn node(p: ProcessId) -> NodeIndex {
    NodeIndex::new(p.index())
}

/// Maps every output signal to its single writer.
fn signal_owners(design: &Design) -> Result<HashMap<SignalId, ProcessId>, SimError> {
    let mut owners: HashMap<SignalId, ProcessId> = HashMap::new();
    for (id, decl) in design.processes().iter() {
        for &signal in &decl.outputs {
            if let Some(&first) = owners.get(&signal) {
                return Err(SimError::ConflictingWrite {
                    signal: design.signal_path(signal),
                    first: design.process_name(first).to_string(),
                    second: design.process_name(id).to_string(),
                });
            }
            owners.insert(signal, id);
        }
    }
    Ok(owners)
}

/// Returns the members of the lowest-numbered strongly connected set with
/// two or more processes, sorted by ID.
fn first_loop(graph: &DiGraph<ProcessId, ()>) -> Option<Vec<ProcessId>> {
    tarjan_scc(graph)
        .into_iter()
        .filter(|scc| scc.len() > 1)
        .map(|scc| {
            let mut members: Vec<ProcessId> = scc.into_iter().map(|n| graph[n]).collect();
            members.sort_unstable();
            members
        })
        .min()
}

fn apply_tie_break(levels: &mut [Vec<ProcessId>], tie_break: TieBreak) {
    match tie_break {
        TieBreak::Declaration => {}
        TieBreak::Reverse => levels.iter_mut().for_each(|l| l.reverse()),
        TieBreak::Seeded(seed) => {
            let mut rng = StdRng::seed_from_u64(seed);
            for level in levels.iter_mut() {
                level.shuffle(&mut rng);
            }
        }
    }
}

/// The realized execution order for every cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    levels: Vec<Vec<ProcessId>>,
    driven: Vec<ProcessId>,
    edges: Vec<(ProcessId, ProcessId)>,
    tie_break: TieBreak,
}

impl Schedule {
    /// Reactive processes grouped by level. Every process's reactive
    /// producers sit in an earlier level.
    pub fn levels(&self) -> &[Vec<ProcessId>] {
        &self.levels
    }

    /// Driven processes in registration order.
    pub fn driven(&self) -> &[ProcessId] {
        &self.driven
    }

    /// Dependency edges as `(producer, consumer)`.
    pub fn edges(&self) -> &[(ProcessId, ProcessId)] {
        &self.edges
    }

    /// Flattened reactive order.
    pub fn reactive_order(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.levels.iter().flatten().copied()
    }

    /// Number of reactive processes.
    pub fn reactive_count(&self) -> usize {
        self.levels.iter().map(Vec::len).sum()
    }

    /// Tie-break used within levels.
    pub fn tie_break(&self) -> TieBreak {
        self.tie_break
    }
}

/// Builds the dependency graph of `design` and derives its schedule.
pub fn build_schedule(design: &Design, tie_break: TieBreak) -> Result<Schedule, SimError> {
    DependencyGraph::build(design)?.schedule(design, tie_break)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lockstep_common::SignalType;
    use lockstep_ir::{BusId, BusSchema, Ports};

    fn wire() -> BusSchema {
        BusSchema::new("Wire").signal("V", SignalType::Signed { width: 32 }, None)
    }

    fn design_with_buses(n: usize) -> (Design, Vec<BusId>) {
        let mut design = Design::new();
        let buses = (0..n)
            .map(|i| design.add_bus(&format!("w{i}"), &wire()).unwrap())
            .collect();
        (design, buses)
    }

    fn reactive(design: &mut Design, name: &str, ports: Ports) -> ProcessId {
        design
            .add_process(name, ProcessKind::Reactive, &ports)
            .unwrap()
    }

    #[test]
    fn chain_levels_follow_dependencies() {
        let (mut d, w) = design_with_buses(3);
        // declared consumer-first to make sure order comes from the graph
        let c = reactive(&mut d, "c", Ports::new().reads(w[1]).writes(w[2]));
        let b = reactive(&mut d, "b", Ports::new().reads(w[0]).writes(w[1]));
        let a = reactive(&mut d, "a", Ports::new().writes(w[0]));
        let schedule = build_schedule(&d, TieBreak::Declaration).unwrap();
        assert_eq!(schedule.levels(), &[vec![a], vec![b], vec![c]]);
        assert_eq!(schedule.edges(), &[(b, c), (a, b)]);
    }

    #[test]
    fn independent_processes_share_a_level() {
        let (mut d, w) = design_with_buses(3);
        let a = reactive(&mut d, "a", Ports::new().writes(w[0]));
        let b = reactive(&mut d, "b", Ports::new().writes(w[1]));
        let c = reactive(&mut d, "c", Ports::new().reads(w[0]).reads(w[1]).writes(w[2]));
        let schedule = build_schedule(&d, TieBreak::Declaration).unwrap();
        assert_eq!(schedule.levels(), &[vec![a, b], vec![c]]);
        assert_eq!(schedule.reactive_count(), 3);

        let reversed = build_schedule(&d, TieBreak::Reverse).unwrap();
        assert_eq!(reversed.levels(), &[vec![b, a], vec![c]]);
    }

    #[test]
    fn seeded_tie_break_is_reproducible_permutation() {
        let (mut d, w) = design_with_buses(8);
        let ids: Vec<_> = (0..8)
            .map(|i| reactive(&mut d, &format!("p{i}"), Ports::new().writes(w[i])))
            .collect();
        let first = build_schedule(&d, TieBreak::Seeded(7)).unwrap();
        let second = build_schedule(&d, TieBreak::Seeded(7)).unwrap();
        assert_eq!(first, second);
        let mut level = first.levels()[0].clone();
        level.sort_unstable();
        assert_eq!(level, ids);
    }

    #[test]
    fn overlapping_outputs_conflict() {
        let (mut d, w) = design_with_buses(1);
        reactive(&mut d, "first", Ports::new().writes(w[0]));
        reactive(&mut d, "second", Ports::new().writes(w[0]));
        let err = build_schedule(&d, TieBreak::Declaration).unwrap_err();
        assert_eq!(
            err.to_string(),
            "signal 'w0.V' is written by both 'first' and 'second'"
        );
    }

    #[test]
    fn disjoint_signals_on_one_bus_are_fine() {
        let schema = BusSchema::new("Pair")
            .signal("X", SignalType::Bool, None)
            .signal("Y", SignalType::Bool, None);
        let mut d = Design::new();
        let bus = d.add_bus("p", &schema).unwrap();
        let x = d.signal(bus, "X").unwrap();
        let y = d.signal(bus, "Y").unwrap();
        reactive(&mut d, "wx", Ports::new().writes_signal(x));
        reactive(&mut d, "wy", Ports::new().writes_signal(y));
        assert!(build_schedule(&d, TieBreak::Declaration).is_ok());
    }

    #[test]
    fn reactive_loop_rejected_with_members() {
        let (mut d, w) = design_with_buses(3);
        reactive(&mut d, "src", Ports::new().writes(w[2]));
        reactive(&mut d, "ping", Ports::new().reads(w[1]).reads(w[2]).writes(w[0]));
        reactive(&mut d, "pong", Ports::new().reads(w[0]).writes(w[1]));
        let err = build_schedule(&d, TieBreak::Declaration).unwrap_err();
        match err {
            SimError::StructuralCycle { processes } => {
                assert_eq!(processes, vec!["ping".to_string(), "pong".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn self_feedback_is_not_a_loop() {
        let (mut d, w) = design_with_buses(1);
        let counter = reactive(&mut d, "counter", Ports::new().reads(w[0]).writes(w[0]));
        let schedule = build_schedule(&d, TieBreak::Declaration).unwrap();
        assert_eq!(schedule.levels(), &[vec![counter]]);
        assert!(schedule.edges().is_empty());
    }

    #[test]
    fn loops_through_driven_processes_are_allowed() {
        let (mut d, w) = design_with_buses(2);
        let tb = d
            .add_process("tb", ProcessKind::Driven, &Ports::new().reads(w[1]).writes(w[0]))
            .unwrap();
        let dut = reactive(&mut d, "dut", Ports::new().reads(w[0]).writes(w[1]));
        let graph = DependencyGraph::build(&d).unwrap();
        assert_eq!(graph.producers(dut), vec![tb]);
        assert_eq!(graph.producers(tb), vec![dut]);
        let schedule = graph.schedule(&d, TieBreak::Declaration).unwrap();
        assert_eq!(schedule.levels(), &[vec![dut]]);
        assert_eq!(schedule.driven(), &[tb]);
    }

    #[test]
    fn tie_break_display() {
        assert_eq!(TieBreak::Seeded(3).to_string(), "seed 3");
        assert_eq!(TieBreak::default(), TieBreak::Declaration);
    }
}
