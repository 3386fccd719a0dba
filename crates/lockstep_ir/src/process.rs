//! Process declarations and the port sets they are registered with.

use crate::ids::{BusId, SignalId};
use lockstep_common::Ident;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// One entry of a port declaration: a whole bus or a single signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Access {
    /// Every signal of the bus.
    Bus(BusId),
    /// A single signal.
    Signal(SignalId),
}

/// Declared read and write sets of a process, before resolution.
///
/// ```ignore
/// let ports = Ports::new().reads(input).writes_signal(out_valid);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ports {
    reads: Vec<Access>,
    writes: Vec<Access>,
}

impl Ports {
    /// Empty port set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares every signal of `bus` as an input.
    pub fn reads(mut self, bus: BusId) -> Self {
        self.reads.push(Access::Bus(bus));
        self
    }

    /// Declares every signal of `bus` as an output.
    pub fn writes(mut self, bus: BusId) -> Self {
        self.writes.push(Access::Bus(bus));
        self
    }

    /// Declares a single input signal.
    pub fn reads_signal(mut self, signal: SignalId) -> Self {
        self.reads.push(Access::Signal(signal));
        self
    }

    /// Declares a single output signal.
    pub fn writes_signal(mut self, signal: SignalId) -> Self {
        self.writes.push(Access::Signal(signal));
        self
    }

    /// Input declarations in the order given.
    pub fn read_accesses(&self) -> &[Access] {
        &self.reads
    }

    /// Output declarations in the order given.
    pub fn write_accesses(&self) -> &[Access] {
        &self.writes
    }
}

/// Behavioural variant of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProcessKind {
    /// Combinational: evaluated once per cycle from committed inputs.
    Reactive,
    /// Sequential: resumed once per cycle until it finishes.
    Driven,
}

impl fmt::Display for ProcessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessKind::Reactive => write!(f, "reactive"),
            ProcessKind::Driven => write!(f, "driven"),
        }
    }
}

/// A registered process with its ports resolved to signal sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessDecl {
    /// Process name, unique within the design.
    pub name: Ident,
    /// Variant.
    pub kind: ProcessKind,
    /// Signals the process may read.
    pub inputs: BTreeSet<SignalId>,
    /// Signals the process may write.
    pub outputs: BTreeSet<SignalId>,
}

impl ProcessDecl {
    /// Returns `true` if `signal` is a declared input.
    pub fn may_read(&self, signal: SignalId) -> bool {
        self.inputs.contains(&signal)
    }

    /// Returns `true` if `signal` is a declared output.
    pub fn may_write(&self, signal: SignalId) -> bool {
        self.outputs.contains(&signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ports_keep_declaration_order() {
        let ports = Ports::new()
            .reads(BusId::from_raw(1))
            .reads_signal(SignalId::from_raw(4))
            .writes(BusId::from_raw(0));
        assert_eq!(
            ports.read_accesses(),
            &[
                Access::Bus(BusId::from_raw(1)),
                Access::Signal(SignalId::from_raw(4))
            ]
        );
        assert_eq!(ports.write_accesses(), &[Access::Bus(BusId::from_raw(0))]);
    }

    #[test]
    fn decl_membership() {
        let decl = ProcessDecl {
            name: Ident::from_raw(0),
            kind: ProcessKind::Reactive,
            inputs: [SignalId::from_raw(0)].into_iter().collect(),
            outputs: [SignalId::from_raw(1)].into_iter().collect(),
        };
        assert!(decl.may_read(SignalId::from_raw(0)));
        assert!(!decl.may_read(SignalId::from_raw(1)));
        assert!(decl.may_write(SignalId::from_raw(1)));
    }

    #[test]
    fn kind_display() {
        assert_eq!(ProcessKind::Driven.to_string(), "driven");
    }
}
