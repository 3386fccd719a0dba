//! Per-cycle record of committed signal changes.
//!
//! A [`Trace`] stores the committed values before cycle 0 and, for every
//! commit, only the signals that changed plus the digest of the resulting
//! state. Any committed value at any cycle can be reconstructed from it,
//! and it can be replayed into a [`WaveformRecorder`].

use lockstep_common::{SignalType, StateDigest, Value};
use lockstep_ir::{ArenaId, Design, SignalId};
use serde::{Deserialize, Serialize};

use crate::error::SimError;
use crate::store::SignalStore;
use crate::waveform::WaveformRecorder;

/// Static description of a traced signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceSignal {
    /// Signal handle.
    pub id: SignalId,
    /// Owning bus instance name.
    pub bus: String,
    /// Signal name within the bus.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub ty: SignalType,
}

/// Outcome of one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleRecord {
    /// Cycle index, starting at 0.
    pub cycle: u64,
    /// Signals whose committed value changed, in signal order.
    pub changes: Vec<(SignalId, Value)>,
    /// Digest of the committed state after this cycle.
    pub digest: StateDigest,
}

/// Committed signal history of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    signals: Vec<TraceSignal>,
    initial: Vec<Option<Value>>,
    cycles: Vec<CycleRecord>,
}

impl Trace {
    /// Starts a trace from the store's state before cycle 0.
    pub fn new(design: &Design, store: &SignalStore) -> Self {
        let signals = design
            .signals()
            .iter()
            .map(|(id, decl)| TraceSignal {
                id,
                bus: design.bus_name(decl.bus).to_string(),
                name: design.signal_name(id).to_string(),
                ty: decl.ty,
            })
            .collect();
        let initial = store.snapshot().values().to_vec();
        Self {
            signals,
            initial,
            cycles: Vec::new(),
        }
    }

    /// Appends the outcome of one commit.
    pub fn record(&mut self, cycle: u64, changes: Vec<(SignalId, Value)>, digest: StateDigest) {
        self.cycles.push(CycleRecord {
            cycle,
            changes,
            digest,
        });
    }

    /// Traced signals in signal order.
    pub fn signals(&self) -> &[TraceSignal] {
        &self.signals
    }

    /// Recorded commits in cycle order.
    pub fn cycles(&self) -> &[CycleRecord] {
        &self.cycles
    }

    /// Committed value of `signal` before cycle 0.
    pub fn initial_value(&self, signal: SignalId) -> Option<Value> {
        self.initial.get(signal.index()).copied().flatten()
    }

    /// Committed value of `signal` after the commit of `cycle`.
    pub fn value_after(&self, signal: SignalId, cycle: u64) -> Option<Value> {
        let mut value = self.initial_value(signal);
        for record in self.cycles.iter().take_while(|r| r.cycle <= cycle) {
            if let Some((_, v)) = record.changes.iter().find(|(s, _)| *s == signal) {
                value = Some(*v);
            }
        }
        value
    }

    /// Committed value of `signal` after each recorded cycle.
    pub fn series(&self, signal: SignalId) -> Vec<Option<Value>> {
        let mut value = self.initial_value(signal);
        self.cycles
            .iter()
            .map(|record| {
                if let Some((_, v)) = record.changes.iter().find(|(s, _)| *s == signal) {
                    value = Some(*v);
                }
                value
            })
            .collect()
    }

    /// Per-cycle state digests.
    pub fn digests(&self) -> Vec<StateDigest> {
        self.cycles.iter().map(|r| r.digest).collect()
    }

    /// Feeds the trace into `recorder`.
    ///
    /// Initial values are stamped at time 0 and the commit of cycle `n` at
    /// `(n + 1) * period_ps`.
    pub fn replay(&self, recorder: &mut dyn WaveformRecorder, period_ps: u64) -> Result<(), SimError> {
        let mut start = 0;
        while start < self.signals.len() {
            let bus = &self.signals[start].bus;
            let end = self.signals[start..]
                .iter()
                .position(|s| &s.bus != bus)
                .map_or(self.signals.len(), |n| start + n);
            recorder.begin_scope(bus)?;
            for signal in &self.signals[start..end] {
                recorder.register_signal(signal.id, &signal.name, signal.ty)?;
            }
            recorder.end_scope()?;
            start = end;
        }

        for signal in &self.signals {
            if let Some(v) = self.initial_value(signal.id) {
                recorder.record_change(0, signal.id, &v)?;
            }
        }
        for record in &self.cycles {
            let time = (record.cycle + 1).saturating_mul(period_ps);
            for (signal, value) in &record.changes {
                recorder.record_change(time, *signal, value)?;
            }
        }
        recorder.finalize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::waveform::VcdRecorder;
    use lockstep_ir::BusSchema;

    fn traced() -> (Trace, SignalId, SignalId) {
        let schema = BusSchema::new("Out")
            .signal("Valid", SignalType::Bool, Some(Value::Bool(false)))
            .signal("Data", SignalType::Signed { width: 8 }, None);
        let mut design = Design::new();
        let bus = design.add_bus("Out", &schema).unwrap();
        let valid = design.signal(bus, "Valid").unwrap();
        let data = design.signal(bus, "Data").unwrap();
        let mut store = SignalStore::new();
        for (id, decl) in design.signals().iter() {
            store.declare(id, decl.ty, decl.init).unwrap();
        }
        let mut trace = Trace::new(&design, &store);
        let d = StateDigest::from_bytes(b"x");
        trace.record(0, vec![(valid, Value::Bool(true)), (data, Value::Signed(6))], d);
        trace.record(1, vec![(valid, Value::Bool(false))], d);
        trace.record(2, vec![], d);
        (trace, valid, data)
    }

    #[test]
    fn value_after_reconstructs_latched_values() {
        let (trace, valid, data) = traced();
        assert_eq!(trace.initial_value(valid), Some(Value::Bool(false)));
        assert_eq!(trace.initial_value(data), None);
        assert_eq!(trace.value_after(valid, 0), Some(Value::Bool(true)));
        assert_eq!(trace.value_after(valid, 1), Some(Value::Bool(false)));
        assert_eq!(trace.value_after(data, 2), Some(Value::Signed(6)));
    }

    #[test]
    fn series_has_one_entry_per_cycle() {
        let (trace, _, data) = traced();
        assert_eq!(
            trace.series(data),
            vec![Some(Value::Signed(6)); 3]
        );
        assert_eq!(trace.digests().len(), 3);
    }

    #[test]
    fn replay_into_vcd() {
        let (trace, _, _) = traced();
        let mut rec = VcdRecorder::new(Vec::new());
        trace.replay(&mut rec, 10_000).unwrap();
        let out = String::from_utf8(rec.into_inner()).unwrap();
        assert_eq!(out.matches("$scope module Out $end").count(), 1);
        assert!(out.contains("#0\n0!\n"));
        assert!(out.contains("#10000\n1!\nb00000110 \"\n"));
        assert!(out.contains("#20000\n0!\n"));
        assert!(!out.contains("#30000"));
    }

    #[test]
    fn serde_roundtrip() {
        let (trace, _, _) = traced();
        let json = serde_json::to_string(&trace).unwrap();
        let back: Trace = serde_json::from_str(&json).unwrap();
        assert_eq!(back, trace);
    }
}
