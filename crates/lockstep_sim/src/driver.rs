//! The simulation driver: repeats cycles until the run has an outcome.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use lockstep_common::{StateDigest, Value};
use lockstep_ir::{Design, SignalId};
use serde::{Serialize, Serializer};
use tracing::{debug, error, info, instrument, warn};

use crate::error::SimError;
use crate::graph::Schedule;
use crate::scheduler::{CycleError, Phase, Scheduler};
use crate::store::SignalStore;
use crate::trace::Trace;
use crate::SimConfig;

/// Shared flag that stops a run after the current commit.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Creates a token that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Takes effect at the next cycle boundary.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Returns `true` once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Final outcome of a run.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunStatus {
    /// Every driven process finished, or a free-running design used up its
    /// cycle budget.
    Success,
    /// A process failed.
    Error {
        /// Failing process.
        process: String,
        /// Cycle in which it failed.
        cycle: u64,
        /// What went wrong.
        #[serde(serialize_with = "serialize_display")]
        cause: SimError,
    },
    /// The cycle budget ran out with driven processes still suspended.
    Deadlock {
        /// Names of the unfinished driven processes.
        suspended: Vec<String>,
        /// Cycles completed when the budget ran out.
        cycle: u64,
    },
    /// Cancelled through a [`CancelToken`].
    Aborted {
        /// Cycles completed before stopping.
        cycle: u64,
    },
}

fn serialize_display<S: Serializer>(err: &SimError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(err)
}

impl RunStatus {
    /// Returns `true` for [`RunStatus::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, RunStatus::Success)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::Error {
                process,
                cycle,
                cause,
            } => write!(f, "error in process '{process}' at cycle {cycle}: {cause}"),
            RunStatus::Deadlock { suspended, cycle } => write!(
                f,
                "deadlock after {cycle} cycles; still suspended: {}",
                suspended.join(", ")
            ),
            RunStatus::Aborted { cycle } => write!(f, "aborted after {cycle} cycles"),
        }
    }
}

/// Everything a finished run reports.
#[derive(Debug, Serialize)]
pub struct RunReport {
    /// Outcome.
    pub status: RunStatus,
    /// Number of committed cycles.
    pub cycles: u64,
    /// Digest of the final committed state.
    pub digest: StateDigest,
    /// Committed value history, when tracing was enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Trace>,
}

/// Result of advancing the simulation by one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// The run can continue.
    Continued,
    /// The run has an outcome; see [`Simulation::status`].
    Done,
}

/// One simulation run: design, committed state, schedule, and cycle counter.
///
/// Built by [`SimulationBuilder::build`](crate::builder::SimulationBuilder::build).
pub struct Simulation {
    design: Design,
    store: SignalStore,
    scheduler: Scheduler,
    cycle: u64,
    max_cycles: u64,
    trace: Option<Trace>,
    cancel: CancelToken,
    status: Option<RunStatus>,
}

impl Simulation {
    pub(crate) fn new(
        design: Design,
        store: SignalStore,
        scheduler: Scheduler,
        config: &SimConfig,
    ) -> Self {
        let trace = (config.record_trace || config.waveform_path.is_some())
            .then(|| Trace::new(&design, &store));
        Self {
            design,
            store,
            scheduler,
            cycle: 0,
            max_cycles: config.max_cycles,
            trace,
            cancel: CancelToken::new(),
            status: None,
        }
    }

    /// Number of committed cycles; also the index of the next cycle.
    pub fn cycles_completed(&self) -> u64 {
        self.cycle
    }

    /// Cycle budget.
    pub fn max_cycles(&self) -> u64 {
        self.max_cycles
    }

    /// The design being simulated.
    pub fn design(&self) -> &Design {
        &self.design
    }

    /// The realized schedule.
    pub fn schedule(&self) -> &Schedule {
        self.scheduler.schedule()
    }

    /// Scheduler phase.
    pub fn phase(&self) -> Phase {
        self.scheduler.phase()
    }

    /// Committed state, read-only.
    pub fn store(&self) -> &SignalStore {
        &self.store
    }

    /// Committed value of `signal`, or `None` while uninitialized.
    pub fn peek(&self, signal: SignalId) -> Option<Value> {
        self.store.read(signal).ok()
    }

    /// Committed value of the signal at `"Bus.Signal"`.
    pub fn value(&self, path: &str) -> Result<Option<Value>, SimError> {
        let signal = self
            .design
            .find_signal(path)
            .ok_or_else(|| SimError::UnknownSignal(path.to_string()))?;
        Ok(self.peek(signal))
    }

    /// Digest of the committed state.
    pub fn digest(&self) -> StateDigest {
        self.store.digest()
    }

    /// Token that aborts this run at the next cycle boundary.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Recorded history, if tracing is enabled.
    pub fn trace(&self) -> Option<&Trace> {
        self.trace.as_ref()
    }

    /// Outcome, once the run is over.
    pub fn status(&self) -> Option<&RunStatus> {
        self.status.as_ref()
    }

    /// Returns `true` once the run has an outcome.
    pub fn is_done(&self) -> bool {
        self.status.is_some()
    }

    /// Names of driven processes that have not finished.
    pub fn suspended(&self) -> Vec<String> {
        self.scheduler
            .suspended()
            .map(|p| self.design.process_name(p).to_string())
            .collect()
    }

    /// Runs one cycle, or decides the outcome if the run cannot continue.
    pub fn step(&mut self) -> StepResult {
        if self.status.is_some() {
            return StepResult::Done;
        }
        if self.cancel.is_cancelled() {
            return self.finish(RunStatus::Aborted { cycle: self.cycle });
        }
        if self.cycle >= self.max_cycles {
            let status = self.budget_status();
            return self.finish(status);
        }

        let cycle = self.cycle;
        match self.scheduler.run_cycle(&self.design, &mut self.store, cycle) {
            Ok(changes) => {
                if let Some(trace) = &mut self.trace {
                    trace.record(cycle, changes, self.store.digest());
                }
            }
            Err(CycleError { process, cause }) => {
                let process = self.design.process_name(process).to_string();
                error!(cycle, %process, %cause, "process failed");
                return self.finish(RunStatus::Error {
                    process,
                    cycle,
                    cause,
                });
            }
        }
        self.cycle += 1;

        if self.scheduler.driven_count() > 0 && self.scheduler.all_finished() {
            return self.finish(RunStatus::Success);
        }
        if self.cancel.is_cancelled() {
            return self.finish(RunStatus::Aborted { cycle: self.cycle });
        }
        if self.cycle >= self.max_cycles {
            let status = self.budget_status();
            return self.finish(status);
        }
        StepResult::Continued
    }

    fn budget_status(&self) -> RunStatus {
        if self.scheduler.driven_count() == 0 {
            RunStatus::Success
        } else {
            RunStatus::Deadlock {
                suspended: self.suspended(),
                cycle: self.cycle,
            }
        }
    }

    fn finish(&mut self, status: RunStatus) -> StepResult {
        match &status {
            RunStatus::Deadlock { suspended, cycle } => {
                warn!(cycle, ?suspended, "cycle budget exhausted")
            }
            other => debug!(cycle = self.cycle, status = %other, "run finished"),
        }
        self.status = Some(status);
        StepResult::Done
    }

    /// Steps until the run has an outcome.
    pub fn run_until_done(&mut self) {
        while self.step() == StepResult::Continued {}
    }

    /// Runs to completion and returns the report.
    #[instrument(skip(self), fields(max_cycles = self.max_cycles, parallel = self.scheduler.is_parallel()))]
    pub fn run(mut self) -> RunReport {
        info!("run started");
        self.run_until_done();
        let report = self.into_report();
        info!(cycles = report.cycles, status = %report.status, "run complete");
        report
    }

    /// Consumes the simulation and reports its outcome. A run stopped
    /// before it had one is reported as aborted.
    pub fn into_report(self) -> RunReport {
        let cycles = self.cycle;
        RunReport {
            status: self.status.unwrap_or(RunStatus::Aborted { cycle: cycles }),
            cycles,
            digest: self.store.digest(),
            trace: self.trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::SimulationBuilder;
    use crate::process::{driven_fn, reactive_fn, Step};
    use lockstep_common::SignalType;
    use lockstep_ir::{BusSchema, Ports};

    fn counter_wire() -> BusSchema {
        BusSchema::new("Wire").signal("V", SignalType::Unsigned { width: 16 }, Some(Value::Unsigned(0)))
    }

    fn config(max_cycles: u64) -> SimConfig {
        SimConfig {
            max_cycles,
            record_trace: true,
            ..SimConfig::default()
        }
    }

    /// A free-running counter with no driven processes.
    fn free_running() -> SimulationBuilder {
        let mut b = SimulationBuilder::new();
        let bus = b.add_bus("count", &counter_wire()).unwrap();
        let v = b.signal(bus, "V").unwrap();
        b.add_reactive(
            "inc",
            Ports::new().reads(bus).writes(bus),
            reactive_fn(move |io| {
                let n = io.read_u64(v)?;
                io.write(v, n + 1)
            }),
        )
        .unwrap();
        b
    }

    #[test]
    fn free_running_design_uses_whole_budget() {
        let report = free_running().build(&config(5)).unwrap().run();
        assert!(report.status.is_success());
        assert_eq!(report.cycles, 5);
        let trace = report.trace.unwrap();
        assert_eq!(trace.cycles().len(), 5);
        let v = trace.signals()[0].id;
        assert_eq!(trace.value_after(v, 4), Some(Value::Unsigned(5)));
    }

    #[test]
    fn finishes_when_driven_processes_finish() {
        let mut b = free_running();
        b.add_driven("tb", Ports::new(), {
            let mut n = 0;
            driven_fn(move |_| {
                n += 1;
                Ok(if n == 3 { Step::Finished } else { Step::Suspend })
            })
        })
        .unwrap();
        let report = b.build(&config(100)).unwrap().run();
        assert!(report.status.is_success());
        assert_eq!(report.cycles, 3);
    }

    #[test]
    fn never_finishing_process_deadlocks() {
        let mut b = free_running();
        b.add_driven("forever", Ports::new(), driven_fn(|_| Ok(Step::Suspend)))
            .unwrap();
        let report = b.build(&config(10)).unwrap().run();
        match report.status {
            RunStatus::Deadlock { suspended, cycle } => {
                assert_eq!(suspended, vec!["forever".to_string()]);
                assert_eq!(cycle, 10);
            }
            other => panic!("expected deadlock, got {other}"),
        }
    }

    #[test]
    fn process_error_reports_process_and_cycle() {
        let mut b = free_running();
        b.add_driven(
            "checker",
            Ports::new(),
            driven_fn(|io| {
                if io.cycle() == 2 {
                    Err(SimError::fault("mismatch"))
                } else {
                    Ok(Step::Suspend)
                }
            }),
        )
        .unwrap();
        let mut sim = b.build(&config(10)).unwrap();
        sim.run_until_done();
        assert_eq!(sim.cycles_completed(), 2);
        // the failing cycle left no trace in committed state
        assert_eq!(sim.value("count.V").unwrap(), Some(Value::Unsigned(2)));
        match sim.into_report().status {
            RunStatus::Error { process, cycle, cause } => {
                assert_eq!(process, "checker");
                assert_eq!(cycle, 2);
                assert_eq!(cause.to_string(), "process fault: mismatch");
            }
            other => panic!("expected error, got {other}"),
        }
    }

    #[test]
    fn cancellation_stops_after_commit() {
        let mut sim = free_running().build(&config(100)).unwrap();
        let token = sim.cancel_token();
        assert_eq!(sim.step(), StepResult::Continued);
        token.cancel();
        assert_eq!(sim.step(), StepResult::Done);
        assert_eq!(sim.cycles_completed(), 1);
        assert!(matches!(sim.status(), Some(RunStatus::Aborted { cycle: 1 })));
        assert_eq!(sim.value("count.V").unwrap(), Some(Value::Unsigned(1)));
    }

    #[test]
    fn stepping_after_done_is_a_no_op() {
        let mut sim = free_running().build(&config(1)).unwrap();
        assert_eq!(sim.step(), StepResult::Done);
        let digest = sim.digest();
        assert_eq!(sim.step(), StepResult::Done);
        assert_eq!(sim.digest(), digest);
        assert_eq!(sim.phase(), Phase::Advanced);
    }

    #[test]
    fn report_serializes_status_kind() {
        let report = free_running().build(&SimConfig { max_cycles: 2, ..SimConfig::default() }).unwrap().run();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"]["kind"], "success");
        assert_eq!(json["cycles"], 2);
        assert!(json.get("trace").is_none());
    }

    #[test]
    fn error_status_serializes_cause_as_text() {
        let status = RunStatus::Error {
            process: "p".into(),
            cycle: 4,
            cause: SimError::fault("bad"),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["kind"], "error");
        assert_eq!(json["cause"], "process fault: bad");
        assert_eq!(
            status.to_string(),
            "error in process 'p' at cycle 4: process fault: bad"
        );
    }

    #[test]
    fn unknown_path_is_an_error() {
        let sim = free_running().build(&config(1)).unwrap();
        assert!(matches!(sim.value("nope.V"), Err(SimError::UnknownSignal(_))));
    }
}
