//! One clock cycle: evaluate, resume, commit, advance.
//!
//! Every process reads the state committed at the end of the previous
//! cycle, so processes of one level never observe each other. With
//! `parallel` enabled a level is evaluated on the rayon pool; write buffers
//! are still flushed in schedule order, so the outcome is identical to a
//! sequential run.

use lockstep_common::Value;
use lockstep_ir::{ArenaId, Design, ProcessId, SignalId};
use rayon::prelude::*;
use tracing::{debug, trace};

use crate::error::SimError;
use crate::graph::Schedule;
use crate::process::{Driven, ProcessIo, Reactive, Step, WriteBuffer};
use crate::store::{SignalStore, StoreError};

/// Where the scheduler is within the current cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No cycle has started, or the last one failed.
    Idle,
    /// Reactive processes and driven segments are running.
    Evaluating,
    /// Pending writes are being applied.
    Committing,
    /// The last cycle committed and the counter moved on.
    Advanced,
}

/// Failure of one cycle, attributed to the process that caused it.
#[derive(Debug)]
pub struct CycleError {
    /// The failing process.
    pub process: ProcessId,
    /// What went wrong.
    pub cause: SimError,
}

pub(crate) struct DrivenSlot {
    id: ProcessId,
    process: Box<dyn Driven>,
    finished: bool,
}

/// Runs cycles over a fixed [`Schedule`].
pub struct Scheduler {
    schedule: Schedule,
    // indexed by process ID; `None` for driven processes
    reactive: Vec<Option<Box<dyn Reactive>>>,
    driven: Vec<DrivenSlot>,
    parallel: bool,
    phase: Phase,
}

impl Scheduler {
    pub(crate) fn new(
        schedule: Schedule,
        reactive: Vec<(ProcessId, Box<dyn Reactive>)>,
        driven: Vec<(ProcessId, Box<dyn Driven>)>,
        parallel: bool,
    ) -> Self {
        let len = reactive
            .iter()
            .map(|(id, _)| id.index() + 1)
            .max()
            .unwrap_or(0);
        let mut table: Vec<Option<Box<dyn Reactive>>> = (0..len).map(|_| None).collect();
        for (id, process) in reactive {
            table[id.index()] = Some(process);
        }

        // resume in the schedule's declaration order
        let mut driven: Vec<DrivenSlot> = driven
            .into_iter()
            .map(|(id, process)| DrivenSlot {
                id,
                process,
                finished: false,
            })
            .collect();
        driven.sort_by_key(|slot| slot.id);

        Self {
            schedule,
            reactive: table,
            driven,
            parallel,
            phase: Phase::Idle,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// The schedule being executed.
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Whether levels are evaluated in parallel.
    pub fn is_parallel(&self) -> bool {
        self.parallel
    }

    /// Driven processes that have not finished, in resume order.
    pub fn suspended(&self) -> impl Iterator<Item = ProcessId> + '_ {
        self.driven.iter().filter(|s| !s.finished).map(|s| s.id)
    }

    /// Number of driven processes, finished or not.
    pub fn driven_count(&self) -> usize {
        self.driven.len()
    }

    /// Returns `true` once every driven process has finished.
    pub fn all_finished(&self) -> bool {
        self.driven.iter().all(|s| s.finished)
    }

    /// Runs one full cycle and returns the signals whose committed value
    /// changed.
    ///
    /// On failure the store's pending writes are discarded, so committed
    /// state stays at the previous cycle.
    pub fn run_cycle(
        &mut self,
        design: &Design,
        store: &mut SignalStore,
        cycle: u64,
    ) -> Result<Vec<(SignalId, Value)>, CycleError> {
        self.phase = Phase::Evaluating;
        if let Err(err) = self.evaluate(design, store, cycle) {
            store.discard_pending();
            self.phase = Phase::Idle;
            return Err(err);
        }

        self.phase = Phase::Committing;
        let changes = store.commit();
        debug!(cycle, changed = changes.len(), "commit");

        self.phase = Phase::Advanced;
        Ok(changes)
    }

    fn evaluate(
        &mut self,
        design: &Design,
        store: &mut SignalStore,
        cycle: u64,
    ) -> Result<(), CycleError> {
        let reactive = &self.reactive;
        for level in self.schedule.levels() {
            let eval = |&id: &ProcessId| -> (ProcessId, Result<WriteBuffer, SimError>) {
                let mut buffer = WriteBuffer::new();
                let result = match reactive.get(id.index()).and_then(Option::as_ref) {
                    Some(process) => {
                        let mut io = ProcessIo::new(id, design, store, &mut buffer, cycle);
                        process.evaluate(&mut io)
                    }
                    None => Err(SimError::fault("reactive process has no behaviour")),
                };
                trace!(cycle, process = design.process_name(id), writes = buffer.len(), "evaluated");
                (id, result.map(|()| buffer))
            };

            let results: Vec<_> = if self.parallel && level.len() > 1 {
                level.par_iter().map(eval).collect()
            } else {
                level.iter().map(eval).collect()
            };

            for (id, result) in results {
                let buffer = result.map_err(|cause| CycleError { process: id, cause })?;
                flush(design, store, buffer, id)?;
            }
        }

        for slot in self.driven.iter_mut().filter(|s| !s.finished) {
            let mut buffer = WriteBuffer::new();
            let step = {
                let mut io = ProcessIo::new(slot.id, design, store, &mut buffer, cycle);
                slot.process.resume(&mut io)
            };
            let step = step.map_err(|cause| CycleError {
                process: slot.id,
                cause,
            })?;
            flush(design, store, buffer, slot.id)?;
            if step == Step::Finished {
                slot.finished = true;
                debug!(cycle, process = design.process_name(slot.id), "driven process finished");
            }
        }
        Ok(())
    }
}

fn flush(
    design: &Design,
    store: &mut SignalStore,
    buffer: WriteBuffer,
    writer: ProcessId,
) -> Result<(), CycleError> {
    buffer
        .flush_into(store, writer)
        .map_err(|err| CycleError {
            process: writer,
            cause: describe(design, err),
        })
}

fn describe(design: &Design, err: StoreError) -> SimError {
    match err {
        StoreError::Conflict {
            signal,
            first,
            second,
        } => SimError::ConflictingWrite {
            signal: design.signal_path(signal),
            first: design.process_name(first).to_string(),
            second: design.process_name(second).to_string(),
        },
        StoreError::Type { signal, source } => SimError::TypeMismatch {
            signal: design.signal_path(signal),
            source,
        },
        StoreError::Uninitialized(signal) => SimError::UninitializedRead {
            signal: design.signal_path(signal),
        },
        StoreError::Undeclared(signal) | StoreError::AlreadyDeclared(signal) => {
            SimError::UnknownSignal(signal.to_string())
        }
    }
}
