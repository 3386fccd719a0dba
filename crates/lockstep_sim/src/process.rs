//! Process behaviours and the I/O handle they run against.
//!
//! A [`Reactive`] process is combinational logic evaluated once per cycle.
//! A [`Driven`] process is a resumable state machine: every call to
//! [`Driven::resume`] runs one segment and says whether to wait for the next
//! commit or stop. Both see the world only through [`ProcessIo`], which reads
//! committed values and stages writes into a private [`WriteBuffer`].

use std::collections::BTreeMap;
use std::collections::VecDeque;

use lockstep_common::{SignalType, Value, ValueError};
use lockstep_ir::{Design, ProcessDecl, ProcessId, SignalId};

use crate::error::SimError;
use crate::store::{SignalStore, StoreError};

/// What a driven process wants after one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Wait for the next commit, then resume.
    Suspend,
    /// Done; writes staged in this segment still commit.
    Finished,
}

/// Combinational logic: a pure function of committed inputs.
pub trait Reactive: Send + Sync {
    /// Reads committed inputs and stages zero or more writes.
    ///
    /// Outputs that are not written keep their committed value.
    fn evaluate(&self, io: &mut ProcessIo<'_>) -> Result<(), SimError>;
}

/// Sequential logic that suspends at clock boundaries.
pub trait Driven: Send {
    /// Runs the segment up to the next suspension point.
    fn resume(&mut self, io: &mut ProcessIo<'_>) -> Result<Step, SimError>;
}

/// Adapter returned by [`reactive_fn`].
pub struct ReactiveFn<F>(F);

impl<F> Reactive for ReactiveFn<F>
where
    F: Fn(&mut ProcessIo<'_>) -> Result<(), SimError> + Send + Sync,
{
    fn evaluate(&self, io: &mut ProcessIo<'_>) -> Result<(), SimError> {
        (self.0)(io)
    }
}

/// Wraps a closure as a [`Reactive`] process.
pub fn reactive_fn<F>(f: F) -> ReactiveFn<F>
where
    F: Fn(&mut ProcessIo<'_>) -> Result<(), SimError> + Send + Sync,
{
    ReactiveFn(f)
}

/// Adapter returned by [`driven_fn`].
pub struct DrivenFn<F>(F);

impl<F> Driven for DrivenFn<F>
where
    F: FnMut(&mut ProcessIo<'_>) -> Result<Step, SimError> + Send,
{
    fn resume(&mut self, io: &mut ProcessIo<'_>) -> Result<Step, SimError> {
        (self.0)(io)
    }
}

/// Wraps a closure as a [`Driven`] process. The closure keeps its own state
/// between calls.
pub fn driven_fn<F>(f: F) -> DrivenFn<F>
where
    F: FnMut(&mut ProcessIo<'_>) -> Result<Step, SimError> + Send,
{
    DrivenFn(f)
}

type ScriptStep = Box<dyn FnMut(&mut ProcessIo<'_>) -> Result<(), SimError> + Send>;

/// A driven process built from an ordered list of per-cycle steps.
///
/// Each resume runs the next step. The process suspends while steps remain
/// and finishes after the last one, whose writes still commit.
#[derive(Default)]
pub struct Script {
    steps: VecDeque<ScriptStep>,
}

impl Script {
    /// Creates an empty script, which finishes on its first resume.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends one cycle of work.
    pub fn step<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut ProcessIo<'_>) -> Result<(), SimError> + Send + 'static,
    {
        self.steps.push_back(Box::new(f));
        self
    }

    /// Appends `cycles` cycles that do nothing.
    pub fn idle(mut self, cycles: usize) -> Self {
        for _ in 0..cycles {
            self.steps.push_back(Box::new(idle_step));
        }
        self
    }

    /// Remaining steps.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns `true` when no steps remain.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

fn idle_step(_: &mut ProcessIo<'_>) -> Result<(), SimError> {
    Ok(())
}

impl Driven for Script {
    fn resume(&mut self, io: &mut ProcessIo<'_>) -> Result<Step, SimError> {
        if let Some(mut step) = self.steps.pop_front() {
            step(io)?;
        }
        Ok(if self.steps.is_empty() {
            Step::Finished
        } else {
            Step::Suspend
        })
    }
}

/// Writes staged by one process during one evaluation.
///
/// Repeated writes to the same signal keep only the last value.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WriteBuffer {
    writes: BTreeMap<SignalId, Value>,
}

impl WriteBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a write, replacing any earlier one to the same signal.
    pub fn stage(&mut self, signal: SignalId, value: Value) {
        self.writes.insert(signal, value);
    }

    /// Pending value for `signal`, if any.
    pub fn get(&self, signal: SignalId) -> Option<Value> {
        self.writes.get(&signal).copied()
    }

    /// Number of distinct signals written.
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Returns `true` if nothing was written.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Moves every write into the store's pending set on behalf of `writer`.
    pub fn flush_into(self, store: &mut SignalStore, writer: ProcessId) -> Result<(), StoreError> {
        for (signal, value) in self.writes {
            store.stage(signal, value, writer)?;
        }
        Ok(())
    }
}

/// The view a process gets of the simulation during one evaluation.
pub struct ProcessIo<'a> {
    id: ProcessId,
    decl: &'a ProcessDecl,
    design: &'a Design,
    store: &'a SignalStore,
    buffer: &'a mut WriteBuffer,
    cycle: u64,
}

impl<'a> ProcessIo<'a> {
    pub(crate) fn new(
        id: ProcessId,
        design: &'a Design,
        store: &'a SignalStore,
        buffer: &'a mut WriteBuffer,
        cycle: u64,
    ) -> Self {
        Self {
            id,
            decl: design.process(id),
            design,
            store,
            buffer,
            cycle,
        }
    }

    /// Index of the cycle being evaluated, starting at 0.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Name of the running process.
    pub fn process_name(&self) -> &str {
        self.design.process_name(self.id)
    }

    /// ID of the running process.
    pub fn process_id(&self) -> ProcessId {
        self.id
    }

    /// Committed value of `signal` as of the end of the previous cycle.
    ///
    /// In debug builds, reading a signal outside the declared inputs is an
    /// [`SimError::IllegalRead`].
    pub fn read(&self, signal: SignalId) -> Result<Value, SimError> {
        #[cfg(debug_assertions)]
        if !self.decl.may_read(signal) {
            return Err(SimError::IllegalRead {
                process: self.process_name().to_string(),
                signal: self.path(signal),
            });
        }
        self.store.read(signal).map_err(|e| self.store_error(e))
    }

    /// Reads a boolean signal.
    pub fn read_bool(&self, signal: SignalId) -> Result<bool, SimError> {
        let value = self.read(signal)?;
        value
            .as_bool()
            .ok_or_else(|| self.mismatch(signal, SignalType::Bool, value))
    }

    /// Reads an integer signal as `i64`.
    pub fn read_i64(&self, signal: SignalId) -> Result<i64, SimError> {
        let value = self.read(signal)?;
        value
            .as_i64()
            .ok_or_else(|| self.mismatch(signal, SignalType::Signed { width: 64 }, value))
    }

    /// Reads a non-negative integer signal as `u64`.
    pub fn read_u64(&self, signal: SignalId) -> Result<u64, SimError> {
        let value = self.read(signal)?;
        value
            .as_u64()
            .ok_or_else(|| self.mismatch(signal, SignalType::Unsigned { width: 64 }, value))
    }

    /// Returns `true` if `signal` has a committed value.
    pub fn is_initialized(&self, signal: SignalId) -> bool {
        self.store.is_initialized(signal)
    }

    /// Stages a write to `signal`, visible to everyone after the next commit.
    ///
    /// Fails with [`SimError::IllegalWrite`] if `signal` is not a declared
    /// output and with [`SimError::TypeMismatch`] if the value does not fit.
    pub fn write(&mut self, signal: SignalId, value: impl Into<Value>) -> Result<(), SimError> {
        if !self.decl.may_write(signal) {
            return Err(SimError::IllegalWrite {
                process: self.process_name().to_string(),
                signal: self.path(signal),
            });
        }
        let ty = self.design.signal_decl(signal).ty;
        let value = ty.coerce(value.into()).map_err(|source| SimError::TypeMismatch {
            signal: self.path(signal),
            source,
        })?;
        self.buffer.stage(signal, value);
        Ok(())
    }

    fn path(&self, signal: SignalId) -> String {
        if self.design.signals().contains(signal) {
            self.design.signal_path(signal)
        } else {
            signal.to_string()
        }
    }

    fn mismatch(&self, signal: SignalId, expected: SignalType, value: Value) -> SimError {
        SimError::TypeMismatch {
            signal: self.path(signal),
            source: ValueError::WrongKind { expected, value },
        }
    }

    fn store_error(&self, err: StoreError) -> SimError {
        match err {
            StoreError::Uninitialized(s) => SimError::UninitializedRead {
                signal: self.path(s),
            },
            StoreError::Undeclared(s) | StoreError::AlreadyDeclared(s) => {
                SimError::UnknownSignal(self.path(s))
            }
            StoreError::Type { signal, source } => SimError::TypeMismatch {
                signal: self.path(signal),
                source,
            },
            StoreError::Conflict {
                signal,
                first,
                second,
            } => SimError::ConflictingWrite {
                signal: self.path(signal),
                first: self.design.process_name(first).to_string(),
                second: self.design.process_name(second).to_string(),
            },
        }
    }
}
