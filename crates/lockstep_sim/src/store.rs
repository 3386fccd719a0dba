//! The signal store: committed and pending values of every signal.
//!
//! Reads always return the last committed value. Writes are staged and only
//! become visible when [`SignalStore::commit`] runs, which takes `&mut self`
//! and therefore cannot interleave with any read.

use lockstep_common::{DigestBuilder, SignalType, StateDigest, Value, ValueError};
use lockstep_ir::{ArenaId, ProcessId, SignalId};
use serde::{Deserialize, Serialize};

/// Low-level store failures, reported in terms of IDs.
///
/// [`ProcessIo`](crate::process::ProcessIo) and the scheduler translate these
/// into [`SimError`](crate::SimError)s carrying human-readable names.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// `declare` was called twice for the same signal.
    #[error("signal {0} declared twice")]
    AlreadyDeclared(SignalId),
    /// The signal was never declared.
    #[error("signal {0} is not declared")]
    Undeclared(SignalId),
    /// No commit has produced a value yet and there is no initial value.
    #[error("signal {0} is uninitialized")]
    Uninitialized(SignalId),
    /// Another process already staged a write to this signal this cycle.
    #[error("signal {signal} staged by {first} and {second}")]
    Conflict {
        /// Contested signal.
        signal: SignalId,
        /// Writer holding the pending slot.
        first: ProcessId,
        /// Rejected writer.
        second: ProcessId,
    },
    /// The value does not fit the declared type.
    #[error("signal {signal}: {source}")]
    Type {
        /// Target signal.
        signal: SignalId,
        /// The failed check.
        source: ValueError,
    },
}

#[derive(Debug, Clone)]
struct Slot {
    ty: SignalType,
    committed: Option<Value>,
    pending: Option<(Value, ProcessId)>,
}

/// Committed and pending state of every declared signal.
#[derive(Debug, Default)]
pub struct SignalStore {
    slots: Vec<Option<Slot>>,
    staged: Vec<SignalId>,
    declared: usize,
}

impl SignalStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `signal` with its type and optional initial value.
    ///
    /// The initial value, when given, is the committed value before cycle 0.
    pub fn declare(
        &mut self,
        signal: SignalId,
        ty: SignalType,
        initial: Option<Value>,
    ) -> Result<(), StoreError> {
        let index = signal.index();
        if index >= self.slots.len() {
            self.slots.resize(index + 1, None);
        }
        if self.slots[index].is_some() {
            return Err(StoreError::AlreadyDeclared(signal));
        }
        let committed = initial
            .map(|v| ty.coerce(v))
            .transpose()
            .map_err(|source| StoreError::Type { signal, source })?;
        self.slots[index] = Some(Slot {
            ty,
            committed,
            pending: None,
        });
        self.declared += 1;
        Ok(())
    }

    fn slot(&self, signal: SignalId) -> Result<&Slot, StoreError> {
        self.slots
            .get(signal.index())
            .and_then(Option::as_ref)
            .ok_or(StoreError::Undeclared(signal))
    }

    /// Returns the last committed value of `signal`.
    pub fn read(&self, signal: SignalId) -> Result<Value, StoreError> {
        self.slot(signal)?
            .committed
            .ok_or(StoreError::Uninitialized(signal))
    }

    /// Returns `true` if `signal` has a committed value.
    pub fn is_initialized(&self, signal: SignalId) -> bool {
        self.slot(signal).is_ok_and(|s| s.committed.is_some())
    }

    /// Declared type of `signal`.
    pub fn signal_type(&self, signal: SignalId) -> Option<SignalType> {
        self.slot(signal).ok().map(|s| s.ty)
    }

    /// Records a pending write of `value` to `signal` on behalf of `writer`.
    ///
    /// A second write by the same writer replaces the first. A write by a
    /// different writer in the same cycle is rejected.
    pub fn stage(
        &mut self,
        signal: SignalId,
        value: Value,
        writer: ProcessId,
    ) -> Result<(), StoreError> {
        let slot = self
            .slots
            .get_mut(signal.index())
            .and_then(Option::as_mut)
            .ok_or(StoreError::Undeclared(signal))?;
        let value = slot
            .ty
            .coerce(value)
            .map_err(|source| StoreError::Type { signal, source })?;
        match slot.pending {
            Some((_, first)) if first != writer => {
                return Err(StoreError::Conflict {
                    signal,
                    first,
                    second: writer,
                })
            }
            Some(_) => {}
            None => self.staged.push(signal),
        }
        slot.pending = Some((value, writer));
        Ok(())
    }

    /// Number of signals with a pending write.
    pub fn pending_len(&self) -> usize {
        self.staged.len()
    }

    /// Applies every pending write and clears the pending set.
    ///
    /// Signals without a pending write keep their committed value. Returns
    /// the signals whose committed value changed, in signal order.
    pub fn commit(&mut self) -> Vec<(SignalId, Value)> {
        let mut staged = std::mem::take(&mut self.staged);
        staged.sort_unstable();
        let mut changes = Vec::with_capacity(staged.len());
        for signal in staged {
            let Some(slot) = self.slots.get_mut(signal.index()).and_then(Option::as_mut) else {
                continue;
            };
            if let Some((value, _)) = slot.pending.take() {
                if slot.committed != Some(value) {
                    changes.push((signal, value));
                }
                slot.committed = Some(value);
            }
        }
        changes
    }

    /// Drops every pending write, leaving committed state untouched.
    pub fn discard_pending(&mut self) {
        for signal in std::mem::take(&mut self.staged) {
            if let Some(slot) = self.slots.get_mut(signal.index()).and_then(Option::as_mut) {
                slot.pending = None;
            }
        }
    }

    /// Owned copy of every committed value, indexed by signal.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            values: self
                .slots
                .iter()
                .map(|s| s.as_ref().and_then(|s| s.committed))
                .collect(),
        }
    }

    /// Digest of the committed state.
    ///
    /// Two stores with the same declared signals and the same committed
    /// values produce the same digest.
    pub fn digest(&self) -> StateDigest {
        let mut builder = DigestBuilder::new();
        for (index, slot) in self.slots.iter().enumerate() {
            let Some(slot) = slot else { continue };
            builder.update_u64(index as u64);
            match slot.committed {
                Some(v) => builder.update(&v.digest_bytes()),
                None => builder.update(&[0xff]),
            }
        }
        builder.finish()
    }

    /// Number of declared signals.
    pub fn len(&self) -> usize {
        self.declared
    }

    /// Returns `true` if no signal has been declared.
    pub fn is_empty(&self) -> bool {
        self.declared == 0
    }
}

/// Committed values at one point in time, indexed by signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    values: Vec<Option<Value>>,
}

impl Snapshot {
    /// Committed value of `signal`, or `None` if uninitialized or unknown.
    pub fn get(&self, signal: SignalId) -> Option<Value> {
        self.values.get(signal.index()).copied().flatten()
    }

    /// All values in signal order.
    pub fn values(&self) -> &[Option<Value>] {
        &self.values
    }
}
