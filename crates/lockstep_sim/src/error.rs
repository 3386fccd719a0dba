//! Errors raised while building or running a simulation.
//!
//! Build-time variants abort before any cycle runs. Run-time variants abort
//! the current run; the driver wraps them with the failing process and cycle
//! in [`RunStatus::Error`](crate::driver::RunStatus::Error).

use std::io;

use lockstep_common::ValueError;
use lockstep_ir::{DesignError, SchemaError};

/// Errors that can occur during simulation setup or execution.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// Reactive processes form a combinational loop.
    #[error("reactive dependency cycle among processes: {}", .processes.join(", "))]
    StructuralCycle {
        /// Names of the processes in the offending strongly connected set.
        processes: Vec<String>,
    },

    /// A signal was read before its first commit and has no initial value.
    #[error("read of uninitialized signal '{signal}'")]
    UninitializedRead {
        /// `Bus.Signal` path.
        signal: String,
    },

    /// A process staged a write to a signal outside its declared outputs.
    #[error("process '{process}' wrote undeclared output '{signal}'")]
    IllegalWrite {
        /// Writing process.
        process: String,
        /// `Bus.Signal` path.
        signal: String,
    },

    /// A process read a signal outside its declared inputs.
    #[error("process '{process}' read undeclared input '{signal}'")]
    IllegalRead {
        /// Reading process.
        process: String,
        /// `Bus.Signal` path.
        signal: String,
    },

    /// Two processes write the same signal.
    #[error("signal '{signal}' is written by both '{first}' and '{second}'")]
    ConflictingWrite {
        /// `Bus.Signal` path.
        signal: String,
        /// Process registered (or staged) first.
        first: String,
        /// Process registered (or staged) second.
        second: String,
    },

    /// A value does not fit the signal's declared type.
    #[error("type mismatch on '{signal}': {source}")]
    TypeMismatch {
        /// `Bus.Signal` path.
        signal: String,
        /// The failed check.
        source: ValueError,
    },

    /// A process's own logic reported an error.
    #[error("process fault: {0}")]
    ProcessFault(String),

    /// A name or handle does not refer to a signal of this design.
    #[error("unknown signal '{0}'")]
    UnknownSignal(String),

    /// A port refers to a bus of another design.
    #[error("process '{process}' refers to unknown bus {bus}")]
    UnknownBus {
        /// Process being registered.
        process: String,
        /// The foreign handle, as displayed.
        bus: String,
    },

    /// Two busses share an instance name.
    #[error("duplicate bus name '{0}'")]
    DuplicateBus(String),

    /// Two processes share a name.
    #[error("duplicate process name '{0}'")]
    DuplicateProcess(String),

    /// A bus schema is invalid.
    #[error("invalid bus schema: {0}")]
    Schema(#[from] SchemaError),

    /// An I/O error occurred while writing waveform data.
    #[error("waveform I/O error: {0}")]
    WaveformIo(#[from] io::Error),
}

impl SimError {
    /// Creates a [`SimError::ProcessFault`] from a message.
    pub fn fault(message: impl Into<String>) -> Self {
        SimError::ProcessFault(message.into())
    }

    /// Returns `true` for errors that can only be raised while building.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            SimError::StructuralCycle { .. }
                | SimError::UnknownBus { .. }
                | SimError::DuplicateBus(_)
                | SimError::DuplicateProcess(_)
                | SimError::Schema(_)
        )
    }
}

impl From<DesignError> for SimError {
    fn from(err: DesignError) -> Self {
        match err {
            DesignError::Schema(e) => SimError::Schema(e),
            DesignError::DuplicateBus(name) => SimError::DuplicateBus(name),
            DesignError::DuplicateProcess(name) => SimError::DuplicateProcess(name),
            DesignError::UnknownBus { process, bus } => SimError::UnknownBus { process, bus },
            DesignError::UnknownSignal(name) => SimError::UnknownSignal(name),
        }
    }
}
