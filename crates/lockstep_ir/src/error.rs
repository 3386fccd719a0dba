//! Errors raised while assembling a design.

use lockstep_common::ValueError;

/// A bus schema that cannot be instantiated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// The schema declares no signals.
    #[error("bus kind '{kind}' declares no signals")]
    Empty {
        /// Bus kind name.
        kind: String,
    },
    /// A signal name is empty or contains a `.`.
    #[error("bus kind '{kind}' has an invalid signal name '{signal}'")]
    InvalidName {
        /// Bus kind name.
        kind: String,
        /// Offending name.
        signal: String,
    },
    /// Two signals share a name.
    #[error("bus kind '{kind}' declares signal '{signal}' twice")]
    DuplicateSignal {
        /// Bus kind name.
        kind: String,
        /// Repeated name.
        signal: String,
    },
    /// The initial value is not admitted by the declared type.
    #[error("bus kind '{kind}', signal '{signal}': bad initial value: {source}")]
    BadInit {
        /// Bus kind name.
        kind: String,
        /// Signal name.
        signal: String,
        /// Type check failure.
        source: ValueError,
    },
    /// An integer signal's width is outside 1..=64.
    #[error("bus kind '{kind}', signal '{signal}': {source}")]
    InvalidWidth {
        /// Bus kind name.
        kind: String,
        /// Signal name.
        signal: String,
        /// Width check failure.
        source: ValueError,
    },
    /// A schema set lookup failed.
    #[error("unknown bus kind '{0}'")]
    UnknownKind(String),
}

/// A structural error while registering busses or processes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DesignError {
    /// The schema used for a bus is invalid.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// A bus instance name is already taken.
    #[error("duplicate bus name '{0}'")]
    DuplicateBus(String),
    /// A process name is already taken.
    #[error("duplicate process name '{0}'")]
    DuplicateProcess(String),
    /// A port refers to a bus this design does not contain.
    #[error("process '{process}' refers to unknown bus {bus}")]
    UnknownBus {
        /// Process being registered.
        process: String,
        /// The foreign handle, as displayed.
        bus: String,
    },
    /// A port or lookup refers to a signal this design does not contain.
    #[error("unknown signal '{0}'")]
    UnknownSignal(String),
}
