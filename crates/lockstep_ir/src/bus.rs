//! Instantiated busses and their signal declarations.

use crate::ids::{BusId, SignalId};
use lockstep_common::{Ident, SignalType, Value};
use serde::{Deserialize, Serialize};

/// A bus instance: a fixed, ordered group of signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bus {
    /// Instance name, unique within the design.
    pub name: Ident,
    /// Kind name of the schema it was built from.
    pub kind: String,
    /// Signals in schema order.
    pub signals: Vec<SignalId>,
}

/// Static description of one signal slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalDecl {
    /// Owning bus.
    pub bus: BusId,
    /// Signal name within the bus.
    pub name: Ident,
    /// Declared type.
    pub ty: SignalType,
    /// Initial committed value, already coerced to `ty`.
    pub init: Option<Value>,
}
