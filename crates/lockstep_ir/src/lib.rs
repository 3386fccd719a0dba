//! Static structure of a simulated circuit.
//!
//! A [`Design`] owns every bus, signal declaration, and process declaration
//! in ID-indexed arenas. Processes refer to signals only through
//! [`SignalId`] handles, never to values, so nothing here holds runtime state.

#![warn(missing_docs)]

pub mod arena;
pub mod bus;
pub mod design;
pub mod error;
pub mod ids;
pub mod process;
pub mod schema;

pub use arena::{Arena, ArenaId};
pub use bus::{Bus, SignalDecl};
pub use design::Design;
pub use error::{DesignError, SchemaError};
pub use ids::{BusId, ProcessId, SignalId};
pub use process::{Access, Ports, ProcessDecl, ProcessKind};
pub use schema::{BusSchema, SchemaSet, SignalSpec};
