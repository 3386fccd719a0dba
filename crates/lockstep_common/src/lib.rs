//! Shared foundational types used across the Lockstep simulation kernel.
//!
//! This crate provides interned names, state digests, clock frequencies,
//! and the typed value model carried by every bus signal.

#![warn(missing_docs)]

pub mod frequency;
pub mod hash;
pub mod ident;
pub mod value;

pub use frequency::{Frequency, ParseFrequencyError};
pub use hash::{DigestBuilder, StateDigest};
pub use ident::{Ident, Interner};
pub use value::{ParseTypeError, SignalType, Value, ValueError};
