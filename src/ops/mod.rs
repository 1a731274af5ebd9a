//! Typed map, set and list operations over a guarded store connection.
//!
//! Each operation takes the connection lock once per store command and
//! decodes outside of it.

pub mod list;
pub mod map;
pub mod set;

use crate::error::Outcome;

/// Per-field results of a bulk map read.
pub type Fields<T> = Vec<(String, Outcome<T>)>;

/// A single value together with the key it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keyed<T> {
    pub key: String,
    pub value: T,
}
