//! An asynchronous, typed facade over a remote data-structure store.
//!
//! Values are stored as JSON in the store's hashes, lists and sets. Every
//! operation is dispatched as a job that takes the client's single connection
//! lock for each store command and hands its [`Outcome`] to a callback.
//! [`Channels`] adapts that callback into a result channel plus a fault
//! channel.

pub mod client;
pub mod connection;
pub mod error;
pub mod ops;
pub mod promise;
pub mod protocol;
pub mod storage;
pub mod value;

pub use client::{connect, Client, Config, Mode};
pub use error::{Fault, Outcome};
pub use ops::{Fields, Keyed};
pub use promise::{report, Channels, FaultSink, LogFaults, Promise};
