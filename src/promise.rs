//! Callback-style delivery: a result channel and a separate fault channel.
//!
//! Client operations complete with a single [`Outcome`]. [`Channels`] splits
//! that outcome in two: successful values go to a [`Promise`] and faults go to
//! a [`FaultSink`]. A bulk map read reports each undecodable field to the sink
//! and still delivers the remaining fields.

use crate::{
    error::{Fault, Outcome},
    ops::{Fields, Keyed},
};
use std::collections::{HashMap, HashSet};
use tracing::error;

/// Receives the values of completed operations.
///
/// Only the method matching the operation is called, and at most once.
pub trait Promise<T>: Send + 'static {
    fn map(&mut self, map: HashMap<String, T>) {
        let _ = map;
    }

    fn list(&mut self, list: Vec<T>) {
        let _ = list;
    }

    fn set(&mut self, set: HashSet<T>) {
        let _ = set;
    }

    fn object(&mut self, value: T, key: String) {
        let _ = (value, key);
    }
}

/// Receives every fault. Never called for an operation that succeeded.
pub trait FaultSink: Send + 'static {
    fn fault(&mut self, fault: Fault);
}

impl<F> FaultSink for F
where
    F: FnMut(Fault) + Send + 'static,
{
    fn fault(&mut self, fault: Fault) {
        self(fault)
    }
}

/// Logs faults; the sink used when the caller does not supply one.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogFaults;

impl FaultSink for LogFaults {
    fn fault(&mut self, fault: Fault) {
        error!(type_name = fault.type_name(), reason = %fault, "operation failed");
    }
}

pub struct Channels<P, K = LogFaults> {
    promise: P,
    faults: K,
}

impl<P> Channels<P> {
    pub fn new(promise: P) -> Self {
        Self {
            promise,
            faults: LogFaults,
        }
    }
}

impl<P, K: FaultSink> Channels<P, K> {
    pub fn with_faults(promise: P, faults: K) -> Self {
        Self { promise, faults }
    }

    pub fn on_map<T: 'static>(self) -> impl FnOnce(Outcome<Fields<T>>) + Send + 'static
    where
        P: Promise<T>,
    {
        let Self {
            mut promise,
            mut faults,
        } = self;

        move |outcome| match outcome {
            Ok(fields) => {
                let mut map = HashMap::with_capacity(fields.len());
                for (field, value) in fields {
                    match value {
                        Ok(value) => {
                            map.insert(field, value);
                        }
                        Err(fault) => faults.fault(fault),
                    }
                }
                promise.map(map);
            }
            Err(fault) => faults.fault(fault),
        }
    }

    pub fn on_list<T: 'static>(self) -> impl FnOnce(Outcome<Vec<T>>) + Send + 'static
    where
        P: Promise<T>,
    {
        let Self {
            mut promise,
            mut faults,
        } = self;

        move |outcome| match outcome {
            Ok(list) => promise.list(list),
            Err(fault) => faults.fault(fault),
        }
    }

    pub fn on_set<T: 'static>(self) -> impl FnOnce(Outcome<HashSet<T>>) + Send + 'static
    where
        P: Promise<T>,
    {
        let Self {
            mut promise,
            mut faults,
        } = self;

        move |outcome| match outcome {
            Ok(set) => promise.set(set),
            Err(fault) => faults.fault(fault),
        }
    }

    pub fn on_object<T: 'static>(self) -> impl FnOnce(Outcome<Keyed<T>>) + Send + 'static
    where
        P: Promise<T>,
    {
        let Self {
            mut promise,
            mut faults,
        } = self;

        move |outcome| match outcome {
            Ok(Keyed { key, value }) => promise.object(value, key),
            Err(fault) => faults.fault(fault),
        }
    }
}

/// Completion for operations with nothing to deliver: only faults are passed on.
pub fn report<R, K>(mut faults: K) -> impl FnOnce(Outcome<R>) + Send + 'static
where
    R: 'static,
    K: FaultSink,
{
    move |outcome| {
        if let Err(fault) = outcome {
            faults.fault(fault);
        }
    }
}
