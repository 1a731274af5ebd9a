//! In-memory data-structure storage.
//!
//! Mirrors the command semantics of the remote store: one keyspace shared by
//! hashes, lists and sets, `WRONGTYPE` rejections, and collections that vanish
//! once their last element is removed.

use super::types::{Command, Field, Key, KeyRef, Reply, Value};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

const WRONG_TYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";

#[derive(Debug)]
enum Entry {
    Hash(HashMap<Field, Value>),
    List(VecDeque<Value>),
    Set(HashSet<Value>),
}

impl Entry {
    fn is_empty(&self) -> bool {
        match self {
            Entry::Hash(hash) => hash.is_empty(),
            Entry::List(list) => list.is_empty(),
            Entry::Set(set) => set.is_empty(),
        }
    }
}

#[derive(Debug)]
pub struct Backend {
    data: HashMap<Key, Entry>,
    commands: mpsc::Receiver<Command>,
}

/// Handle to a running in-memory backend.
///
/// Cloning the handle shares the same data, so several clients may talk to one
/// backend the way several connections talk to one remote store.
#[derive(Debug, Clone)]
pub struct Store {
    commands: mpsc::Sender<Command>,
}

pub fn start() -> Store {
    let (tx, rx) = mpsc::channel(32);

    let backend = Backend {
        data: HashMap::new(),
        commands: rx,
    };

    tokio::spawn(backend.start());

    Store { commands: tx }
}

impl Store {
    async fn call<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        let command = make(tx);
        let name = command.name();
        self.commands
            .send(command)
            .await
            .with_context(|| format!("unable to send {} command", name))?;
        rx.await
            .with_context(|| format!("unable to access result of {} command", name))?
    }
}

#[async_trait]
impl super::Store for Store {
    type Err = anyhow::Error;

    async fn hgetall<'k>(&mut self, key: KeyRef<'k>) -> Result<HashMap<Field, Value>> {
        let key = key.to_owned();
        self.call(|cb| Command::HGetAll { key, cb }).await
    }

    async fn hget<'k>(&mut self, key: KeyRef<'k>, field: KeyRef<'k>) -> Result<Option<Value>> {
        let (key, field) = (key.to_owned(), field.to_owned());
        self.call(|cb| Command::HGet { key, field, cb }).await
    }

    async fn hset<'k>(&mut self, key: KeyRef<'k>, field: Field, value: Value) -> Result<bool> {
        let key = key.to_owned();
        self.call(|cb| Command::HSet {
            key,
            field,
            value,
            cb,
        })
        .await
    }

    async fn hdel<'k>(&mut self, key: KeyRef<'k>, fields: Vec<Field>) -> Result<u64> {
        let key = key.to_owned();
        self.call(|cb| Command::HDel { key, fields, cb }).await
    }

    async fn sadd<'k>(&mut self, key: KeyRef<'k>, member: Value) -> Result<bool> {
        let key = key.to_owned();
        self.call(|cb| Command::SAdd { key, member, cb }).await
    }

    async fn srem<'k>(&mut self, key: KeyRef<'k>, member: Value) -> Result<bool> {
        let key = key.to_owned();
        self.call(|cb| Command::SRem { key, member, cb }).await
    }

    async fn smembers<'k>(&mut self, key: KeyRef<'k>) -> Result<Vec<Value>> {
        let key = key.to_owned();
        self.call(|cb| Command::SMembers { key, cb }).await
    }

    async fn llen<'k>(&mut self, key: KeyRef<'k>) -> Result<i64> {
        let key = key.to_owned();
        self.call(|cb| Command::LLen { key, cb }).await
    }

    async fn lrange<'k>(&mut self, key: KeyRef<'k>, start: i64, stop: i64) -> Result<Vec<Value>> {
        let key = key.to_owned();
        self.call(|cb| Command::LRange {
            key,
            start,
            stop,
            cb,
        })
        .await
    }

    async fn lpush<'k>(&mut self, key: KeyRef<'k>, value: Value) -> Result<i64> {
        let key = key.to_owned();
        self.call(|cb| Command::LPush { key, value, cb }).await
    }

    async fn lpop<'k>(&mut self, key: KeyRef<'k>) -> Result<Option<Value>> {
        let key = key.to_owned();
        self.call(|cb| Command::LPop { key, cb }).await
    }

    async fn lindex<'k>(&mut self, key: KeyRef<'k>, index: i64) -> Result<Option<Value>> {
        let key = key.to_owned();
        self.call(|cb| Command::LIndex { key, index, cb }).await
    }
}

impl Backend {
    pub async fn start(mut self) {
        while let Some(command) = self.commands.recv().await {
            debug!(command = command.name(), "applying");
            self.apply(command);
        }
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::HGetAll { key, cb } => {
                let _ = cb.send(self.hash(&key).map(|hash| hash.cloned().unwrap_or_default()));
            }
            Command::HGet { key, field, cb } => {
                let _ = cb.send(
                    self.hash(&key)
                        .map(|hash| hash.and_then(|hash| hash.get(&field).cloned())),
                );
            }
            Command::HSet {
                key,
                field,
                value,
                cb,
            } => {
                let _ = cb.send(
                    self.hash_mut(&key)
                        .map(|hash| hash.insert(field, value).is_none()),
                );
            }
            Command::HDel { key, fields, cb } => {
                let removed = self.hash_mut(&key).map(|hash| {
                    fields
                        .iter()
                        .filter(|field| hash.remove(*field).is_some())
                        .count() as u64
                });
                self.prune(&key);
                let _ = cb.send(removed);
            }
            Command::SAdd { key, member, cb } => {
                let _ = cb.send(self.set_mut(&key).map(|set| set.insert(member)));
            }
            Command::SRem { key, member, cb } => {
                let removed = self.set_mut(&key).map(|set| set.remove(&member));
                self.prune(&key);
                let _ = cb.send(removed);
            }
            Command::SMembers { key, cb } => {
                let _ = cb.send(self.set(&key).map(|set| {
                    set.map(|set| set.iter().cloned().collect())
                        .unwrap_or_default()
                }));
            }
            Command::LLen { key, cb } => {
                let _ = cb.send(
                    self.list(&key)
                        .map(|list| list.map_or(0, |list| list.len() as i64)),
                );
            }
            Command::LRange {
                key,
                start,
                stop,
                cb,
            } => {
                let _ = cb.send(self.list(&key).map(|list| {
                    list.map(|list| range(list, start, stop))
                        .unwrap_or_default()
                }));
            }
            Command::LPush { key, value, cb } => {
                let _ = cb.send(self.list_mut(&key).map(|list| {
                    list.push_front(value);
                    list.len() as i64
                }));
            }
            Command::LPop { key, cb } => {
                let popped = self.list_mut(&key).map(VecDeque::pop_front);
                self.prune(&key);
                let _ = cb.send(popped);
            }
            Command::LIndex { key, index, cb } => {
                let _ = cb.send(
                    self.list(&key)
                        .map(|list| list.and_then(|list| at(list, index))),
                );
            }
        }
    }

    fn hash(&self, key: KeyRef<'_>) -> Result<Option<&HashMap<Field, Value>>> {
        match self.data.get(key) {
            Some(Entry::Hash(hash)) => Ok(Some(hash)),
            Some(_) => bail!(WRONG_TYPE),
            None => Ok(None),
        }
    }

    fn hash_mut(&mut self, key: KeyRef<'_>) -> Result<&mut HashMap<Field, Value>> {
        match self
            .data
            .entry(key.to_owned())
            .or_insert_with(|| Entry::Hash(HashMap::new()))
        {
            Entry::Hash(hash) => Ok(hash),
            _ => bail!(WRONG_TYPE),
        }
    }

    fn list(&self, key: KeyRef<'_>) -> Result<Option<&VecDeque<Value>>> {
        match self.data.get(key) {
            Some(Entry::List(list)) => Ok(Some(list)),
            Some(_) => bail!(WRONG_TYPE),
            None => Ok(None),
        }
    }

    fn list_mut(&mut self, key: KeyRef<'_>) -> Result<&mut VecDeque<Value>> {
        match self
            .data
            .entry(key.to_owned())
            .or_insert_with(|| Entry::List(VecDeque::new()))
        {
            Entry::List(list) => Ok(list),
            _ => bail!(WRONG_TYPE),
        }
    }

    fn set(&self, key: KeyRef<'_>) -> Result<Option<&HashSet<Value>>> {
        match self.data.get(key) {
            Some(Entry::Set(set)) => Ok(Some(set)),
            Some(_) => bail!(WRONG_TYPE),
            None => Ok(None),
        }
    }

    fn set_mut(&mut self, key: KeyRef<'_>) -> Result<&mut HashSet<Value>> {
        match self
            .data
            .entry(key.to_owned())
            .or_insert_with(|| Entry::Set(HashSet::new()))
        {
            Entry::Set(set) => Ok(set),
            _ => bail!(WRONG_TYPE),
        }
    }

    fn prune(&mut self, key: KeyRef<'_>) {
        if self.data.get(key).map_or(false, Entry::is_empty) {
            self.data.remove(key);
        }
    }
}

fn range(list: &VecDeque<Value>, start: i64, stop: i64) -> Vec<Value> {
    let len = list.len() as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

    if start > stop || start >= len {
        return Vec::new();
    }

    list.range(start as usize..=stop as usize).cloned().collect()
}

fn at(list: &VecDeque<Value>, index: i64) -> Option<Value> {
    let len = list.len() as i64;
    let index = if index < 0 { len + index } else { index };

    if index < 0 || index >= len {
        return None;
    }

    list.get(index as usize).cloned()
}
