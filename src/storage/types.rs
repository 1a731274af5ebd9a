use anyhow::Result;
use bytes::Bytes;
use std::collections::HashMap;
use tokio::sync::oneshot;

pub type Key = String;
pub type KeyRef<'a> = &'a str;
pub type Field = String;
/// Stored payloads are raw bytes; they only become text when decoded.
pub type Value = Bytes;

pub type Reply<T> = oneshot::Sender<Result<T>>;

/// A single primitive command understood by a store.
#[derive(Debug)]
pub enum Command {
    HGetAll {
        key: Key,
        cb: Reply<HashMap<Field, Value>>,
    },
    HGet {
        key: Key,
        field: Field,
        cb: Reply<Option<Value>>,
    },
    HSet {
        key: Key,
        field: Field,
        value: Value,
        cb: Reply<bool>,
    },
    HDel {
        key: Key,
        fields: Vec<Field>,
        cb: Reply<u64>,
    },
    SAdd {
        key: Key,
        member: Value,
        cb: Reply<bool>,
    },
    SRem {
        key: Key,
        member: Value,
        cb: Reply<bool>,
    },
    SMembers {
        key: Key,
        cb: Reply<Vec<Value>>,
    },
    LLen {
        key: Key,
        cb: Reply<i64>,
    },
    LRange {
        key: Key,
        start: i64,
        stop: i64,
        cb: Reply<Vec<Value>>,
    },
    LPush {
        key: Key,
        value: Value,
        cb: Reply<i64>,
    },
    LPop {
        key: Key,
        cb: Reply<Option<Value>>,
    },
    LIndex {
        key: Key,
        index: i64,
        cb: Reply<Option<Value>>,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::HGetAll { .. } => "HGETALL",
            Command::HGet { .. } => "HGET",
            Command::HSet { .. } => "HSET",
            Command::HDel { .. } => "HDEL",
            Command::SAdd { .. } => "SADD",
            Command::SRem { .. } => "SREM",
            Command::SMembers { .. } => "SMEMBERS",
            Command::LLen { .. } => "LLEN",
            Command::LRange { .. } => "LRANGE",
            Command::LPush { .. } => "LPUSH",
            Command::LPop { .. } => "LPOP",
            Command::LIndex { .. } => "LINDEX",
        }
    }
}
