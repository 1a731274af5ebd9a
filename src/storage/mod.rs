use self::types::{Field, KeyRef, Value};
use async_trait::async_trait;
use std::collections::HashMap;

pub mod inmemory;
pub mod remote;
pub mod types;

/// The primitive hash, set and list commands a backing store must offer.
///
/// Every method takes `&mut self`: a connection serves one command at a time,
/// and callers are expected to hold it exclusively while a command is in
/// flight.
#[async_trait]
pub trait Store: Send {
    type Err;

    async fn hgetall<'k>(&mut self, key: KeyRef<'k>) -> Result<HashMap<Field, Value>, Self::Err>;

    async fn hget<'k>(&mut self, key: KeyRef<'k>, field: KeyRef<'k>)
        -> Result<Option<Value>, Self::Err>;

    /// Returns `true` when the field did not exist before.
    async fn hset<'k>(&mut self, key: KeyRef<'k>, field: Field, value: Value)
        -> Result<bool, Self::Err>;

    /// Returns the number of fields actually removed.
    async fn hdel<'k>(&mut self, key: KeyRef<'k>, fields: Vec<Field>) -> Result<u64, Self::Err>;

    async fn sadd<'k>(&mut self, key: KeyRef<'k>, member: Value) -> Result<bool, Self::Err>;

    async fn srem<'k>(&mut self, key: KeyRef<'k>, member: Value) -> Result<bool, Self::Err>;

    async fn smembers<'k>(&mut self, key: KeyRef<'k>) -> Result<Vec<Value>, Self::Err>;

    async fn llen<'k>(&mut self, key: KeyRef<'k>) -> Result<i64, Self::Err>;

    /// Inclusive on both ends; negative indices count from the tail.
    async fn lrange<'k>(&mut self, key: KeyRef<'k>, start: i64, stop: i64)
        -> Result<Vec<Value>, Self::Err>;

    /// Prepends `value` and returns the new length.
    async fn lpush<'k>(&mut self, key: KeyRef<'k>, value: Value) -> Result<i64, Self::Err>;

    async fn lpop<'k>(&mut self, key: KeyRef<'k>) -> Result<Option<Value>, Self::Err>;

    async fn lindex<'k>(&mut self, key: KeyRef<'k>, index: i64) -> Result<Option<Value>, Self::Err>;
}
