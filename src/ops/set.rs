use crate::{
    connection::Connection,
    error::{Fault, Outcome},
    storage::Store,
    value::{decode, encode, type_name},
};
use serde::{de::DeserializeOwned, Serialize};
use std::{collections::HashSet, hash::Hash};
use tracing::debug;

impl<S> Connection<S>
where
    S: Store<Err = anyhow::Error>,
{
    pub async fn add_set<T: Serialize>(&self, name: &str, value: T) -> Outcome<()> {
        let member = encode(&value)?;

        let added = self
            .lock()
            .await
            .sadd(name, member)
            .await
            .map_err(Fault::store("SADD", type_name::<T>()))?;

        debug!(key = name, added, "added set member");
        Ok(())
    }

    pub async fn remove_set<T: Serialize>(&self, name: &str, value: T) -> Outcome<()> {
        let member = encode(&value)?;

        let removed = self
            .lock()
            .await
            .srem(name, member)
            .await
            .map_err(Fault::store("SREM", type_name::<T>()))?;

        debug!(key = name, removed, "removed set member");
        Ok(())
    }

    /// Reads every member of set `name`.
    ///
    /// The first member that fails to decode fails the whole read.
    pub async fn get_set<T>(&self, name: &str) -> Outcome<HashSet<T>>
    where
        T: DeserializeOwned + Eq + Hash,
    {
        let members = self
            .lock()
            .await
            .smembers(name)
            .await
            .map_err(Fault::store("SMEMBERS", type_name::<T>()))?;

        debug!(key = name, members = members.len(), "read set");

        members
            .iter()
            .map(|member| decode(name, member))
            .collect()
    }
}
