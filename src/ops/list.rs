use super::Keyed;
use crate::{
    connection::Connection,
    error::{Fault, Outcome},
    storage::Store,
    value::{decode, encode, type_name},
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

impl<S> Connection<S>
where
    S: Store<Err = anyhow::Error>,
{
    /// Prepends `value`, so the most recent push sits at index 0.
    pub async fn push_list<T: Serialize>(&self, name: &str, value: T) -> Outcome<()> {
        let payload = encode(&value)?;

        let len = self
            .lock()
            .await
            .lpush(name, payload)
            .await
            .map_err(Fault::store("LPUSH", type_name::<T>()))?;

        debug!(key = name, len, "pushed list item");
        Ok(())
    }

    /// Reads the whole list, head first.
    ///
    /// The first item that fails to decode fails the whole read.
    pub async fn get_list<T: DeserializeOwned>(&self, name: &str) -> Outcome<Vec<T>> {
        let len = self.len::<T>(name).await?;
        if len == 0 {
            return Ok(Vec::new());
        }

        // The list may change between the two commands.
        let items = self
            .lock()
            .await
            .lrange(name, 0, len - 1)
            .await
            .map_err(Fault::store("LRANGE", type_name::<T>()))?;

        debug!(key = name, items = items.len(), "read list");

        items.iter().map(|item| decode(name, item)).collect()
    }

    /// Removes the head, i.e. the most recently pushed item.
    pub async fn pop_list<T: DeserializeOwned>(&self, name: &str) -> Outcome<Keyed<T>> {
        let key = format!("{}-0", name);

        let payload = self
            .lock()
            .await
            .lpop(name)
            .await
            .map_err(Fault::store("LPOP", type_name::<T>()))?
            .ok_or_else(|| Fault::Missing {
                key: key.clone(),
                type_name: type_name::<T>(),
            })?;

        let value = decode(&key, &payload)?;
        Ok(Keyed { key, value })
    }

    /// Reads the tail, i.e. the oldest item, without removing it.
    ///
    /// The delivered key is `name-len`, where `len` is the length observed
    /// before reading the tail.
    pub async fn peek_list<T: DeserializeOwned>(&self, name: &str) -> Outcome<Keyed<T>> {
        let len = self.len::<T>(name).await?;
        let key = format!("{}-{}", name, len);

        let missing = || Fault::Missing {
            key: key.clone(),
            type_name: type_name::<T>(),
        };

        if len == 0 {
            return Err(missing());
        }

        let payload = self
            .lock()
            .await
            .lindex(name, len - 1)
            .await
            .map_err(Fault::store("LINDEX", type_name::<T>()))?
            .ok_or_else(missing)?;

        let value = decode(&key, &payload)?;
        Ok(Keyed { key, value })
    }

    async fn len<T>(&self, name: &str) -> Outcome<i64> {
        self.lock()
            .await
            .llen(name)
            .await
            .map_err(Fault::store("LLEN", type_name::<T>()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::inmemory;

    #[tokio::test]
    async fn pushes_to_the_head_and_peeks_at_the_tail() {
        // Pre-condition.
        let conn = Connection::new(inmemory::start());
        conn.push_list("jobs", "a").await.unwrap();
        conn.push_list("jobs", "b").await.unwrap();

        // Action.
        let items = conn.get_list::<String>("jobs").await.unwrap();
        let peeked = conn.peek_list::<String>("jobs").await.unwrap();

        // Post-condition.
        assert_eq!(items, vec!["b", "a"]);
        assert_eq!(
            peeked,
            Keyed {
                key: "jobs-2".into(),
                value: "a".into()
            }
        );
        assert_eq!(conn.get_list::<String>("jobs").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn pops_the_most_recent_push() {
        // Pre-condition.
        let conn = Connection::new(inmemory::start());
        conn.push_list("jobs", "a").await.unwrap();
        conn.push_list("jobs", "b").await.unwrap();

        // Action.
        let popped = conn.pop_list::<String>("jobs").await.unwrap();

        // Post-condition.
        assert_eq!(
            popped,
            Keyed {
                key: "jobs-0".into(),
                value: "b".into()
            }
        );
        assert_eq!(conn.get_list::<String>("jobs").await.unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn reads_absent_list_as_empty() {
        // Pre-condition.
        let conn = Connection::new(inmemory::start());

        // Action.
        let items = conn.get_list::<u32>("jobs").await.unwrap();
        let popped = conn.pop_list::<u32>("jobs").await;
        let peeked = conn.peek_list::<u32>("jobs").await;

        // Post-condition.
        assert!(items.is_empty());
        assert!(matches!(popped, Err(Fault::Missing { key, .. }) if key == "jobs-0"));
        assert!(matches!(peeked, Err(Fault::Missing { key, .. }) if key == "jobs-0"));
    }

    #[tokio::test]
    async fn aborts_on_first_item_that_fails_to_decode() {
        // Pre-condition.
        let conn = Connection::new(inmemory::start());
        conn.push_list("jobs", &1u32).await.unwrap();
        conn.push_list("jobs", "two").await.unwrap();
        conn.push_list("jobs", &3u32).await.unwrap();

        // Action.
        let result = conn.get_list::<u32>("jobs").await;

        // Post-condition.
        assert!(matches!(result, Err(Fault::Decode { .. })));
    }

    #[tokio::test]
    async fn popped_item_that_fails_to_decode_is_still_removed() {
        // Pre-condition.
        let conn = Connection::new(inmemory::start());
        conn.push_list("jobs", &1u32).await.unwrap();
        conn.push_list("jobs", "two").await.unwrap();

        // Action.
        let popped = conn.pop_list::<u32>("jobs").await;

        // Post-condition.
        assert!(matches!(popped, Err(Fault::Decode { key, .. }) if key == "jobs-0"));
        assert_eq!(conn.get_list::<u32>("jobs").await.unwrap(), vec![1]);
    }
}
