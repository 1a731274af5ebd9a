use super::{Fields, Keyed};
use crate::{
    connection::Connection,
    error::{Fault, Outcome, ANY_TYPE},
    storage::Store,
    value::{decode, encode, type_name},
};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

impl<S> Connection<S>
where
    S: Store<Err = anyhow::Error>,
{
    /// Reads every field of map `name`.
    ///
    /// Fields are decoded one by one: a field that fails to decode carries its
    /// own fault and does not affect the others.
    pub async fn get_map<T: DeserializeOwned>(&self, name: &str) -> Outcome<Fields<T>> {
        let fields = self
            .lock()
            .await
            .hgetall(name)
            .await
            .map_err(Fault::store("HGETALL", type_name::<T>()))?;

        debug!(key = name, fields = fields.len(), "read map");

        Ok(fields
            .into_iter()
            .map(|(field, payload)| {
                let value = decode(&field, &payload);
                (field, value)
            })
            .collect())
    }

    pub async fn get_from_map<T: DeserializeOwned>(
        &self,
        name: &str,
        field: &str,
    ) -> Outcome<Keyed<T>> {
        let payload = self
            .lock()
            .await
            .hget(name, field)
            .await
            .map_err(Fault::store("HGET", type_name::<T>()))?
            .ok_or_else(|| Fault::Missing {
                key: field.to_owned(),
                type_name: type_name::<T>(),
            })?;

        Ok(Keyed {
            key: field.to_owned(),
            value: decode(field, &payload)?,
        })
    }

    pub async fn put_map<T: Serialize>(&self, name: &str, field: &str, value: T) -> Outcome<()> {
        let payload = encode(&value)?;

        let created = self
            .lock()
            .await
            .hset(name, field.to_owned(), payload)
            .await
            .map_err(Fault::store("HSET", type_name::<T>()))?;

        debug!(key = name, field, created, "wrote map field");
        Ok(())
    }

    pub async fn del_map(&self, name: &str, fields: Vec<String>) -> Outcome<()> {
        let removed = self
            .lock()
            .await
            .hdel(name, fields)
            .await
            .map_err(Fault::store("HDEL", ANY_TYPE))?;

        debug!(key = name, removed, "deleted map fields");
        Ok(())
    }
}
