//! Remote data-structure storage reached over the wire protocol.

use super::types::{Field, KeyRef, Value};
use crate::protocol::{codec::Codec, framed, Frame};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::collections::HashMap;
use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};
use tokio_util::codec::Framed;
use tracing::{debug, info};

pub const DEFAULT_ADDRESS: &str = "localhost";
pub const DEFAULT_PORT: u16 = 6379;

#[derive(Debug)]
pub struct Store<T> {
    frames: Framed<T, Codec>,
}

/// Opens one connection to the store at `address`, adding the default port
/// when `address` names only a host.
pub async fn connect(address: &str) -> Result<Store<TcpStream>> {
    let address = with_port(address);
    let conn = TcpStream::connect(&address)
        .await
        .with_context(|| format!("unable to connect to {}", address))?;

    info!(address = %address, "connected to store");

    Ok(Store::new(conn))
}

fn with_port(address: &str) -> String {
    if address.matches(':').count() > 1 && !address.starts_with('[') {
        // A bare IPv6 address never carries a port.
        return format!("[{}]:{}", address, DEFAULT_PORT);
    }

    let has_port = address
        .rsplit_once(':')
        .map_or(false, |(_, port)| port.parse::<u16>().is_ok());

    if has_port {
        address.to_owned()
    } else {
        format!("{}:{}", address, DEFAULT_PORT)
    }
}

impl<T> Store<T>
where
    T: AsyncRead + AsyncWrite + Send + Unpin,
{
    pub fn new(conn: T) -> Self {
        Self {
            frames: framed(conn),
        }
    }

    async fn call(&mut self, name: &'static str, args: Vec<Bytes>) -> Result<Frame> {
        debug!(command = name, "sending");

        self.frames
            .send(Frame::command(name, args))
            .await
            .with_context(|| format!("unable to send {} command", name))?;

        let reply = self
            .frames
            .next()
            .await
            .with_context(|| format!("connection closed before {} reply", name))?
            .with_context(|| format!("unable to read {} reply", name))?;

        match reply {
            Frame::Error(message) => bail!("{} rejected: {}", name, message),
            reply => Ok(reply),
        }
    }
}

#[async_trait]
impl<T> super::Store for Store<T>
where
    T: AsyncRead + AsyncWrite + Send + Unpin,
{
    type Err = anyhow::Error;

    async fn hgetall<'k>(&mut self, key: KeyRef<'k>) -> Result<HashMap<Field, Value>> {
        let items = values(self.call("HGETALL", vec![arg(key)]).await?)?;

        if items.len() % 2 != 0 {
            bail!("HGETALL replied with an odd number of items");
        }

        let mut items = items.into_iter();
        let mut fields = HashMap::with_capacity(items.len() / 2);
        while let (Some(field), Some(value)) = (items.next(), items.next()) {
            // Field names are text; invalid bytes are replaced.
            fields.insert(String::from_utf8_lossy(&field).into_owned(), value);
        }
        Ok(fields)
    }

    async fn hget<'k>(&mut self, key: KeyRef<'k>, field: KeyRef<'k>) -> Result<Option<Value>> {
        optional(self.call("HGET", vec![arg(key), arg(field)]).await?)
    }

    async fn hset<'k>(&mut self, key: KeyRef<'k>, field: Field, value: Value) -> Result<bool> {
        Ok(integer(self.call("HSET", vec![arg(key), field.into(), value]).await?)? > 0)
    }

    async fn hdel<'k>(&mut self, key: KeyRef<'k>, fields: Vec<Field>) -> Result<u64> {
        let mut args = Vec::with_capacity(fields.len() + 1);
        args.push(arg(key));
        args.extend(fields.into_iter().map(Bytes::from));

        let removed = integer(self.call("HDEL", args).await?)?;
        u64::try_from(removed).context("HDEL replied with a negative count")
    }

    async fn sadd<'k>(&mut self, key: KeyRef<'k>, member: Value) -> Result<bool> {
        Ok(integer(self.call("SADD", vec![arg(key), member]).await?)? > 0)
    }

    async fn srem<'k>(&mut self, key: KeyRef<'k>, member: Value) -> Result<bool> {
        Ok(integer(self.call("SREM", vec![arg(key), member]).await?)? > 0)
    }

    async fn smembers<'k>(&mut self, key: KeyRef<'k>) -> Result<Vec<Value>> {
        values(self.call("SMEMBERS", vec![arg(key)]).await?)
    }

    async fn llen<'k>(&mut self, key: KeyRef<'k>) -> Result<i64> {
        integer(self.call("LLEN", vec![arg(key)]).await?)
    }

    async fn lrange<'k>(&mut self, key: KeyRef<'k>, start: i64, stop: i64) -> Result<Vec<Value>> {
        let args = vec![arg(key), start.to_string().into(), stop.to_string().into()];
        values(self.call("LRANGE", args).await?)
    }

    async fn lpush<'k>(&mut self, key: KeyRef<'k>, value: Value) -> Result<i64> {
        integer(self.call("LPUSH", vec![arg(key), value]).await?)
    }

    async fn lpop<'k>(&mut self, key: KeyRef<'k>) -> Result<Option<Value>> {
        optional(self.call("LPOP", vec![arg(key)]).await?)
    }

    async fn lindex<'k>(&mut self, key: KeyRef<'k>, index: i64) -> Result<Option<Value>> {
        optional(
            self.call("LINDEX", vec![arg(key), index.to_string().into()])
                .await?,
        )
    }
}

fn arg(text: &str) -> Bytes {
    Bytes::copy_from_slice(text.as_bytes())
}

fn integer(frame: Frame) -> Result<i64> {
    match frame {
        Frame::Integer(number) => Ok(number),
        other => bail!("expected an integer reply, got {:?}", other),
    }
}

fn optional(frame: Frame) -> Result<Option<Value>> {
    match frame {
        Frame::Bulk(bytes) => Ok(Some(bytes)),
        Frame::Simple(text) => Ok(Some(text.into())),
        Frame::Null => Ok(None),
        other => bail!("expected a bulk reply, got {:?}", other),
    }
}

fn values(frame: Frame) -> Result<Vec<Value>> {
    match frame {
        Frame::Array(items) => items
            .into_iter()
            .map(|item| optional(item)?.context("unexpected null inside array reply"))
            .collect(),
        Frame::Null => Ok(Vec::new()),
        other => bail!("expected an array reply, got {:?}", other),
    }
}
