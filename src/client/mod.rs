//! The typed client facade.
//!
//! Every operation is packaged as a job and handed to the [`Dispatcher`]. The
//! job runs the operation against the shared [`Connection`] and passes the
//! [`Outcome`] to the caller's callback exactly once. Failures never surface at
//! the call site.

use crate::{
    connection::Connection,
    error::Outcome,
    ops::{Fields, Keyed},
    storage::{remote, Store},
};
use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::{collections::HashSet, future::Future, hash::Hash, sync::Arc};
use tokio::net::TcpStream;
use tracing::{info_span, Span};
use tracing_futures::Instrument;

pub mod dispatch;

pub use dispatch::{Dispatcher, Mode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// `host` or `host:port` of the remote store.
    pub address: String,
    pub workers: usize,
    /// How many spawned jobs may wait for a worker before callers wait too.
    pub queue_capacity: usize,
    pub mode: Mode,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: remote::DEFAULT_ADDRESS.to_owned(),
            workers: 4,
            queue_capacity: 32,
            mode: Mode::default(),
        }
    }
}

/// Connects a new client to the store at `address`, or at `localhost` when
/// none is given.
///
/// Each call opens its own connection; any number of clients may coexist.
pub async fn connect(address: Option<&str>) -> Result<Client<remote::Store<TcpStream>>> {
    let config = Config {
        address: address.unwrap_or(remote::DEFAULT_ADDRESS).to_owned(),
        ..Config::default()
    };
    Client::connect(&config).await
}

pub struct Client<S> {
    conn: Arc<Connection<S>>,
    dispatcher: Dispatcher,
}

impl Client<remote::Store<TcpStream>> {
    pub async fn connect(config: &Config) -> Result<Self> {
        let store = remote::connect(&config.address).await?;
        Ok(Self::with_store(store, config))
    }
}

impl<S> Client<S>
where
    S: Store<Err = anyhow::Error> + Send + 'static,
{
    /// Builds a client around an already open store connection.
    ///
    /// Must be called from within a tokio runtime.
    pub fn with_store(store: S, config: &Config) -> Self {
        Self {
            conn: Arc::new(Connection::new(store)),
            dispatcher: Dispatcher::start(config.workers, config.queue_capacity, config.mode),
        }
    }

    pub fn mode(&self) -> Mode {
        self.dispatcher.mode()
    }

    /// Runs every later operation inline: its callback has run by the time
    /// the call returns. This cannot be undone.
    pub fn set_inline(&self) {
        self.dispatcher.set_inline()
    }

    async fn dispatch<J>(&self, span: Span, job: J)
    where
        J: Future<Output = ()> + Send + 'static,
    {
        self.dispatcher.dispatch(job.instrument(span)).await
    }

    pub async fn get_map<T, F>(&self, name: &str, done: F)
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(Outcome<Fields<T>>) + Send + 'static,
    {
        let conn = self.conn.clone();
        let name = name.to_owned();
        let span = info_span!("get_map", key = %name);
        self.dispatch(span, async move { done(conn.get_map(&name).await) })
            .await
    }

    pub async fn get_from_map<T, F>(&self, name: &str, field: &str, done: F)
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(Outcome<Keyed<T>>) + Send + 'static,
    {
        let conn = self.conn.clone();
        let (name, field) = (name.to_owned(), field.to_owned());
        let span = info_span!("get_from_map", key = %name, field = %field);
        self.dispatch(span, async move {
            done(conn.get_from_map(&name, &field).await)
        })
        .await
    }

    pub async fn put_map<T, F>(&self, name: &str, field: &str, value: T, done: F)
    where
        T: Serialize + Send + 'static,
        F: FnOnce(Outcome<()>) + Send + 'static,
    {
        let conn = self.conn.clone();
        let (name, field) = (name.to_owned(), field.to_owned());
        let span = info_span!("put_map", key = %name, field = %field);
        self.dispatch(span, async move {
            done(conn.put_map(&name, &field, value).await)
        })
        .await
    }

    pub async fn del_map<I, F>(&self, name: &str, fields: I, done: F)
    where
        I: IntoIterator,
        I::Item: Into<String>,
        F: FnOnce(Outcome<()>) + Send + 'static,
    {
        let conn = self.conn.clone();
        let name = name.to_owned();
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        let span = info_span!("del_map", key = %name, fields = fields.len());
        self.dispatch(span, async move { done(conn.del_map(&name, fields).await) })
            .await
    }

    pub async fn add_set<T, F>(&self, name: &str, value: T, done: F)
    where
        T: Serialize + Send + 'static,
        F: FnOnce(Outcome<()>) + Send + 'static,
    {
        let conn = self.conn.clone();
        let name = name.to_owned();
        let span = info_span!("add_set", key = %name);
        self.dispatch(span, async move { done(conn.add_set(&name, value).await) })
            .await
    }

    pub async fn remove_set<T, F>(&self, name: &str, value: T, done: F)
    where
        T: Serialize + Send + 'static,
        F: FnOnce(Outcome<()>) + Send + 'static,
    {
        let conn = self.conn.clone();
        let name = name.to_owned();
        let span = info_span!("remove_set", key = %name);
        self.dispatch(span, async move {
            done(conn.remove_set(&name, value).await)
        })
        .await
    }

    pub async fn get_set<T, F>(&self, name: &str, done: F)
    where
        T: DeserializeOwned + Eq + Hash + Send + 'static,
        F: FnOnce(Outcome<HashSet<T>>) + Send + 'static,
    {
        let conn = self.conn.clone();
        let name = name.to_owned();
        let span = info_span!("get_set", key = %name);
        self.dispatch(span, async move { done(conn.get_set(&name).await) })
            .await
    }

    pub async fn push_list<T, F>(&self, name: &str, value: T, done: F)
    where
        T: Serialize + Send + 'static,
        F: FnOnce(Outcome<()>) + Send + 'static,
    {
        let conn = self.conn.clone();
        let name = name.to_owned();
        let span = info_span!("push_list", key = %name);
        self.dispatch(span, async move {
            done(conn.push_list(&name, value).await)
        })
        .await
    }

    pub async fn get_list<T, F>(&self, name: &str, done: F)
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(Outcome<Vec<T>>) + Send + 'static,
    {
        let conn = self.conn.clone();
        let name = name.to_owned();
        let span = info_span!("get_list", key = %name);
        self.dispatch(span, async move { done(conn.get_list(&name).await) })
            .await
    }

    pub async fn pop_list<T, F>(&self, name: &str, done: F)
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(Outcome<Keyed<T>>) + Send + 'static,
    {
        let conn = self.conn.clone();
        let name = name.to_owned();
        let span = info_span!("pop_list", key = %name);
        self.dispatch(span, async move { done(conn.pop_list(&name).await) })
            .await
    }

    pub async fn peek_list<T, F>(&self, name: &str, done: F)
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(Outcome<Keyed<T>>) + Send + 'static,
    {
        let conn = self.conn.clone();
        let name = name.to_owned();
        let span = info_span!("peek_list", key = %name);
        self.dispatch(span, async move { done(conn.peek_list(&name).await) })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::Fault,
        storage::{
            inmemory,
            types::{Field, KeyRef, Value},
        },
    };
    use async_trait::async_trait;
    use std::{
        cell::Cell,
        collections::HashMap,
        sync::atomic::{AtomicUsize, Ordering},
        thread,
    };
    use tokio::sync::{mpsc, oneshot};

    fn inline() -> Config {
        Config {
            mode: Mode::Inline,
            ..Config::default()
        }
    }

    /// Wraps a store and records how many commands run at the same time.
    #[derive(Debug, Clone)]
    struct Probe {
        inner: inmemory::Store,
        inside: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl Probe {
        fn new(inner: inmemory::Store) -> Self {
            Self {
                inner,
                inside: Arc::new(AtomicUsize::new(0)),
                peak: Arc::new(AtomicUsize::new(0)),
            }
        }

        async fn enter<T>(&self, command: impl Future<Output = T>) -> T {
            let now = self.inside.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::task::yield_now().await;
            let result = command.await;
            self.inside.fetch_sub(1, Ordering::SeqCst);
            result
        }
    }

    #[async_trait]
    impl Store for Probe {
        type Err = anyhow::Error;

        async fn hgetall<'k>(&mut self, key: KeyRef<'k>) -> Result<HashMap<Field, Value>> {
            let mut inner = self.inner.clone();
            self.enter(inner.hgetall(key)).await
        }

        async fn hget<'k>(
            &mut self,
            key: KeyRef<'k>,
            field: KeyRef<'k>,
        ) -> Result<Option<Value>> {
            let mut inner = self.inner.clone();
            self.enter(inner.hget(key, field)).await
        }

        async fn hset<'k>(
            &mut self,
            key: KeyRef<'k>,
            field: Field,
            value: Value,
        ) -> Result<bool> {
            let mut inner = self.inner.clone();
            self.enter(inner.hset(key, field, value)).await
        }

        async fn hdel<'k>(&mut self, key: KeyRef<'k>, fields: Vec<Field>) -> Result<u64> {
            let mut inner = self.inner.clone();
            self.enter(inner.hdel(key, fields)).await
        }

        async fn sadd<'k>(&mut self, key: KeyRef<'k>, member: Value) -> Result<bool> {
            let mut inner = self.inner.clone();
            self.enter(inner.sadd(key, member)).await
        }

        async fn srem<'k>(&mut self, key: KeyRef<'k>, member: Value) -> Result<bool> {
            let mut inner = self.inner.clone();
            self.enter(inner.srem(key, member)).await
        }

        async fn smembers<'k>(&mut self, key: KeyRef<'k>) -> Result<Vec<Value>> {
            let mut inner = self.inner.clone();
            self.enter(inner.smembers(key)).await
        }

        async fn llen<'k>(&mut self, key: KeyRef<'k>) -> Result<i64> {
            let mut inner = self.inner.clone();
            self.enter(inner.llen(key)).await
        }

        async fn lrange<'k>(
            &mut self,
            key: KeyRef<'k>,
            start: i64,
            stop: i64,
        ) -> Result<Vec<Value>> {
            let mut inner = self.inner.clone();
            self.enter(inner.lrange(key, start, stop)).await
        }

        async fn lpush<'k>(&mut self, key: KeyRef<'k>, value: Value) -> Result<i64> {
            let mut inner = self.inner.clone();
            self.enter(inner.lpush(key, value)).await
        }

        async fn lpop<'k>(&mut self, key: KeyRef<'k>) -> Result<Option<Value>> {
            let mut inner = self.inner.clone();
            self.enter(inner.lpop(key)).await
        }

        async fn lindex<'k>(
            &mut self,
            key: KeyRef<'k>,
            index: i64,
        ) -> Result<Option<Value>> {
            let mut inner = self.inner.clone();
            self.enter(inner.lindex(key, index)).await
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_runs_two_commands_at_once() {
        // Pre-condition.
        let probe = Probe::new(inmemory::start());
        let config = Config {
            workers: 8,
            queue_capacity: 4,
            ..Config::default()
        };
        let client = Client::with_store(probe.clone(), &config);
        let (tx, mut rx) = mpsc::unbounded_channel::<Outcome<()>>();
        let rounds = 24;

        // Action.
        for i in 0..rounds {
            let (a, b, c) = (tx.clone(), tx.clone(), tx.clone());
            client
                .push_list("jobs", i, move |outcome| {
                    let _ = a.send(outcome);
                })
                .await;
            client
                .put_map("users", &format!("user-{}", i), i, move |outcome| {
                    let _ = b.send(outcome);
                })
                .await;
            client
                .get_list::<u32, _>("jobs", move |outcome| {
                    let _ = c.send(outcome.map(|_| ()));
                })
                .await;
        }
        for _ in 0..rounds * 3 {
            rx.recv().await.unwrap().unwrap();
        }

        // Post-condition.
        assert_eq!(probe.peak.load(Ordering::SeqCst), 1);
        assert_eq!(probe.inside.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn runs_callbacks_on_the_calling_thread_when_inline() {
        // Pre-condition.
        let client = Client::with_store(inmemory::start(), &Config::default());
        let caller = thread::current().id();
        let (tx, mut rx) = mpsc::unbounded_channel();

        // Action.
        let spawned = tx.clone();
        client
            .push_list("jobs", "a", move |outcome| {
                let _ = spawned.send((thread::current().id(), outcome));
            })
            .await;
        let (on_worker, _) = rx.recv().await.unwrap();

        client.set_inline();
        client
            .push_list("jobs", "b", move |outcome| {
                let _ = tx.send((thread::current().id(), outcome));
            })
            .await;

        // Post-condition.
        assert_ne!(on_worker, caller);
        let (observed, outcome) = rx.try_recv().unwrap();
        assert_eq!(observed, caller);
        assert!(outcome.is_ok());
    }

    #[tokio::test]
    async fn accepts_values_that_are_send_but_not_sync() {
        // Pre-condition.
        let client = Client::with_store(inmemory::start(), &Config::default());
        let (written, wrote) = oneshot::channel();
        let (read, got) = oneshot::channel();

        // Action.
        client
            .put_map("counters", "hits", Cell::new(3u32), move |outcome| {
                let _ = written.send(outcome);
            })
            .await;
        wrote.await.unwrap().unwrap();
        client
            .get_from_map::<u32, _>("counters", "hits", move |outcome| {
                let _ = read.send(outcome);
            })
            .await;

        // Post-condition.
        assert_eq!(got.await.unwrap().unwrap().value, 3);
    }

    #[tokio::test]
    async fn delivers_spawned_results_through_the_callback() {
        // Pre-condition.
        let client = Client::with_store(inmemory::start(), &Config::default());
        let (written, wrote) = oneshot::channel();
        let (read, got) = oneshot::channel();

        // Action.
        client
            .put_map("users", "ada", 36u32, move |outcome| {
                let _ = written.send(outcome);
            })
            .await;
        wrote.await.unwrap().unwrap();
        client
            .get_from_map::<u32, _>("users", "ada", move |outcome| {
                let _ = read.send(outcome);
            })
            .await;

        // Post-condition.
        let keyed = got.await.unwrap().unwrap();
        assert_eq!(keyed.key, "ada");
        assert_eq!(keyed.value, 36);
    }

    #[tokio::test]
    async fn delivers_store_faults_through_the_callback() {
        // Pre-condition.
        let client = Client::with_store(inmemory::start(), &inline());
        client.push_list("users", 1u32, |_| {}).await;
        let (tx, mut rx) = mpsc::unbounded_channel();

        // Action.
        client
            .get_map::<u32, _>("users", move |outcome| {
                let _ = tx.send(outcome);
            })
            .await;

        // Post-condition.
        let fault = rx.try_recv().unwrap().unwrap_err();
        assert!(matches!(fault, Fault::Store { command: "HGETALL", .. }));
    }

    #[tokio::test]
    async fn independent_clients_share_one_store() {
        // Pre-condition.
        let store = inmemory::start();
        let writer = Client::with_store(store.clone(), &inline());
        let reader = Client::with_store(store, &inline());
        let (tx, mut rx) = mpsc::unbounded_channel();

        // Action.
        writer.add_set("ports", 80u16, |_| {}).await;
        writer.add_set("ports", 443u16, |_| {}).await;
        writer.remove_set("ports", 80u16, |_| {}).await;
        reader
            .get_set::<u16, _>("ports", move |outcome| {
                let _ = tx.send(outcome);
            })
            .await;

        // Post-condition.
        let ports = rx.try_recv().unwrap().unwrap();
        assert_eq!(ports, vec![443].into_iter().collect());
    }

    #[tokio::test]
    async fn composes_a_stack_with_a_peekable_bottom() {
        // Pre-condition.
        let client = Client::with_store(inmemory::start(), &inline());
        let (tx, mut rx) = mpsc::unbounded_channel();
        client.push_list("jobs", "a", |_| {}).await;
        client.push_list("jobs", "b", |_| {}).await;

        // Action.
        let peeked = tx.clone();
        client
            .peek_list::<String, _>("jobs", move |outcome| {
                let _ = peeked.send(outcome.map(|keyed| vec![keyed.key, keyed.value]));
            })
            .await;
        let popped = tx.clone();
        client
            .pop_list::<String, _>("jobs", move |outcome| {
                let _ = popped.send(outcome.map(|keyed| vec![keyed.key, keyed.value]));
            })
            .await;
        client
            .get_list::<String, _>("jobs", move |outcome| {
                let _ = tx.send(outcome);
            })
            .await;

        // Post-condition.
        assert_eq!(rx.try_recv().unwrap().unwrap(), vec!["jobs-2", "a"]);
        assert_eq!(rx.try_recv().unwrap().unwrap(), vec!["jobs-0", "b"]);
        assert_eq!(rx.try_recv().unwrap().unwrap(), vec!["a"]);
    }

    #[tokio::test]
    async fn deletes_map_fields_in_bulk() {
        // Pre-condition.
        let client = Client::with_store(inmemory::start(), &inline());
        for (field, age) in &[("ada", 36u32), ("bob", 41), ("cy", 29)] {
            client.put_map("users", field, *age, |_| {}).await;
        }
        let (tx, mut rx) = mpsc::unbounded_channel();

        // Action.
        client.del_map("users", vec!["ada", "cy"], |_| {}).await;
        client
            .get_map::<u32, _>("users", move |outcome| {
                let _ = tx.send(outcome);
            })
            .await;

        // Post-condition.
        let fields = rx.try_recv().unwrap().unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].0, "bob");
        assert_eq!(*fields[0].1.as_ref().unwrap(), 41);
    }
}
