//! Runs client operations either inline or on a fixed pool of workers.

use futures::{future::BoxFuture, FutureExt};
use std::{
    future::Future,
    panic::AssertUnwindSafe,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, warn};

type Job = BoxFuture<'static, ()>;

/// Where operations run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mode {
    /// Operations are queued for the worker pool and the call returns as soon
    /// as the job is queued.
    #[default]
    Spawned,
    /// Operations run to completion inside the calling task before the call
    /// returns.
    Inline,
}

#[derive(Debug)]
pub struct Dispatcher {
    inline: AtomicBool,
    jobs: mpsc::Sender<Job>,
}

impl Dispatcher {
    /// Starts `workers` workers sharing one queue of at most `capacity` jobs.
    ///
    /// Must be called from within a tokio runtime. Workers stop once the
    /// dispatcher is dropped and the queue has drained.
    pub fn start(workers: usize, capacity: usize, mode: Mode) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let rx = Arc::new(Mutex::new(rx));

        for id in 0..workers.max(1) {
            tokio::spawn(work(id, rx.clone()));
        }

        Self {
            inline: AtomicBool::new(mode == Mode::Inline),
            jobs: tx,
        }
    }

    pub fn mode(&self) -> Mode {
        if self.inline.load(Ordering::SeqCst) {
            Mode::Inline
        } else {
            Mode::Spawned
        }
    }

    /// Switches to inline execution for every later dispatch.
    ///
    /// There is no way back to spawned execution on the same dispatcher.
    pub fn set_inline(&self) {
        self.inline.store(true, Ordering::SeqCst);
    }

    /// Runs `job` inline or hands it to a worker, depending on the mode.
    ///
    /// In spawned mode this waits only for room in the queue, never for the
    /// job itself.
    pub async fn dispatch<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.inline.load(Ordering::SeqCst) {
            job.await;
            return;
        }

        if let Err(mpsc::error::SendError(job)) = self.jobs.send(job.boxed()).await {
            warn!("worker pool is gone, running job inline");
            job.await;
        }
    }
}

async fn work(id: usize, jobs: Arc<Mutex<mpsc::Receiver<Job>>>) {
    loop {
        let job = jobs.lock().await.recv().await;

        match job {
            Some(job) => {
                if AssertUnwindSafe(job).catch_unwind().await.is_err() {
                    error!(worker = id, "job panicked");
                }
            }
            None => break,
        }
    }

    debug!(worker = id, "job queue closed");
}
