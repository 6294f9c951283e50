//! The single-consumer worker queue and its result cache.
//!
//! One OS thread drains a bounded channel in submission order. Before
//! running a work it records it in the cache under the work's name,
//! replacing any older entry. At most one work executes at a time and
//! completions follow enqueue order.

use std::collections::HashMap;
use std::io;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use tracing::{debug, info};

use crate::error::DispatchError;
use crate::work::Work;

type Cache = Arc<Mutex<HashMap<String, Arc<Work>>>>;

/// Handle to the worker. Cheap to clone; the worker stops once the queue is
/// closed (or every handle is dropped) and the backlog has drained.
#[derive(Clone)]
pub struct WorkQueue {
    sender: Arc<Mutex<Option<SyncSender<Arc<Work>>>>>,
    cache: Cache,
}

impl WorkQueue {
    /// Spawn the worker thread with room for `capacity` pending works.
    pub fn start(capacity: usize) -> io::Result<Self> {
        let (sender, receiver) = mpsc::sync_channel(capacity);
        let cache: Cache = Arc::default();
        let worker_cache = Arc::clone(&cache);
        thread::Builder::new()
            .name("commander-worker".to_string())
            .spawn(move || drain(receiver, worker_cache))?;
        info!(capacity, "Work queue started");
        Ok(Self {
            sender: Arc::new(Mutex::new(Some(sender))),
            cache,
        })
    }

    /// Enqueue a work. Blocks while the queue is full.
    pub fn submit(&self, work: Arc<Work>) -> Result<(), DispatchError> {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let name = work.name().to_string();
        let Some(sender) = sender else {
            return Err(DispatchError::QueueClosed(name));
        };
        sender
            .send(work)
            .map_err(|_| DispatchError::QueueClosed(name))
    }

    /// Record a work in the cache without running it. Used for work that
    /// is already complete.
    pub fn record(&self, work: Arc<Work>) {
        record(&self.cache, work);
    }

    /// The most recent work recorded under `name`.
    pub fn latest(&self, name: &str) -> Option<Arc<Work>> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn cached_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Stop accepting work. Already queued work still runs. Idempotent.
    pub fn close(&self) {
        if self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
        {
            info!("Work queue closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }
}

/// Cache `work` under its name unless a later work of that name is
/// already there. Skipped work is recorded at dispatch, so an older queued
/// work can reach the worker after it.
fn record(cache: &Cache, work: Arc<Work>) {
    let mut cache = cache.lock().unwrap_or_else(PoisonError::into_inner);
    let superseded = cache
        .get(work.name())
        .is_some_and(|cached| cached.sequence() > work.sequence());
    if superseded {
        debug!(work = %work.id(), name = %work.name(), "Newer work already cached");
        return;
    }
    cache.insert(work.name().to_string(), work);
}

fn drain(receiver: Receiver<Arc<Work>>, cache: Cache) {
    for work in receiver {
        debug!(work = %work.id(), name = %work.name(), "Running work");
        record(&cache, Arc::clone(&work));
        work.run();
    }
    debug!("Work queue drained");
}
