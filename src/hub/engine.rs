//! Hub engine
//!
//! The hub is both the subscriber registry and the dispatcher:
//! - subscribers are kept in a map from id to the handles registered under it,
//!   in insertion order
//! - `publish` fans an action out to every subscriber on a bounded pool of
//!   worker threads and returns at the first failure
//! - `publish_to` applies an action serially to the subscribers of the given ids
//!
//! Concurrency and usage notes:
//! - The registry lock is held only while the map is read or written. Subscriber
//!   hooks and publish actions always run outside it, so they may call back into
//!   the hub. The flip side is that a hook can race with a concurrent
//!   `unsubscribe` of the same handle.
//! - `publish` and `publish_to` deliver to a snapshot of the registry. A
//!   subscriber added or removed while a round is in flight may or may not see
//!   that round.
//! - After a failed `publish` returns, deliveries that were already running
//!   finish on their own threads. Their late signals land in a channel sized
//!   for every item, so those workers always exit.
//! - All operations block the calling thread. Async callers should run them on
//!   a blocking thread (for example `tokio::task::spawn_blocking`).

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::hash::Hash;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use crossbeam_channel::{Receiver, Sender, bounded};
use tracing::{debug, trace};

use crate::config::HubSettings;
use crate::hub::options::{HubBuilder, HubOptions};
use crate::hub::subscriber::Subscriber;
use crate::utils::error::{BoxError, HubError};

type Registry<S> = HashMap<<S as Subscriber>::Id, Vec<Arc<S>>>;

/// Outcome reported by a publish worker for one subscriber.
enum Signal {
    Done,
    Failed(HubError),
}

pub struct Hub<S: Subscriber> {
    options: HubOptions,
    subs: Mutex<Registry<S>>,
}

impl<S: Subscriber> Default for Hub<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Subscriber> Hub<S> {
    /// Creates a hub with the default options (5 workers, duplicate ids allowed).
    pub fn new() -> Self {
        Self {
            options: HubOptions::default(),
            subs: Mutex::new(HashMap::new()),
        }
    }

    pub fn builder() -> HubBuilder<S> {
        HubBuilder::new()
    }

    pub fn with_options(options: HubOptions) -> Result<Self, HubError> {
        options.validate()?;
        Ok(Self {
            options,
            subs: Mutex::new(HashMap::new()),
        })
    }

    pub fn from_settings(settings: &HubSettings) -> Result<Self, HubError> {
        Self::with_options(HubOptions::from(settings))
    }

    pub fn concurrency(&self) -> usize {
        self.options.concurrency
    }

    pub fn allows_duplicate_ids(&self) -> bool {
        self.options.allow_duplicate_ids
    }

    // Hooks never run under the lock, so a poisoned map is still consistent.
    fn registry(&self) -> MutexGuard<'_, Registry<S>> {
        self.subs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a subscriber.
    ///
    /// With duplicate ids allowed, the subscriber is activated and appended
    /// after the ones already registered under its id. If activation fails the
    /// subscriber is not registered.
    ///
    /// With duplicate ids disallowed, every subscriber already registered under
    /// the id is deactivated and the new one takes their place without being
    /// activated. The first failing deactivation aborts the call: nothing is
    /// installed and the remaining old subscribers stay registered.
    pub fn subscribe(&self, subscriber: Arc<S>) -> Result<(), HubError> {
        let id = subscriber.id();

        if !self.options.allow_duplicate_ids {
            let displaced = self.registry().get(&id).cloned().unwrap_or_default();
            for old in &displaced {
                old.deactivate()
                    .map_err(|source| HubError::deactivation(&id, source))?;
            }
            self.registry().insert(id.clone(), vec![subscriber]);
            debug!(id = ?id, displaced = displaced.len(), "subscriber replaced");
            return Ok(());
        }

        subscriber
            .activate()
            .map_err(|source| HubError::activation(&id, source))?;
        self.registry()
            .entry(id.clone())
            .or_default()
            .push(subscriber);
        debug!(id = ?id, "subscriber added");
        Ok(())
    }

    /// Deactivates and removes one registered handle.
    ///
    /// Handles are matched by pointer identity. Unknown handles are a no-op.
    /// If the same handle was registered more than once only the first entry
    /// is removed. When deactivation fails the handle stays registered.
    pub fn unsubscribe(&self, subscriber: &Arc<S>) -> Result<(), HubError> {
        let id = subscriber.id();

        let registered = self
            .registry()
            .get(&id)
            .is_some_and(|subs| subs.iter().any(|s| Arc::ptr_eq(s, subscriber)));
        if !registered {
            trace!(id = ?id, "unsubscribe of unknown subscriber ignored");
            return Ok(());
        }

        subscriber
            .deactivate()
            .map_err(|source| HubError::deactivation(&id, source))?;

        let mut registry = self.registry();
        let emptied = match registry.get_mut(&id) {
            Some(subs) => {
                if let Some(pos) = subs.iter().position(|s| Arc::ptr_eq(s, subscriber)) {
                    subs.remove(pos);
                }
                subs.is_empty()
            }
            None => false,
        };
        if emptied {
            registry.remove(&id);
        }
        drop(registry);

        debug!(id = ?id, "subscriber removed");
        Ok(())
    }

    /// Deactivates every subscriber and empties the hub.
    ///
    /// Stops at the first failing deactivation and returns its error without
    /// clearing anything, so some subscribers may already be deactivated while
    /// still registered. Order across ids is unspecified; within one id it is
    /// insertion order. The hub stays usable afterwards.
    pub fn terminate(&self) -> Result<(), HubError> {
        let snapshot: Vec<(S::Id, Vec<Arc<S>>)> = self
            .registry()
            .iter()
            .map(|(id, subs)| (id.clone(), subs.clone()))
            .collect();

        for (id, subs) in &snapshot {
            for subscriber in subs {
                subscriber
                    .deactivate()
                    .map_err(|source| HubError::deactivation(id, source))?;
            }
        }

        *self.registry() = HashMap::new();
        debug!(ids = snapshot.len(), "hub terminated");
        Ok(())
    }

    /// Applies `action` to every registered subscriber, running at most
    /// `concurrency` deliveries at once.
    ///
    /// Returns the first delivery error as soon as it is reported. Deliveries
    /// already in flight keep running on their workers after the call returns,
    /// but no worker picks up new work. Delivery order is unspecified.
    ///
    /// The subscriber set is snapshotted when the call starts: subscribers
    /// added or removed concurrently may or may not be reached by this round.
    pub fn publish<F>(&self, action: F) -> Result<(), HubError>
    where
        F: Fn(&S) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let queue: Vec<Arc<S>> = self.registry().values().flatten().cloned().collect();
        let total = queue.len();
        if total == 0 {
            trace!("publish skipped, no subscribers");
            return Ok(());
        }

        let workers = self.options.concurrency.min(total);
        debug!(subscribers = total, workers, "publishing");

        let (work_tx, work_rx) = bounded(total);
        for subscriber in queue {
            // capacity equals the item count and the receiver is alive
            let _ = work_tx.send(subscriber);
        }
        drop(work_tx);

        // One slot per item: a worker signalling after the coordinator
        // returned can never block.
        let (signal_tx, signal_rx) = bounded(total);
        let aborted = Arc::new(AtomicBool::new(false));
        let action = Arc::new(action);

        for _ in 0..workers {
            let work_rx = work_rx.clone();
            let signal_tx = signal_tx.clone();
            let worker_aborted = aborted.clone();
            let action = action.clone();
            let spawned = thread::Builder::new()
                .name("pubhub-publish".to_string())
                .spawn(move || run_worker(&work_rx, &signal_tx, &worker_aborted, &*action));
            if let Err(err) = spawned {
                aborted.store(true, Ordering::Relaxed);
                return Err(HubError::WorkerSpawn(err));
            }
        }
        drop(signal_tx);

        let mut done = 0;
        loop {
            match signal_rx.recv() {
                Ok(Signal::Done) => {
                    done += 1;
                    if done == total {
                        return Ok(());
                    }
                }
                Ok(Signal::Failed(err)) => {
                    aborted.store(true, Ordering::Relaxed);
                    return Err(err);
                }
                // every worker exited before all items were accounted for
                Err(_) => return Err(HubError::WorkerPanicked),
            }
        }
    }

    /// Applies `action` serially to the subscribers of each id, in the order
    /// given and in insertion order within an id.
    ///
    /// Stops at the first failure. Ids with no subscribers are skipped silently.
    pub fn publish_to<'a, F, I, Q>(&self, action: F, ids: I) -> Result<(), HubError>
    where
        F: Fn(&S) -> Result<(), BoxError>,
        I: IntoIterator<Item = &'a Q>,
        Q: Hash + Eq + Debug + ?Sized + 'a,
        S::Id: Borrow<Q>,
    {
        for id in ids {
            for subscriber in self.subscribers(id) {
                action(&subscriber).map_err(|source| HubError::delivery(&id, source))?;
            }
        }
        Ok(())
    }

    /// Snapshot of the handles registered under `id`, in insertion order.
    pub fn subscribers<Q>(&self, id: &Q) -> Vec<Arc<S>>
    where
        Q: Hash + Eq + ?Sized,
        S::Id: Borrow<Q>,
    {
        self.registry().get(id).cloned().unwrap_or_default()
    }

    pub fn ids(&self) -> Vec<S::Id> {
        self.registry().keys().cloned().collect()
    }

    /// Total number of registered handles across all ids.
    pub fn len(&self) -> usize {
        self.registry().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn run_worker<S, F>(
    queue: &Receiver<Arc<S>>,
    signals: &Sender<Signal>,
    aborted: &AtomicBool,
    action: &F,
) where
    S: Subscriber,
    F: Fn(&S) -> Result<(), BoxError>,
{
    while !aborted.load(Ordering::Relaxed) {
        let Ok(subscriber) = queue.recv() else {
            return;
        };
        match action(&subscriber) {
            Ok(()) => {
                let _ = signals.send(Signal::Done);
            }
            Err(source) => {
                aborted.store(true, Ordering::Relaxed);
                let _ = signals.send(Signal::Failed(HubError::delivery(
                    &subscriber.id(),
                    source,
                )));
                return;
            }
        }
    }
}

impl<S: Subscriber> Debug for Hub<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Hub")
            .field("options", &self.options)
            .field("subscribers", &self.len())
            .finish()
    }
}
