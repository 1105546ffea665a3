/***
 * Observers and the registry that fans snapshots out to them.
 *
 *  Every subscriber gets its own FIFO queue and a worker thread that drains
 *  it. Publishing only pushes onto the queues, so the sampling loop never
 *  waits for an observer to finish with a snapshot, and each observer sees
 *  snapshots in the order they were published.
 */

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use log::{debug, error, warn};
use thiserror::Error;

use crate::measurements::Snapshot;

#[cfg(test)]
mod tests;

/// Something that wants to hear about every new snapshot.
///
/// Errors and panics are caught by the delivery worker and logged; they never
/// reach the station or the other observers.
pub trait Observer: Send + 'static {
    fn receive(&mut self, snapshot: &Snapshot) -> anyhow::Result<()>;
}

impl<F> Observer for F
where
    F: FnMut(&Snapshot) -> anyhow::Result<()> + Send + 'static,
{
    fn receive(&mut self, snapshot: &Snapshot) -> anyhow::Result<()> {
        self(snapshot)
    }
}

#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("observer name must not be empty")]
    EmptyName,

    #[error("could not start the delivery worker for observer `{name}`")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Handle returned by [`ObserverRegistry::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscriber {
    id: SubscriptionId,
    name: String,
    queue: Sender<Arc<Snapshot>>,
}

#[derive(Default)]
pub struct ObserverRegistry {
    next_id: AtomicU64,
    subscribers: Mutex<Vec<Subscriber>>,
}

impl ObserverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `observer` under `name` and start its delivery worker.
    ///
    /// The same observer may be registered more than once; each registration
    /// gets its own id and receives its own copy of every snapshot.
    pub fn subscribe<O: Observer>(
        &self,
        name: &str,
        observer: O,
    ) -> Result<SubscriptionId, SubscribeError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(SubscribeError::EmptyName);
        }

        let (queue, inbox) = mpsc::channel();
        let worker_name = name.to_owned();
        thread::Builder::new()
            .name(format!("observer-{name}"))
            .spawn(move || deliver(&worker_name, observer, inbox))
            .map_err(|source| SubscribeError::Spawn {
                name: name.to_owned(),
                source,
            })?;

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push(Subscriber {
            id,
            name: name.to_owned(),
            queue,
        });
        debug!("observer `{name}` subscribed as {id:?}");

        Ok(id)
    }

    /// Stop sending new snapshots to a subscription. Snapshots already queued
    /// for it are still delivered before its worker exits.
    ///
    /// Returns `false` if `id` is not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.lock();
        match subscribers.iter().position(|s| s.id == id) {
            Some(index) => {
                let removed = subscribers.remove(index);
                debug!("observer `{}` unsubscribed", removed.name);
                true
            }
            None => false,
        }
    }

    /// Queue `snapshot` for every subscriber. Never waits on observer work.
    pub fn publish(&self, snapshot: &Arc<Snapshot>) {
        self.lock().retain(|s| match s.queue.send(Arc::clone(snapshot)) {
            Ok(()) => true,
            Err(_) => {
                warn!("delivery worker for observer `{}` is gone, dropping it", s.name);
                false
            }
        });
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Worker body: hand each queued snapshot to the observer until the queue
/// is closed.
fn deliver<O: Observer>(name: &str, mut observer: O, inbox: Receiver<Arc<Snapshot>>) {
    for snapshot in inbox {
        let cycle = snapshot.cycle();
        match panic::catch_unwind(AssertUnwindSafe(|| observer.receive(&snapshot))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!("observer `{name}` failed on cycle {cycle}: {err:#}"),
            Err(payload) => error!(
                "observer `{name}` panicked on cycle {cycle}: {}",
                panic_message(&*payload)
            ),
        }
    }
    debug!("observer `{name}` detached");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}
