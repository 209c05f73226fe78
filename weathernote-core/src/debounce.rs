use parking_lot::Mutex;
use std::{
    collections::HashMap,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug)]
struct Pending {
    id: u64,
    token: CancellationToken,
}

/// Delays actions per key and lets a newer schedule for the same key preempt
/// the one still waiting.
///
/// Once the delay has elapsed the action runs to completion; only the wait
/// is cancellable. Different keys never affect each other.
#[derive(Debug)]
pub struct SettleDebouncer {
    name: &'static str,
    pending: Arc<Mutex<HashMap<String, Pending>>>,
    next_id: AtomicU64,
}

impl SettleDebouncer {
    pub fn new(name: &'static str) -> Self {
        Self { name, pending: Arc::new(Mutex::new(HashMap::new())), next_id: AtomicU64::new(0) }
    }

    pub fn schedule<F>(&self, key: impl Into<String>, delay: Duration, action: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let key = key.into();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        if let Some(previous) = self
            .pending
            .lock()
            .insert(key.clone(), Pending { id, token: token.clone() })
        {
            previous.token.cancel();
        }

        let pending = Arc::clone(&self.pending);
        let name = self.name;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!(debouncer = name, %key, "settle wait preempted by a newer trigger");
                }
                _ = tokio::time::sleep(delay) => {
                    {
                        let mut pending = pending.lock();
                        if pending.get(&key).is_some_and(|p| p.id == id) {
                            pending.remove(&key);
                        }
                    }
                    action.await;
                }
            }
        })
    }

    /// Drop whatever is still waiting, for every key.
    pub fn cancel(&self) {
        for (_, pending) in self.pending.lock().drain() {
            pending.token.cancel();
        }
    }
}
