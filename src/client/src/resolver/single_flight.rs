use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use tokio::sync::Mutex;

/// Coalesces concurrent calls for the same key into one execution.
///
/// Every caller that arrives while a call for its key is in flight awaits
/// that call and receives a clone of its result. The entry is dropped once
/// the call completes, so a later call starts afresh.
pub struct SingleFlight<K, V> {
    inflight: Mutex<HashMap<K, Shared<BoxFuture<'static, V>>>>,
}

impl<K, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs the future built by `make`, or joins the call already in flight for `key`.
    pub async fn run<F, Fut>(&self, key: K, make: F) -> V
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = V> + Send + 'static,
    {
        let call = {
            let mut inflight = self.inflight.lock().await;
            inflight
                .entry(key.clone())
                .or_insert_with(|| make().boxed().shared())
                .clone()
        };

        let result = call.clone().await;

        let mut inflight = self.inflight.lock().await;
        if inflight
            .get(&key)
            .is_some_and(|current| Shared::ptr_eq(current, &call))
        {
            inflight.remove(&key);
        }
        result
    }

    pub async fn in_flight(&self) -> usize {
        self.inflight.lock().await.len()
    }
}
