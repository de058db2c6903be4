//! Per-key single-flight for upstream fetches.
//!
//! The first caller for a key becomes the leader and runs the fetch; callers
//! arriving while it is in flight wait on a oneshot channel and receive a
//! clone of the leader's result, success or failure.

use std::future::Future;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use metrics::counter;
use tokio::sync::oneshot;
use tracing::debug;

use crate::domain::error::FetchError;

const SOURCE: &str = "cache::coalesce";
pub const METRIC_JOIN: &str = "courtside_coalesce_join_total";

type Waiter<V> = oneshot::Sender<Result<V, FetchError>>;

pub struct Coalescer<V> {
    pending: DashMap<String, Vec<Waiter<V>>>,
}

impl<V> Default for Coalescer<V> {
    fn default() -> Self {
        Self {
            pending: DashMap::new(),
        }
    }
}

impl<V: Clone> Coalescer<V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `fetch` unless a fetch for `key` is already in flight, in which case
    /// the caller shares that fetch's outcome.
    ///
    /// The entry is removed before waiters are woken, so a failure is never
    /// replayed to later callers. If the leader is dropped mid-flight its
    /// waiters receive [`FetchError::Abandoned`].
    pub async fn run<F, Fut>(&self, key: &str, fetch: F) -> Result<V, FetchError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, FetchError>>,
    {
        let waiting = match self.pending.entry(key.to_string()) {
            Entry::Occupied(mut waiters) => {
                let (tx, rx) = oneshot::channel();
                waiters.get_mut().push(tx);
                Some(rx)
            }
            Entry::Vacant(slot) => {
                slot.insert(Vec::new());
                None
            }
        };

        if let Some(rx) = waiting {
            counter!(METRIC_JOIN).increment(1);
            debug!(target = SOURCE, key, outcome = "join", "joined in-flight fetch");
            return rx
                .await
                .unwrap_or_else(|_| Err(FetchError::abandoned(key)));
        }

        let leadership = Leadership {
            pending: &self.pending,
            key,
            settled: false,
        };
        let result = fetch().await;
        leadership.settle(&result);
        result
    }

    pub fn in_flight(&self) -> usize {
        self.pending.len()
    }

    pub fn is_in_flight(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }
}

struct Leadership<'a, V> {
    pending: &'a DashMap<String, Vec<Waiter<V>>>,
    key: &'a str,
    settled: bool,
}

impl<V: Clone> Leadership<'_, V> {
    fn settle(mut self, result: &Result<V, FetchError>) {
        self.settled = true;
        let Some((_, waiters)) = self.pending.remove(self.key) else {
            return;
        };
        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
    }
}

impl<V> Drop for Leadership<'_, V> {
    fn drop(&mut self) {
        if !self.settled {
            // Dropping the senders wakes every waiter with a receive error.
            self.pending.remove(self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures::future::join_all;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn concurrent_callers_share_one_fetch() {
        let coalescer = Arc::new(Coalescer::<u32>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let callers = (0..10).map(|_| {
            let coalescer = Arc::clone(&coalescer);
            let calls = Arc::clone(&calls);
            async move {
                coalescer
                    .run("boxscore:1", || async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        Ok(42)
                    })
                    .await
            }
        });
        let results = join_all(callers).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|result| result == &Ok(42)));
        assert_eq!(coalescer.in_flight(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn failure_reaches_every_waiter_and_is_not_retained() {
        let coalescer = Arc::new(Coalescer::<u32>::new());
        let failing = || async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err(FetchError::upstream("espn", "scoreboard", 503))
        };

        let (first, second) = tokio::join!(
            coalescer.run("scoreboard", failing),
            coalescer.run("scoreboard", failing)
        );
        assert_eq!(first, Err(FetchError::upstream("espn", "scoreboard", 503)));
        assert_eq!(first, second);

        let retried = coalescer.run("scoreboard", || async { Ok(7) }).await;
        assert_eq!(retried, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn distinct_keys_do_not_coalesce() {
        let coalescer = Coalescer::<&'static str>::new();
        let calls = AtomicUsize::new(0);
        let fetch = |value| {
            let calls = &calls;
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(value)
            }
        };

        let (a, b) = tokio::join!(coalescer.run("a", fetch("a")), coalescer.run("b", fetch("b")));

        assert_eq!((a, b), (Ok("a"), Ok("b")));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_leader_abandons_waiters() {
        let coalescer = Arc::new(Coalescer::<u32>::new());

        let leader = {
            let coalescer = Arc::clone(&coalescer);
            tokio::spawn(async move {
                coalescer
                    .run("comments", || async {
                        tokio::time::sleep(Duration::from_secs(60)).await;
                        Ok(1)
                    })
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(coalescer.is_in_flight("comments"));

        let follower = {
            let coalescer = Arc::clone(&coalescer);
            tokio::spawn(async move { coalescer.run("comments", || async { Ok(2) }).await })
        };
        tokio::time::sleep(Duration::from_millis(1)).await;
        leader.abort();

        let outcome = follower.await.expect("follower task should finish");
        assert_eq!(outcome, Err(FetchError::abandoned("comments")));
        assert!(!coalescer.is_in_flight("comments"));
    }
}
