use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

/// Locks `lock`, recovering the inner state if a previous holder panicked.
pub(crate) fn mutex_lock<'a, T>(
    lock: &'a Mutex<T>,
    target: &'static str,
    op: &'static str,
) -> MutexGuard<'a, T> {
    lock.lock().unwrap_or_else(|poisoned| recover(poisoned, target, op))
}

fn recover<G>(poisoned: PoisonError<G>, target: &'static str, op: &'static str) -> G {
    warn!(
        op,
        target_module = target,
        lock_kind = "mutex.lock",
        result = "poisoned_recovered",
        "Recovered from poisoned cache lock"
    );
    poisoned.into_inner()
}
