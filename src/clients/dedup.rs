//! Sharing of concurrent identical requests.
//!
//! The registry maps a [`RequestKey`] to the shared handle of the operation
//! currently in flight for it. Callers that ask for a key while an operation
//! is pending join it and observe the same outcome.
//!
//! Each operation runs as its own task, so it settles whether or not anyone
//! is polling it, and the entry is removed when it does. When every caller
//! has gone away before that, the task is aborted and the entry removed.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use futures_util::future::{BoxFuture, FutureExt, Shared};
use tokio::task::AbortHandle;

use crate::clients::errors::ClassifiedError;
use crate::clients::http_request::RequestKey;
use crate::clients::http_response::ResponseBody;

/// Outcome shared between every caller of one deduplicated operation.
pub type SharedOutcome = Result<ResponseBody, ClassifiedError>;

/// One caller's handle to a pending deduplicated operation.
///
/// Dropping it withdraws the caller. The operation is aborted once the last
/// caller has withdrawn before it settled.
pub type SharedResult = BoxFuture<'static, SharedOutcome>;

type TaskOutcome = Shared<BoxFuture<'static, SharedOutcome>>;

struct PendingOperation {
    id: u64,
    outcome: TaskOutcome,
    waiters: usize,
    abort: AbortHandle,
}

#[derive(Default)]
struct Table {
    next_id: u64,
    pending: HashMap<RequestKey, PendingOperation>,
}

impl Table {
    fn join(&mut self, key: &RequestKey) -> Option<(u64, TaskOutcome)> {
        let op = self.pending.get_mut(key)?;
        op.waiters += 1;
        Some((op.id, op.outcome.clone()))
    }
}

/// Process-wide table of in-flight deduplicated operations.
///
/// Construct one per application and hand it to the gateway; tests build a
/// fresh one each. Cloning is cheap and clones share the table.
///
/// At most one operation is pending per key. The lock is only held for map
/// access, never while a future is polled.
#[derive(Clone, Default)]
pub struct DeduplicationRegistry {
    table: Arc<Mutex<Table>>,
}

impl fmt::Debug for DeduplicationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeduplicationRegistry")
            .field("pending", &self.len())
            .finish()
    }
}

// Verify DeduplicationRegistry is Send + Sync at compile time
const _: fn() = || {
    const fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<DeduplicationRegistry>();
};

impl DeduplicationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a handle to the pending operation for `key`, or spawns one
    /// built by `factory`.
    ///
    /// `factory` runs only when no operation is pending for `key`. The
    /// operation is spawned on the current tokio runtime and makes progress
    /// on its own.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime and a new operation has to
    /// be spawned.
    pub fn get_or_create<F, Fut>(&self, key: &RequestKey, factory: F) -> SharedResult
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = SharedOutcome> + Send + 'static,
    {
        let joined = self.lock().join(key);
        if let Some((id, outcome)) = joined {
            tracing::debug!(key = %key, "Joining in-flight request");
            return self.waiter(key, id, outcome);
        }

        // Built outside the lock so a factory may touch the registry.
        let operation = factory();

        let mut table = self.lock();
        let joined = table.join(key);
        if let Some((id, outcome)) = joined {
            drop(table);
            tracing::debug!(key = %key, "Joining in-flight request");
            return self.waiter(key, id, outcome);
        }

        let id = table.next_id;
        table.next_id = table.next_id.wrapping_add(1);

        let guard = SettleGuard {
            table: Arc::downgrade(&self.table),
            key: key.clone(),
            id,
        };
        // Spawned under the lock so the task cannot settle before its entry
        // exists.
        let task = tokio::spawn(async move {
            let _guard = guard;
            operation.await
        });
        let abort = task.abort_handle();
        let outcome = async move {
            task.await.unwrap_or_else(|e| {
                if e.is_cancelled() {
                    Err(ClassifiedError::cancelled())
                } else {
                    Err(ClassifiedError::unexpected(e.to_string()))
                }
            })
        }
        .boxed()
        .shared();

        table.pending.insert(
            key.clone(),
            PendingOperation {
                id,
                outcome: outcome.clone(),
                waiters: 1,
                abort,
            },
        );
        drop(table);

        tracing::trace!(key = %key, id, "Registered in-flight request");
        self.waiter(key, id, outcome)
    }

    /// Returns `true` if an operation is pending for `key`.
    #[must_use]
    pub fn contains(&self, key: &RequestKey) -> bool {
        self.lock().pending.contains_key(key)
    }

    /// Returns the number of pending operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Returns `true` if nothing is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn waiter(&self, key: &RequestKey, id: u64, outcome: TaskOutcome) -> SharedResult {
        let waiter = WaiterGuard {
            table: Arc::downgrade(&self.table),
            key: key.clone(),
            id,
        };
        async move {
            let _waiter = waiter;
            outcome.await
        }
        .boxed()
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Removes a pending entry when its operation settles or is aborted.
///
/// Only the entry with the matching id is removed, so a newer operation that
/// took over the key is left alone.
struct SettleGuard {
    table: Weak<Mutex<Table>>,
    key: RequestKey,
    id: u64,
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        let Some(table) = self.table.upgrade() else {
            return;
        };
        let mut table = table.lock().unwrap_or_else(PoisonError::into_inner);
        if table.pending.get(&self.key).is_some_and(|op| op.id == self.id) {
            table.pending.remove(&self.key);
        }
    }
}

/// Withdraws one caller from a pending operation.
///
/// The last caller to withdraw from an unsettled operation removes its entry
/// and aborts the task.
struct WaiterGuard {
    table: Weak<Mutex<Table>>,
    key: RequestKey,
    id: u64,
}

impl Drop for WaiterGuard {
    fn drop(&mut self) {
        let Some(table) = self.table.upgrade() else {
            return;
        };
        let mut table = table.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(op) = table.pending.get_mut(&self.key) else {
            return;
        };
        if op.id != self.id {
            return;
        }
        op.waiters = op.waiters.saturating_sub(1);
        if op.waiters > 0 {
            return;
        }
        let abandoned = table.pending.remove(&self.key);
        // The aborted task drops its settle guard, which takes this lock.
        drop(table);
        if let Some(op) = abandoned {
            tracing::debug!(key = %self.key, "Aborting abandoned request");
            op.abort.abort();
        }
    }
}
