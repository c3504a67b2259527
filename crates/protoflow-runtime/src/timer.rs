//! Cancelable scheduled tasks
//!
//! Timers belong to the component that armed them. Cancelling a key, tearing
//! the owner down or dropping it aborts the underlying tokio task.

use indexmap::IndexMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

/// Keyed one-shot timers; re-arming a key cancels its pending timer
#[derive(Debug)]
pub struct TimerSet<K: Hash + Eq> {
    timers: IndexMap<K, JoinHandle<()>>,
}

impl<K: Hash + Eq> Default for TimerSet<K> {
    fn default() -> Self {
        Self {
            timers: IndexMap::new(),
        }
    }
}

impl<K: Hash + Eq> TimerSet<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` after `delay`, replacing any timer pending under `key`
    ///
    /// Without a current tokio runtime nothing is scheduled and `f` is handed
    /// back to the caller.
    pub fn schedule<F>(&mut self, key: K, delay: Duration, f: F) -> Result<(), F>
    where
        F: FnOnce() + Send + 'static,
    {
        let Ok(handle) = Handle::try_current() else {
            return Err(f);
        };
        self.prune();
        let task = handle.spawn(async move {
            tokio::time::sleep(delay).await;
            f();
        });
        if let Some(previous) = self.timers.insert(key, task) {
            previous.abort();
        }
        Ok(())
    }

    /// Cancel the timer under `key`; returns whether one was pending
    pub fn cancel(&mut self, key: &K) -> bool {
        match self.timers.shift_remove(key) {
            Some(task) => {
                let pending = !task.is_finished();
                task.abort();
                pending
            }
            None => false,
        }
    }

    /// Cancel every timer whose key matches `pred`
    pub fn cancel_where(&mut self, pred: impl Fn(&K) -> bool) -> usize {
        let mut cancelled = 0;
        self.timers.retain(|key, task| {
            if pred(key) {
                task.abort();
                cancelled += 1;
                false
            } else {
                true
            }
        });
        cancelled
    }

    pub fn cancel_all(&mut self) {
        for (_, task) in self.timers.drain(..) {
            task.abort();
        }
    }

    /// Whether a timer under `key` has yet to fire
    pub fn is_pending(&self, key: &K) -> bool {
        self.timers.get(key).map(|t| !t.is_finished()).unwrap_or(false)
    }

    /// Number of timers that have yet to fire
    pub fn pending(&self) -> usize {
        self.timers.values().filter(|t| !t.is_finished()).count()
    }

    fn prune(&mut self) {
        self.timers.retain(|_, task| !task.is_finished());
    }
}

impl<K: Hash + Eq> Drop for TimerSet<K> {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

/// Fire-and-forget tasks that are still aborted on teardown
#[derive(Debug, Default)]
pub struct TaskGroup {
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn onto the current runtime; returns false when there is none
    pub fn spawn<F>(&self, future: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Ok(handle) = Handle::try_current() else {
            return false;
        };
        let mut tasks = self.tasks.lock().unwrap_or_else(|e| e.into_inner());
        tasks.retain(|t| !t.is_finished());
        tasks.push(handle.spawn(future));
        true
    }

    /// Number of tasks still running
    pub fn running(&self) -> usize {
        self.tasks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|t| !t.is_finished())
            .count()
    }

    pub fn abort_all(&self) {
        for task in self.tasks.lock().unwrap_or_else(|e| e.into_inner()).drain(..) {
            task.abort();
        }
    }
}

impl Drop for TaskGroup {
    fn drop(&mut self) {
        self.abort_all();
    }
}
