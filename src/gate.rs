//! Serialized mutation gate
//!
//! Graph eviction reads a full snapshot of the store, evaluates it and writes
//! back. Any mutation interleaving with that sequence would make the snapshot
//! stale, so every build/evict/store cycle runs through this gate one at a
//! time. Waiters are admitted in FIFO order (tokio's mutex is fair).

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

#[derive(Debug, Default)]
pub struct MutationGate {
    lock: Mutex<()>,
    admitted: AtomicU64,
}

impl MutationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` with exclusive access to the store.
    ///
    /// Admitted work always runs to completion; dropping the returned future
    /// before admission just leaves the queue.
    pub async fn with_exclusive_access<F, Fut, T>(&self, work: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let _guard = self.lock.lock().await;
        let ticket = self.admitted.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::trace!(ticket, "Mutation gate admitted work");
        work().await
    }

    /// Number of work items admitted so far
    pub fn admitted(&self) -> u64 {
        self.admitted.load(Ordering::Relaxed)
    }

    /// Whether some work currently holds the gate
    pub fn is_busy(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_work_never_overlaps() {
        let gate = Arc::new(MutationGate::new());
        let inside = Arc::new(AtomicU64::new(0));
        let mut handles = Vec::new();

        for _ in 0..8 {
            let gate = Arc::clone(&gate);
            let inside = Arc::clone(&inside);
            handles.push(tokio::spawn(async move {
                gate.with_exclusive_access(|| async {
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0, "overlapping work");
                    tokio::time::sleep(Duration::from_millis(2)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
                .await
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(gate.admitted(), 8);
    }

    #[tokio::test]
    async fn test_fifo_admission() {
        let gate = Arc::new(MutationGate::new());
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        let holder = {
            let gate = Arc::clone(&gate);
            tokio::spawn(async move {
                gate.with_exclusive_access(move || async move {
                    release_rx.await.ok();
                })
                .await
            })
        };
        tokio::task::yield_now().await;
        assert!(gate.is_busy());

        let mut waiters = Vec::new();
        for i in 0..5 {
            let gate = Arc::clone(&gate);
            let order = Arc::clone(&order);
            waiters.push(tokio::spawn(async move {
                gate.with_exclusive_access(|| async {
                    order.lock().unwrap().push(i);
                })
                .await
            }));
            // Let the waiter reach the queue before spawning the next one
            tokio::task::yield_now().await;
        }

        release_tx.send(()).unwrap();
        holder.await.unwrap();
        for w in waiters {
            w.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert!(!gate.is_busy());
    }

    #[tokio::test]
    async fn test_returns_work_output() {
        let gate = MutationGate::new();
        let value = gate.with_exclusive_access(|| async { 41 + 1 }).await;
        assert_eq!(value, 42);
    }
}
