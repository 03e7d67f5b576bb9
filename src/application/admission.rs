// Admission gate - Bound the number of chart updates with requests in flight
use crate::domain::error::{ChartError, ChartResult};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Permit held for the lifetime of one chart update.
#[derive(Debug)]
pub struct Admission {
    _permit: OwnedSemaphorePermit,
}

/// Counting gate shared by every chart. Waiters are admitted in FIFO order and
/// a slot frees up as soon as an [`Admission`] is dropped, whatever the outcome.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl AdmissionGate {
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    pub async fn admit(&self) -> ChartResult<Admission> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ChartError::Unavailable)?;
        Ok(Admission { _permit: permit })
    }

    /// Run `task` once admitted.
    pub async fn run<T, F>(&self, task: F) -> ChartResult<T>
    where
        F: Future<Output = ChartResult<T>>,
    {
        let _admission = self.admit().await?;
        task.await
    }

    pub fn in_flight(&self) -> usize {
        self.limit - self.semaphore.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_limits_concurrent_tasks() {
        let gate = AdmissionGate::new(2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let gate = gate.clone();
            let running = running.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                gate.run(async {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                })
                .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_failure_releases_slot() {
        let gate = AdmissionGate::new(1);
        let failed: ChartResult<()> = gate
            .run(async { Err(ChartError::Network("boom".to_string())) })
            .await;
        assert!(failed.is_err());
        assert_eq!(gate.in_flight(), 0);

        let ok = tokio::time::timeout(Duration::from_millis(100), gate.run(async { Ok(7) })).await;
        assert_eq!(ok.unwrap().unwrap(), 7);
    }

    #[tokio::test]
    async fn test_waiters_are_admitted_in_order() {
        let gate = AdmissionGate::new(1);
        let held = gate.admit().await.unwrap();
        let order = Arc::new(std::sync::Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for i in 0..3 {
            let gate = gate.clone();
            let order = order.clone();
            handles.push(tokio::spawn(async move {
                let _admission = gate.admit().await.unwrap();
                order.lock().unwrap().push(i);
            }));
            // Let each waiter enqueue before the next one.
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(gate.in_flight(), 1);
        drop(held);
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }
}
