//! 批次调度：同一批次的研究任务并发执行，Semaphore 限制同时在途数
//!
//! 所有任务在当前 future 内以 join_all 驱动，调用方 future 被丢弃（取消 / 超时）时在途任务随之放弃。

use std::future::Future;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::Semaphore;

/// 并发上限调度器
#[derive(Debug, Clone)]
pub struct TaskScheduler {
    permits: Arc<Semaphore>,
    max_concurrent: usize,
}

impl TaskScheduler {
    pub fn new(max_concurrent: usize) -> Self {
        let max_concurrent = max_concurrent.max(1);
        Self {
            permits: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// 并发运行一批任务，等待全部完成；结果顺序与输入一致
    pub async fn run_batch<F, T>(&self, tasks: Vec<F>) -> Vec<T>
    where
        F: Future<Output = T>,
    {
        let guarded = tasks.into_iter().map(|task| {
            let permits = Arc::clone(&self.permits);
            async move {
                // Semaphore 不会被关闭；拿不到许可时直接执行
                let _permit = permits.acquire_owned().await.ok();
                task.await
            }
        });
        join_all(guarded).await
    }
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new(5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_run_batch_preserves_order() {
        let scheduler = TaskScheduler::new(2);
        let tasks: Vec<_> = (0..5u64)
            .map(|i| async move {
                tokio::time::sleep(Duration::from_millis(10 * (5 - i))).await;
                i
            })
            .collect();
        assert_eq!(scheduler.run_batch(tasks).await, vec![0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_run_batch_respects_limit() {
        let scheduler = TaskScheduler::new(2);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let tasks: Vec<_> = (0..6)
            .map(|_| {
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                }
            })
            .collect();
        scheduler.run_batch(tasks).await;
        assert_eq!(peak.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_zero_limit_is_clamped() {
        assert_eq!(TaskScheduler::new(0).max_concurrent(), 1);
    }
}
