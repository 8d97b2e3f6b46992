use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use tuner_errors::{TunerError, TunerResult};

/// 有界任务队列 + 固定数量的worker
///
/// 队列满时 `reserve` 立即返回 `QueueFull`，不会等待。
pub struct TuningWorkerPool<T> {
    sender: RwLock<Option<mpsc::Sender<T>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    queue_capacity: usize,
    worker_count: usize,
}

/// 已预留的队列位置，`send` 不会失败
pub struct QueueSlot<T> {
    permit: mpsc::OwnedPermit<T>,
}

impl<T> QueueSlot<T> {
    pub fn send(self, task: T) {
        self.permit.send(task);
    }
}

impl<T: Send + 'static> TuningWorkerPool<T> {
    /// 启动worker，必须在tokio运行时内调用
    pub fn spawn<F, Fut>(worker_count: usize, queue_capacity: usize, handler: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let worker_count = worker_count.max(1);
        let queue_capacity = queue_capacity.max(1);
        let (sender, receiver) = mpsc::channel(queue_capacity);
        let receiver = Arc::new(Mutex::new(receiver));
        let handler = Arc::new(handler);

        let workers = (0..worker_count)
            .map(|index| {
                let receiver = Arc::clone(&receiver);
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    debug!("调优worker {} 启动", index);
                    loop {
                        let task = receiver.lock().await.recv().await;
                        match task {
                            Some(task) => handler(task).await,
                            None => break,
                        }
                    }
                    debug!("调优worker {} 退出", index);
                })
            })
            .collect();

        info!(
            "调优worker池已启动: {} 个worker, 队列容量 {}",
            worker_count, queue_capacity
        );

        Self {
            sender: RwLock::new(Some(sender)),
            workers: Mutex::new(workers),
            queue_capacity,
            worker_count,
        }
    }

    pub async fn reserve(&self) -> TunerResult<QueueSlot<T>> {
        let sender = self
            .sender
            .read()
            .await
            .clone()
            .ok_or_else(|| TunerError::internal("调优worker池已关闭"))?;

        match sender.try_reserve_owned() {
            Ok(permit) => Ok(QueueSlot { permit }),
            Err(mpsc::error::TrySendError::Full(_)) => Err(TunerError::QueueFull {
                capacity: self.queue_capacity,
            }),
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Err(TunerError::internal("调优worker池已关闭"))
            }
        }
    }

    pub fn queue_capacity(&self) -> usize {
        self.queue_capacity
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// 关闭队列，等待已入队的任务全部执行完
    pub async fn shutdown(&self) {
        self.sender.write().await.take();

        let workers: Vec<JoinHandle<()>> = self.workers.lock().await.drain(..).collect();
        for worker in workers {
            if let Err(e) = worker.await {
                warn!("调优worker异常退出: {}", e);
            }
        }
        info!("调优worker池已关闭");
    }
}
