//! 批量调度器 - 编排层
//!
//! ## 调度方式
//!
//! ```text
//! items[0], items[N], items[2N] ... → 槽位 0 的会话 → 通道 0
//! items[1], items[N+1], ...        → 槽位 1 的会话 → 通道 1
//! ...
//! ```
//!
//! 每个会话被移入一个独立的 tokio 任务（通道），通道内按顺序处理分配给它的
//! 条目，所以同一会话永远不会被并发使用；通道之间并行，并行度等于会话数。
//! 完成结果通过 mpsc 发回调度方，只有调度方写结果集合和进度。

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use tokio::sync::mpsc;
use tracing::{debug, error};

use crate::error::{AppError, AppResult};
use crate::infrastructure::Session;
use crate::orchestrator::progress::ProgressCounter;
use crate::orchestrator::session_pool::SessionPool;

/// 单个条目的处理逻辑
#[async_trait]
pub trait BatchWorker: Send + Sync + 'static {
    type Session: Session;
    type Item: Send + Sync + 'static;
    type Output: Send + 'static;

    async fn process(
        &self,
        session: &mut Self::Session,
        index: usize,
        item: &Self::Item,
    ) -> AppResult<Self::Output>;

    /// 完成后打印在进度条上方的一行
    fn describe(&self, item: &Self::Item, result: &AppResult<Self::Output>) -> String;
}

/// 单个条目的处理结果
#[derive(Debug)]
pub struct BatchEntry<I, O> {
    /// 在输入中的位置
    pub index: usize,
    /// 处理它的会话槽位
    pub slot: usize,
    pub item: I,
    pub result: AppResult<O>,
}

/// 把条目分发到会话池中执行，按完成顺序收集结果
///
/// 单个条目失败（包括 panic）只记录在它自己的结果里，不影响同一通道
/// 后面的条目，也不影响其他通道。返回前所有会话都已归还到池中。
pub async fn run_batch<W>(
    pool: &mut SessionPool<W::Session>,
    items: Vec<W::Item>,
    worker: Arc<W>,
    progress: &ProgressCounter,
) -> Vec<BatchEntry<W::Item, W::Output>>
where
    W: BatchWorker,
{
    let total = items.len();
    let lane_count = pool.size();

    let mut queues: Vec<Vec<(usize, W::Item)>> = (0..lane_count).map(|_| Vec::new()).collect();
    for (index, item) in items.into_iter().enumerate() {
        queues[pool.slot_for(index)].push((index, item));
    }

    let (tx, mut rx) = mpsc::unbounded_channel::<BatchEntry<W::Item, W::Output>>();
    let mut lanes = Vec::with_capacity(lane_count);

    for (slot, mut session) in pool.check_out_all() {
        let queue = std::mem::take(&mut queues[slot]);
        let tx = tx.clone();
        let worker = Arc::clone(&worker);

        let handle = tokio::spawn(async move {
            debug!("通道 #{} 开始处理 {} 个条目", slot, queue.len());
            for (index, item) in queue {
                let result = AssertUnwindSafe(worker.process(&mut session, index, &item))
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|panic| {
                        let message = panic_message(panic.as_ref());
                        error!("通道 #{} 处理第 {} 个条目时 panic: {}", slot, index + 1, message);
                        Err(AppError::Other(format!("任务 panic: {}", message)))
                    });
                let entry = BatchEntry {
                    index,
                    slot,
                    item,
                    result,
                };
                if tx.send(entry).is_err() {
                    break;
                }
            }
            session
        });
        lanes.push((slot, handle));
    }
    drop(tx);

    let mut entries = Vec::with_capacity(total);
    while let Some(entry) = rx.recv().await {
        let line = worker.describe(&entry.item, &entry.result);
        progress.advance(entry.result.is_ok(), &line).await;
        entries.push(entry);
    }

    for (slot, handle) in lanes {
        match handle.await {
            Ok(session) => pool.check_in(slot, session),
            Err(e) => error!("通道 #{} 异常退出: {}", slot, e),
        }
    }

    entries
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "未知错误".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::Credentials;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingSession {
        slot: usize,
        in_use: Arc<AtomicUsize>,
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Session for CountingSession {
        fn label(&self) -> String {
            format!("counting #{}", self.slot)
        }

        async fn authenticate(&mut self, _credentials: &Credentials) -> AppResult<()> {
            Ok(())
        }

        async fn close(&mut self) -> AppResult<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct SlotRecorder;

    #[async_trait]
    impl BatchWorker for SlotRecorder {
        type Session = CountingSession;
        type Item = u64;
        type Output = usize;

        async fn process(&self, session: &mut CountingSession, _index: usize, delay: &u64) -> AppResult<usize> {
            // 同一个会话不应同时被两个任务持有
            assert_eq!(session.in_use.fetch_add(1, Ordering::SeqCst), 0);
            tokio::time::sleep(Duration::from_millis(*delay)).await;
            session.in_use.fetch_sub(1, Ordering::SeqCst);
            if *delay == 13 {
                return Err(AppError::Other("boom".to_string()));
            }
            Ok(session.slot)
        }

        fn describe(&self, item: &u64, _result: &AppResult<usize>) -> String {
            format!("item {}", item)
        }
    }

    #[tokio::test]
    async fn test_round_robin_and_exclusive_use() {
        let closed = Arc::new(AtomicUsize::new(0));
        let sessions: Vec<CountingSession> = (0..3)
            .map(|slot| CountingSession {
                slot,
                in_use: Arc::new(AtomicUsize::new(0)),
                closed: Arc::clone(&closed),
            })
            .collect();
        let mut pool = SessionPool::from_sessions(sessions).unwrap();

        // 故意让前面的条目更慢，完成顺序与输入顺序不同
        let items: Vec<u64> = vec![30, 20, 10, 1, 13, 2, 5, 0];
        let progress = ProgressCounter::hidden(items.len());
        let entries = run_batch(&mut pool, items, Arc::new(SlotRecorder), &progress).await;

        assert_eq!(entries.len(), 8);
        assert_eq!(progress.completed().await, 8);
        assert_eq!(progress.failed().await, 1);
        for entry in &entries {
            assert_eq!(entry.slot, entry.index % 3);
            match &entry.result {
                Ok(slot) => assert_eq!(*slot, entry.index % 3),
                Err(_) => assert_eq!(entry.item, 13),
            }
        }

        assert_eq!(pool.shutdown().await, 3);
        assert_eq!(closed.load(Ordering::SeqCst), 3);
    }

    struct PanicsOnFirst;

    #[async_trait]
    impl BatchWorker for PanicsOnFirst {
        type Session = CountingSession;
        type Item = String;
        type Output = usize;

        async fn process(&self, session: &mut CountingSession, index: usize, _item: &String) -> AppResult<usize> {
            if index == 0 {
                panic!("页面脚本崩溃");
            }
            Ok(session.slot)
        }

        fn describe(&self, item: &String, _result: &AppResult<usize>) -> String {
            item.clone()
        }
    }

    #[tokio::test]
    async fn test_panic_is_isolated_to_its_item() {
        let closed = Arc::new(AtomicUsize::new(0));
        let sessions: Vec<CountingSession> = (0..2)
            .map(|slot| CountingSession {
                slot,
                in_use: Arc::new(AtomicUsize::new(0)),
                closed: Arc::clone(&closed),
            })
            .collect();
        let mut pool = SessionPool::from_sessions(sessions).unwrap();

        let items: Vec<String> = (0..6).map(|i| format!("post {}", i)).collect();
        let progress = ProgressCounter::hidden(items.len());
        let mut entries = run_batch(&mut pool, items, Arc::new(PanicsOnFirst), &progress).await;
        entries.sort_by_key(|entry| entry.index);

        assert_eq!(entries.len(), 6);
        assert_eq!(progress.failed().await, 1);
        match &entries[0].result {
            Err(AppError::Other(message)) => assert!(message.contains("页面脚本崩溃")),
            other => panic!("expected panic to become an error, got {:?}", other),
        }
        // 同一通道后面的条目照常处理
        assert_eq!(entries[2].result.as_ref().unwrap(), &0);
        assert_eq!(entries[4].result.as_ref().unwrap(), &0);

        assert_eq!(pool.shutdown().await, 2);
        assert_eq!(closed.load(Ordering::SeqCst), 2);
    }
}
