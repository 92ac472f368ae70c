use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tracing::debug;

use crate::common::error::WtreeError;
use crate::common::result::WtreeResult;

/// 独立した作業を並列度の上限付きで実行するプール
///
/// 作業間で共有するのは結果の蓄積先だけで、1つのロックで守る。
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    jobs: usize,
}

impl WorkerPool {
    /// 新しいWorkerPoolインスタンスを作成（0は1として扱う）
    pub fn new(jobs: usize) -> Self {
        Self { jobs: jobs.max(1) }
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// すべての項目に`work`を適用し、項目の順に結果を返す
    ///
    /// ある項目の失敗は他の項目に影響しない。作業を途中で取り消すことはない。
    pub async fn run<T, R, F, Fut>(&self, items: Vec<T>, work: F) -> WtreeResult<Vec<R>>
    where
        T: Send + 'static,
        R: Send + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        let total = items.len();
        debug!("Running {} items with {} workers", total, self.jobs);

        let semaphore = Arc::new(Semaphore::new(self.jobs));
        let results: Arc<Mutex<Vec<(usize, R)>>> = Arc::new(Mutex::new(Vec::with_capacity(total)));
        let work = Arc::new(work);

        let tasks: Vec<_> = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                let semaphore = semaphore.clone();
                let results = results.clone();
                let work = work.clone();
                tokio::spawn(async move {
                    let _permit = semaphore.acquire_owned().await.map_err(|e| {
                        WtreeError::internal_error(format!("Failed to acquire worker: {}", e))
                    })?;
                    let result = (*work)(item).await;
                    results.lock().await.push((index, result));
                    Ok::<(), WtreeError>(())
                })
            })
            .collect();

        for joined in join_all(tasks).await {
            match joined {
                Ok(task_result) => task_result?,
                Err(join_err) => {
                    return Err(WtreeError::internal_error(format!(
                        "Worker task failed: {}",
                        join_err
                    )))
                }
            }
        }

        let mut results = std::mem::take(&mut *results.lock().await);
        results.sort_by_key(|(index, _)| *index);
        Ok(results.into_iter().map(|(_, result)| result).collect())
    }
}
