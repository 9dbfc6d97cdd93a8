/*
 * Licensed to the Apache Software Foundation (ASF) under one or more
 * contributor license agreements.  See the NOTICE file distributed with
 * this work for additional information regarding copyright ownership.
 * The ASF licenses this file to You under the Apache License, Version 2.0
 * (the "License"); you may not use this file except in compliance with
 * the License.  You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

use std::{
    fmt::{Debug, Formatter},
    future::Future,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use meshroute_logger::tracing::warn;
use tokio::{runtime, sync::Semaphore};

// OS worker threads per pool are capped; the configured `threads` value is
// carried in full by the admission bound instead.
const MAX_WORKER_THREADS: usize = 16;

#[derive(thiserror::Error, Debug)]
pub enum ExecutorError {
    #[error("failed to start worker pool {name}: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// One worker pool: a dedicated multi-thread runtime plus a semaphore that
/// bounds admitted tasks. The bound — not the thread count — is the quantity
/// that can be resized while the pool runs.
pub struct PoolExecutor {
    name: String,
    runtime: Mutex<Option<runtime::Runtime>>,
    handle: runtime::Handle,
    permits: Arc<Semaphore>,
    task_bound: AtomicUsize,
    closed: AtomicBool,
}

impl PoolExecutor {
    pub fn new(name: &str, threads: usize, queues: usize) -> Result<Self, ExecutorError> {
        let threads = threads.max(1);
        let runtime = runtime::Builder::new_multi_thread()
            .worker_threads(threads.min(MAX_WORKER_THREADS))
            .thread_name(format!("{}-worker", name))
            .enable_time()
            .build()
            .map_err(|source| ExecutorError::Spawn {
                name: name.to_string(),
                source,
            })?;
        let bound = threads + queues;
        Ok(Self {
            name: name.to_string(),
            handle: runtime.handle().clone(),
            runtime: Mutex::new(Some(runtime)),
            permits: Arc::new(Semaphore::new(bound)),
            task_bound: AtomicUsize::new(bound),
            closed: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Submits a task. Tasks beyond the admission bound wait for a slot
    /// inside the pool; the submitting thread never blocks.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.is_shutdown() {
            warn!("worker pool {} is shut down, dropping task", self.name);
            return;
        }
        let permits = self.permits.clone();
        self.handle.spawn(async move {
            // a closed semaphore means the pool is draining
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            task.await;
        });
    }

    pub fn is_shutdown(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn task_bound(&self) -> usize {
        self.task_bound.load(Ordering::SeqCst)
    }

    /// Live-resizes the admission bound. Growing takes effect immediately;
    /// shrinking reclaims slots as running tasks release them. Tasks already
    /// admitted are never interrupted.
    pub fn resize(&self, bound: usize) {
        if self.is_shutdown() {
            return;
        }
        let bound = bound.max(1);
        let previous = self.task_bound.swap(bound, Ordering::SeqCst);
        if bound > previous {
            self.permits.add_permits(bound - previous);
        } else if bound < previous {
            let permits = self.permits.clone();
            let excess = (previous - bound) as u32;
            self.handle.spawn(async move {
                if let Ok(reclaimed) = permits.acquire_many_owned(excess).await {
                    reclaimed.forget();
                }
            });
        }
    }

    /// Stops accepting work and waits up to `timeout` for in-flight tasks;
    /// whatever is still running afterwards is abandoned. Idempotent. Must
    /// be called from outside the pool's own workers.
    pub fn shutdown(&self, timeout: Duration) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.permits.close();
        let runtime = self.runtime.lock().unwrap().take();
        if let Some(runtime) = runtime {
            runtime.shutdown_timeout(timeout);
        }
    }
}

impl Debug for PoolExecutor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolExecutor")
            .field("name", &self.name)
            .field("task_bound", &self.task_bound())
            .field("closed", &self.is_shutdown())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;

    use super::*;

    #[test]
    fn test_spawn_runs_task() {
        let pool = PoolExecutor::new("test-pool", 2, 0).unwrap();
        let (tx, rx) = mpsc::channel();
        pool.spawn(async move {
            tx.send(41 + 1).unwrap();
        });
        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);
        pool.shutdown(Duration::from_secs(1));
    }

    #[test]
    fn test_resize_changes_bound() {
        let pool = PoolExecutor::new("resize-pool", 2, 2).unwrap();
        assert_eq!(pool.task_bound(), 4);
        pool.resize(8);
        assert_eq!(pool.task_bound(), 8);
        pool.resize(1);
        assert_eq!(pool.task_bound(), 1);
        pool.shutdown(Duration::from_secs(1));
    }

    #[test]
    fn test_shutdown_is_idempotent_and_drops_new_tasks() {
        let pool = PoolExecutor::new("stop-pool", 1, 0).unwrap();
        pool.shutdown(Duration::from_millis(100));
        pool.shutdown(Duration::from_millis(100));
        assert!(pool.is_shutdown());

        let (tx, rx) = mpsc::channel::<()>();
        pool.spawn(async move {
            let _ = tx.send(());
        });
        assert!(rx.recv_timeout(Duration::from_millis(200)).is_err());
    }
}
