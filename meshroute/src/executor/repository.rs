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

use std::{sync::Arc, time::Duration};

use dashmap::{mapref::entry::Entry, DashMap};
use meshroute_base::{
    constants::{
        CONSUMER_SIDE, DEFAULT_QUEUES, DEFAULT_THREADS, DEFAULT_THREAD_NAME, PROVIDER_SIDE,
        QUEUES_KEY, SIDE_KEY, THREADS_KEY, THREAD_NAME_KEY,
    },
    Url,
};
use meshroute_logger::tracing::{debug, error, info, warn};

use super::{ExecutorError, PoolExecutor};

// consumers share one pool regardless of port; providers get one per
// listening port
pub const CONSUMER_SHARED_PORT: u16 = u16::MAX;

const SHARED_POOL_NAME: &str = "meshroute-shared";
const SHARED_POOL_THREADS: usize = 4;

pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExecutorKey {
    pub side: String,
    pub port: u16,
}

/// Keyed registry of worker pools, created lazily from service URLs. Owns a
/// shared background pool that doubles as the fallback for lookups that miss.
pub struct ExecutorRepository {
    executors: DashMap<ExecutorKey, Arc<PoolExecutor>>,
    shared: Arc<PoolExecutor>,
}

impl Default for ExecutorRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutorRepository {
    pub fn new() -> Self {
        let shared = PoolExecutor::new(SHARED_POOL_NAME, SHARED_POOL_THREADS, 0)
            .expect("failed to start the shared worker pool");
        Self {
            executors: DashMap::new(),
            shared: Arc::new(shared),
        }
    }

    /// The always-available background pool (rule refresh, notification
    /// fan-out).
    pub fn shared_executor(&self) -> Arc<PoolExecutor> {
        self.shared.clone()
    }

    pub fn executor_key(url: &Url) -> ExecutorKey {
        let side = url
            .get_param(SIDE_KEY)
            .unwrap_or_else(|| PROVIDER_SIDE.to_string());
        let port = if side == CONSUMER_SIDE {
            CONSUMER_SHARED_PORT
        } else {
            url.port
        };
        ExecutorKey { side, port }
    }

    /// Returns the pool for the URL's key, creating it on first use. A pool
    /// found shut down is evicted and recreated, so callers never observe a
    /// dead executor.
    pub fn create_executor_if_absent(&self, url: &Url) -> Arc<PoolExecutor> {
        let key = Self::executor_key(url);
        match self.executors.entry(key.clone()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_shutdown() {
                    warn!("worker pool for {:?} was shut down, recreating", key);
                    match Self::build_executor(url, &key) {
                        Ok(executor) => {
                            occupied.insert(executor.clone());
                            executor
                        }
                        Err(e) => {
                            error!("failed to recreate worker pool for {:?}: {}", key, e);
                            self.shared.clone()
                        }
                    }
                } else {
                    occupied.get().clone()
                }
            }
            Entry::Vacant(vacant) => match Self::build_executor(url, &key) {
                Ok(executor) => {
                    vacant.insert(executor.clone());
                    executor
                }
                Err(e) => {
                    error!("failed to create worker pool for {:?}: {}", key, e);
                    self.shared.clone()
                }
            },
        }
    }

    /// Lookup without creation; falls back to the shared pool (logged — the
    /// caller skipped `create_executor_if_absent`) rather than failing.
    pub fn get_executor(&self, url: &Url) -> Arc<PoolExecutor> {
        let key = Self::executor_key(url);
        match self.executors.get(&key) {
            Some(executor) if !executor.is_shutdown() => executor.clone(),
            Some(_) => {
                warn!("worker pool for {:?} is shut down, using the shared pool", key);
                self.shared.clone()
            }
            None => {
                warn!(
                    "no worker pool created for {:?} yet, using the shared pool",
                    key
                );
                self.shared.clone()
            }
        }
    }

    /// Applies changed pool parameters from an updated URL to a running
    /// executor.
    pub fn update_thread_pool(&self, url: &Url, executor: &PoolExecutor) {
        let Some(threads) = url
            .get_param(THREADS_KEY)
            .and_then(|raw| raw.parse::<usize>().ok())
        else {
            return;
        };
        let bound = threads + param_usize(url, QUEUES_KEY, DEFAULT_QUEUES);
        if bound != executor.task_bound() {
            info!(
                "resizing worker pool {} task bound from {} to {}",
                executor.name(),
                executor.task_bound(),
                bound
            );
            executor.resize(bound);
        }
    }

    /// Shuts every owned pool down with a bounded wait each; a stuck pool
    /// cannot hold up the rest.
    pub fn destroy_all(&self) {
        for entry in self.executors.iter() {
            entry.value().shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
            debug!("worker pool {} stopped", entry.value().name());
        }
        self.executors.clear();
        self.shared.shutdown(DEFAULT_SHUTDOWN_TIMEOUT);
    }

    fn build_executor(url: &Url, key: &ExecutorKey) -> Result<Arc<PoolExecutor>, ExecutorError> {
        let threads = param_usize(url, THREADS_KEY, DEFAULT_THREADS);
        let queues = param_usize(url, QUEUES_KEY, DEFAULT_QUEUES);
        let name = url
            .get_param(THREAD_NAME_KEY)
            .unwrap_or_else(|| format!("{}-{}-{}", DEFAULT_THREAD_NAME, key.side, key.port));
        Ok(Arc::new(PoolExecutor::new(&name, threads, queues)?))
    }
}

fn param_usize(url: &Url, key: &str, default: usize) -> usize {
    url.get_param(key)
        .and_then(|raw| raw.parse::<usize>().ok())
        .unwrap_or(default)
}
