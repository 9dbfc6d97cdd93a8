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

//! Boundary to whatever holds the rule documents. Concrete config-center
//! clients live behind [`RuleSource`]; the routing core only ever sees raw
//! rule text and push callbacks.

use std::{sync::Arc, time::Duration};

pub mod memory;

pub use memory::MemoryRuleSource;

pub type BoxRuleTextListener = Arc<dyn RuleTextListener + Send + Sync + 'static>;

/// Receives raw rule text pushed by a rule source.
pub trait RuleTextListener {
    fn receive(&self, raw: &str);
}

#[derive(thiserror::Error, Debug)]
pub enum RuleSourceError {
    #[error("rule fetch for {data_id} timed out after {timeout:?}")]
    Timeout { data_id: String, timeout: Duration },
    #[error("rule source unavailable: {0}")]
    Unavailable(String),
}

pub trait RuleSource: Send + Sync {
    /// One-shot fetch, bounded by `timeout`. `Ok(None)` means no rule is
    /// published under the key.
    fn get_rule(
        &self,
        data_id: &str,
        group: &str,
        timeout: Duration,
    ) -> Result<Option<String>, RuleSourceError>;

    fn add_listener(&self, data_id: &str, group: &str, listener: BoxRuleTextListener);

    fn remove_listener(&self, data_id: &str, group: &str, listener: &BoxRuleTextListener);
}

/// Platform-provided rule feeds (control planes pushing rules from outside
/// the primary config source) that track which applications are subscribed.
pub trait EnvRuleSource: Send + Sync {
    fn is_enabled(&self) -> bool;
    fn on_subscribe(&self, app: &str, listener: BoxRuleTextListener);
    fn on_unsubscribe(&self, app: &str);
}
