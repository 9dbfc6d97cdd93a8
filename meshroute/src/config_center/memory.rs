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
    collections::HashMap,
    sync::{Arc, RwLock},
    time::Duration,
};

use meshroute_logger::tracing::debug;

use super::{BoxRuleTextListener, RuleSource, RuleSourceError};

/// Process-local rule source. Holds rule texts in memory and pushes them
/// synchronously to registered listeners; used for local deployments and
/// tests in place of a real config-center client.
#[derive(Default)]
pub struct MemoryRuleSource {
    rules: RwLock<HashMap<String, String>>,
    listeners: RwLock<HashMap<String, Vec<BoxRuleTextListener>>>,
}

impl MemoryRuleSource {
    pub fn new() -> Self {
        Default::default()
    }

    fn entry_key(data_id: &str, group: &str) -> String {
        format!("{}/{}", group, data_id)
    }

    /// Stores a rule text and pushes it to every listener of the key.
    pub fn publish(&self, data_id: &str, group: &str, content: &str) {
        let key = Self::entry_key(data_id, group);
        self.rules
            .write()
            .unwrap()
            .insert(key.clone(), content.to_string());
        debug!("published rule under {}", key);
        for listener in self.listener_snapshot(&key) {
            listener.receive(content);
        }
    }

    /// Deletes a rule text; listeners observe the removal as an empty push.
    pub fn remove(&self, data_id: &str, group: &str) {
        let key = Self::entry_key(data_id, group);
        self.rules.write().unwrap().remove(&key);
        for listener in self.listener_snapshot(&key) {
            listener.receive("");
        }
    }

    fn listener_snapshot(&self, key: &str) -> Vec<BoxRuleTextListener> {
        self.listeners
            .read()
            .unwrap()
            .get(key)
            .cloned()
            .unwrap_or_default()
    }
}

impl RuleSource for MemoryRuleSource {
    fn get_rule(
        &self,
        data_id: &str,
        group: &str,
        _timeout: Duration,
    ) -> Result<Option<String>, RuleSourceError> {
        let key = Self::entry_key(data_id, group);
        Ok(self.rules.read().unwrap().get(&key).cloned())
    }

    fn add_listener(&self, data_id: &str, group: &str, listener: BoxRuleTextListener) {
        let key = Self::entry_key(data_id, group);
        self.listeners
            .write()
            .unwrap()
            .entry(key)
            .or_default()
            .push(listener);
    }

    fn remove_listener(&self, data_id: &str, group: &str, listener: &BoxRuleTextListener) {
        let key = Self::entry_key(data_id, group);
        if let Some(registered) = self.listeners.write().unwrap().get_mut(&key) {
            registered.retain(|candidate| !Arc::ptr_eq(candidate, listener));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        received: Mutex<Vec<String>>,
    }

    impl super::super::RuleTextListener for Recorder {
        fn receive(&self, raw: &str) {
            self.received.lock().unwrap().push(raw.to_string());
        }
    }

    #[test]
    fn test_publish_reaches_listener_and_get_rule() {
        let source = MemoryRuleSource::new();
        let recorder = Arc::new(Recorder::default());
        let listener: BoxRuleTextListener = recorder.clone();
        source.add_listener("payments.MESHAPPRULE", "mesh", listener.clone());

        source.publish("payments.MESHAPPRULE", "mesh", "kind: DestinationRule");
        assert_eq!(
            source
                .get_rule("payments.MESHAPPRULE", "mesh", Duration::from_secs(1))
                .unwrap(),
            Some("kind: DestinationRule".to_string())
        );
        assert_eq!(
            recorder.received.lock().unwrap().as_slice(),
            &["kind: DestinationRule".to_string()]
        );

        source.remove_listener("payments.MESHAPPRULE", "mesh", &listener);
        source.publish("payments.MESHAPPRULE", "mesh", "kind: VirtualService");
        assert_eq!(recorder.received.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_remove_pushes_empty_text() {
        let source = MemoryRuleSource::new();
        let recorder = Arc::new(Recorder::default());
        source.add_listener("a.MESHAPPRULE", "mesh", recorder.clone());

        source.publish("a.MESHAPPRULE", "mesh", "kind: DestinationRule");
        source.remove("a.MESHAPPRULE", "mesh");
        assert_eq!(
            recorder.received.lock().unwrap().as_slice(),
            &["kind: DestinationRule".to_string(), String::new()]
        );
        assert_eq!(
            source
                .get_rule("a.MESHAPPRULE", "mesh", Duration::from_secs(1))
                .unwrap(),
            None
        );
    }
}
