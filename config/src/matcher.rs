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

use std::collections::HashMap;

use meshroute_logger::tracing::warn;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// One string predicate: exact, prefix or regex. The first populated field
/// wins; a matcher with no field set matches nothing.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct StringMatch {
    pub exact: Option<String>,
    pub prefix: Option<String>,
    pub regex: Option<String>,
}

impl StringMatch {
    pub fn is_match(&self, value: &str) -> bool {
        if let Some(exact) = &self.exact {
            return exact == value;
        }
        if let Some(prefix) = &self.prefix {
            return value.starts_with(prefix.as_str());
        }
        if let Some(pattern) = &self.regex {
            return match Regex::new(pattern) {
                Ok(regex) => regex.is_match(value),
                Err(error) => {
                    warn!("invalid regex in rule matcher({}): {}", pattern, error);
                    false
                }
            };
        }
        false
    }

    pub fn exact(value: &str) -> Self {
        StringMatch {
            exact: Some(value.to_string()),
            ..Default::default()
        }
    }
}

/// Request-level predicates of one route detail. Every populated predicate
/// must hold; an all-empty match accepts any request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct RequestMatch {
    pub method: Option<StringMatch>,
    #[serde(default, rename = "sourceLabels")]
    pub source_labels: HashMap<String, String>,
    #[serde(default)]
    pub attachments: HashMap<String, StringMatch>,
}

impl RequestMatch {
    pub fn is_match(
        &self,
        method: &str,
        attachments: &HashMap<String, String>,
        source_labels: &HashMap<String, String>,
    ) -> bool {
        if let Some(method_match) = &self.method {
            if !method_match.is_match(method) {
                return false;
            }
        }
        for (key, expected) in &self.source_labels {
            if source_labels.get(key) != Some(expected) {
                return false;
            }
        }
        for (key, matcher) in &self.attachments {
            match attachments.get(key) {
                Some(value) if matcher.is_match(value) => {}
                _ => return false,
            }
        }
        true
    }
}
