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

use serde::{Deserialize, Serialize};

use crate::RuleMetadata;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct DestinationRuleConfig {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: RuleMetadata,
    #[serde(default)]
    pub spec: DestinationRuleSpec,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct DestinationRuleSpec {
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub subsets: Vec<SubsetConfig>,
}

/// A named partition of one application's instances. An instance belongs to
/// the subset iff every label key/value is present and equal in its service
/// parameters; an empty label map is the universal subset.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct SubsetConfig {
    pub name: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl SubsetConfig {
    pub fn matches(&self, params: &HashMap<String, String>) -> bool {
        self.labels
            .iter()
            .all(|(key, value)| params.get(key) == Some(value))
    }
}
