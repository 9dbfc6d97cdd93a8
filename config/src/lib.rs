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

//! Typed model of the mesh rule documents.
//!
//! A rule text is one or more concatenated YAML documents, each tagged by a
//! top-level `kind` field. The two kinds are [`DestinationRuleConfig`]
//! (named, label-matched subsets of one application's instances) and
//! [`VirtualServiceConfig`] (request-matching routes selecting among subsets
//! with weights and fallbacks).

use serde::{Deserialize, Serialize};

pub mod destination;
pub mod matcher;
pub mod virtual_service;

pub use destination::{DestinationRuleConfig, DestinationRuleSpec, SubsetConfig};
pub use matcher::{RequestMatch, StringMatch};
pub use virtual_service::{
    RouteConfig, RouteDestination, RouteDetailConfig, VirtualServiceConfig, VirtualServiceSpec,
};

pub const DESTINATION_RULE_KIND: &str = "DestinationRule";
pub const VIRTUAL_SERVICE_KIND: &str = "VirtualService";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct RuleMetadata {
    #[serde(default)]
    pub name: String,
}

/// Reads the `kind` tag of one parsed YAML document.
pub fn kind_of(document: &serde_yaml::Value) -> Option<&str> {
    document.get("kind").and_then(|kind| kind.as_str())
}
