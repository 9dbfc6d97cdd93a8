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

use serde::{Deserialize, Serialize};

use crate::{
    matcher::{RequestMatch, StringMatch},
    RuleMetadata,
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct VirtualServiceConfig {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: RuleMetadata,
    #[serde(default)]
    pub spec: VirtualServiceSpec,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct VirtualServiceSpec {
    #[serde(default)]
    pub hosts: Vec<String>,
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// One service-scoped route: `services` selects which target services it
/// applies to (empty = all), `details` are scanned first-match-wins per
/// request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct RouteConfig {
    #[serde(default)]
    pub services: Vec<StringMatch>,
    #[serde(default, rename = "routeDetail")]
    pub details: Vec<RouteDetailConfig>,
}

impl RouteConfig {
    /// Empty matcher list applies to every service.
    pub fn applies_to(&self, service_name: &str) -> bool {
        self.services.is_empty()
            || self
                .services
                .iter()
                .any(|matcher| matcher.is_match(service_name))
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct RouteDetailConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "match")]
    pub matches: Vec<RequestMatch>,
    #[serde(default)]
    pub route: Vec<RouteDestination>,
}

/// A weighted pointer at a subset, optionally chained to a fallback tried
/// when the subset has no live instances.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct RouteDestination {
    pub subset: String,
    #[serde(default)]
    pub weight: i32,
    #[serde(default)]
    pub fallback: Option<Box<RouteDestination>>,
}

impl RouteDestination {
    /// Declared weight with non-positive/unset values floored to 1.
    pub fn effective_weight(&self) -> i64 {
        if self.weight > 0 {
            self.weight as i64
        } else {
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_applies_to_empty_services_list() {
        let route = RouteConfig::default();
        assert!(route.applies_to("org.example.PayService"));
    }

    #[test]
    fn test_route_applies_to_any_matcher() {
        let route = RouteConfig {
            services: vec![
                StringMatch::exact("org.example.OrderService"),
                StringMatch::exact("org.example.PayService"),
            ],
            details: vec![],
        };
        assert!(route.applies_to("org.example.PayService"));
        assert!(!route.applies_to("org.example.UserService"));
    }

    #[test]
    fn test_effective_weight_floor() {
        let mut destination = RouteDestination {
            subset: "v1".to_string(),
            weight: 0,
            fallback: None,
        };
        assert_eq!(destination.effective_weight(), 1);
        destination.weight = -5;
        assert_eq!(destination.effective_weight(), 1);
        destination.weight = 80;
        assert_eq!(destination.effective_weight(), 80);
    }
}
