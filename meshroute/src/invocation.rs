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

pub trait Invocation {
    fn get_target_service_unique_name(&self) -> String;
    fn get_method_name(&self) -> String;
    fn get_attachment(&self, key: &str) -> Option<String>;
}

/// One outbound call as seen by the routing layer: the target service, the
/// method, and the request attachments used by rule match predicates.
#[derive(Debug, Default, Clone)]
pub struct RpcInvocation {
    target_service_unique_name: String,
    method_name: String,
    attachments: HashMap<String, String>,
}

impl RpcInvocation {
    pub fn with_service_unique_name(mut self, service_unique_name: String) -> Self {
        self.target_service_unique_name = service_unique_name;
        self
    }

    pub fn with_method_name(mut self, method_name: String) -> Self {
        self.method_name = method_name;
        self
    }

    pub fn with_attachment(mut self, key: &str, value: &str) -> Self {
        self.attachments.insert(key.to_string(), value.to_string());
        self
    }

    pub fn attachments(&self) -> &HashMap<String, String> {
        &self.attachments
    }

    pub fn unique_fingerprint(&self) -> String {
        format!("{}#{}", self.target_service_unique_name, self.method_name)
    }
}

impl Invocation for RpcInvocation {
    fn get_target_service_unique_name(&self) -> String {
        self.target_service_unique_name.clone()
    }

    fn get_method_name(&self) -> String {
        self.method_name.clone()
    }

    fn get_attachment(&self, key: &str) -> Option<String> {
        self.attachments.get(key).cloned()
    }
}
