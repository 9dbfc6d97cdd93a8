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
    fmt::{Display, Formatter},
};

use crate::constants::{APPLICATION_KEY, GROUP_KEY, VERSION_KEY};

/// A service instance address plus its key-value parameters.
///
/// The routing layer treats a `Url` as an opaque invoker handle: once a url
/// has been handed to a router it is never mutated in place, a changed
/// invoker set is always a wholesale replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Url {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    // same to interfaceName
    pub service_name: String,
    pub params: HashMap<String, String>,
}

#[derive(thiserror::Error, Debug)]
pub enum UrlParseError {
    #[error("fail to parse url({url}): {source}")]
    Invalid {
        url: String,
        #[source]
        source: http::uri::InvalidUri,
    },
    #[error("url({url}) is missing its {part}")]
    Missing { url: String, part: &'static str },
}

impl Url {
    pub fn new() -> Self {
        Default::default()
    }

    /// Parses `scheme://host:port/service.Name?k1=v1&k2=v2`.
    pub fn from_url(url: &str) -> Result<Self, UrlParseError> {
        let uri = url
            .parse::<http::Uri>()
            .map_err(|source| UrlParseError::Invalid {
                url: url.to_string(),
                source,
            })?;
        let missing = |part| UrlParseError::Missing {
            url: url.to_string(),
            part,
        };
        let authority = uri.authority().ok_or_else(|| missing("authority"))?;
        let scheme = uri.scheme_str().ok_or_else(|| missing("scheme"))?;
        let port = authority.port_u16().ok_or_else(|| missing("port"))?;
        let params = uri
            .path_and_query()
            .and_then(|pq| pq.query())
            .map(Url::decode_query)
            .unwrap_or_default();

        Ok(Self {
            scheme: scheme.to_string(),
            host: authority.host().to_string(),
            port,
            service_name: uri.path().trim_start_matches('/').to_string(),
            params,
        })
    }

    pub fn get_param(&self, key: &str) -> Option<String> {
        self.params.get(key).cloned()
    }

    pub fn set_param(&mut self, key: &str, value: &str) {
        self.params.insert(key.to_string(), value.to_string());
    }

    /// Remote application name this instance belongs to.
    pub fn application(&self) -> Option<String> {
        self.get_param(APPLICATION_KEY)
    }

    pub fn get_service_name(&self) -> String {
        self.service_name.clone()
    }

    // serviceKey format: '{group}/{interfaceName}:{version}'
    pub fn service_key(&self) -> String {
        format!(
            "{group}/{interface}:{version}",
            group = self.get_param(GROUP_KEY).unwrap_or_else(|| "default".to_string()),
            interface = self.service_name,
            version = self.get_param(VERSION_KEY).unwrap_or_else(|| "1.0.0".to_string())
        )
    }

    pub fn location(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn decode_query(raw_query: &str) -> HashMap<String, String> {
        let mut params = HashMap::new();
        for pair in raw_query.split('&') {
            let mut kv = pair.trim().splitn(2, '=');
            match (kv.next(), kv.next()) {
                (Some(k), Some(v)) if !k.is_empty() => {
                    params.insert(k.trim().to_string(), v.trim().to_string());
                }
                _ => continue,
            }
        }
        params
    }

    fn encode_query(&self) -> String {
        if self.params.is_empty() {
            return String::new();
        }
        let mut pairs: Vec<String> = self
            .params
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        pairs.sort();
        format!("?{}", pairs.join("&"))
    }
}

impl Display for Url {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}://{}:{}/{}{}",
            self.scheme,
            self.host,
            self.port,
            self.service_name,
            self.encode_query()
        )
    }
}
