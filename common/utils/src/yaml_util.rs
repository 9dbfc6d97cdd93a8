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
use std::{fs, path::PathBuf};

use anyhow::Error;
use serde::Deserialize;
use serde_yaml::Value;

// parse yaml file to structs
pub fn yaml_file_parser<T>(path: PathBuf) -> Result<T, Error>
where
    T: serde::de::DeserializeOwned + std::fmt::Debug,
{
    if !path.is_file() {
        return Err(anyhow::anyhow!("path is not a file: {:?}", path));
    }
    let data = fs::read(path.as_path())?;
    Ok(serde_yaml::from_slice(&data)?)
}

/// Splits a string of one or more concatenated YAML documents into values.
///
/// Rule texts delivered by a config source are `---`-separated documents.
/// The whole text is rejected if any document is syntactically malformed,
/// so a half-readable payload never produces a partial result. Null
/// documents (empty sections between separators) are dropped.
pub fn yaml_multi_document_parser(text: &str) -> Result<Vec<Value>, Error> {
    let mut documents = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }
        documents.push(value);
    }
    Ok(documents)
}
