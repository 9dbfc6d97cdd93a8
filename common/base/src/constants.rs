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

pub const APPLICATION_KEY: &str = "application";

pub const GROUP_KEY: &str = "group";
pub const VERSION_KEY: &str = "version";

pub const SIDE_KEY: &str = "side";
pub const PROVIDER_SIDE: &str = "provider";
pub const CONSUMER_SIDE: &str = "consumer";

// worker-pool parameters carried on service URLs
pub const THREADS_KEY: &str = "threads";
pub const QUEUES_KEY: &str = "queues";
pub const THREAD_NAME_KEY: &str = "threadname";

pub const DEFAULT_THREADS: usize = 200;
pub const DEFAULT_QUEUES: usize = 0;
pub const DEFAULT_THREAD_NAME: &str = "meshroute";
