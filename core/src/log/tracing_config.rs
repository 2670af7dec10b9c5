/*
 *   Copyright (c) 2025 R3BL LLC
 *   All rights reserved.
 *
 *   Licensed under the Apache License, Version 2.0 (the "License");
 *   you may not use this file except in compliance with the License.
 *   You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 *   Unless required by applicable law or agreed to in writing, software
 *   distributed under the License is distributed on an "AS IS" BASIS,
 *   WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *   See the License for the specific language governing permissions and
 *   limitations under the License.
 */

//! Declarative logging configuration. See [`TracingConfig`] for details.

use tracing_core::LevelFilter;

/// Where log output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriterConfig {
    /// Human-readable output on stderr.
    Display,
    /// Append to the given log file.
    File(String),
    /// Both of the above.
    DisplayAndFile(String),
    /// Swallow everything (the default for embedded runs).
    None,
}

/// Configuration consumed by [`try_initialize_tracing`].
///
/// [`try_initialize_tracing`]: super::try_initialize_tracing
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub writer_config: WriterConfig,
    pub level_filter: LevelFilter,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            writer_config: WriterConfig::None,
            level_filter: LevelFilter::OFF,
        }
    }
}

impl TracingConfig {
    /// Stderr display at the given level.
    #[must_use]
    pub fn display(level_filter: LevelFilter) -> Self {
        Self {
            writer_config: WriterConfig::Display,
            level_filter,
        }
    }

    /// File-only output at the given level.
    #[must_use]
    pub fn file(path: impl Into<String>, level_filter: LevelFilter) -> Self {
        Self {
            writer_config: WriterConfig::File(path.into()),
            level_filter,
        }
    }
}
