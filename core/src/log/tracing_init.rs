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

//! Builds and installs the tracing layers described by a
//! [`TracingConfig`](super::TracingConfig).

use super::tracing_config::{TracingConfig, WriterConfig};
use miette::IntoDiagnostic;
use std::path::Path;
use tracing_core::LevelFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry};

/// Type alias for a boxed layer.
pub type DynLayer<S> = dyn Layer<S> + Send + Sync + 'static;

/// Install the global tracing subscriber. Call at most once per process; a second call
/// reports the underlying `set_global_default` error.
pub fn try_initialize_tracing(config: TracingConfig) -> miette::Result<()> {
    let layers = try_create_layers(config)?;
    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .into_diagnostic()
}

/// Returns the layers without installing them, for embedders that compose their own
/// subscriber.
pub fn try_create_layers(
    config: TracingConfig,
) -> miette::Result<Vec<Box<DynLayer<Registry>>>> {
    let mut layers: Vec<Box<DynLayer<Registry>>> = vec![];
    if let Some(layer) = try_create_display_layer(&config)? {
        layers.push(layer);
    }
    if let Some(layer) = try_create_file_layer(&config)? {
        layers.push(layer);
    }
    Ok(layers)
}

fn try_create_display_layer(
    config: &TracingConfig,
) -> miette::Result<Option<Box<DynLayer<Registry>>>> {
    Ok(match config.writer_config {
        WriterConfig::Display | WriterConfig::DisplayAndFile(_) => Some(Box::new(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(config.level_filter),
        )),
        _ => None,
    })
}

fn try_create_file_layer(
    config: &TracingConfig,
) -> miette::Result<Option<Box<DynLayer<Registry>>>> {
    let path = match &config.writer_config {
        WriterConfig::File(path) | WriterConfig::DisplayAndFile(path) => path,
        _ => return Ok(None),
    };
    let path = Path::new(path);
    let directory = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| miette::miette!("log path `{}` has no file name", path.display()))?;
    let appender = tracing_appender::rolling::never(directory, file_name);
    Ok(Some(Box::new(
        tracing_subscriber::fmt::layer()
            .with_writer(appender)
            .with_ansi(false)
            .with_filter(config.level_filter),
    )))
}

/// Level filter from the conventional verbosity flag count (`-v`, `-vv`).
#[must_use]
pub fn level_from_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::OFF,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}
