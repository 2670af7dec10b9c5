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

//! The seam between the front-end and whatever script interpreter is embedded in the
//! final product. See [`ScriptEngine`] for details.

use autorun_core::Runtime;
use std::path::PathBuf;

/// Where the script to execute came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    /// Extracted from the running executable's own bundle.
    Embedded(Vec<u8>),
    /// A path given on the command line.
    File(PathBuf),
}

/// An embedded script interpreter.
///
/// The front-end resolves *what* to run (embedded bundle, script path) and owns exit
/// codes; the engine's only job is to turn script source into coroutines on the
/// runtime's scheduler before [`Runtime::run`] takes over. Implementations typically
/// parse/compile the source and register one root coroutine per script.
pub trait ScriptEngine {
    /// Engine name for diagnostics.
    fn name(&self) -> &str;

    /// Load `source` and register its root coroutine(s) on `runtime`'s scheduler.
    fn boot(&self, runtime: &Runtime, source: ScriptSource) -> miette::Result<()>;
}

/// Placeholder engine for builds that do not link an interpreter: booting always fails
/// with a descriptive diagnostic (and therefore a non-zero exit).
#[derive(Debug, Default)]
pub struct NoEngine;

impl ScriptEngine for NoEngine {
    fn name(&self) -> &str { "none" }

    fn boot(&self, _runtime: &Runtime, source: ScriptSource) -> miette::Result<()> {
        let what = match source {
            ScriptSource::Embedded(_) => "the embedded script".to_string(),
            ScriptSource::File(path) => format!("`{}`", path.display()),
        };
        Err(miette::miette!(
            code = "autorun_cmdr::engine::missing",
            help = "link a script engine into the binary, or use -c to produce bundles",
            "cannot execute {what}: no script engine is embedded in this build"
        ))
    }
}
