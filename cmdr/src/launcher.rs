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

//! Argument handling and launch-mode resolution for the `autorun` binary.
//!
//! Resolution order mirrors the bundle design: an image with an embedded script runs
//! it straight away and never parses the command line; otherwise the command line
//! selects between executing a script file and compiling one into a bundle.

use crate::bundle;
use crate::engine::{ScriptEngine, ScriptSource};
use autorun_core::{level_from_verbosity, try_initialize_tracing, Runtime, RuntimeOptions,
                   TracingConfig, WriterConfig};
use clap::{CommandFactory, Parser};
use miette::IntoDiagnostic;
use std::path::{Path, PathBuf};

/// More info: <https://docs.rs/clap/latest/clap/_derive/#overview>
#[derive(Debug, Parser, Default)]
#[command(bin_name = "autorun")]
#[command(about = "Run automation scripts, or pack them into self-contained bundles")]
#[command(version)]
#[command(next_line_help = true)]
pub struct CLIArg {
    /// Script file to execute.
    #[arg(value_name = "SCRIPT")]
    pub script_path: Option<PathBuf>,

    /// Compile a script into a self-contained bundle.
    #[arg(short = 'c', value_name = "PATH")]
    pub compile_path: Option<PathBuf>,

    /// Output path for `-c`. Defaults to the script path minus its extension.
    #[arg(short = 'o', value_name = "PATH")]
    pub output_path: Option<PathBuf>,

    /// Log to stderr; repeat for more detail (-v, -vv, -vvv).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,
}

/// Entry point used by the `autorun` binary. Returns `Ok` for every success path —
/// including bare usage output — so the process exits 0 for help and usage, non-zero
/// for everything that goes wrong.
pub fn run_app(engine: &dyn ScriptEngine) -> miette::Result<()> {
    let image = read_self_image()?;

    // An embedded script takes precedence and suppresses argument parsing entirely.
    if let Some(script) = bundle::embedded_script(&image) {
        let source = ScriptSource::Embedded(script.to_vec());
        return execute(engine, source);
    }

    let cli_arg = CLIArg::parse();
    try_run(engine, cli_arg, &image)
}

/// Everything after argument parsing; separated so tests can drive it directly.
pub fn try_run(engine: &dyn ScriptEngine, cli_arg: CLIArg, image: &[u8]) -> miette::Result<()> {
    if cli_arg.verbosity > 0 {
        try_initialize_tracing(TracingConfig {
            writer_config: WriterConfig::Display,
            level_filter: level_from_verbosity(cli_arg.verbosity),
        })?;
    }

    if cli_arg.script_path.is_some() && cli_arg.compile_path.is_some() {
        return Err(miette::miette!(
            code = "autorun_cmdr::launcher::conflict",
            help = "run the script, or compile it, not both",
            "conflicting options: a script argument cannot be combined with `-c`"
        ));
    }

    if let Some(compile_path) = &cli_arg.compile_path {
        let output_path = resolve_output_path(compile_path, cli_arg.output_path.as_deref())?;
        let script = bundle::read_bytes(compile_path)?;
        bundle::write_bundle(image, &script, &output_path)?;
        tracing::info!(
            script = %compile_path.display(),
            bundle = %output_path.display(),
            "bundle written"
        );
        return Ok(());
    }

    if let Some(script_path) = cli_arg.script_path {
        let source = ScriptSource::File(script_path);
        return execute(engine, source);
    }

    // No operation requested: print usage, exit 0.
    CLIArg::command().print_help().into_diagnostic()?;
    Ok(())
}

/// Default bundle path for `-c` without `-o`: the script path minus its extension.
pub fn resolve_output_path(
    compile_path: &Path,
    output_path: Option<&Path>,
) -> miette::Result<PathBuf> {
    if let Some(output_path) = output_path {
        return Ok(output_path.to_path_buf());
    }
    let derived = compile_path.with_extension("");
    if derived == compile_path {
        return Err(miette::miette!(
            code = "autorun_cmdr::launcher::output_path",
            help = "pass -o <path> to pick the bundle location",
            "cannot derive an output path from `{}` (no extension to strip)",
            compile_path.display()
        ));
    }
    Ok(derived)
}

fn execute(engine: &dyn ScriptEngine, source: ScriptSource) -> miette::Result<()> {
    tracing::debug!(engine = engine.name(), "booting script engine");
    let runtime = Runtime::init(RuntimeOptions::default());
    engine.boot(&runtime, source)?;
    runtime.run()?;
    Ok(())
}

fn read_self_image() -> miette::Result<Vec<u8>> {
    let exe = std::env::current_exe().into_diagnostic()?;
    std::fs::read(&exe).into_diagnostic()
}
