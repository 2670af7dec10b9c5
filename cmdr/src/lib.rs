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

//! # autorun-cmdr
//!
//! Command-line front-end over [`autorun_core`]: resolves what to run (an embedded
//! bundle beats a script path beats `-c` compilation), owns process exit codes, and
//! packs script bundles behind the fixed 1,024-byte sentinel. The interpreter itself
//! is pluggable through [`ScriptEngine`].

// Attach sources.
pub mod bundle;
pub mod engine;
pub mod launcher;

// Re-export.
pub use bundle::*;
pub use engine::*;
pub use launcher::*;
