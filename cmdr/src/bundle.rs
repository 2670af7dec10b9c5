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

//! Script-bundle packing and detection.
//!
//! A bundle is the executable image, a 1,024-byte sentinel, then the raw script bytes.
//! On startup the front-end searches its own image for the sentinel; everything after
//! it is the embedded script. The sentinel layout is fixed — existing bundles depend on
//! it bit-for-bit.

use miette::Diagnostic;
use std::{fs, io, path::Path};

/// The 16-byte unit the sentinel is built from.
const SENTINEL_UNIT: [u8; 16] = [
    0x00, 0x80, b'=', b'A', b'U', b'T', b'O', b'M', b'A', b'T', b'I', b'O', b'N', b'=', 0x80,
    0x00,
];

/// Total sentinel size: the unit repeated to fill 1,024 bytes.
pub const SENTINEL_LEN: usize = 1024;

/// The full sentinel. Assembled at run time; the executable image must never contain
/// the full pattern itself.
#[must_use]
pub fn sentinel() -> [u8; SENTINEL_LEN] {
    let mut out = [0_u8; SENTINEL_LEN];
    for chunk in out.chunks_exact_mut(SENTINEL_UNIT.len()) {
        chunk.copy_from_slice(&SENTINEL_UNIT);
    }
    out
}

#[derive(Debug, thiserror::Error, Diagnostic)]
pub enum BundleError {
    #[error("cannot read `{path}`")]
    #[diagnostic(code(autorun_cmdr::bundle::read))]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot write `{path}`")]
    #[diagnostic(code(autorun_cmdr::bundle::write))]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
}

/// Offset of the sentinel inside `image`, if present.
#[must_use]
pub fn find_sentinel(image: &[u8]) -> Option<usize> { boyer_moore_find(image, &sentinel()) }

/// The script bytes embedded after the sentinel, if any.
#[must_use]
pub fn embedded_script(image: &[u8]) -> Option<&[u8]> {
    let pos = find_sentinel(image)?;
    Some(&image[pos + SENTINEL_LEN..])
}

/// Write a bundle: the executable part of `exe_image` (anything after an existing
/// sentinel is dropped), the sentinel, then `script`. On Unix the output is marked
/// executable.
pub fn write_bundle(exe_image: &[u8], script: &[u8], out: &Path) -> Result<(), BundleError> {
    let exe_part = find_sentinel(exe_image).map_or(exe_image, |pos| &exe_image[..pos]);

    let mut bundle = Vec::with_capacity(exe_part.len() + SENTINEL_LEN + script.len());
    bundle.extend_from_slice(exe_part);
    bundle.extend_from_slice(&sentinel());
    bundle.extend_from_slice(script);

    let write_err = |source| BundleError::Write {
        path: out.display().to_string(),
        source,
    };
    fs::write(out, &bundle).map_err(write_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(out, fs::Permissions::from_mode(0o755)).map_err(write_err)?;
    }

    Ok(())
}

/// Read a file for bundling or execution, with the path attached to any error.
pub fn read_bytes(path: &Path) -> Result<Vec<u8>, BundleError> {
    fs::read(path).map_err(|source| BundleError::Read {
        path: path.display().to_string(),
        source,
    })
}

/// Boyer-Moore search (bad-character + good-suffix tables). Returns the offset of the
/// first occurrence of `key` in `data`.
pub(crate) fn boyer_moore_find(data: &[u8], key: &[u8]) -> Option<usize> {
    if key.is_empty() || data.len() < key.len() {
        return None;
    }
    let key_len = key.len();

    // Bad-character table: shift by the distance from the last occurrence.
    let mut bad_char = [key_len as isize; 256];
    for (i, byte) in key.iter().enumerate().take(key_len - 1) {
        bad_char[*byte as usize] = (key_len - 1 - i) as isize;
    }

    // Good-suffix table.
    let is_prefix = |pos: usize| -> bool {
        let suffix_len = key_len - pos;
        (0..suffix_len).all(|i| key[i] == key[pos + i])
    };
    let suffix_length = |pos: usize| -> usize {
        let mut i = 0;
        while key[pos - i] == key[key_len - 1 - i] && i < pos {
            i += 1;
        }
        i
    };

    let mut good_suffix = vec![0_isize; key_len];
    let mut last_prefix_index = key_len - 1;
    for p in (0..key_len).rev() {
        if is_prefix(p + 1) {
            last_prefix_index = p + 1;
        }
        good_suffix[p] = ((key_len - 1 - p) + last_prefix_index) as isize;
    }
    for p in 0..key_len - 1 {
        let slen = suffix_length(p);
        if key[p - slen] != key[key_len - 1 - slen] {
            good_suffix[key_len - 1 - slen] = (key_len - 1 - p + slen) as isize;
        }
    }

    // Search right-to-left per window.
    let data_len = data.len() as isize;
    let mut i = (key_len - 1) as isize;
    while i < data_len {
        let mut j = (key_len - 1) as isize;
        while j >= 0 && data[i as usize] == key[j as usize] {
            i -= 1;
            j -= 1;
        }
        if j < 0 {
            return Some((i + 1) as usize);
        }
        i += bad_char[data[i as usize] as usize].max(good_suffix[j as usize]);
    }
    None
}
