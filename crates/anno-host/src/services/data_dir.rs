// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-aware data directory resolution.

use std::path::PathBuf;

/// Explicit override, mostly for mobile hosts that own the sandbox layout.
const DATA_DIR_ENV: &str = "ANNO_DATA_DIR";

/// Return the bridge data directory, creating it if needed.
///
/// `ANNO_DATA_DIR`, then `$XDG_DATA_HOME/anno`, then
/// `$HOME/.local/share/anno`, then `/tmp/anno`.
pub fn data_dir() -> PathBuf {
    let dir = std::env::var_os(DATA_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| base_dir().join("anno"));
    std::fs::create_dir_all(&dir).ok();
    dir
}

fn base_dir() -> PathBuf {
    std::env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local").join("share")))
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}
