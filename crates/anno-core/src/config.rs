// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Bridge configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Persistent bridge settings.
///
/// Every field has a default so a partial `bridge.json` still loads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Where plain screenshots are written. `None` means `<data_dir>/screenshots`.
    pub screenshot_dir: Option<PathBuf>,
    /// Where annotated screenshots are written. `None` means `<data_dir>/anno_screenshots`.
    pub anno_screenshot_dir: Option<PathBuf>,
    /// Maximum entries returned by `get_recent_applist`.
    pub recent_app_limit: usize,
    /// Name of the dedicated UI execution thread.
    pub ui_thread_name: String,
    /// Fallback `tracing` filter when `RUST_LOG` is unset.
    pub log_filter: String,
    /// How long the host waits for in-flight calls after stdin closes.
    pub shutdown_grace_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            screenshot_dir: None,
            anno_screenshot_dir: None,
            recent_app_limit: 20,
            ui_thread_name: "anno-ui".into(),
            log_filter: "info".into(),
            shutdown_grace_ms: 2_000,
        }
    }
}

impl BridgeConfig {
    pub fn screenshot_dir(&self, data_dir: &Path) -> PathBuf {
        self.screenshot_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("screenshots"))
    }

    pub fn anno_screenshot_dir(&self, data_dir: &Path) -> PathBuf {
        self.anno_screenshot_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("anno_screenshots"))
    }
}
