// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

//! Anno native platform bridge abstractions.
//!
//! Defines the capability traits the command handlers call into. Mobile
//! hosts implement `PlatformBridge` on their side of the FFI boundary and
//! hand it to the dispatcher; desktop and CI builds use the stub.

use std::path::Path;
use std::sync::Arc;

use anno_core::BridgeConfig;

pub mod stub;
pub mod traits;

/// Builds the bridge used when no native host supplies one.
///
/// RETURNS: a shared trait object, since every registered command handler
/// holds a reference to it.
pub fn platform_bridge(config: &BridgeConfig, data_dir: &Path) -> Arc<dyn traits::PlatformBridge> {
    Arc::new(stub::StubBridge::new(
        config.screenshot_dir(data_dir),
        config.anno_screenshot_dir(data_dir),
    ))
}
