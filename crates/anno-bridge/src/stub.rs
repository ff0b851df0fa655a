// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stub bridge for desktop/CI builds where native mobile APIs are unavailable.
//
// UI operations are logged and succeed so a web UI can be driven end to end
// from a terminal. Screenshot paths are derived from the configured
// directories. Anything that needs real device state returns
// `PlatformUnavailable`.

use std::path::PathBuf;

use chrono::Utc;
use serde_json::{Map, Value};

use anno_core::error::{AnnoError, Result};
use anno_core::types::AppDescriptor;

use crate::traits::*;

/// Desktop bridge returned on non-mobile platforms.
pub struct StubBridge {
    screenshot_dir: PathBuf,
    anno_screenshot_dir: PathBuf,
}

impl StubBridge {
    pub fn new(screenshot_dir: PathBuf, anno_screenshot_dir: PathBuf) -> Self {
        Self {
            screenshot_dir,
            anno_screenshot_dir,
        }
    }
}

/// `<dir>/<prefix>_<UTC timestamp>.png`
fn timestamped(dir: &std::path::Path, prefix: &str) -> PathBuf {
    dir.join(format!("{prefix}_{}.png", Utc::now().format("%Y%m%d_%H%M%S")))
}

impl PlatformBridge for StubBridge {
    fn platform_name(&self) -> &str {
        "Desktop (stub)"
    }
}

impl NativeToast for StubBridge {
    fn show_toast(&self, message: &str) -> Result<()> {
        tracing::info!(message, "toast");
        Ok(())
    }
}

impl NativeKeyboard for StubBridge {
    fn show_soft_keyboard(&self) -> Result<()> {
        tracing::debug!("desktop has no soft keyboard; show ignored");
        Ok(())
    }

    fn close_soft_keyboard(&self) -> Result<()> {
        tracing::debug!("desktop has no soft keyboard; close ignored");
        Ok(())
    }
}

impl NativeNavigation for StubBridge {
    fn exit_current_activity(&self) -> Result<()> {
        tracing::info!("exit current activity");
        Ok(())
    }

    fn goto_anno_home(&self) -> Result<()> {
        tracing::info!("navigate to anno home");
        Ok(())
    }

    fn start_activity(&self, activity: &str, extras: &Map<String, Value>) -> Result<()> {
        tracing::info!(activity, extras = extras.len(), "start activity");
        Ok(())
    }

    fn exit_intro(&self) -> Result<()> {
        tracing::info!("exit intro");
        Ok(())
    }
}

impl NativeScreenshot for StubBridge {
    fn screenshot_path(&self) -> Result<PathBuf> {
        Ok(timestamped(&self.screenshot_dir, "screenshot"))
    }

    fn anno_screenshot_path(&self) -> Result<PathBuf> {
        Ok(timestamped(&self.anno_screenshot_dir, "anno"))
    }

    fn process_image_and_appinfo(
        &self,
        _image_reference: &str,
        _app_metadata: &Map<String, Value>,
    ) -> Result<String> {
        tracing::warn!("NativeScreenshot::process_image_and_appinfo called on stub bridge");
        Err(AnnoError::PlatformUnavailable)
    }
}

impl NativeAnnoDraw for StubBridge {
    fn start_anno_draw(&self, session: DrawSession) {
        tracing::warn!(
            image = session.image_reference(),
            "NativeAnnoDraw::start_anno_draw called on stub bridge"
        );
        session.failed(AnnoError::PlatformUnavailable);
    }
}

impl NativeAppCatalog for StubBridge {
    fn recent_apps(&self, _limit: usize) -> Result<Vec<AppDescriptor>> {
        tracing::warn!("NativeAppCatalog::recent_apps called on stub bridge");
        Err(AnnoError::PlatformUnavailable)
    }

    fn installed_apps(&self) -> Result<Vec<AppDescriptor>> {
        tracing::warn!("NativeAppCatalog::installed_apps called on stub bridge");
        Err(AnnoError::PlatformUnavailable)
    }
}

impl NativeGestures for StubBridge {
    fn enable_gesture_listener(&self, listener: GestureListener) {
        tracing::warn!("NativeGestures::enable_gesture_listener called on stub bridge");
        listener.close(Err(AnnoError::PlatformUnavailable));
    }
}
