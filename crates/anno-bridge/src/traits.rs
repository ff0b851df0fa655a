// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Platform-agnostic trait definitions for native capabilities.
//
// The web UI never touches these directly; the dispatch layer binds each
// command name to one of the methods below.

use std::path::PathBuf;

use serde_json::{Map, Value};

use anno_core::error::{AnnoError, Result};
use anno_core::types::{AppDescriptor, GestureEvent};

/// Unified bridge that groups all native capabilities.
///
/// Implementations are shared between the UI thread and the background pool,
/// so they must be `Send + Sync`. Methods documented as UI-bound are only ever
/// called from the UI execution context.
pub trait PlatformBridge:
    NativeToast
    + NativeKeyboard
    + NativeNavigation
    + NativeScreenshot
    + NativeAnnoDraw
    + NativeAppCatalog
    + NativeGestures
    + Send
    + Sync
{
    /// Human-readable platform name (e.g. "iOS 17", "Android 14").
    fn platform_name(&self) -> &str;
}

/// Transient on-screen messages. UI-bound.
pub trait NativeToast {
    fn show_toast(&self, message: &str) -> Result<()>;
}

/// Soft keyboard visibility. UI-bound.
pub trait NativeKeyboard {
    fn show_soft_keyboard(&self) -> Result<()>;

    fn close_soft_keyboard(&self) -> Result<()>;
}

/// Screen transitions. UI-bound.
pub trait NativeNavigation {
    /// Close the screen hosting the web UI.
    fn exit_current_activity(&self) -> Result<()>;

    /// Return to the annotation home screen.
    fn goto_anno_home(&self) -> Result<()>;

    /// Open another native screen by identifier, passing `extras` through.
    fn start_activity(&self, activity: &str, extras: &Map<String, Value>) -> Result<()>;

    /// Leave the first-run intro flow.
    fn exit_intro(&self) -> Result<()>;
}

/// Screenshot locations and post-processing. Safe off the UI thread.
pub trait NativeScreenshot {
    /// Path of the most recent plain screenshot.
    fn screenshot_path(&self) -> Result<PathBuf>;

    /// Path of the most recent annotated screenshot.
    fn anno_screenshot_path(&self) -> Result<PathBuf>;

    /// Attach app metadata to a captured image, returning the processed reference.
    fn process_image_and_appinfo(
        &self,
        image_reference: &str,
        app_metadata: &Map<String, Value>,
    ) -> Result<String>;
}

/// The modal annotation canvas. UI-bound.
pub trait NativeAnnoDraw {
    /// Present the drawing screen for `session.image_reference()`.
    ///
    /// The platform reports the outcome through `session` whenever the user
    /// finishes, which may be long after this call returns. Keeping the
    /// session alive without reporting leaves the call pending.
    fn start_anno_draw(&self, session: DrawSession);
}

/// Installed application metadata. Safe off the UI thread.
pub trait NativeAppCatalog {
    /// Recently used applications, most recent first, at most `limit` entries.
    fn recent_apps(&self, limit: usize) -> Result<Vec<AppDescriptor>>;

    /// Every launchable application on the device, in no particular order.
    fn installed_apps(&self) -> Result<Vec<AppDescriptor>>;
}

/// Native gesture forwarding. UI-bound.
pub trait NativeGestures {
    /// Start forwarding gestures to `listener` until the platform closes it.
    ///
    /// Call `listener.armed()` once gestures are actually observed; a listener
    /// that cannot be enabled is closed with `Err` without arming.
    fn enable_gesture_listener(&self, listener: GestureListener);
}

// ---------------------------------------------------------------------------
// Completion objects for long-running native operations
// ---------------------------------------------------------------------------

/// How a drawing session ended.
#[derive(Debug)]
pub enum DrawOutcome {
    /// The user saved; carries the reference of the annotated image.
    Saved(String),
    /// The user backed out without saving.
    Dismissed,
    Failed(AnnoError),
}

type DrawFinish = Box<dyn FnOnce(DrawOutcome) + Send + Sync>;

/// Handle to one presentation of the annotation canvas.
///
/// Reports exactly one outcome. Dropping it unreported counts as a dismissal.
pub struct DrawSession {
    image_reference: String,
    finish: Option<DrawFinish>,
}

impl DrawSession {
    pub fn new(
        image_reference: impl Into<String>,
        finish: impl FnOnce(DrawOutcome) + Send + Sync + 'static,
    ) -> Self {
        Self {
            image_reference: image_reference.into(),
            finish: Some(Box::new(finish)),
        }
    }

    pub fn image_reference(&self) -> &str {
        &self.image_reference
    }

    pub fn saved(mut self, result_reference: impl Into<String>) {
        self.report(DrawOutcome::Saved(result_reference.into()));
    }

    pub fn dismissed(mut self) {
        self.report(DrawOutcome::Dismissed);
    }

    pub fn failed(mut self, err: AnnoError) {
        self.report(DrawOutcome::Failed(err));
    }

    fn report(&mut self, outcome: DrawOutcome) {
        if let Some(finish) = self.finish.take() {
            finish(outcome);
        }
    }
}

impl Drop for DrawSession {
    fn drop(&mut self) {
        // A panicking native call is not a dismissal; let the completion
        // closure go unreported so the panic is what the caller sees.
        if std::thread::panicking() {
            self.finish.take();
            return;
        }
        self.report(DrawOutcome::Dismissed);
    }
}

type GestureArmed = Box<dyn FnOnce() + Send + Sync>;
type GestureFn = Box<dyn Fn(GestureEvent) + Send + Sync>;
type GestureClose = Box<dyn FnOnce(Result<()>) + Send + Sync>;

/// Receiver for native gesture events.
///
/// The platform calls `armed` once the listener is live, then `emit` per
/// gesture. `close` (or dropping the listener) ends the stream; `Err` reports
/// that the listener could not be enabled or failed while running.
pub struct GestureListener {
    on_armed: Option<GestureArmed>,
    on_event: GestureFn,
    on_close: Option<GestureClose>,
}

impl GestureListener {
    pub fn new(
        on_armed: impl FnOnce() + Send + Sync + 'static,
        on_event: impl Fn(GestureEvent) + Send + Sync + 'static,
        on_close: impl FnOnce(Result<()>) + Send + Sync + 'static,
    ) -> Self {
        Self {
            on_armed: Some(Box::new(on_armed)),
            on_event: Box::new(on_event),
            on_close: Some(Box::new(on_close)),
        }
    }

    /// Report that gestures are now being observed. Only the first call counts.
    pub fn armed(&mut self) {
        if let Some(on_armed) = self.on_armed.take() {
            on_armed();
        }
    }

    pub fn emit(&self, event: GestureEvent) {
        (self.on_event)(event);
    }

    pub fn close(mut self, result: Result<()>) {
        self.finish(result);
    }

    fn finish(&mut self, result: Result<()>) {
        if let Some(on_close) = self.on_close.take() {
            on_close(result);
        }
    }
}

impl Drop for GestureListener {
    fn drop(&mut self) {
        // Unwinding out of the platform is not a clean close.
        if std::thread::panicking() {
            self.on_close.take();
            return;
        }
        self.finish(Ok(()));
    }
}
