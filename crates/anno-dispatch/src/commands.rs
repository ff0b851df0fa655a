// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Built-in command table.
//
// Binds every command name the web UI calls to a method on the platform
// bridge. Anything that shows, hides, or navigates on-screen elements is
// registered as UI-affine; metadata and path lookups run in the background.

use std::sync::Arc;

use serde_json::{Map, Value, json};

use anno_bridge::traits::{DrawOutcome, DrawSession, GestureListener, PlatformBridge};
use anno_core::config::BridgeConfig;
use anno_core::error::{AnnoError, Result};
use anno_core::types::Arguments;

use crate::registry::{Affinity, RegistryBuilder};

pub const EXIT_CURRENT_ACTIVITY: &str = "exit_current_activity";
pub const SHOW_TOAST: &str = "show_toast";
pub const GOTO_ANNO_HOME: &str = "goto_anno_home";
pub const START_ACTIVITY: &str = "start_activity";
pub const PROCESS_IMAGE_AND_APPINFO: &str = "process_image_and_appinfo";
pub const START_ANNO_DRAW: &str = "start_anno_draw";
pub const GET_SCREENSHOT_PATH: &str = "get_screenshot_path";
pub const GET_ANNO_SCREENSHOT_PATH: &str = "get_anno_screenshot_path";
pub const SHOW_SOFTKEYBOARD: &str = "show_softkeyboard";
pub const CLOSE_SOFTKEYBOARD: &str = "close_softkeyboard";
pub const EXIT_INTRO: &str = "exit_intro";
pub const GET_RECENT_APPLIST: &str = "get_recent_applist";
pub const GET_INSTALLED_APP_LIST: &str = "get_installed_app_list";
pub const ENABLE_NATIVE_GESTURE_LISTENER: &str = "enable_native_gesture_listener";

/// Register all built-in commands against `platform`.
pub fn register_builtin_commands(
    builder: &mut RegistryBuilder,
    platform: Arc<dyn PlatformBridge>,
    config: &BridgeConfig,
) -> Result<()> {
    let p = Arc::clone(&platform);
    builder.register_fn(EXIT_CURRENT_ACTIVITY, Affinity::Ui, move |_, r| {
        r.finish(p.exit_current_activity())
    })?;

    let p = Arc::clone(&platform);
    builder.register_fn(SHOW_TOAST, Affinity::Ui, move |args, r| {
        r.finish(args.string(0, "message").and_then(|m| p.show_toast(m)))
    })?;

    let p = Arc::clone(&platform);
    builder.register_fn(GOTO_ANNO_HOME, Affinity::Ui, move |_, r| {
        r.finish(p.goto_anno_home())
    })?;

    let p = Arc::clone(&platform);
    builder.register_fn(START_ACTIVITY, Affinity::Ui, move |args, r| {
        r.finish(start_activity(p.as_ref(), &args))
    })?;

    let p = Arc::clone(&platform);
    builder.register_fn(PROCESS_IMAGE_AND_APPINFO, Affinity::Background, move |args, r| {
        r.finish(process_image_and_appinfo(p.as_ref(), &args))
    })?;

    let p = Arc::clone(&platform);
    builder.register_fn(START_ANNO_DRAW, Affinity::Ui, move |args, r| {
        let image = match args.string(0, "image_reference") {
            Ok(image) => image.to_string(),
            Err(err) => return r.fail(err),
        };
        // The responder moves into the session; the call stays pending until
        // the user saves or leaves the canvas.
        p.start_anno_draw(DrawSession::new(image, move |outcome| match outcome {
            DrawOutcome::Saved(reference) => r.success(Value::String(reference)),
            DrawOutcome::Dismissed => r.fail(AnnoError::Cancelled),
            DrawOutcome::Failed(err) => r.fail(err),
        }));
    })?;

    let p = Arc::clone(&platform);
    builder.register_fn(GET_SCREENSHOT_PATH, Affinity::Background, move |_, r| {
        r.finish(p.screenshot_path())
    })?;

    let p = Arc::clone(&platform);
    builder.register_fn(GET_ANNO_SCREENSHOT_PATH, Affinity::Background, move |_, r| {
        r.finish(p.anno_screenshot_path())
    })?;

    let p = Arc::clone(&platform);
    builder.register_fn(SHOW_SOFTKEYBOARD, Affinity::Ui, move |_, r| {
        r.finish(p.show_soft_keyboard())
    })?;

    let p = Arc::clone(&platform);
    builder.register_fn(CLOSE_SOFTKEYBOARD, Affinity::Ui, move |_, r| {
        r.finish(p.close_soft_keyboard())
    })?;

    let p = Arc::clone(&platform);
    builder.register_fn(EXIT_INTRO, Affinity::Ui, move |_, r| r.finish(p.exit_intro()))?;

    let p = Arc::clone(&platform);
    let limit = config.recent_app_limit;
    builder.register_fn(GET_RECENT_APPLIST, Affinity::Background, move |_, r| {
        r.finish(p.recent_apps(limit).map(|mut apps| {
            apps.truncate(limit);
            apps
        }))
    })?;

    let p = Arc::clone(&platform);
    builder.register_fn(GET_INSTALLED_APP_LIST, Affinity::Background, move |_, r| {
        r.finish(p.installed_apps())
    })?;

    let p = platform;
    builder.register_fn(ENABLE_NATIVE_GESTURE_LISTENER, Affinity::Ui, move |_, r| {
        // Ack once the platform has armed the listener, so a listener that
        // cannot be enabled only ever produces its terminal error.
        let ack = r.progress_sink();
        let events = r.progress_sink();
        p.enable_gesture_listener(GestureListener::new(
            move || {
                ack.emit(json!({ "listening": true }));
            },
            move |event| match serde_json::to_value(&event) {
                Ok(payload) => {
                    events.emit(payload);
                }
                Err(err) => tracing::warn!(error = %err, "unserializable gesture event"),
            },
            move |closed| r.finish(closed),
        ));
    })?;

    Ok(())
}

fn start_activity(p: &dyn PlatformBridge, args: &Arguments) -> Result<()> {
    let activity = args.string(0, "activity_identifier")?;
    match args.optional_object(1, "extras")? {
        Some(extras) => p.start_activity(activity, extras),
        None => p.start_activity(activity, &Map::new()),
    }
}

fn process_image_and_appinfo(p: &dyn PlatformBridge, args: &Arguments) -> Result<String> {
    let image = args.string(0, "image_reference")?;
    let metadata = args.object(1, "app_metadata")?;
    p.process_image_and_appinfo(image, metadata)
}
