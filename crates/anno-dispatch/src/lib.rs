// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Anno dispatch: the command registry and the bridge that runs it.

pub mod bridge;
pub mod commands;
pub mod registry;
pub mod responder;
pub mod ui_context;
pub mod wire;

pub use bridge::{DeliveryStream, DispatchBridge};
pub use registry::{Affinity, CommandHandler, CommandRegistry, FnHandler, RegistryBuilder};
pub use responder::{ProgressSink, Responder};
pub use ui_context::{UiExecutor, UiTask, UiThread};
