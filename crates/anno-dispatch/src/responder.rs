// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-call delivery slots and the handler-facing `Responder`.
//
// Each accepted call owns one slot. The slot holds a clone of the outbound
// delivery sender until the terminal result is sent, then drops it; nothing
// can be delivered through a closed slot. Closing the slot and releasing the
// callback id happen under the in-flight lock, so a caller that sees the
// terminal delivery can immediately reuse the id.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, warn};

use anno_core::error::AnnoError;
use anno_core::types::{CallId, CallbackId, CommandResult, Delivery};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Callback ids with a call still awaiting its terminal delivery.
#[derive(Debug, Default)]
pub(crate) struct InFlight {
    ids: Mutex<HashSet<CallbackId>>,
}

impl InFlight {
    /// Reserve `id`. Returns `false` if it is already in flight.
    pub(crate) fn claim(&self, id: &CallbackId) -> bool {
        lock(&self.ids).insert(id.clone())
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.ids).len()
    }

    /// Run `send` and release `id` without letting a new claim slip between.
    fn release_with(&self, id: &CallbackId, send: impl FnOnce()) {
        let mut ids = lock(&self.ids);
        send();
        ids.remove(id);
    }
}

/// Delivery state for one accepted call.
pub(crate) struct CallSlot {
    call_id: CallId,
    callback_id: CallbackId,
    command: Arc<str>,
    /// `Some` while open.
    outbound: Mutex<Option<UnboundedSender<Delivery>>>,
    in_flight: Arc<InFlight>,
    /// Thread currently running the handler under the dispatcher's
    /// `catch_unwind`, which reports panics on that thread itself.
    runner: Mutex<Option<ThreadId>>,
}

/// Marks the current thread as the handler runner until dropped.
pub(crate) struct RunGuard<'a> {
    slot: &'a CallSlot,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *lock(&self.slot.runner) = None;
    }
}

impl CallSlot {
    pub(crate) fn open(
        callback_id: CallbackId,
        command: Arc<str>,
        outbound: UnboundedSender<Delivery>,
        in_flight: Arc<InFlight>,
    ) -> Arc<Self> {
        Arc::new(Self {
            call_id: CallId::new(),
            callback_id,
            command,
            outbound: Mutex::new(Some(outbound)),
            in_flight,
            runner: Mutex::new(None),
        })
    }

    /// Claim the current thread as the runner for the guard's lifetime.
    pub(crate) fn running(&self) -> RunGuard<'_> {
        *lock(&self.runner) = Some(thread::current().id());
        RunGuard { slot: self }
    }

    fn panic_reported_by_runner(&self) -> bool {
        *lock(&self.runner) == Some(thread::current().id())
    }

    pub(crate) fn call_id(&self) -> CallId {
        self.call_id
    }

    fn is_closed(&self) -> bool {
        lock(&self.outbound).is_none()
    }

    fn progress(&self, payload: Value) -> bool {
        let outbound = lock(&self.outbound);
        let Some(tx) = outbound.as_ref() else {
            warn!(
                call = %self.call_id,
                callback_id = %self.callback_id,
                "progress after terminal result dropped"
            );
            return false;
        };
        let delivery = Delivery::new(self.callback_id.clone(), CommandResult::Progress(payload));
        if tx.send(delivery).is_err() {
            debug!(call = %self.call_id, "delivery stream closed; progress discarded");
        }
        true
    }

    /// Send the terminal result and close the slot. Returns `false` if the
    /// slot was already closed.
    pub(crate) fn complete(&self, result: CommandResult) -> bool {
        debug_assert!(result.is_terminal());
        let Some(tx) = lock(&self.outbound).take() else {
            warn!(
                call = %self.call_id,
                callback_id = %self.callback_id,
                "second terminal result dropped"
            );
            return false;
        };

        match &result {
            CommandResult::Error(payload) => debug!(
                call = %self.call_id,
                command = %self.command,
                kind = %payload.kind,
                code = %payload.code,
                "call failed"
            ),
            _ => debug!(call = %self.call_id, command = %self.command, "call succeeded"),
        }

        let delivery = Delivery::new(self.callback_id.clone(), result);
        self.in_flight.release_with(&self.callback_id, || {
            if tx.send(delivery).is_err() {
                debug!(call = %self.call_id, "delivery stream closed; terminal result discarded");
            }
        });
        true
    }

    pub(crate) fn fail(&self, err: &AnnoError) -> bool {
        self.complete(CommandResult::Error(err.into()))
    }
}

/// Handle a handler uses to answer its invocation.
///
/// Consuming methods send the terminal result. Dropping a responder that has
/// not answered fails the call with `AnnoError::HandlerAbandoned`, or with
/// `AnnoError::HandlerPanicked` when the dropping thread is unwinding. A
/// handler that means to answer later must keep the responder alive.
pub struct Responder {
    slot: Arc<CallSlot>,
}

impl Responder {
    pub(crate) fn new(slot: Arc<CallSlot>) -> Self {
        Self { slot }
    }

    /// Send a non-terminal result. Returns `false` once the call is closed.
    pub fn progress(&self, payload: Value) -> bool {
        self.slot.progress(payload)
    }

    /// A cloneable handle for emitting progress from callbacks while this
    /// responder is kept for the terminal result.
    pub fn progress_sink(&self) -> ProgressSink {
        ProgressSink {
            slot: Arc::clone(&self.slot),
        }
    }

    pub fn success(self, payload: Value) {
        self.slot.complete(CommandResult::Success(payload));
    }

    pub fn success_empty(self) {
        self.success(Value::Null);
    }

    pub fn fail(self, err: AnnoError) {
        self.slot.fail(&err);
    }

    /// Serialize `result` into a success payload, or fail with its error.
    pub fn finish<T: Serialize>(self, result: anno_core::Result<T>) {
        match result.and_then(|v| serde_json::to_value(v).map_err(AnnoError::from)) {
            Ok(payload) => self.success(payload),
            Err(err) => self.fail(err),
        }
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        if self.slot.is_closed() {
            return;
        }
        if thread::panicking() {
            // The dispatcher reports panics on its own thread, with the
            // payload. Anywhere else nobody will.
            if self.slot.panic_reported_by_runner() {
                return;
            }
            error!(
                call = %self.slot.call_id,
                command = %self.slot.command,
                "responder dropped by a panicking thread"
            );
            self.slot.fail(&AnnoError::HandlerPanicked(
                "responder dropped by a panicking thread".into(),
            ));
            return;
        }
        warn!(
            call = %self.slot.call_id,
            command = %self.slot.command,
            "responder dropped without a result"
        );
        self.slot.fail(&AnnoError::HandlerAbandoned);
    }
}

/// Progress-only view of a call.
#[derive(Clone)]
pub struct ProgressSink {
    slot: Arc<CallSlot>,
}

impl ProgressSink {
    pub fn emit(&self, payload: Value) -> bool {
        self.slot.progress(payload)
    }

    pub fn is_closed(&self) -> bool {
        self.slot.is_closed()
    }
}
