// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The single UI execution context.
//
// UI-affine handlers are posted here and run one at a time in posting order.
// Mobile hosts implement `UiExecutor` by forwarding to their main looper or
// main dispatch queue; everywhere else `UiThread` provides a dedicated OS
// thread draining a FIFO channel.

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};

use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, error, info};

use anno_core::error::{AnnoError, Result};

/// Unit of work for the UI context.
pub type UiTask = Box<dyn FnOnce() + Send + 'static>;

/// Serial executor standing in for the platform UI thread.
pub trait UiExecutor: Send + Sync {
    /// Queue `task` behind everything posted before it.
    ///
    /// Hands the task back if the context has shut down.
    fn post(&self, task: UiTask) -> std::result::Result<(), UiTask>;
}

/// Dedicated thread acting as the UI context.
///
/// The thread exits once every handle to the executor is dropped and the
/// queue has drained.
pub struct UiThread {
    tx: UnboundedSender<UiTask>,
    thread_id: ThreadId,
    handle: Option<JoinHandle<()>>,
}

impl UiThread {
    pub fn spawn(name: &str) -> Result<Self> {
        let (tx, mut rx) = mpsc::unbounded_channel::<UiTask>();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                info!("UI context started");
                while let Some(task) = rx.blocking_recv() {
                    // Handlers are wrapped by the dispatcher already; this
                    // keeps arbitrary posted tasks from killing the thread.
                    if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                        error!("UI task panicked");
                    }
                }
                debug!("UI context stopped");
            })
            .map_err(|e| AnnoError::Bridge(format!("failed to spawn UI thread: {e}")))?;

        Ok(Self {
            tx,
            thread_id: handle.thread().id(),
            handle: Some(handle),
        })
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Stop accepting work and wait for queued tasks to finish.
    pub fn shutdown(mut self) {
        let handle = self.handle.take();
        drop(self);
        if let Some(handle) = handle {
            if handle.join().is_err() {
                error!("UI thread terminated abnormally");
            }
        }
    }
}

impl UiExecutor for UiThread {
    fn post(&self, task: UiTask) -> std::result::Result<(), UiTask> {
        self.tx.send(task).map_err(|e| e.0)
    }
}
