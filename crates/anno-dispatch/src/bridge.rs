// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Dispatch bridge -- routes invocations to handlers and correlates replies.
//
// `dispatch` validates an invocation, claims its callback id, and schedules
// the handler on the UI context or the blocking pool according to the
// affinity recorded at registration. It never waits for the handler. Every
// result the handler produces reaches the UI layer through the single
// `DeliveryStream`, tagged with the invocation's callback id.
//
// # Failure model
//
// Validation failures are answered immediately with a terminal error and no
// handler runs. Handler panics are caught at the execution boundary and
// become `handler_panicked` errors. Nothing a handler does can take the
// bridge down.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, instrument, warn};

use anno_core::config::BridgeConfig;
use anno_core::error::{AnnoError, Result};
use anno_core::types::{Arguments, CallbackId, Delivery, Invocation};

use crate::registry::{Affinity, CommandRegistry, RegisteredCommand};
use crate::responder::{CallSlot, InFlight, Responder};
use crate::ui_context::{UiExecutor, UiThread};

/// Receiving end of all deliveries, consumed by the UI layer.
pub struct DeliveryStream {
    rx: UnboundedReceiver<Delivery>,
}

impl DeliveryStream {
    /// Next delivery, or `None` once the bridge and every pending call are gone.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }
}

/// Entry point for the UI layer.
///
/// Cheap to clone; clones share the registry, UI context, and in-flight set.
#[derive(Clone)]
pub struct DispatchBridge {
    registry: Arc<CommandRegistry>,
    ui: Arc<dyn UiExecutor>,
    runtime: Handle,
    outbound: UnboundedSender<Delivery>,
    in_flight: Arc<InFlight>,
}

impl DispatchBridge {
    /// Assemble a bridge from explicit parts.
    ///
    /// `runtime` hosts background handlers via `spawn_blocking`.
    pub fn new(
        registry: Arc<CommandRegistry>,
        ui: Arc<dyn UiExecutor>,
        runtime: Handle,
    ) -> (Self, DeliveryStream) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let bridge = Self {
            registry,
            ui,
            runtime,
            outbound,
            in_flight: Arc::new(InFlight::default()),
        };
        (bridge, DeliveryStream { rx })
    }

    /// Spawn a dedicated UI thread and bind to the current tokio runtime.
    pub fn start(registry: CommandRegistry, config: &BridgeConfig) -> Result<(Self, DeliveryStream)> {
        let runtime = Handle::try_current()
            .map_err(|e| AnnoError::Bridge(format!("no tokio runtime: {e}")))?;
        let ui = UiThread::spawn(&config.ui_thread_name)?;
        Ok(Self::new(Arc::new(registry), Arc::new(ui), runtime))
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    /// Calls accepted but not yet answered with a terminal result.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Schedule `invocation`. Results arrive on the `DeliveryStream`.
    #[instrument(
        skip_all,
        fields(command = %invocation.command(), callback_id = %invocation.callback_id())
    )]
    pub fn dispatch(&self, invocation: Invocation) {
        let (command, args, callback_id) = invocation.into_parts();

        if callback_id.is_empty() {
            self.reject(
                callback_id,
                &AnnoError::InvalidInvocation("callback id must not be empty".into()),
            );
            return;
        }

        let registered = match self.registry.lookup(&command) {
            Ok(registered) => registered.clone(),
            Err(err) => {
                self.reject(callback_id, &err);
                return;
            }
        };

        if !self.in_flight.claim(&callback_id) {
            self.reject(
                callback_id.clone(),
                &AnnoError::InvalidInvocation(format!(
                    "callback id {callback_id:?} is already in flight"
                )),
            );
            return;
        }

        let slot = CallSlot::open(
            callback_id,
            Arc::from(registered.name()),
            self.outbound.clone(),
            Arc::clone(&self.in_flight),
        );
        let responder = Responder::new(Arc::clone(&slot));
        let affinity = registered.affinity();
        debug!(call = %slot.call_id(), ?affinity, "call accepted");

        let task_slot = Arc::clone(&slot);
        let task = move || run(&registered, args, responder, &task_slot);

        match affinity {
            Affinity::Ui => {
                if let Err(task) = self.ui.post(Box::new(task)) {
                    error!(call = %slot.call_id(), "UI context closed; call failed");
                    slot.fail(&AnnoError::UiContextClosed);
                    drop(task);
                }
            }
            Affinity::Background => {
                self.runtime.spawn_blocking(task);
            }
        }
    }

    /// Answer `callback_id` with a terminal error without running anything.
    ///
    /// The id is neither claimed nor released, so an in-flight call with the
    /// same id is unaffected.
    pub fn reject(&self, callback_id: CallbackId, err: &AnnoError) {
        warn!(callback_id = %callback_id, error = %err, "invocation rejected");
        if self.outbound.send(Delivery::error(callback_id, err)).is_err() {
            debug!("delivery stream closed; rejection discarded");
        }
    }
}

/// Execute one handler, converting a panic into a terminal error.
fn run(command: &RegisteredCommand, args: Arguments, responder: Responder, slot: &CallSlot) {
    let handler = command.handler();
    let outcome = {
        let _running = slot.running();
        panic::catch_unwind(AssertUnwindSafe(|| handler.execute(args, responder)))
    };
    if let Err(payload) = outcome {
        let message = panic_message(payload.as_ref());
        error!(call = %slot.call_id(), command = command.name(), %message, "handler panicked");
        slot.fail(&AnnoError::HandlerPanicked(message));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Barrier, Mutex};
    use std::thread;
    use std::time::Duration;

    use anno_core::error::ErrorKind;
    use anno_core::types::CommandResult;
    use serde_json::{Value, json};

    use crate::registry::RegistryBuilder;
    use crate::ui_context::UiTask;

    async fn next(stream: &mut DeliveryStream) -> Delivery {
        tokio::time::timeout(Duration::from_secs(5), stream.recv())
            .await
            .expect("timed out waiting for a delivery")
            .expect("delivery stream closed")
    }

    async fn assert_quiet(stream: &mut DeliveryStream) {
        let extra = tokio::time::timeout(Duration::from_millis(100), stream.recv()).await;
        assert!(extra.is_err(), "unexpected delivery: {extra:?}");
    }

    fn error_kind(delivery: &Delivery) -> Option<ErrorKind> {
        delivery.result.error_kind()
    }

    fn start(builder: RegistryBuilder) -> (DispatchBridge, DeliveryStream) {
        let ui = UiThread::spawn("test-ui").unwrap();
        DispatchBridge::new(Arc::new(builder.build()), Arc::new(ui), Handle::current())
    }

    #[tokio::test]
    async fn unknown_command_is_rejected_without_running_anything() {
        let ran = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let mut builder = CommandRegistry::builder();
        builder
            .register_fn("show_toast", Affinity::Ui, move |_, r| {
                flag.store(true, Ordering::SeqCst);
                r.success_empty();
            })
            .unwrap();
        let (bridge, mut stream) = start(builder);

        bridge.dispatch(Invocation::new("no_such_command", vec![], "cb1"));

        let delivery = next(&mut stream).await;
        assert_eq!(delivery.callback_id.as_str(), "cb1");
        assert!(delivery.terminal);
        assert_eq!(error_kind(&delivery), Some(ErrorKind::UnknownCommand));
        assert_quiet(&mut stream).await;
        assert!(!ran.load(Ordering::SeqCst));
        assert_eq!(bridge.in_flight(), 0);
    }

    #[tokio::test]
    async fn empty_callback_id_is_invalid() {
        let mut builder = CommandRegistry::builder();
        builder
            .register_fn("exit_intro", Affinity::Ui, |_, r| r.success_empty())
            .unwrap();
        let (bridge, mut stream) = start(builder);

        bridge.dispatch(Invocation::new("exit_intro", vec![], ""));

        let delivery = next(&mut stream).await;
        assert_eq!(error_kind(&delivery), Some(ErrorKind::InvalidInvocation));
        assert_quiet(&mut stream).await;
    }

    #[tokio::test]
    async fn duplicate_in_flight_id_does_not_disturb_first_call() {
        let (gate_tx, gate_rx) = std::sync::mpsc::channel::<()>();
        let gate_rx = Mutex::new(gate_rx);
        let mut builder = CommandRegistry::builder();
        builder
            .register_fn("get_installed_app_list", Affinity::Background, move |_, r| {
                gate_rx.lock().unwrap().recv().unwrap();
                r.success(json!(["first"]));
            })
            .unwrap();
        let (bridge, mut stream) = start(builder);

        bridge.dispatch(Invocation::new("get_installed_app_list", vec![], "cb2"));
        bridge.dispatch(Invocation::new("get_installed_app_list", vec![], "cb2"));

        let rejected = next(&mut stream).await;
        assert_eq!(rejected.callback_id.as_str(), "cb2");
        assert_eq!(error_kind(&rejected), Some(ErrorKind::InvalidInvocation));
        assert_eq!(bridge.in_flight(), 1);

        gate_tx.send(()).unwrap();
        let first = next(&mut stream).await;
        assert_eq!(first.callback_id.as_str(), "cb2");
        assert_eq!(first.result, CommandResult::Success(json!(["first"])));
        assert_quiet(&mut stream).await;
        assert_eq!(bridge.in_flight(), 0);
    }

    #[tokio::test]
    async fn progress_precedes_terminal_and_nothing_follows() {
        let mut builder = CommandRegistry::builder();
        builder
            .register_fn("count", Affinity::Background, |_, r| {
                for i in 0..3 {
                    r.progress(json!(i));
                }
                r.success(json!("done"));
            })
            .unwrap();
        let (bridge, mut stream) = start(builder);

        bridge.dispatch(Invocation::new("count", vec![], "cb"));

        let mut results = Vec::new();
        loop {
            let delivery = next(&mut stream).await;
            assert_eq!(delivery.callback_id.as_str(), "cb");
            let terminal = delivery.terminal;
            results.push(delivery.result);
            if terminal {
                break;
            }
        }
        assert_eq!(
            results,
            vec![
                CommandResult::Progress(json!(0)),
                CommandResult::Progress(json!(1)),
                CommandResult::Progress(json!(2)),
                CommandResult::Success(json!("done")),
            ]
        );
        assert_quiet(&mut stream).await;
    }

    #[tokio::test]
    async fn callback_id_is_reusable_after_terminal() {
        let mut builder = CommandRegistry::builder();
        builder
            .register_fn("echo", Affinity::Ui, |args, r| {
                r.success(args.get(0).cloned().unwrap_or(Value::Null))
            })
            .unwrap();
        let (bridge, mut stream) = start(builder);

        bridge.dispatch(Invocation::new("echo", vec![json!(1)], "cb"));
        assert_eq!(next(&mut stream).await.result, CommandResult::Success(json!(1)));

        bridge.dispatch(Invocation::new("echo", vec![json!(2)], "cb"));
        assert_eq!(next(&mut stream).await.result, CommandResult::Success(json!(2)));
    }

    #[tokio::test]
    async fn ui_calls_run_one_at_a_time_in_arrival_order() {
        let ui = Arc::new(UiThread::spawn("test-ui").unwrap());
        let ui_thread = ui.thread_id();
        let active = Arc::new(AtomicUsize::new(0));
        let overlap = Arc::new(AtomicBool::new(false));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let (a, o, s) = (Arc::clone(&active), Arc::clone(&overlap), Arc::clone(&seen));
        let mut builder = CommandRegistry::builder();
        builder
            .register_fn("show_toast", Affinity::Ui, move |args, r| {
                if a.fetch_add(1, Ordering::SeqCst) != 0 {
                    o.store(true, Ordering::SeqCst);
                }
                thread::sleep(Duration::from_millis(2));
                s.lock()
                    .unwrap()
                    .push((args.get(0).cloned(), thread::current().id()));
                a.fetch_sub(1, Ordering::SeqCst);
                r.success_empty();
            })
            .unwrap();
        let (bridge, mut stream) =
            DispatchBridge::new(Arc::new(builder.build()), ui, Handle::current());

        for i in 0..10 {
            bridge.dispatch(Invocation::new("show_toast", vec![json!(i)], format!("cb{i}")));
        }
        for _ in 0..10 {
            assert!(next(&mut stream).await.terminal);
        }

        assert!(!overlap.load(Ordering::SeqCst));
        let seen = seen.lock().unwrap();
        let order: Vec<Option<Value>> = seen.iter().map(|(v, _)| v.clone()).collect();
        let expected: Vec<Option<Value>> = (0..10).map(|i| Some(json!(i))).collect();
        assert_eq!(order, expected);
        assert!(seen.iter().all(|(_, id)| *id == ui_thread));
    }

    #[tokio::test]
    async fn background_calls_run_concurrently() {
        let barrier = Arc::new(Barrier::new(2));
        let b = Arc::clone(&barrier);
        let mut builder = CommandRegistry::builder();
        builder
            .register_fn("get_recent_applist", Affinity::Background, move |_, r| {
                // Only returns once both calls are running at the same time.
                b.wait();
                r.success(json!([]));
            })
            .unwrap();
        let (bridge, mut stream) = start(builder);

        bridge.dispatch(Invocation::new("get_recent_applist", vec![], "a"));
        bridge.dispatch(Invocation::new("get_recent_applist", vec![], "b"));

        let mut ids = vec![
            next(&mut stream).await.callback_id.to_string(),
            next(&mut stream).await.callback_id.to_string(),
        ];
        ids.sort();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn handler_panic_becomes_handler_failure() {
        let mut builder = CommandRegistry::builder();
        builder
            .register_fn("explode", Affinity::Ui, |_, _r| panic!("native crash"))
            .unwrap()
            .register_fn("exit_intro", Affinity::Ui, |_, r| r.success_empty())
            .unwrap();
        let (bridge, mut stream) = start(builder);

        bridge.dispatch(Invocation::new("explode", vec![], "cb1"));
        let delivery = next(&mut stream).await;
        match &delivery.result {
            CommandResult::Error(payload) => {
                assert_eq!(payload.kind, ErrorKind::HandlerFailure);
                assert_eq!(payload.code, "handler_panicked");
                assert!(payload.message.contains("native crash"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_quiet(&mut stream).await;

        // The UI context survives.
        bridge.dispatch(Invocation::new("exit_intro", vec![], "cb2"));
        assert_eq!(
            next(&mut stream).await.result,
            CommandResult::Success(Value::Null)
        );
    }

    #[tokio::test]
    async fn panic_on_a_helper_thread_still_answers() {
        let mut builder = CommandRegistry::builder();
        builder
            .register_fn("get_recent_applist", Affinity::Background, |_, r| {
                thread::spawn(move || {
                    let _r = r;
                    panic!("helper crashed");
                });
            })
            .unwrap();
        let (bridge, mut stream) = start(builder);

        bridge.dispatch(Invocation::new("get_recent_applist", vec![], "cb"));
        let delivery = next(&mut stream).await;
        assert!(delivery.terminal);
        match &delivery.result {
            CommandResult::Error(payload) => assert_eq!(payload.code, "handler_panicked"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_quiet(&mut stream).await;
        assert_eq!(bridge.in_flight(), 0);
    }

    #[tokio::test]
    async fn modal_handler_may_stay_pending() {
        let parked: Arc<Mutex<Option<Responder>>> = Arc::new(Mutex::new(None));
        let park = Arc::clone(&parked);
        let mut builder = CommandRegistry::builder();
        builder
            .register_fn("start_anno_draw", Affinity::Ui, move |_, r| {
                *park.lock().unwrap() = Some(r);
            })
            .unwrap();
        let (bridge, mut stream) = start(builder);

        bridge.dispatch(Invocation::new("start_anno_draw", vec![json!("img1")], "cb3"));
        assert_quiet(&mut stream).await;
        assert_eq!(bridge.in_flight(), 1);

        let responder = parked.lock().unwrap().take().unwrap();
        responder.success(json!("img1-annotated"));
        let delivery = next(&mut stream).await;
        assert_eq!(delivery.callback_id.as_str(), "cb3");
        assert_eq!(delivery.result, CommandResult::Success(json!("img1-annotated")));
        assert_eq!(bridge.in_flight(), 0);
    }

    struct ClosedUi;

    impl UiExecutor for ClosedUi {
        fn post(&self, task: UiTask) -> std::result::Result<(), UiTask> {
            Err(task)
        }
    }

    #[tokio::test]
    async fn closed_ui_context_fails_the_call() {
        let mut builder = CommandRegistry::builder();
        builder
            .register_fn("show_softkeyboard", Affinity::Ui, |_, r| r.success_empty())
            .unwrap();
        let (bridge, mut stream) = DispatchBridge::new(
            Arc::new(builder.build()),
            Arc::new(ClosedUi),
            Handle::current(),
        );

        bridge.dispatch(Invocation::new("show_softkeyboard", vec![], "cb"));
        let delivery = next(&mut stream).await;
        match &delivery.result {
            CommandResult::Error(payload) => assert_eq!(payload.code, "ui_context_closed"),
            other => panic!("unexpected result: {other:?}"),
        }
        assert_quiet(&mut stream).await;
        assert_eq!(bridge.in_flight(), 0);
    }

    #[tokio::test]
    async fn start_binds_to_current_runtime() {
        let mut builder = CommandRegistry::builder();
        builder
            .register_fn("exit_intro", Affinity::Ui, |_, r| r.success_empty())
            .unwrap();
        let (bridge, mut stream) =
            DispatchBridge::start(builder.build(), &BridgeConfig::default()).unwrap();

        bridge.dispatch(Invocation::new("exit_intro", vec![], "cb"));
        assert!(next(&mut stream).await.terminal);
    }
}
