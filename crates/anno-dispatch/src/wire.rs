// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// JSON-lines wire encoding between the web UI and the bridge.
//
//   invocation: {"command": "show_toast", "arguments": ["Saved"], "callback_id": "cb1"}
//   delivery:   {"callback_id": "cb1", "terminal": true,
//                "result": {"status": "success", "payload": null}}

use serde_json::Value;
use tracing::warn;

use anno_core::error::{AnnoError, Result};
use anno_core::types::{CallbackId, Delivery, Invocation};

use crate::bridge::DispatchBridge;

/// A line that could not be decoded as an invocation.
#[derive(Debug)]
pub struct MalformedInvocation {
    /// Recovered when the line is an object with a string `callback_id`.
    pub callback_id: Option<CallbackId>,
    pub error: AnnoError,
}

pub fn decode_invocation(line: &str) -> std::result::Result<Invocation, MalformedInvocation> {
    let value: Value = serde_json::from_str(line).map_err(|e| MalformedInvocation {
        callback_id: None,
        error: AnnoError::InvalidInvocation(format!("not JSON: {e}")),
    })?;

    let callback_id = value
        .get("callback_id")
        .and_then(Value::as_str)
        .map(CallbackId::new);

    serde_json::from_value(value).map_err(|e| MalformedInvocation {
        callback_id,
        error: AnnoError::InvalidInvocation(e.to_string()),
    })
}

pub fn encode_delivery(delivery: &Delivery) -> Result<String> {
    Ok(serde_json::to_string(delivery)?)
}

impl DispatchBridge {
    /// Decode one wire line and dispatch it.
    ///
    /// Undecodable lines are answered with `invalid_invocation` when a
    /// callback id can be recovered, and otherwise only logged.
    pub fn dispatch_line(&self, line: &str) {
        match decode_invocation(line) {
            Ok(invocation) => self.dispatch(invocation),
            Err(MalformedInvocation {
                callback_id: Some(callback_id),
                error,
            }) => self.reject(callback_id, &error),
            Err(MalformedInvocation {
                callback_id: None,
                error,
            }) => warn!(error = %error, "dropping undecodable invocation"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use anno_core::error::ErrorKind;
    use anno_core::types::CommandResult;
    use serde_json::json;
    use tokio::runtime::Handle;

    use crate::registry::{Affinity, CommandRegistry};
    use crate::ui_context::UiThread;

    #[test]
    fn decodes_a_full_invocation() {
        let inv = decode_invocation(
            r#"{"command":"start_activity","arguments":["Community",{"id":3}],"callback_id":"cb7"}"#,
        )
        .unwrap();
        assert_eq!(inv.command(), "start_activity");
        assert_eq!(inv.arguments().len(), 2);
        assert_eq!(inv.arguments().string(0, "activity").unwrap(), "Community");
        assert_eq!(inv.callback_id().as_str(), "cb7");
    }

    #[test]
    fn recovers_callback_id_from_bad_shape() {
        let err = decode_invocation(r#"{"arguments":[],"callback_id":"cb1"}"#).unwrap_err();
        assert_eq!(err.callback_id, Some(CallbackId::new("cb1")));
        assert_eq!(err.error.kind(), ErrorKind::InvalidInvocation);
    }

    #[test]
    fn garbage_has_no_callback_id() {
        let err = decode_invocation("show_toast(\"hi\")").unwrap_err();
        assert!(err.callback_id.is_none());
    }

    #[test]
    fn encodes_progress_as_non_terminal() {
        let line = encode_delivery(&Delivery::new(
            CallbackId::new("g"),
            CommandResult::Progress(json!({"kind": "shake"})),
        ))
        .unwrap();
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["terminal"], false);
        assert_eq!(value["result"]["status"], "progress");
        assert_eq!(value["result"]["payload"]["kind"], "shake");
    }

    #[tokio::test]
    async fn dispatch_line_round_trip() {
        let mut builder = CommandRegistry::builder();
        builder
            .register_fn("show_toast", Affinity::Ui, |args, r| {
                r.finish(args.string(0, "message").map(|_| ()))
            })
            .unwrap();
        let ui = UiThread::spawn("test-ui").unwrap();
        let (bridge, mut stream) =
            DispatchBridge::new(Arc::new(builder.build()), Arc::new(ui), Handle::current());

        bridge.dispatch_line(r#"{"command":"show_toast","arguments":["Saved"],"callback_id":"cb1"}"#);
        bridge.dispatch_line(r#"{"command":42,"callback_id":"cb2"}"#);
        bridge.dispatch_line("not json at all");

        let mut seen = Vec::new();
        for _ in 0..2 {
            let delivery = tokio::time::timeout(Duration::from_secs(5), stream.recv())
                .await
                .unwrap()
                .unwrap();
            seen.push((delivery.callback_id.to_string(), delivery.result));
        }
        seen.sort_by(|a, b| a.0.cmp(&b.0));

        assert_eq!(seen[0], ("cb1".to_string(), CommandResult::Success(Value::Null)));
        assert_eq!(seen[1].0, "cb2");
        assert_eq!(seen[1].1.error_kind(), Some(ErrorKind::InvalidInvocation));

        let extra = tokio::time::timeout(Duration::from_millis(100), stream.recv()).await;
        assert!(extra.is_err());
    }
}
