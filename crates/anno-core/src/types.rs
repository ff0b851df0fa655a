// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Anno command bridge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{AnnoError, ErrorKind, Result};

/// Opaque correlation token supplied by the UI layer with every invocation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CallbackId(String);

impl CallbackId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for CallbackId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CallbackId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for CallbackId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Internal identifier for one accepted call.
///
/// Callback ids may be reused once released, so logs are keyed on this
/// instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallId(pub Uuid);

impl CallId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CallId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CallId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single request from the UI layer. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    command: String,
    #[serde(default)]
    arguments: Arguments,
    callback_id: CallbackId,
}

impl Invocation {
    pub fn new(
        command: impl Into<String>,
        arguments: Vec<Value>,
        callback_id: impl Into<CallbackId>,
    ) -> Self {
        Self {
            command: command.into(),
            arguments: Arguments(arguments),
            callback_id: callback_id.into(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    pub fn callback_id(&self) -> &CallbackId {
        &self.callback_id
    }

    /// Consume the invocation, handing its parts to the dispatcher.
    pub fn into_parts(self) -> (String, Arguments, CallbackId) {
        (self.command, self.arguments, self.callback_id)
    }
}

/// Ordered positional arguments of an invocation.
///
/// Accessors treat an explicit JSON `null` the same as a missing position,
/// because web callers routinely pad optional arguments with `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Arguments(Vec<Value>);

impl Arguments {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The value at `index`, or `None` when absent or `null`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.0.get(index).filter(|v| !v.is_null())
    }

    fn required(&self, index: usize, name: &'static str) -> Result<&Value> {
        self.get(index)
            .ok_or(AnnoError::MissingArgument { index, name })
    }

    pub fn string(&self, index: usize, name: &'static str) -> Result<&str> {
        self.required(index, name)?
            .as_str()
            .ok_or(AnnoError::InvalidArgument {
                name,
                expected: "a string",
            })
    }

    pub fn object(&self, index: usize, name: &'static str) -> Result<&Map<String, Value>> {
        self.required(index, name)?
            .as_object()
            .ok_or(AnnoError::InvalidArgument {
                name,
                expected: "an object",
            })
    }

    pub fn optional_object(
        &self,
        index: usize,
        name: &'static str,
    ) -> Result<Option<&Map<String, Value>>> {
        match self.get(index) {
            None => Ok(None),
            Some(value) => value.as_object().map(Some).ok_or(AnnoError::InvalidArgument {
                name,
                expected: "an object",
            }),
        }
    }
}

impl From<Vec<Value>> for Arguments {
    fn from(values: Vec<Value>) -> Self {
        Self(values)
    }
}

/// Error body carried by a `CommandResult::Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub kind: ErrorKind,
    pub code: String,
    pub message: String,
}

impl From<&AnnoError> for ErrorPayload {
    fn from(err: &AnnoError) -> Self {
        Self {
            kind: err.kind(),
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

impl From<AnnoError> for ErrorPayload {
    fn from(err: AnnoError) -> Self {
        Self::from(&err)
    }
}

/// Outcome reported by a handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "payload", rename_all = "snake_case")]
pub enum CommandResult {
    Success(Value),
    Error(ErrorPayload),
    /// Non-terminal intermediate result.
    Progress(Value),
}

impl CommandResult {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Self::Error(payload) => Some(payload.kind),
            _ => None,
        }
    }
}

/// A result addressed to one callback id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub callback_id: CallbackId,
    pub terminal: bool,
    pub result: CommandResult,
}

impl Delivery {
    pub fn new(callback_id: CallbackId, result: CommandResult) -> Self {
        Self {
            callback_id,
            terminal: result.is_terminal(),
            result,
        }
    }

    pub fn error(callback_id: CallbackId, err: &AnnoError) -> Self {
        Self::new(callback_id, CommandResult::Error(err.into()))
    }
}

/// An installed or recently used application.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AppDescriptor {
    pub package_identifier: String,
    pub display_name: String,
    pub icon_reference: String,
}

/// Native gestures the host can forward to the web UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    /// Device shake, used to start a new annotation.
    Shake,
    /// The system screenshot gesture.
    Screenshot,
    /// Swipe in from the screen edge.
    EdgeSwipe,
}

/// A gesture observed by the native listener.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GestureEvent {
    pub kind: GestureKind,
    pub at: DateTime<Utc>,
}

impl GestureEvent {
    pub fn now(kind: GestureKind) -> Self {
        Self { kind, at: Utc::now() }
    }
}
