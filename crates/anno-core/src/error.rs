// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Anno.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level error type for all Anno operations.
#[derive(Debug, Error)]
pub enum AnnoError {
    // -- Registry / dispatch errors --
    #[error("unknown command: {0:?}")]
    UnknownCommand(String),

    #[error("command already registered: {0:?}")]
    DuplicateCommand(String),

    #[error("invalid invocation: {0}")]
    InvalidInvocation(String),

    #[error("missing required argument {name:?} at position {index}")]
    MissingArgument { index: usize, name: &'static str },

    #[error("argument {name:?} must be {expected}")]
    InvalidArgument {
        name: &'static str,
        expected: &'static str,
    },

    // -- Handler outcomes --
    #[error("cancelled by the user")]
    Cancelled,

    #[error("{message}")]
    HandlerFailure { code: String, message: String },

    #[error("handler panicked: {0}")]
    HandlerPanicked(String),

    #[error("handler finished without producing a result")]
    HandlerAbandoned,

    #[error("UI execution context is no longer running")]
    UiContextClosed,

    // -- Platform bridge --
    #[error("platform bridge error: {0}")]
    Bridge(String),

    #[error("feature not available on this platform")]
    PlatformUnavailable,

    // -- Configuration / persistence --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, AnnoError>;

/// The four error categories a UI layer can observe on a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The command name is not registered.
    UnknownCommand,
    /// Malformed or duplicate callback id, or a bad argument list.
    InvalidInvocation,
    /// The native operation failed.
    HandlerFailure,
    /// A modal operation was dismissed without a result.
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UnknownCommand => "unknown_command",
            Self::InvalidInvocation => "invalid_invocation",
            Self::HandlerFailure => "handler_failure",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AnnoError {
    /// Shorthand for a handler failure carrying a subsystem-specific code.
    pub fn handler(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::HandlerFailure {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Category reported to the UI layer.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownCommand(_) => ErrorKind::UnknownCommand,
            Self::InvalidInvocation(_)
            | Self::MissingArgument { .. }
            | Self::InvalidArgument { .. } => ErrorKind::InvalidInvocation,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::DuplicateCommand(_)
            | Self::HandlerFailure { .. }
            | Self::HandlerPanicked(_)
            | Self::HandlerAbandoned
            | Self::UiContextClosed
            | Self::Bridge(_)
            | Self::PlatformUnavailable
            | Self::Config(_)
            | Self::Io(_)
            | Self::Serialization(_) => ErrorKind::HandlerFailure,
        }
    }

    /// Stable machine-readable code. Never changes between releases.
    pub fn code(&self) -> &str {
        match self {
            Self::UnknownCommand(_) => "unknown_command",
            Self::DuplicateCommand(_) => "duplicate_command",
            Self::InvalidInvocation(_) => "invalid_invocation",
            Self::MissingArgument { .. } => "missing_argument",
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::Cancelled => "cancelled",
            Self::HandlerFailure { code, .. } => code,
            Self::HandlerPanicked(_) => "handler_panicked",
            Self::HandlerAbandoned => "handler_abandoned",
            Self::UiContextClosed => "ui_context_closed",
            Self::Bridge(_) => "platform_bridge",
            Self::PlatformUnavailable => "platform_unavailable",
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }
}
