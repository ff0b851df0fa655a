// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command registry: name → handler, frozen before the first dispatch.
//
// Handlers are added through `RegistryBuilder`; `build()` produces an
// immutable `CommandRegistry` that the bridge shares behind an `Arc` and
// reads without locking.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use anno_core::error::{AnnoError, Result};
use anno_core::types::Arguments;

use crate::responder::Responder;

/// Where a handler must run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Affinity {
    /// Touches on-screen state; runs on the single UI context, FIFO.
    Ui,
    /// No UI access; runs on the background pool, unordered.
    Background,
}

/// Native-side capability bound to one command name.
///
/// `execute` owns the responder. It may answer before returning, hand the
/// responder to another thread, or keep it for as long as a modal flow lasts.
pub trait CommandHandler: Send + Sync {
    /// Static execution requirement, read once at registration.
    fn affinity(&self) -> Affinity;

    fn execute(&self, args: Arguments, responder: Responder);
}

/// Adapts a closure into a `CommandHandler`.
pub struct FnHandler<F> {
    affinity: Affinity,
    f: F,
}

impl<F> FnHandler<F>
where
    F: Fn(Arguments, Responder) + Send + Sync,
{
    pub fn new(affinity: Affinity, f: F) -> Self {
        Self { affinity, f }
    }
}

impl<F> CommandHandler for FnHandler<F>
where
    F: Fn(Arguments, Responder) + Send + Sync,
{
    fn affinity(&self) -> Affinity {
        self.affinity
    }

    fn execute(&self, args: Arguments, responder: Responder) {
        (self.f)(args, responder)
    }
}

/// A handler together with the affinity captured when it was registered.
#[derive(Clone)]
pub struct RegisteredCommand {
    name: Arc<str>,
    affinity: Affinity,
    handler: Arc<dyn CommandHandler>,
}

impl RegisteredCommand {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn affinity(&self) -> Affinity {
        self.affinity
    }

    pub fn handler(&self) -> &Arc<dyn CommandHandler> {
        &self.handler
    }
}

impl std::fmt::Debug for RegisteredCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredCommand")
            .field("name", &self.name)
            .field("affinity", &self.affinity)
            .finish_non_exhaustive()
    }
}

/// Mutable registration phase.
#[derive(Default)]
pub struct RegistryBuilder {
    commands: HashMap<String, RegisteredCommand>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `handler`. Each name can be bound once.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: Arc<dyn CommandHandler>,
    ) -> Result<&mut Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(AnnoError::InvalidInvocation(
                "command name must not be empty".into(),
            ));
        }
        if self.commands.contains_key(&name) {
            return Err(AnnoError::DuplicateCommand(name));
        }

        let affinity = handler.affinity();
        debug!(command = %name, ?affinity, "command registered");
        self.commands.insert(
            name.clone(),
            RegisteredCommand {
                name: name.into(),
                affinity,
                handler,
            },
        );
        Ok(self)
    }

    /// Closure shorthand for [`register`](Self::register).
    pub fn register_fn<F>(
        &mut self,
        name: impl Into<String>,
        affinity: Affinity,
        f: F,
    ) -> Result<&mut Self>
    where
        F: Fn(Arguments, Responder) + Send + Sync + 'static,
    {
        self.register(name, Arc::new(FnHandler::new(affinity, f)))
    }

    pub fn build(self) -> CommandRegistry {
        CommandRegistry {
            commands: self.commands,
        }
    }
}

/// Immutable command table.
#[derive(Debug, Default)]
pub struct CommandRegistry {
    commands: HashMap<String, RegisteredCommand>,
}

impl CommandRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    pub fn lookup(&self, name: &str) -> Result<&RegisteredCommand> {
        self.commands
            .get(name)
            .ok_or_else(|| AnnoError::UnknownCommand(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.commands.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.commands.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
