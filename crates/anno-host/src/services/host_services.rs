// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Host service layer -- wires configuration, the platform bridge, the
// command registry, and the dispatch bridge together.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time::{Instant, sleep};
use tracing::{info, warn};

use anno_core::error::Result;
use anno_core::BridgeConfig;
use anno_dispatch::commands::register_builtin_commands;
use anno_dispatch::{CommandRegistry, DeliveryStream, DispatchBridge};

/// File name of the persisted configuration inside the data dir.
const CONFIG_FILE: &str = "bridge.json";

/// How often `drain` re-checks the in-flight count.
const DRAIN_POLL: Duration = Duration::from_millis(20);

/// Everything the host loop needs, built once at startup.
pub struct HostServices {
    bridge: DispatchBridge,
    config: BridgeConfig,
    data_dir: PathBuf,
}

impl HostServices {
    /// Build the platform bridge and registry, then start dispatching.
    ///
    /// Must run inside a tokio runtime.
    pub fn init(data_dir: PathBuf, config: BridgeConfig) -> Result<(Self, DeliveryStream)> {
        info!(path = %data_dir.display(), "initialising host services");

        let platform = anno_bridge::platform_bridge(&config, &data_dir);
        info!(platform = platform.platform_name(), "platform bridge ready");

        let mut builder = CommandRegistry::builder();
        register_builtin_commands(&mut builder, platform, &config)?;
        let registry = builder.build();
        info!(commands = registry.len(), "command registry built");

        let (bridge, deliveries) = DispatchBridge::start(registry, &config)?;
        Ok((
            Self {
                bridge,
                config,
                data_dir,
            },
            deliveries,
        ))
    }

    pub fn bridge(&self) -> &DispatchBridge {
        &self.bridge
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Dispatch one invocation per line of `input` until EOF.
    ///
    /// Lines that are not UTF-8 are logged and skipped; only a failing read
    /// ends the loop early.
    pub async fn serve<R: AsyncBufRead + Unpin>(&self, mut input: R) -> Result<()> {
        let mut buf = Vec::new();
        loop {
            buf.clear();
            if input.read_until(b'\n', &mut buf).await? == 0 {
                return Ok(());
            }
            let line = match std::str::from_utf8(&buf) {
                Ok(line) => line.trim(),
                Err(e) => {
                    warn!(error = %e, len = buf.len(), "dropping line that is not UTF-8");
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }
            self.bridge.dispatch_line(line);
        }
    }

    /// Wait until no call is in flight or `grace` elapses.
    ///
    /// Returns `true` if everything drained.
    pub async fn drain(&self, grace: Duration) -> bool {
        let deadline = Instant::now() + grace;
        loop {
            let pending = self.bridge.in_flight();
            if pending == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                warn!(pending, "grace period elapsed with calls still pending");
                return false;
            }
            sleep(DRAIN_POLL).await;
        }
    }
}

pub fn config_path(data_dir: &Path) -> PathBuf {
    data_dir.join(CONFIG_FILE)
}

/// Load the persisted configuration.
///
/// `Ok(None)` when no file exists yet; a file that cannot be read or parsed
/// is an error so the caller can report it once logging is up.
pub fn load_config(data_dir: &Path) -> Result<Option<BridgeConfig>> {
    let data = match std::fs::read_to_string(config_path(data_dir)) {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    Ok(Some(serde_json::from_str(&data)?))
}

pub fn persist_config(data_dir: &Path, config: &BridgeConfig) -> Result<()> {
    let path = config_path(data_dir);
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, json)?;
    Ok(())
}
