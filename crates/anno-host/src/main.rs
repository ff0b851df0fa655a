// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Anno bridge host
//
// Entry point. Initialises logging and host services, then pumps JSON-lines
// invocations from stdin and writes deliveries to stdout until stdin closes.

mod services;

use std::time::Duration;

use tokio::io::{AsyncWriteExt, BufReader};

use anno_core::BridgeConfig;
use anno_dispatch::DeliveryStream;
use anno_dispatch::wire::encode_delivery;

use services::data_dir::data_dir;
use services::host_services::{HostServices, load_config, persist_config};

/// How long to wait for the writer to flush after the bridge is dropped.
const WRITER_FLUSH: Duration = Duration::from_millis(500);

#[tokio::main]
async fn main() -> anno_core::Result<()> {
    let dir = data_dir();
    let loaded = load_config(&dir);
    let config = match &loaded {
        Ok(Some(config)) => config.clone(),
        _ => BridgeConfig::default(),
    };

    // stdout carries the wire protocol, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_filter)),
        )
        .init();

    tracing::info!(data_dir = %dir.display(), "Anno bridge host starting");
    if let Err(e) = &loaded {
        tracing::warn!(error = %e, "ignoring unreadable configuration, using defaults");
    }

    let (services, deliveries) = HostServices::init(dir, config)?;
    let grace = Duration::from_millis(services.config().shutdown_grace_ms);

    // First run: write the defaults out so they can be edited.
    if matches!(loaded, Ok(None)) {
        if let Err(e) = persist_config(services.data_dir(), services.config()) {
            tracing::warn!(error = %e, "could not write default configuration");
        }
    }
    let writer = tokio::spawn(write_deliveries(deliveries));

    if let Err(e) = services.serve(BufReader::new(tokio::io::stdin())).await {
        tracing::error!(error = %e, "reading stdin failed");
    }

    tracing::info!("stdin closed, draining in-flight calls");
    if !services.drain(grace).await {
        tracing::warn!(
            pending = services.bridge().in_flight(),
            "shutting down with unanswered calls"
        );
    }
    drop(services);

    match tokio::time::timeout(WRITER_FLUSH, writer).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => tracing::error!(error = %e, "delivery writer failed"),
        Ok(Err(e)) => tracing::error!(error = %e, "delivery writer task aborted"),
        Err(_) => tracing::warn!("delivery writer did not finish in time"),
    }

    tracing::info!("Anno bridge host stopped");
    Ok(())
}

/// Encode every delivery as one line on stdout.
async fn write_deliveries(mut deliveries: DeliveryStream) -> anno_core::Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(delivery) = deliveries.recv().await {
        let mut line = match encode_delivery(&delivery) {
            Ok(line) => line,
            Err(e) => {
                tracing::error!(
                    callback_id = %delivery.callback_id,
                    error = %e,
                    "failed to encode delivery"
                );
                continue;
            }
        };
        line.push('\n');
        stdout.write_all(line.as_bytes()).await?;
        stdout.flush().await?;
    }
    Ok(())
}
