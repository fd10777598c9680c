//! The relay loop: gateway dispatches in, one task per relay event out.

use std::sync::Arc;

use anyhow::bail;
use tokio::sync::broadcast::error::RecvError;

use wormhole_gateway::{EventTranslator, GatewayClient, RelayEvent};
use wormhole_relay::RelayEngine;

pub async fn run(
    engine: Arc<RelayEngine>,
    gateway: GatewayClient,
    translator: EventTranslator,
) -> anyhow::Result<()> {
    let mut events = gateway.subscribe();
    let mut connection = gateway.connect();

    loop {
        tokio::select! {
            _ = &mut connection => bail!("gateway connection stopped"),
            received = events.recv() => match received {
                Ok(event) => {
                    // Translation stays on this task so the message cache sees
                    // dispatches in order
                    let relay_events = match translator.translate(&event) {
                        Ok(relay_events) => relay_events,
                        Err(e) => {
                            tracing::warn!(event = ?event.name(), error = %e, "Relay: undecodable dispatch");
                            continue;
                        }
                    };
                    for relay_event in relay_events {
                        let engine = Arc::clone(&engine);
                        tokio::spawn(async move { handle(&engine, relay_event).await });
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Relay: event stream lagged, dispatches dropped");
                }
                Err(RecvError::Closed) => bail!("gateway event stream closed"),
            },
        }
    }
}

async fn handle(engine: &RelayEngine, event: RelayEvent) {
    let (kind, message, result) = match &event {
        RelayEvent::Created(m) => ("create", m, engine.on_message_created(m).await),
        RelayEvent::Updated { before, after } => {
            ("update", after, engine.on_message_updated(before, after).await)
        }
        RelayEvent::Deleted(m) => ("delete", m, engine.on_message_deleted(m).await),
    };

    match result {
        Ok(report) if report.skipped.is_some() => {
            tracing::trace!(kind, message_id = %message.id, reason = ?report.skipped, "Relay: skipped");
        }
        Ok(report) => {
            tracing::debug!(
                kind,
                message_id = %message.id,
                channel_id = %message.channel_id,
                delivered = report.delivered,
                deleted = report.deleted,
                edited = report.edited,
                unresolved = report.unresolved,
                failed = report.failed,
                pruned = report.pruned.len(),
                "Relay: event handled"
            );
        }
        Err(e) => {
            tracing::error!(kind, message_id = %message.id, error = %e, "Relay: event failed");
        }
    }
}
