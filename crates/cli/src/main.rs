mod config;

use std::sync::Arc;

use anyhow::{Context, Result};
use relaycall_client::{Call, CallEvent, HttpRpcClient, SessionIdentity, WebRtcBackend};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;
    let identity = SessionIdentity::generate(&config.display_name);
    info!(
        id = %identity.id(),
        username = identity.username(),
        room = %config.room,
        endpoint = %config.endpoint,
        "starting relaycall"
    );

    let rpc = HttpRpcClient::new(config.endpoint.clone(), config.rpc_timeout)
        .context("failed to build rpc client")?;
    let backend = WebRtcBackend::new().context("failed to initialise webrtc")?;
    let call = Call::new(config.call_settings(), identity, Arc::new(rpc), Arc::new(backend));

    tokio::spawn(log_events(call.events()));

    if unless_interrupted(join(&call), tokio::signal::ctrl_c()).await.is_none() {
        call.stop().await;
        return Ok(());
    }
    info!("commands: mute, leave, join, quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match line.trim() {
                    "mute" => match call.toggle_mute() {
                        Some(true) => info!("muted"),
                        Some(false) => info!("unmuted"),
                        None => warn!("not in a call"),
                    },
                    "leave" => call.stop().await,
                    "join" => join(&call).await,
                    "quit" => break,
                    "" => {}
                    other => warn!(command = other, "unknown command"),
                }
            }
        }
    }

    call.stop().await;
    Ok(())
}

/// Runs `work` unless `interrupt` completes first.
async fn unless_interrupted<T>(work: impl Future<Output = T>, interrupt: impl Future) -> Option<T> {
    tokio::select! {
        _ = interrupt => None,
        output = work => Some(output),
    }
}

/// Logs call events until the call is gone. Returns how many were logged.
async fn log_events(mut events: broadcast::Receiver<CallEvent>) -> usize {
    let mut logged = 0;
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "missed call events");
                continue;
            }
            Err(RecvError::Closed) => break,
        };
        match event {
            CallEvent::Published { track, .. } => info!(%track, "joined"),
            CallEvent::Restarting { .. } => warn!("sfu dropped the session, rejoining"),
            CallEvent::RestartFailed { reason } => error!(%reason, "could not rejoin"),
            CallEvent::Ended => info!("left"),
        }
        logged += 1;
    }
    logged
}

async fn join(call: &Call) {
    if let Err(err) = call.start().await {
        error!(error = %err, "failed to join call");
    }
}
