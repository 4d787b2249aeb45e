//! TCP accept loop and per-connection line handling.

use crate::{parse_line, DetectionSender, IngressError};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use wavehome_events::PipelineStats;

/// Listens for producer connections and feeds the detection channel.
///
/// Multiple sequential producer connections are expected (the producer
/// reconnects after restarts); pipeline state lives downstream and is
/// untouched by connection churn.
pub struct IngressServer {
    listener: TcpListener,
}

impl IngressServer {
    /// Bind the listener. `addr` may use port 0 for an ephemeral port.
    pub async fn bind(addr: &str) -> Result<Self, IngressError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| IngressError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        Ok(Self { listener })
    }

    /// The bound address.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.local_addr().ok()
    }

    /// Accept connections until cancelled.
    pub async fn run(
        self,
        sender: DetectionSender,
        stats: Arc<PipelineStats>,
        cancel: CancellationToken,
    ) {
        if let Some(addr) = self.local_addr() {
            info!(%addr, "ingress listening");
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        info!(%peer, "producer connected");
                        tokio::spawn(handle_connection(
                            stream,
                            peer,
                            sender.clone(),
                            Arc::clone(&stats),
                            cancel.clone(),
                        ));
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to accept producer connection");
                    }
                }
            }
        }

        info!("ingress stopped");
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    sender: DetectionSender,
    stats: Arc<PipelineStats>,
    cancel: CancellationToken,
) {
    let mut lines = BufReader::new(stream).lines();

    loop {
        let line = tokio::select! {
            _ = cancel.cancelled() => break,
            line = lines.next_line() => line,
        };

        match line {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                stats.record_received();
                match parse_line(&line) {
                    Ok(detection) => {
                        if !sender.send(detection) {
                            stats.record_dropped();
                        }
                    }
                    Err(e) => {
                        stats.record_malformed();
                        warn!(%peer, error = %e, "skipping malformed detection record");
                    }
                }
            }
            Ok(None) => break,
            Err(e) => {
                debug!(%peer, error = %e, "producer read error");
                break;
            }
        }
    }

    info!(%peer, "producer disconnected");
}
