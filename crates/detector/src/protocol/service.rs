#![forbid(unsafe_code)]

use super::{MAX_FRAME_LENGTH, Message, MessageCodec, RequestKind, fits_in_frame};
use crate::cache::DetectionCache;
use crate::domain::DetectionSnapshot;
use crate::error::Error;
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

const UNKNOWN_REQUEST: &str = "unknown request type";

/// Pause after a failed `accept` (e.g. `EMFILE`) before trying again.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Answers detection queries from the latest published snapshot.
#[derive(Debug, Clone)]
pub struct QueryService {
    cache: DetectionCache,
}

impl QueryService {
    pub fn new(cache: DetectionCache) -> Self {
        Self { cache }
    }

    /// Build the reply to one request. Never fails; problems are reported as
    /// an `error` message.
    pub fn handle(&self, request: &Message) -> Message {
        let Ok(kind) = request.message_type.parse::<RequestKind>() else {
            debug!(message_type = %request.message_type, "unknown request");
            return Message::error(UNKNOWN_REQUEST);
        };

        let snapshot = self.cache.current();
        match encode_results(&snapshot, kind) {
            Ok(payload) if fits_in_frame(kind.response_type(), payload.len()) => {
                Message::new(kind.response_type(), payload)
            }
            Ok(payload) => {
                warn!(%kind, len = payload.len(), "results exceed the frame limit");
                Message::error(&format!(
                    "{} results of {} bytes exceed the {MAX_FRAME_LENGTH} byte frame limit",
                    kind.response_type(),
                    payload.len()
                ))
            }
            Err(err) => {
                warn!(%kind, %err, "failed to serialize results");
                Message::error(&format!("failed to serialize results: {err}"))
            }
        }
    }

    /// Accept connections until `cancel` fires, then wait for open sessions
    /// to wind down.
    pub async fn serve(&self, listener: TcpListener, cancel: CancellationToken) -> Result<(), Error> {
        info!(addr = ?listener.local_addr().ok(), "query service listening");
        let listener = &listener;
        self.accept_loop(move || listener.accept(), cancel).await
    }

    async fn accept_loop<A, F, S>(&self, mut accept: A, cancel: CancellationToken) -> Result<(), Error>
    where
        A: FnMut() -> F,
        F: Future<Output = io::Result<(S, SocketAddr)>>,
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let tracker = TaskTracker::new();

        loop {
            let (stream, peer) = tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = accept() => match accepted {
                    Ok(conn) => conn,
                    Err(err) => {
                        warn!(%err, "failed to accept connection");
                        tokio::select! {
                            _ = cancel.cancelled() => break,
                            _ = tokio::time::sleep(ACCEPT_BACKOFF) => continue,
                        }
                    }
                },
            };

            let service = self.clone();
            let cancel = cancel.clone();
            tracker.spawn(async move {
                debug!(%peer, "session opened");
                if let Err(err) = service.run_session(stream, peer, cancel).await {
                    debug!(%peer, %err, "session ended with error");
                }
                debug!(%peer, "session closed");
            });
        }

        tracker.close();
        tracker.wait().await;
        info!("query service stopped");
        Ok(())
    }

    /// Serve one connection. Requests are answered strictly in order.
    #[tracing::instrument(skip_all, fields(%peer))]
    pub async fn run_session<S>(&self, stream: S, peer: SocketAddr, cancel: CancellationToken) -> Result<(), Error>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut framed = Framed::new(stream, MessageCodec::new());
        loop {
            let request = tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                next = framed.next() => next,
            };
            let Some(request) = request else {
                return Ok(());
            };
            let request = request?;
            debug!(message_type = %request.message_type, "request");
            framed.send(self.handle(&request)).await?;
        }
    }
}

fn encode_results(snapshot: &DetectionSnapshot, kind: RequestKind) -> serde_json::Result<Vec<u8>> {
    fn to_vec<T: Serialize>(value: &T) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(value)
    }

    match kind {
        RequestKind::Unsigned => to_vec(&snapshot.unsigned),
        RequestKind::Malicious => to_vec(&snapshot.malicious),
        RequestKind::Relationships => to_vec(&snapshot.relationships),
        RequestKind::Defective => to_vec(&snapshot.defective),
    }
}
