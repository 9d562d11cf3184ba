use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use log::{debug, error, info};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::{CancellationToken, DropGuard};
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::error::{RelayError, RelayResult};
use crate::relay::decoder::FrameDecoder;
use crate::relay::mapper::{map_line, StreamEvent};

/// Raw backend body, one item per network read.
pub type ChunkStream = BoxStream<'static, RelayResult<Bytes>>;

/// What the pump hands to the client side: a text fragment, or the one error
/// that ends the response.
pub type Delivery = RelayResult<Bytes>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    CompletedNormally,
    Cancelled,
    Failed(RelayError),
}

/// One client request paired with one streaming backend call.
///
/// The session owns its decoder and cancellation token; nothing here is
/// shared with other sessions.
pub struct RelaySession {
    id: Uuid,
    decoder: FrameDecoder,
    cancel: CancellationToken,
    read_timeout: Duration,
    fragments: usize,
}

impl RelaySession {
    pub fn new(config: &RelayConfig) -> Self {
        Self::with_limits(config.read_timeout, config.max_frame_bytes)
    }

    pub fn with_limits(read_timeout: Duration, max_frame_bytes: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            decoder: FrameDecoder::new(max_frame_bytes),
            cancel: CancellationToken::new(),
            read_timeout,
            fragments: 0,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Handle that stops the session from outside the pump.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drive the backend body to the client until completion, cancellation or failure.
    ///
    /// The backend stream is dropped before this returns, which closes the
    /// outbound connection on every exit path.
    pub async fn pump<S>(mut self, mut chunks: S, client: mpsc::Sender<Delivery>) -> SessionOutcome
    where
        S: Stream<Item = RelayResult<Bytes>> + Unpin,
    {
        let outcome = self.relay(&mut chunks, &client).await;
        drop(chunks);

        match &outcome {
            SessionOutcome::CompletedNormally => {
                info!(
                    "Relay session {} completed ({} fragments)",
                    self.id, self.fragments
                );
            }
            SessionOutcome::Cancelled => {
                info!(
                    "Relay session {} cancelled after {} fragments",
                    self.id, self.fragments
                );
            }
            SessionOutcome::Failed(e) => {
                error!("Relay session {} failed: {}", self.id, e);
                self.surface(&client, e.clone()).await;
            }
        }
        outcome
    }

    async fn relay<S>(&mut self, chunks: &mut S, client: &mpsc::Sender<Delivery>) -> SessionOutcome
    where
        S: Stream<Item = RelayResult<Bytes>> + Unpin,
    {
        let cancel = self.cancel.clone();
        loop {
            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => return SessionOutcome::Cancelled,
                _ = client.closed() => return SessionOutcome::Cancelled,
                read = timeout(self.read_timeout, chunks.next()) => read,
            };

            let lines = match read {
                Ok(Some(Ok(chunk))) => match self.decoder.feed(&chunk) {
                    Ok(lines) => lines,
                    Err(e) => return SessionOutcome::Failed(e),
                },
                Ok(Some(Err(e))) => return SessionOutcome::Failed(e),
                Ok(None) => {
                    let tail: Vec<String> = self.decoder.finish().into_iter().collect();
                    if let Some(outcome) = self.dispatch(tail, client).await {
                        return outcome;
                    }
                    return SessionOutcome::Failed(RelayError::BackendStreamInterrupted(
                        "backend closed the stream before signalling completion".to_string(),
                    ));
                }
                Err(_) => {
                    return SessionOutcome::Failed(RelayError::BackendTimeout(format!(
                        "no data received for {:?}",
                        self.read_timeout
                    )))
                }
            };

            if let Some(outcome) = self.dispatch(lines, client).await {
                return outcome;
            }
        }
    }

    // Returns an outcome once a line ends the session.
    async fn dispatch(
        &mut self,
        lines: Vec<String>,
        client: &mpsc::Sender<Delivery>,
    ) -> Option<SessionOutcome> {
        for line in lines {
            for event in map_line(&line) {
                match event {
                    StreamEvent::ContentFragment(text) => {
                        if let Some(outcome) = self.deliver(client, text).await {
                            return Some(outcome);
                        }
                    }
                    StreamEvent::StreamEnd => return Some(SessionOutcome::CompletedNormally),
                    StreamEvent::DecodeWarning(_) => {}
                }
            }
        }
        None
    }

    async fn deliver(&mut self, client: &mpsc::Sender<Delivery>, text: String) -> Option<SessionOutcome> {
        let cancel = self.cancel.clone();
        let sent = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Some(SessionOutcome::Cancelled),
            sent = client.send(Ok(Bytes::from(text))) => sent,
        };

        match sent {
            Ok(()) => {
                self.fragments += 1;
                debug!("Relay session {} forwarded fragment #{}", self.id, self.fragments);
                None
            }
            // Receiver gone: the client hung up.
            Err(_) => Some(SessionOutcome::Cancelled),
        }
    }

    async fn surface(&self, client: &mpsc::Sender<Delivery>, err: RelayError) {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {}
            _ = client.send(Err(err)) => {}
        }
    }
}

/// Response body handed to the HTTP layer.
///
/// Dropping it (the client went away) cancels the session that feeds it.
pub struct FragmentStream {
    rx: mpsc::Receiver<Delivery>,
    _cancel_on_drop: DropGuard,
}

impl FragmentStream {
    pub fn new(rx: mpsc::Receiver<Delivery>, cancel: CancellationToken) -> Self {
        Self {
            rx,
            _cancel_on_drop: cancel.drop_guard(),
        }
    }
}

impl Stream for FragmentStream {
    type Item = Delivery;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
