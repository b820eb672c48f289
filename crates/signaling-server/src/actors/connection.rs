//! `ConnectionActor` - per-WebSocket outbound writer.
//!
//! Each `ConnectionActor`:
//! - Owns the write half of exactly one WebSocket
//! - Drains a bounded queue of [`ServerEvent`]s and writes them as text frames
//! - Never blocks its producers: room actors enqueue with `try_send` and a
//!   full or closed queue drops the event
//!
//! # Lifecycle
//!
//! 1. Spawned by the WebSocket session once the handshake is verified
//! 2. Runs until every [`ConnectionHandle`] is dropped, the socket write
//!    fails, or its cancellation token fires
//! 3. The session cancels it after a short drain timeout on disconnect

use super::metrics::{ActorType, MailboxMonitor};
use crate::protocol::ServerEvent;

use axum::extract::ws::Message;
use common::types::ConnectionId;
use futures::{Sink, SinkExt};
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

/// Sending side of a connection's outbound queue.
///
/// Cheap to clone; room actors hold one per participant.
#[derive(Clone, Debug)]
pub struct ConnectionHandle {
    connection_id: ConnectionId,
    sender: mpsc::Sender<ServerEvent>,
    mailbox: Arc<MailboxMonitor>,
}

impl ConnectionHandle {
    /// Create a handle and the receiving end of its queue, without a writer.
    ///
    /// Tests use this to observe what a room pushes to a connection.
    #[must_use]
    pub fn channel(
        connection_id: ConnectionId,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<ServerEvent>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let mailbox = Arc::new(MailboxMonitor::new(
            ActorType::Connection,
            connection_id.to_string(),
        ));
        (
            Self {
                connection_id,
                sender,
                mailbox,
            },
            receiver,
        )
    }

    #[must_use]
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Enqueue an event without waiting.
    ///
    /// Returns `false` if the event was dropped.
    pub fn send(&self, event: ServerEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(event)) => {
                warn!(
                    target: "signaling.ws",
                    connection_id = %self.connection_id,
                    event = event.name(),
                    "Outbound queue full, dropping event"
                );
                self.mailbox.record_drop();
                false
            }
            Err(TrySendError::Closed(event)) => {
                warn!(
                    target: "signaling.ws",
                    connection_id = %self.connection_id,
                    event = event.name(),
                    "Outbound queue closed, dropping event"
                );
                self.mailbox.record_drop();
                false
            }
        }
    }

    /// Whether the writer has stopped reading the queue.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// The `ConnectionActor` implementation.
pub struct ConnectionActor<S> {
    connection_id: ConnectionId,
    receiver: mpsc::Receiver<ServerEvent>,
    sink: S,
    cancel_token: CancellationToken,
    mailbox: Arc<MailboxMonitor>,
}

impl<S> ConnectionActor<S>
where
    S: Sink<Message> + Unpin + Send + 'static,
    S::Error: Display,
{
    /// Spawn a writer over `sink`.
    ///
    /// Returns the queue handle and the task join handle.
    pub fn spawn(
        connection_id: ConnectionId,
        sink: S,
        capacity: usize,
        cancel_token: CancellationToken,
    ) -> (ConnectionHandle, JoinHandle<()>) {
        let (handle, receiver) = ConnectionHandle::channel(connection_id, capacity);

        let actor = Self {
            connection_id,
            receiver,
            sink,
            cancel_token,
            mailbox: Arc::clone(&handle.mailbox),
        };

        let task_handle = tokio::spawn(actor.run());
        (handle, task_handle)
    }

    #[instrument(
        skip_all,
        name = "signaling.actor.connection",
        fields(connection_id = %self.connection_id)
    )]
    async fn run(mut self) {
        debug!(
            target: "signaling.ws",
            connection_id = %self.connection_id,
            "ConnectionActor started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    debug!(
                        target: "signaling.ws",
                        connection_id = %self.connection_id,
                        "ConnectionActor received cancellation signal"
                    );
                    break;
                }

                event = self.receiver.recv() => {
                    match event {
                        Some(event) => {
                            self.mailbox.record_dequeue(self.receiver.len());
                            if !self.write(&event).await {
                                break;
                            }
                        }
                        None => {
                            debug!(
                                target: "signaling.ws",
                                connection_id = %self.connection_id,
                                "ConnectionActor queue closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        let _ = self.sink.close().await;

        debug!(
            target: "signaling.ws",
            connection_id = %self.connection_id,
            messages_processed = self.mailbox.messages_processed(),
            messages_dropped = self.mailbox.messages_dropped(),
            "ConnectionActor stopped"
        );
    }

    /// Write one event. Returns `false` if the socket is gone.
    async fn write(&mut self, event: &ServerEvent) -> bool {
        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    target: "signaling.ws",
                    connection_id = %self.connection_id,
                    event = event.name(),
                    error = %e,
                    "Failed to serialize outbound event"
                );
                return true;
            }
        };

        match self.sink.send(Message::Text(text)).await {
            Ok(()) => true,
            Err(e) => {
                debug!(
                    target: "signaling.ws",
                    connection_id = %self.connection_id,
                    error = %e,
                    "Socket write failed, stopping writer"
                );
                false
            }
        }
    }
}
