//! `RoomRegistryActor` - singleton index of live call rooms.
//!
//! The registry:
//! - Maps room ids to `RoomActor` handles
//! - Creates a room on the first join and forgets it when the room reports
//!   itself empty, so a listed room always has at least one participant
//!   or a join queued
//! - Owns the root `CancellationToken` for graceful shutdown
//! - Monitors room actor health (panic detection via `JoinHandle`)
//!
//! The registry never awaits a room actor: joins are forwarded with
//! `try_send` and statistics are read from atomics on the handles.

use super::connection::ConnectionHandle;
use super::messages::{PendingJoin, RegistryMessage, RegistryStats, RoomMessage, RoomSummary};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};
use super::room::{RoomActor, RoomActorHandle, RoomSettings};
use crate::auth::SessionIdentity;
use crate::chat::ChatChannel;
use crate::errors::SignalingError;
use crate::observability::metrics as prom;

use chrono::Utc;
use common::types::RoomId;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Default channel buffer size for the registry mailbox.
const REGISTRY_CHANNEL_BUFFER: usize = 1000;

/// Attempts to join before giving up on a room that keeps closing underneath us.
const JOIN_ATTEMPTS: usize = 3;

/// How long shutdown waits for each room task.
const ROOM_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Handle to the `RoomRegistryActor`.
///
/// This is the public interface for interacting with the registry.
#[derive(Clone, Debug)]
pub struct RoomRegistryHandle {
    sender: mpsc::Sender<RegistryMessage>,
    cancel_token: CancellationToken,
}

impl RoomRegistryHandle {
    /// Create a new `RoomRegistryActor` and return a handle to it.
    ///
    /// This spawns the actor task and returns immediately.
    #[must_use]
    pub fn new(
        instance_id: String,
        chat: Arc<ChatChannel>,
        settings: RoomSettings,
        metrics: Arc<ActorMetrics>,
    ) -> Self {
        let (sender, receiver) = mpsc::channel(REGISTRY_CHANNEL_BUFFER);
        let cancel_token = CancellationToken::new();

        let actor = RoomRegistryActor {
            mailbox: MailboxMonitor::new(ActorType::Registry, &instance_id),
            instance_id,
            receiver,
            self_sender: sender.clone(),
            cancel_token: cancel_token.clone(),
            rooms: HashMap::new(),
            next_instance: 1,
            chat,
            settings,
            metrics,
        };

        tokio::spawn(actor.run());

        Self {
            sender,
            cancel_token,
        }
    }

    /// Join `room_id`, creating the room if needed.
    ///
    /// Returns the room handle for subsequent requests. A join that races
    /// with the room's last leave is retried on a fresh room.
    ///
    /// # Errors
    ///
    /// - `SignalingError::RoomClosed` if every attempt hit a closing room
    /// - `SignalingError::Internal` if the registry is unavailable
    pub async fn join_room(
        &self,
        room_id: RoomId,
        appointment_id: String,
        member: Arc<SessionIdentity>,
        outbound: ConnectionHandle,
    ) -> Result<RoomActorHandle, SignalingError> {
        for attempt in 1..=JOIN_ATTEMPTS {
            let (tx, rx) = oneshot::channel();
            self.send(RegistryMessage::Join {
                room_id: room_id.clone(),
                appointment_id: appointment_id.clone(),
                member: Arc::clone(&member),
                outbound: outbound.clone(),
                respond_to: tx,
            })
            .await?;

            let pending = rx
                .await
                .map_err(|e| SignalingError::Internal(format!("response receive failed: {e}")))??;

            match pending.outcome.await {
                Ok(Ok(_)) => return Ok(pending.room),
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    debug!(
                        target: "signaling.actor.registry",
                        room_id = %room_id,
                        attempt = attempt,
                        "Room closed before join completed, retrying"
                    );
                }
            }
        }

        Err(SignalingError::RoomClosed)
    }

    /// Look up a live room.
    pub async fn get_room(
        &self,
        room_id: RoomId,
    ) -> Result<Option<RoomActorHandle>, SignalingError> {
        let (tx, rx) = oneshot::channel();
        self.send(RegistryMessage::GetRoom {
            room_id,
            respond_to: tx,
        })
        .await?;

        rx.await
            .map_err(|e| SignalingError::Internal(format!("response receive failed: {e}")))
    }

    /// Registry statistics.
    pub async fn stats(&self) -> Result<RegistryStats, SignalingError> {
        let (tx, rx) = oneshot::channel();
        self.send(RegistryMessage::GetStats { respond_to: tx })
            .await?;

        rx.await
            .map_err(|e| SignalingError::Internal(format!("response receive failed: {e}")))
    }

    /// Close every room (participants get `call-ended`) and stop the registry.
    pub async fn shutdown(&self) -> Result<(), SignalingError> {
        let (tx, rx) = oneshot::channel();
        self.send(RegistryMessage::Shutdown { respond_to: tx })
            .await?;

        rx.await
            .map_err(|e| SignalingError::Internal(format!("response receive failed: {e}")))
    }

    /// Cancel the actor (for immediate shutdown).
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    async fn send(&self, message: RegistryMessage) -> Result<(), SignalingError> {
        self.sender
            .send(message)
            .await
            .map_err(|e| SignalingError::Internal(format!("channel send failed: {e}")))
    }
}

/// Internal state for a managed room.
struct ManagedRoom {
    handle: RoomActorHandle,
    task_handle: JoinHandle<()>,
}

/// The `RoomRegistryActor` implementation.
pub struct RoomRegistryActor {
    instance_id: String,
    receiver: mpsc::Receiver<RegistryMessage>,
    /// Given to rooms so they can report themselves empty.
    self_sender: mpsc::Sender<RegistryMessage>,
    /// Root token; rooms get child tokens.
    cancel_token: CancellationToken,
    rooms: HashMap<RoomId, ManagedRoom>,
    next_instance: u64,
    chat: Arc<ChatChannel>,
    settings: RoomSettings,
    metrics: Arc<ActorMetrics>,
    mailbox: MailboxMonitor,
}

impl RoomRegistryActor {
    #[instrument(
        skip_all,
        name = "signaling.actor.registry",
        fields(instance_id = %self.instance_id)
    )]
    async fn run(mut self) {
        info!(
            target: "signaling.actor.registry",
            instance_id = %self.instance_id,
            "RoomRegistryActor started"
        );

        loop {
            self.check_room_health().await;

            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "signaling.actor.registry",
                        instance_id = %self.instance_id,
                        "RoomRegistryActor received cancellation signal"
                    );
                    self.graceful_shutdown().await;
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(RegistryMessage::Shutdown { respond_to }) => {
                            self.graceful_shutdown().await;
                            let _ = respond_to.send(());
                            break;
                        }
                        Some(message) => {
                            self.handle_message(message);
                            let queued = self.receiver.len();
                            self.mailbox.record_dequeue(queued);
                            prom::set_actor_mailbox_depth(ActorType::Registry.as_str(), queued);
                            self.metrics.record_message_processed();
                        }
                        None => {
                            info!(
                                target: "signaling.actor.registry",
                                instance_id = %self.instance_id,
                                "RoomRegistryActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "signaling.actor.registry",
            instance_id = %self.instance_id,
            rooms_remaining = self.rooms.len(),
            messages_processed = self.mailbox.messages_processed(),
            "RoomRegistryActor stopped"
        );
    }

    fn handle_message(&mut self, message: RegistryMessage) {
        match message {
            RegistryMessage::Join {
                room_id,
                appointment_id,
                member,
                outbound,
                respond_to,
            } => {
                let result = self.enqueue_join(room_id, appointment_id, member, outbound);
                let _ = respond_to.send(result);
            }

            RegistryMessage::GetRoom {
                room_id,
                respond_to,
            } => {
                let handle = self.rooms.get(&room_id).map(|m| m.handle.clone());
                let _ = respond_to.send(handle);
            }

            RegistryMessage::RoomEmptied {
                room_id,
                instance,
                respond_to,
            } => {
                self.remove_room(&room_id, instance);
                let _ = respond_to.send(());
            }

            RegistryMessage::GetStats { respond_to } => {
                let _ = respond_to.send(self.stats());
            }

            // Handled in the run loop.
            RegistryMessage::Shutdown { respond_to } => {
                let _ = respond_to.send(());
            }
        }
    }

    /// Find or create the room and queue the join on it.
    fn enqueue_join(
        &mut self,
        room_id: RoomId,
        appointment_id: String,
        member: Arc<SessionIdentity>,
        outbound: ConnectionHandle,
    ) -> Result<PendingJoin, SignalingError> {
        if self.cancel_token.is_cancelled() {
            return Err(SignalingError::RoomClosed);
        }

        // A room whose task already ended is unusable; replace it.
        if self
            .rooms
            .get(&room_id)
            .is_some_and(|m| m.handle.is_closed())
        {
            if let Some(stale) = self.rooms.remove(&room_id) {
                warn!(
                    target: "signaling.actor.registry",
                    room_id = %room_id,
                    instance = stale.handle.instance(),
                    "Replacing closed room"
                );
                self.metrics.room_removed();
            }
        }

        let room = match self.rooms.get(&room_id) {
            Some(managed) => managed.handle.clone(),
            None => self.create_room(room_id.clone(), appointment_id),
        };

        let (tx, rx) = oneshot::channel();
        match room.try_enqueue(RoomMessage::Join {
            member,
            outbound,
            respond_to: tx,
        }) {
            Ok(()) => Ok(PendingJoin { room, outcome: rx }),
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(
                    target: "signaling.actor.registry",
                    room_id = %room_id,
                    "Room mailbox full, rejecting join"
                );
                Err(SignalingError::Internal("room mailbox full".to_string()))
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(SignalingError::RoomClosed),
        }
    }

    fn create_room(&mut self, room_id: RoomId, appointment_id: String) -> RoomActorHandle {
        let instance = self.next_instance;
        self.next_instance += 1;

        let (handle, task_handle) = RoomActor::spawn(
            room_id.clone(),
            appointment_id,
            instance,
            self.self_sender.clone(),
            self.cancel_token.child_token(),
            Arc::clone(&self.chat),
            self.settings.clone(),
            Arc::clone(&self.metrics),
        );

        self.rooms.insert(
            room_id.clone(),
            ManagedRoom {
                handle: handle.clone(),
                task_handle,
            },
        );
        self.metrics.room_created();

        info!(
            target: "signaling.actor.registry",
            room_id = %room_id,
            instance = instance,
            total_rooms = self.rooms.len(),
            "Room created"
        );

        handle
    }

    fn remove_room(&mut self, room_id: &RoomId, instance: u64) {
        let matches = self
            .rooms
            .get(room_id)
            .is_some_and(|m| m.handle.instance() == instance);
        if !matches {
            debug!(
                target: "signaling.actor.registry",
                room_id = %room_id,
                instance = instance,
                "Ignoring empty report from a room that is no longer listed"
            );
            return;
        }

        // The task exits right after the acknowledgement; nothing to await.
        self.rooms.remove(room_id);
        self.metrics.room_removed();

        info!(
            target: "signaling.actor.registry",
            room_id = %room_id,
            total_rooms = self.rooms.len(),
            "Room destroyed"
        );
    }

    fn stats(&self) -> RegistryStats {
        let now = Utc::now();
        let mut rooms: Vec<RoomSummary> = self
            .rooms
            .iter()
            .map(|(room_id, managed)| RoomSummary {
                room_id: room_id.clone(),
                appointment_id: managed.handle.appointment_id().to_string(),
                participant_count: managed.handle.participant_count(),
                created_at: managed.handle.created_at().to_rfc3339(),
                age_seconds: (now - managed.handle.created_at()).num_seconds(),
            })
            .collect();
        rooms.sort_by(|a, b| a.room_id.cmp(&b.room_id));

        RegistryStats {
            active_rooms: rooms.len(),
            total_connections: self.metrics.connection_count(),
            total_participants: rooms.iter().map(|r| r.participant_count).sum(),
            rooms,
        }
    }

    /// Cancel every room and wait for each to send its shutdown notice.
    async fn graceful_shutdown(&mut self) {
        info!(
            target: "signaling.actor.registry",
            instance_id = %self.instance_id,
            room_count = self.rooms.len(),
            "Performing graceful shutdown"
        );

        self.cancel_token.cancel();

        for (room_id, managed) in self.rooms.drain() {
            match tokio::time::timeout(ROOM_SHUTDOWN_TIMEOUT, managed.task_handle).await {
                Ok(Ok(())) => {
                    debug!(
                        target: "signaling.actor.registry",
                        room_id = %room_id,
                        "Room actor completed cleanly"
                    );
                }
                Ok(Err(e)) => {
                    warn!(
                        target: "signaling.actor.registry",
                        room_id = %room_id,
                        error = ?e,
                        "Room actor task panicked during shutdown"
                    );
                }
                Err(_) => {
                    warn!(
                        target: "signaling.actor.registry",
                        room_id = %room_id,
                        "Room actor shutdown timed out"
                    );
                }
            }
            self.metrics.room_removed();
        }

        info!(
            target: "signaling.actor.registry",
            instance_id = %self.instance_id,
            "Graceful shutdown complete"
        );
    }

    /// Drop rooms whose task ended without reporting empty.
    async fn check_room_health(&mut self) {
        let finished: Vec<RoomId> = self
            .rooms
            .iter()
            .filter(|(_, m)| m.task_handle.is_finished())
            .map(|(id, _)| id.clone())
            .collect();

        for room_id in finished {
            let Some(managed) = self.rooms.remove(&room_id) else {
                continue;
            };
            self.metrics.room_removed();

            match managed.task_handle.await {
                Ok(()) => {
                    warn!(
                        target: "signaling.actor.registry",
                        room_id = %room_id,
                        "Room actor exited while still listed"
                    );
                }
                Err(join_error) if join_error.is_panic() => {
                    error!(
                        target: "signaling.actor.registry",
                        room_id = %room_id,
                        error = ?join_error,
                        "Room actor panicked - participants lost their room"
                    );
                    self.metrics.record_panic(ActorType::Room);
                }
                Err(join_error) => {
                    warn!(
                        target: "signaling.actor.registry",
                        room_id = %room_id,
                        error = ?join_error,
                        "Room actor task cancelled"
                    );
                }
            }
        }
    }
}
