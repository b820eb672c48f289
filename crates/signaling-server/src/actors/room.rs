//! `RoomActor` - per-room actor that owns call state.
//!
//! Each `RoomActor`:
//! - Owns the participants, chat transcript and audit log of one room
//! - Serializes every join, leave, relay, toggle and chat on that room
//! - Pushes outbound events into the participants' connection queues
//!   without waiting on them
//!
//! # Lifecycle
//!
//! 1. Spawned by the registry with a join already queued as its first message
//! 2. Runs while it has participants
//! 3. When the last participant leaves it reports `RoomEmptied` to the
//!    registry, waits for the acknowledgement, answers the leave and stops;
//!    anything still in its mailbox is dropped and those callers observe
//!    `RoomClosed`
//! 4. On cancellation (server shutdown) it sends `call-ended` to every
//!    participant and stops

use super::connection::ConnectionHandle;
use super::messages::{
    JoinOutcome, MediaToggle, RegistryMessage, RoomMessage, RoomState,
};
use super::metrics::{ActorMetrics, ActorType, MailboxMonitor};
use crate::audit::{AuditEvent, AuditEventType, AuditLog};
use crate::auth::SessionIdentity;
use crate::chat::ChatChannel;
use crate::errors::SignalingError;
use crate::observability::metrics as prom;
use crate::protocol::{
    AudioToggled, CallEnded, ChatMessage, ParticipantInfo, RelayedSignal, RoomJoined,
    ScreenShareToggled, ServerEvent, SignalBody, UserJoined, UserLeft, VideoToggled,
};

use chrono::{DateTime, Utc};
use common::types::{ConnectionId, RoomId};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Default channel buffer size for the room mailbox.
const ROOM_CHANNEL_BUFFER: usize = 500;

/// Reason sent in `call-ended` when the server stops.
pub const SHUTDOWN_REASON: &str = "server-shutdown";

/// Reason sent in `call-ended` when the client gives none.
const DEFAULT_END_REASON: &str = "ended";

/// Handle to a `RoomActor`.
#[derive(Clone, Debug)]
pub struct RoomActorHandle {
    sender: mpsc::Sender<RoomMessage>,
    cancel_token: CancellationToken,
    room_id: RoomId,
    appointment_id: String,
    instance: u64,
    created_at: DateTime<Utc>,
    participant_count: Arc<AtomicUsize>,
}

impl RoomActorHandle {
    #[must_use]
    pub fn room_id(&self) -> &RoomId {
        &self.room_id
    }

    #[must_use]
    pub fn appointment_id(&self) -> &str {
        &self.appointment_id
    }

    /// Registry-assigned instance number, unique per process.
    #[must_use]
    pub fn instance(&self) -> u64 {
        self.instance
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Current participant count, maintained by the actor.
    #[must_use]
    pub fn participant_count(&self) -> usize {
        self.participant_count.load(Ordering::Relaxed)
    }

    /// Enqueue a message without waiting for mailbox space.
    ///
    /// Used by the registry, which must never await a room.
    pub(crate) fn try_enqueue(
        &self,
        message: RoomMessage,
    ) -> Result<(), mpsc::error::TrySendError<RoomMessage>> {
        self.sender.try_send(message)
    }

    /// Remove a connection from the room.
    pub async fn leave(&self, connection_id: ConnectionId) -> Result<(), SignalingError> {
        self.request(|respond_to| RoomMessage::Leave {
            connection_id,
            respond_to,
        })
        .await?
    }

    /// Relay a negotiation message from `from` to the other members.
    pub async fn relay(
        &self,
        from: ConnectionId,
        target_user_id: String,
        body: SignalBody,
    ) -> Result<(), SignalingError> {
        self.request(|respond_to| RoomMessage::Relay {
            from,
            target_user_id,
            body,
            respond_to,
        })
        .await?
    }

    /// Apply a media toggle for `from`.
    pub async fn toggle(
        &self,
        from: ConnectionId,
        toggle: MediaToggle,
    ) -> Result<(), SignalingError> {
        self.request(|respond_to| RoomMessage::Toggle {
            from,
            toggle,
            respond_to,
        })
        .await?
    }

    /// Post a chat message from `from`.
    pub async fn chat(
        &self,
        from: ConnectionId,
        message: String,
        message_type: Option<String>,
    ) -> Result<(), SignalingError> {
        self.request(|respond_to| RoomMessage::Chat {
            from,
            message,
            message_type,
            respond_to,
        })
        .await?
    }

    /// End the call for `from`: notify the others, then leave.
    pub async fn end_call(
        &self,
        from: ConnectionId,
        reason: Option<String>,
    ) -> Result<(), SignalingError> {
        self.request(|respond_to| RoomMessage::EndCall {
            from,
            reason,
            respond_to,
        })
        .await?
    }

    /// Audit records of this room, oldest first.
    pub async fn audit_events(&self) -> Result<Vec<AuditEvent>, SignalingError> {
        self.request(|respond_to| RoomMessage::GetAuditEvents { respond_to })
            .await
    }

    /// Snapshot of the room.
    pub async fn get_state(&self) -> Result<RoomState, SignalingError> {
        self.request(|respond_to| RoomMessage::GetState { respond_to })
            .await
    }

    /// Cancel the room actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// A stopped room has dropped its mailbox.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> RoomMessage,
    ) -> Result<T, SignalingError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| SignalingError::RoomClosed)?;
        rx.await.map_err(|_| SignalingError::RoomClosed)
    }
}

/// Participant state within a room.
struct Participant {
    identity: Arc<SessionIdentity>,
    outbound: ConnectionHandle,
    video_enabled: bool,
    audio_enabled: bool,
    screen_sharing: bool,
    joined_at: DateTime<Utc>,
    /// Join order within the room.
    seq: u64,
}

impl Participant {
    fn to_info(&self) -> ParticipantInfo {
        ParticipantInfo {
            user_id: self.identity.user_id.clone(),
            user_name: self.identity.display_name.clone(),
            role: self.identity.role.clone(),
            video_enabled: self.video_enabled,
            audio_enabled: self.audio_enabled,
            screen_sharing: self.screen_sharing,
            joined_at: self.joined_at.to_rfc3339(),
        }
    }
}

/// Static settings shared by every room.
#[derive(Debug, Clone)]
pub struct RoomSettings {
    /// Maximum transcript length; the oldest entry is evicted beyond it.
    pub history_limit: usize,
    /// Entries included in `room-joined`.
    pub history_window: usize,
}

type Reply = oneshot::Sender<Result<(), SignalingError>>;

/// What the message loop does after a message.
enum Exit {
    Continue,
    /// The last participant left. The request that emptied the room is
    /// answered only after the registry has unlisted it.
    Emptied(Reply, Result<(), SignalingError>),
}

/// The `RoomActor` implementation.
pub struct RoomActor {
    room_id: RoomId,
    appointment_id: String,
    instance: u64,
    receiver: mpsc::Receiver<RoomMessage>,
    registry: mpsc::Sender<RegistryMessage>,
    cancel_token: CancellationToken,
    participants: HashMap<ConnectionId, Participant>,
    next_seq: u64,
    transcript: VecDeque<ChatMessage>,
    audit: AuditLog,
    /// Reserved; never set.
    is_recording: bool,
    chat: Arc<ChatChannel>,
    settings: RoomSettings,
    participant_count: Arc<AtomicUsize>,
    metrics: Arc<ActorMetrics>,
    mailbox: MailboxMonitor,
}

impl RoomActor {
    /// Spawn a new room actor.
    ///
    /// Returns a handle and the task join handle.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        room_id: RoomId,
        appointment_id: String,
        instance: u64,
        registry: mpsc::Sender<RegistryMessage>,
        cancel_token: CancellationToken,
        chat: Arc<ChatChannel>,
        settings: RoomSettings,
        metrics: Arc<ActorMetrics>,
    ) -> (RoomActorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(ROOM_CHANNEL_BUFFER);
        let participant_count = Arc::new(AtomicUsize::new(0));
        let created_at = Utc::now();

        let actor = Self {
            room_id: room_id.clone(),
            appointment_id: appointment_id.clone(),
            instance,
            receiver,
            registry,
            cancel_token: cancel_token.clone(),
            participants: HashMap::new(),
            next_seq: 0,
            transcript: VecDeque::with_capacity(settings.history_limit),
            audit: AuditLog::new(room_id.clone()),
            is_recording: false,
            chat,
            settings,
            participant_count: Arc::clone(&participant_count),
            metrics,
            mailbox: MailboxMonitor::new(ActorType::Room, room_id.as_str()),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = RoomActorHandle {
            sender,
            cancel_token,
            room_id,
            appointment_id,
            instance,
            created_at,
            participant_count,
        };

        (handle, task_handle)
    }

    #[instrument(skip_all, name = "signaling.actor.room", fields(room_id = %self.room_id))]
    async fn run(mut self) {
        info!(
            target: "signaling.actor.room",
            room_id = %self.room_id,
            instance = self.instance,
            "RoomActor started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "signaling.actor.room",
                        room_id = %self.room_id,
                        "RoomActor received cancellation signal"
                    );
                    self.notify_shutdown();
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            let exit = self.handle_message(message);
                            self.mailbox.record_dequeue(self.receiver.len());
                            self.metrics.record_message_processed();

                            if let Exit::Emptied(respond_to, result) = exit {
                                self.report_emptied().await;
                                let _ = respond_to.send(result);
                                break;
                            }
                        }
                        None => {
                            info!(
                                target: "signaling.actor.room",
                                room_id = %self.room_id,
                                "RoomActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "signaling.actor.room",
            room_id = %self.room_id,
            participants = self.participants.len(),
            audit_events = self.audit.len(),
            messages_processed = self.mailbox.messages_processed(),
            "RoomActor stopped"
        );
    }

    /// Handle a single message.
    ///
    /// Every reply is sent before returning except the one for the request
    /// that empties the room, which travels back in [`Exit::Emptied`].
    fn handle_message(&mut self, message: RoomMessage) -> Exit {
        match message {
            RoomMessage::Join {
                member,
                outbound,
                respond_to,
            } => {
                let result = self.handle_join(member, outbound);
                let _ = respond_to.send(result);
                Exit::Continue
            }

            RoomMessage::Leave {
                connection_id,
                respond_to,
            } => {
                self.handle_leave(connection_id);
                self.reply_or_exit(respond_to, Ok(()))
            }

            RoomMessage::Relay {
                from,
                target_user_id,
                body,
                respond_to,
            } => {
                let result = self.handle_relay(from, target_user_id, body);
                let _ = respond_to.send(result);
                Exit::Continue
            }

            RoomMessage::Toggle {
                from,
                toggle,
                respond_to,
            } => {
                let result = self.handle_toggle(from, toggle);
                let _ = respond_to.send(result);
                Exit::Continue
            }

            RoomMessage::Chat {
                from,
                message,
                message_type,
                respond_to,
            } => {
                let result = self.handle_chat(from, &message, message_type.as_deref());
                let _ = respond_to.send(result);
                Exit::Continue
            }

            RoomMessage::EndCall {
                from,
                reason,
                respond_to,
            } => {
                let result = self.handle_end_call(from, reason);
                self.reply_or_exit(respond_to, result)
            }

            RoomMessage::GetAuditEvents { respond_to } => {
                let _ = respond_to.send(self.audit.events().to_vec());
                Exit::Continue
            }

            RoomMessage::GetState { respond_to } => {
                let _ = respond_to.send(self.get_state());
                Exit::Continue
            }
        }
    }

    fn handle_join(
        &mut self,
        member: Arc<SessionIdentity>,
        outbound: ConnectionHandle,
    ) -> Result<JoinOutcome, SignalingError> {
        let connection_id = member.connection_id;

        if self.participants.contains_key(&connection_id) {
            debug!(
                target: "signaling.actor.room",
                room_id = %self.room_id,
                connection_id = %connection_id,
                "Connection already in room, resending room-joined"
            );
            self.send_room_joined(connection_id);
            return Ok(JoinOutcome {
                participant_count: self.participants.len(),
                rejoined: true,
            });
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        self.participants.insert(
            connection_id,
            Participant {
                identity: Arc::clone(&member),
                outbound,
                video_enabled: true,
                audio_enabled: true,
                screen_sharing: false,
                joined_at: Utc::now(),
                seq,
            },
        );
        self.sync_participant_count();

        self.audit.record(
            &member.user_id,
            AuditEventType::Joined,
            json!({ "role": member.role.as_str() }),
        );

        let participants = self.participant_list();
        self.broadcast_except(
            connection_id,
            &ServerEvent::UserJoined(UserJoined {
                user_id: member.user_id.clone(),
                user_name: member.display_name.clone(),
                role: member.role.clone(),
                participants,
            }),
        );
        self.send_room_joined(connection_id);

        info!(
            target: "signaling.actor.room",
            room_id = %self.room_id,
            connection_id = %connection_id,
            role = %member.role,
            participants = self.participants.len(),
            "Participant joined"
        );

        Ok(JoinOutcome {
            participant_count: self.participants.len(),
            rejoined: false,
        })
    }

    fn handle_leave(&mut self, connection_id: ConnectionId) {
        let Some(participant) = self.participants.remove(&connection_id) else {
            debug!(
                target: "signaling.actor.room",
                room_id = %self.room_id,
                connection_id = %connection_id,
                "Leave for non-member ignored"
            );
            return;
        };
        self.sync_participant_count();

        let identity = participant.identity;
        self.audit
            .record(&identity.user_id, AuditEventType::Left, json!({}));

        let participants = self.participant_list();
        self.broadcast_except(
            connection_id,
            &ServerEvent::UserLeft(UserLeft {
                user_id: identity.user_id.clone(),
                user_name: identity.display_name.clone(),
                participants,
            }),
        );

        info!(
            target: "signaling.actor.room",
            room_id = %self.room_id,
            connection_id = %connection_id,
            participants = self.participants.len(),
            "Participant left"
        );
    }

    fn handle_relay(
        &mut self,
        from: ConnectionId,
        target_user_id: String,
        body: SignalBody,
    ) -> Result<(), SignalingError> {
        let sender = self.member(from)?;

        let audit_type = match &body {
            SignalBody::Offer(_) => Some(AuditEventType::WebrtcOffer),
            SignalBody::Answer(_) => Some(AuditEventType::WebrtcAnswer),
            SignalBody::Candidate(_) => None,
        };
        let kind = body.kind();

        if let Some(event_type) = audit_type {
            self.audit.record(
                &sender.user_id,
                event_type,
                json!({ "targetUserId": target_user_id }),
            );
        }

        let event = ServerEvent::relayed(RelayedSignal {
            body,
            from_user_id: sender.user_id.clone(),
            from_user_name: sender.display_name.clone(),
            target_user_id,
        });
        let delivered = self.broadcast_except(from, &event);
        prom::record_relay(kind);

        debug!(
            target: "signaling.actor.room",
            room_id = %self.room_id,
            connection_id = %from,
            kind = kind,
            delivered = delivered,
            "Relayed negotiation message"
        );

        Ok(())
    }

    fn handle_toggle(
        &mut self,
        from: ConnectionId,
        toggle: MediaToggle,
    ) -> Result<(), SignalingError> {
        let participant = self
            .participants
            .get_mut(&from)
            .ok_or(SignalingError::NotInRoom)?;
        let user_id = participant.identity.user_id.clone();

        let (event, audit_type) = match toggle {
            MediaToggle::Video(enabled) => {
                participant.video_enabled = enabled;
                (
                    ServerEvent::UserVideoToggled(VideoToggled {
                        user_id: user_id.clone(),
                        video_enabled: enabled,
                    }),
                    AuditEventType::VideoToggled,
                )
            }
            MediaToggle::Audio(enabled) => {
                participant.audio_enabled = enabled;
                (
                    ServerEvent::UserAudioToggled(AudioToggled {
                        user_id: user_id.clone(),
                        audio_enabled: enabled,
                    }),
                    AuditEventType::AudioToggled,
                )
            }
            MediaToggle::ScreenShare(enabled) => {
                participant.screen_sharing = enabled;
                (
                    ServerEvent::UserScreenShare(ScreenShareToggled {
                        user_id: user_id.clone(),
                        enabled,
                    }),
                    AuditEventType::ScreenShareToggled,
                )
            }
        };

        self.audit
            .record(&user_id, audit_type, json!({ "enabled": toggle.enabled() }));
        self.broadcast_except(from, &event);
        Ok(())
    }

    fn handle_chat(
        &mut self,
        from: ConnectionId,
        raw: &str,
        message_type: Option<&str>,
    ) -> Result<(), SignalingError> {
        let sender = self.member(from)?;
        let entry = self.chat.compose(&sender, raw, message_type)?;

        self.audit.record(
            &sender.user_id,
            AuditEventType::ChatMessage,
            json!({
                "messageId": entry.id,
                "messageType": entry.message_type,
                "length": entry.message.chars().count(),
            }),
        );

        while self.transcript.len() >= self.settings.history_limit {
            self.transcript.pop_front();
        }
        self.transcript.push_back(entry.clone());

        self.broadcast_all(&ServerEvent::ChatMessage(entry));

        debug!(
            target: "signaling.actor.room",
            room_id = %self.room_id,
            connection_id = %from,
            raw_len = raw.len(),
            transcript_len = self.transcript.len(),
            "Chat message posted"
        );

        Ok(())
    }

    fn handle_end_call(
        &mut self,
        from: ConnectionId,
        reason: Option<String>,
    ) -> Result<(), SignalingError> {
        let sender = self.member(from)?;
        let reason = reason
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_END_REASON.to_string());

        self.broadcast_except(
            from,
            &ServerEvent::CallEnded(CallEnded {
                ended_by: sender.user_id.clone(),
                ended_by_name: sender.display_name.clone(),
                reason: reason.clone(),
            }),
        );
        self.audit.record(
            &sender.user_id,
            AuditEventType::CallEnded,
            json!({ "reason": reason }),
        );

        self.handle_leave(from);
        Ok(())
    }

    fn get_state(&self) -> RoomState {
        RoomState {
            room_id: self.room_id.clone(),
            appointment_id: self.appointment_id.clone(),
            participants: self.participant_list(),
            transcript_len: self.transcript.len(),
            audit_len: self.audit.len(),
            is_recording: self.is_recording,
        }
    }

    /// Identity of a current participant.
    fn member(
        &self,
        connection_id: ConnectionId,
    ) -> Result<Arc<SessionIdentity>, SignalingError> {
        self.participants
            .get(&connection_id)
            .map(|p| Arc::clone(&p.identity))
            .ok_or(SignalingError::NotInRoom)
    }

    /// Participants in join order.
    fn participant_list(&self) -> Vec<ParticipantInfo> {
        let mut ordered: Vec<&Participant> = self.participants.values().collect();
        ordered.sort_by_key(|p| p.seq);
        ordered.into_iter().map(Participant::to_info).collect()
    }

    fn send_room_joined(&self, connection_id: ConnectionId) {
        let Some(participant) = self.participants.get(&connection_id) else {
            return;
        };
        let skip = self
            .transcript
            .len()
            .saturating_sub(self.settings.history_window);
        let chat_history = self.transcript.iter().skip(skip).cloned().collect();

        participant
            .outbound
            .send(ServerEvent::RoomJoined(RoomJoined {
                room_id: self.room_id.clone(),
                appointment_id: self.appointment_id.clone(),
                participants: self.participant_list(),
                chat_history,
            }));
    }

    /// Send to every participant except `except`. Returns the number queued.
    fn broadcast_except(&self, except: ConnectionId, event: &ServerEvent) -> usize {
        self.participants
            .iter()
            .filter(|(id, _)| **id != except)
            .filter(|(_, p)| p.outbound.send(event.clone()))
            .count()
    }

    fn broadcast_all(&self, event: &ServerEvent) -> usize {
        self.participants
            .values()
            .filter(|p| p.outbound.send(event.clone()))
            .count()
    }

    fn sync_participant_count(&self) {
        self.participant_count
            .store(self.participants.len(), Ordering::Relaxed);
    }

    /// Answer now, or hold the reply until the empty room is unlisted.
    fn reply_or_exit(&self, respond_to: Reply, result: Result<(), SignalingError>) -> Exit {
        if self.participants.is_empty() {
            Exit::Emptied(respond_to, result)
        } else {
            let _ = respond_to.send(result);
            Exit::Continue
        }
    }

    /// Tell the registry this room is empty and wait until it is unlisted.
    async fn report_emptied(&mut self) {
        let (tx, rx) = oneshot::channel();
        let message = RegistryMessage::RoomEmptied {
            room_id: self.room_id.clone(),
            instance: self.instance,
            respond_to: tx,
        };

        // A registry that is shutting down waits on this task, not on the ack.
        let acknowledged = tokio::select! {
            () = self.cancel_token.cancelled() => false,
            ack = async {
                self.registry.send(message).await.is_ok() && rx.await.is_ok()
            } => ack,
        };

        if !acknowledged {
            warn!(
                target: "signaling.actor.room",
                room_id = %self.room_id,
                "Registry did not acknowledge empty room"
            );
        }

        // Close the mailbox so queued requests fail fast with RoomClosed.
        self.receiver.close();
    }

    /// Notify every participant that the call is over.
    fn notify_shutdown(&mut self) {
        let delivered = self.broadcast_all(&ServerEvent::CallEnded(CallEnded {
            ended_by: "system".to_string(),
            ended_by_name: "System".to_string(),
            reason: SHUTDOWN_REASON.to_string(),
        }));
        self.participants.clear();
        self.sync_participant_count();

        info!(
            target: "signaling.actor.room",
            room_id = %self.room_id,
            delivered = delivered,
            "Participants notified of shutdown"
        );
    }
}
