//! Per-connection session loop.
//!
//! Each admitted WebSocket gets one session task that:
//! - Reads frames in arrival order and awaits each request before reading the next
//! - Keeps the set of rooms this connection has joined
//! - Reports failures to this connection only, as `error` events
//! - Leaves every joined room on disconnect, exactly as an explicit `leave-room`
//!
//! Outbound traffic goes through a [`ConnectionActor`] that owns the write half.

use crate::actors::{ConnectionActor, ConnectionHandle, MediaToggle, RoomActorHandle};
use crate::auth::SessionIdentity;
use crate::errors::SignalingError;
use crate::observability::metrics as prom;
use crate::protocol::{ClientEvent, JoinRoomRequest, ServerEvent, SignalBody};
use crate::routes::AppState;
use axum::extract::ws::{Message, WebSocket};
use common::types::{ConnectionId, RoomId};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// How long the writer may take to flush queued events after disconnect.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Maximum appointment id length in characters.
const MAX_APPOINTMENT_ID_LEN: usize = 128;

/// Run a session until the client disconnects or the server shuts down.
#[instrument(
    skip_all,
    name = "signaling.ws.session",
    fields(connection_id = %identity.connection_id)
)]
pub async fn run(socket: WebSocket, state: Arc<AppState>, identity: SessionIdentity) {
    let (sink, mut stream) = socket.split();
    let cancel_token = state.shutdown.child_token();

    // Not tied to shutdown: the writer must flush the `call-ended` events the
    // rooms emit while closing.
    let writer_token = CancellationToken::new();
    let (outbound, mut writer) = ConnectionActor::spawn(
        identity.connection_id,
        sink,
        state.outbound_queue_size,
        writer_token.clone(),
    );

    state.metrics.connection_created();
    info!(
        target: "signaling.ws",
        connection_id = %identity.connection_id,
        role = %identity.role,
        "Connection admitted"
    );

    let mut session = Session {
        identity: Arc::new(identity),
        state: Arc::clone(&state),
        outbound,
        rooms: HashMap::new(),
    };

    loop {
        tokio::select! {
            () = cancel_token.cancelled() => {
                debug!(
                    target: "signaling.ws",
                    connection_id = %session.connection_id(),
                    "Session cancelled by server shutdown"
                );
                break;
            }

            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => session.handle_text(&text).await,
                    Some(Ok(Message::Binary(_))) => {
                        session.reject(
                            "binary",
                            &SignalingError::Malformed(
                                "Binary frames are not supported".to_string(),
                            ),
                        );
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(
                            target: "signaling.ws",
                            connection_id = %session.connection_id(),
                            error = %e,
                            "Socket read failed"
                        );
                        break;
                    }
                }
            }
        }
    }

    let connection_id = session.connection_id();
    session.disconnect().await;
    drop(session);

    if tokio::time::timeout(WRITER_DRAIN_TIMEOUT, &mut writer)
        .await
        .is_err()
    {
        debug!(
            target: "signaling.ws",
            connection_id = %connection_id,
            "Writer did not drain in time, cancelling"
        );
        writer_token.cancel();
        let _ = writer.await;
    }

    state.metrics.connection_closed();
    info!(target: "signaling.ws", connection_id = %connection_id, "Connection closed");
}

/// State of one admitted connection.
struct Session {
    identity: Arc<SessionIdentity>,
    state: Arc<AppState>,
    outbound: ConnectionHandle,
    rooms: HashMap<RoomId, RoomActorHandle>,
}

impl Session {
    fn connection_id(&self) -> ConnectionId {
        self.identity.connection_id
    }

    /// Parse and dispatch one text frame.
    async fn handle_text(&mut self, text: &str) {
        let event = match serde_json::from_str::<ClientEvent>(text) {
            Ok(event) => event,
            Err(e) => {
                let error = SignalingError::Malformed(format!("Invalid event: {e}"));
                prom::record_event("unknown", error.code(), Duration::ZERO);
                self.reject("unknown", &error);
                return;
            }
        };

        let name = event.name();
        let start = Instant::now();
        let result = self.dispatch(event).await;
        let elapsed = start.elapsed();

        match result {
            Ok(()) => prom::record_event(name, "ok", elapsed),
            Err(e) => {
                prom::record_event(name, e.code(), elapsed);
                self.reject(name, &e);
            }
        }
    }

    async fn dispatch(&mut self, event: ClientEvent) -> Result<(), SignalingError> {
        let from = self.connection_id();

        match event {
            ClientEvent::JoinRoom(req) => self.join(req).await,

            ClientEvent::LeaveRoom(req) => self.leave(&req.room_id).await,

            ClientEvent::WebrtcOffer(req) => {
                let room = self.room_for(&req.room_id)?;
                let result = room
                    .relay(from, req.target_user_id, SignalBody::Offer(req.offer))
                    .await;
                self.settle(&room, result)
            }

            ClientEvent::WebrtcAnswer(req) => {
                let room = self.room_for(&req.room_id)?;
                let result = room
                    .relay(from, req.target_user_id, SignalBody::Answer(req.answer))
                    .await;
                self.settle(&room, result)
            }

            ClientEvent::WebrtcIceCandidate(req) => {
                let room = self.room_for(&req.room_id)?;
                let result = room
                    .relay(
                        from,
                        req.target_user_id,
                        SignalBody::Candidate(req.candidate),
                    )
                    .await;
                self.settle(&room, result)
            }

            ClientEvent::ToggleVideo(req) => {
                let room = self.room_for(&req.room_id)?;
                let result = room.toggle(from, MediaToggle::Video(req.enabled)).await;
                self.settle(&room, result)
            }

            ClientEvent::ToggleAudio(req) => {
                let room = self.room_for(&req.room_id)?;
                let result = room.toggle(from, MediaToggle::Audio(req.enabled)).await;
                self.settle(&room, result)
            }

            ClientEvent::ScreenShare(req) => {
                let room = self.room_for(&req.room_id)?;
                let result = room
                    .toggle(from, MediaToggle::ScreenShare(req.enabled))
                    .await;
                self.settle(&room, result)
            }

            ClientEvent::ChatMessage(req) => {
                let room = self.room_for(&req.room_id)?;
                let result = room.chat(from, req.message, req.message_type).await;
                self.settle(&room, result)
            }

            ClientEvent::CallEnded(req) => {
                let room = self.room_for(&req.room_id)?;
                let result = room.end_call(from, req.reason).await;
                self.rooms.remove(room.room_id());
                result
            }
        }
    }

    async fn join(&mut self, req: JoinRoomRequest) -> Result<(), SignalingError> {
        let room_id = parse_room_id(&req.room_id)?;
        let appointment_id = parse_appointment_id(&req.appointment_id)?;

        if !self.identity.role.can_join_rooms() {
            return Err(SignalingError::Forbidden(
                "Your role may not join call rooms".to_string(),
            ));
        }

        let room = self
            .state
            .registry
            .join_room(
                room_id.clone(),
                appointment_id,
                Arc::clone(&self.identity),
                self.outbound.clone(),
            )
            .await?;

        self.rooms.insert(room_id, room);
        Ok(())
    }

    /// Leave a room. Not being in it is a silent no-op.
    async fn leave(&mut self, raw_room_id: &str) -> Result<(), SignalingError> {
        let room_id = parse_room_id(raw_room_id)?;
        let Some(room) = self.rooms.remove(&room_id) else {
            return Ok(());
        };

        match room.leave(self.connection_id()).await {
            Ok(()) | Err(SignalingError::RoomClosed) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Resolve a room this connection has joined.
    fn room_for(&self, raw_room_id: &str) -> Result<RoomActorHandle, SignalingError> {
        let room_id = parse_room_id(raw_room_id)?;
        self.rooms
            .get(&room_id)
            .cloned()
            .ok_or(SignalingError::NotInRoom)
    }

    /// Forget rooms that stopped underneath this connection.
    fn settle(
        &mut self,
        room: &RoomActorHandle,
        result: Result<(), SignalingError>,
    ) -> Result<(), SignalingError> {
        if matches!(
            result,
            Err(SignalingError::RoomClosed | SignalingError::NotInRoom)
        ) {
            self.rooms.remove(room.room_id());
        }
        result
    }

    /// Send an `error` event to this connection only.
    fn reject(&self, event: &str, error: &SignalingError) {
        match error {
            SignalingError::Internal(_) => warn!(
                target: "signaling.ws",
                connection_id = %self.connection_id(),
                event,
                error = %error,
                "Request failed"
            ),
            _ => debug!(
                target: "signaling.ws",
                connection_id = %self.connection_id(),
                event,
                code = error.code(),
                "Request rejected"
            ),
        }

        self.outbound
            .send(ServerEvent::error(error.code(), error.client_message()));
    }

    /// Leave every joined room.
    async fn disconnect(&mut self) {
        let connection_id = self.connection_id();
        for (room_id, room) in self.rooms.drain() {
            match room.leave(connection_id).await {
                Ok(()) | Err(SignalingError::RoomClosed) => {}
                Err(e) => warn!(
                    target: "signaling.ws",
                    connection_id = %connection_id,
                    room_id = %room_id,
                    error = %e,
                    "Leave on disconnect failed"
                ),
            }
        }
    }
}

fn parse_room_id(raw: &str) -> Result<RoomId, SignalingError> {
    RoomId::parse(raw).ok_or_else(|| {
        SignalingError::Malformed("roomId must be 1 to 128 characters".to_string())
    })
}

fn parse_appointment_id(raw: &str) -> Result<String, SignalingError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_APPOINTMENT_ID_LEN {
        return Err(SignalingError::Malformed(
            "appointmentId must be 1 to 128 characters".to_string(),
        ));
    }
    Ok(trimmed.to_string())
}
