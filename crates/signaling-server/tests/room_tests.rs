//! Room lifecycle and relay integration tests.
//!
//! Each test runs a real server on an ephemeral port and drives it with
//! WebSocket clients.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use common::types::RoomId;
use serde_json::{json, Value};
use signaling_test_utils::{TestSignalingServer, TestTokenBuilder, TestWsClient, TEST_JWT_SECRET};

async fn connect(
    server: &TestSignalingServer,
    builder: TestTokenBuilder,
) -> Result<TestWsClient, anyhow::Error> {
    TestWsClient::connect(&server.ws_url_with_token(&builder.sign(TEST_JWT_SECRET))).await
}

/// Join and consume the `room-joined` acknowledgement.
async fn join(client: &mut TestWsClient, room_id: &str) -> Result<Value, anyhow::Error> {
    client
        .send_event(
            "join-room",
            json!({ "roomId": room_id, "appointmentId": "appt" }),
        )
        .await?;
    client.expect_event("room-joined").await
}

fn user_ids(participants: &Value) -> Vec<String> {
    let mut ids: Vec<String> = participants
        .as_array()
        .map(|list| {
            list.iter()
                .filter_map(|p| p["userId"].as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    ids.sort();
    ids
}

/// Doctor and patient join, toggle, disconnect and leave.
#[tokio::test]
async fn test_consultation_end_to_end() -> Result<(), anyhow::Error> {
    let server = TestSignalingServer::spawn().await?;
    let mut doctor = connect(&server, TestTokenBuilder::doctor("D", "Dr. D")).await?;
    let mut patient = connect(&server, TestTokenBuilder::patient("P", "Pat P")).await?;

    doctor
        .send_event(
            "join-room",
            json!({ "roomId": "appt-42", "appointmentId": "42" }),
        )
        .await?;
    let joined = doctor.expect_event("room-joined").await?;
    assert_eq!(joined["roomId"], "appt-42");
    assert_eq!(joined["appointmentId"], "42");

    patient
        .send_event(
            "join-room",
            json!({ "roomId": "appt-42", "appointmentId": "42" }),
        )
        .await?;

    let user_joined = doctor.expect_event("user-joined").await?;
    assert_eq!(user_joined["userId"], "P");
    assert_eq!(user_joined["participants"].as_array().map(Vec::len), Some(2));

    let room_joined = patient.expect_event("room-joined").await?;
    assert_eq!(user_ids(&room_joined["participants"]), vec!["D", "P"]);
    assert_eq!(room_joined["chatHistory"], json!([]));

    doctor
        .send_event(
            "toggle-video",
            json!({ "roomId": "appt-42", "enabled": false }),
        )
        .await?;
    let toggled = patient.expect_event("user-video-toggled").await?;
    assert_eq!(toggled, json!({ "userId": "D", "videoEnabled": false }));
    doctor.expect_silence().await?;

    doctor.close().await;
    let left = patient.expect_event("user-left").await?;
    assert_eq!(left["userId"], "D");
    assert_eq!(user_ids(&left["participants"]), vec!["P"]);

    patient
        .send_event("leave-room", json!({ "roomId": "appt-42" }))
        .await?;
    server.wait_for_active_rooms(0).await?;

    Ok(())
}

#[tokio::test]
async fn test_room_created_once_and_removed_on_last_leave() -> Result<(), anyhow::Error> {
    let server = TestSignalingServer::spawn().await?;
    let mut a = connect(&server, TestTokenBuilder::doctor("A", "A")).await?;
    let mut b = connect(&server, TestTokenBuilder::patient("B", "B")).await?;

    join(&mut a, "R1").await?;
    server.wait_for_active_rooms(1).await?;

    join(&mut b, "R1").await?;
    a.expect_event("user-joined").await?;

    let stats = server.registry().stats().await?;
    assert_eq!(stats.active_rooms, 1);
    assert_eq!(stats.total_participants, 2);
    assert_eq!(stats.rooms.first().map(|r| r.participant_count), Some(2));

    a.send_event("leave-room", json!({ "roomId": "R1" })).await?;
    b.expect_event("user-left").await?;
    server.wait_for_active_rooms(1).await?;

    b.send_event("leave-room", json!({ "roomId": "R1" })).await?;
    server.wait_for_active_rooms(0).await?;

    // A fresh join recreates the room
    join(&mut a, "R1").await?;
    server.wait_for_active_rooms(1).await?;

    Ok(())
}

#[tokio::test]
async fn test_rejoin_is_idempotent() -> Result<(), anyhow::Error> {
    let server = TestSignalingServer::spawn().await?;
    let mut a = connect(&server, TestTokenBuilder::doctor("A", "A")).await?;
    let mut b = connect(&server, TestTokenBuilder::patient("B", "B")).await?;

    join(&mut a, "R1").await?;
    join(&mut b, "R1").await?;
    a.expect_event("user-joined").await?;

    let again = join(&mut b, "R1").await?;
    assert_eq!(again["participants"].as_array().map(Vec::len), Some(2));
    a.expect_silence().await?;

    let stats = server.registry().stats().await?;
    assert_eq!(stats.total_participants, 2);

    Ok(())
}

#[tokio::test]
async fn test_offer_relayed_to_others_only() -> Result<(), anyhow::Error> {
    let server = TestSignalingServer::spawn().await?;
    let mut a = connect(&server, TestTokenBuilder::doctor("A", "Alice")).await?;
    let mut b = connect(&server, TestTokenBuilder::patient("B", "Bob")).await?;
    let mut c = connect(&server, TestTokenBuilder::admin("C")).await?;

    join(&mut a, "R1").await?;
    join(&mut b, "R1").await?;
    a.expect_event("user-joined").await?;
    join(&mut c, "R1").await?;
    a.expect_event("user-joined").await?;
    b.expect_event("user-joined").await?;

    let sdp = json!({ "type": "offer", "sdp": "v=0\r\n..." });
    a.send_event(
        "webrtc-offer",
        json!({ "roomId": "R1", "targetUserId": "B", "offer": sdp }),
    )
    .await?;

    for peer in [&mut b, &mut c] {
        let offer = peer.expect_event("webrtc-offer").await?;
        assert_eq!(offer["fromUserId"], "A");
        assert_eq!(offer["fromUserName"], "Alice");
        assert_eq!(offer["targetUserId"], "B");
        assert_eq!(offer["offer"], sdp);
    }
    a.expect_silence().await?;

    Ok(())
}

#[tokio::test]
async fn test_answer_and_ice_relay() -> Result<(), anyhow::Error> {
    let server = TestSignalingServer::spawn().await?;
    let mut a = connect(&server, TestTokenBuilder::doctor("A", "A")).await?;
    let mut b = connect(&server, TestTokenBuilder::patient("B", "B")).await?;

    join(&mut a, "R1").await?;
    join(&mut b, "R1").await?;
    a.expect_event("user-joined").await?;

    b.send_event(
        "webrtc-answer",
        json!({ "roomId": "R1", "targetUserId": "A", "answer": { "type": "answer" } }),
    )
    .await?;
    let answer = a.expect_event("webrtc-answer").await?;
    assert_eq!(answer["answer"]["type"], "answer");
    assert_eq!(answer["fromUserId"], "B");

    let candidate = json!({ "candidate": "candidate:1 1 UDP 2122252543 10.0.0.1 5000 typ host" });
    b.send_event(
        "webrtc-ice-candidate",
        json!({ "roomId": "R1", "targetUserId": "A", "candidate": candidate }),
    )
    .await?;
    let ice = a.expect_event("webrtc-ice-candidate").await?;
    assert_eq!(ice["candidate"], candidate);
    b.expect_silence().await?;

    // Answers are audited, ICE candidates are not
    let room = server
        .registry()
        .get_room(RoomId::parse("R1").unwrap())
        .await?
        .ok_or_else(|| anyhow::anyhow!("room missing"))?;
    let types: Vec<String> = room
        .audit_events()
        .await?
        .iter()
        .map(|e| e.event_type.to_string())
        .collect();
    assert_eq!(types, vec!["joined", "joined", "webrtc_answer"]);

    Ok(())
}

#[tokio::test]
async fn test_audio_and_screen_share_toggles() -> Result<(), anyhow::Error> {
    let server = TestSignalingServer::spawn().await?;
    let mut a = connect(&server, TestTokenBuilder::doctor("A", "A")).await?;
    let mut b = connect(&server, TestTokenBuilder::patient("B", "B")).await?;

    join(&mut a, "R1").await?;
    join(&mut b, "R1").await?;
    a.expect_event("user-joined").await?;

    a.send_event("toggle-audio", json!({ "roomId": "R1", "enabled": false }))
        .await?;
    assert_eq!(
        b.expect_event("user-audio-toggled").await?,
        json!({ "userId": "A", "audioEnabled": false })
    );

    a.send_event("screen-share", json!({ "roomId": "R1", "enabled": true }))
        .await?;
    assert_eq!(
        b.expect_event("user-screen-share").await?,
        json!({ "userId": "A", "enabled": true })
    );
    a.expect_silence().await?;

    // A late joiner sees the current flags
    let mut c = connect(&server, TestTokenBuilder::admin("C")).await?;
    let joined = join(&mut c, "R1").await?;
    let alice = joined["participants"]
        .as_array()
        .and_then(|list| list.iter().find(|p| p["userId"] == "A"))
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("A missing from participant list"))?;
    assert_eq!(alice["audioEnabled"], false);
    assert_eq!(alice["videoEnabled"], true);
    assert_eq!(alice["screenSharing"], true);

    Ok(())
}

#[tokio::test]
async fn test_non_member_is_rejected_without_broadcast() -> Result<(), anyhow::Error> {
    let server = TestSignalingServer::spawn().await?;
    let mut member = connect(&server, TestTokenBuilder::doctor("A", "A")).await?;
    let mut outsider = connect(&server, TestTokenBuilder::patient("X", "X")).await?;

    join(&mut member, "R2").await?;

    outsider
        .send_event("chat-message", json!({ "roomId": "R2", "message": "hi" }))
        .await?;
    let error = outsider.expect_event("error").await?;
    assert_eq!(error["code"], "NOT_IN_ROOM");

    outsider
        .send_event("toggle-video", json!({ "roomId": "R2", "enabled": false }))
        .await?;
    assert_eq!(outsider.expect_event("error").await?["code"], "NOT_IN_ROOM");

    outsider
        .send_event(
            "webrtc-offer",
            json!({ "roomId": "R2", "targetUserId": "A", "offer": {} }),
        )
        .await?;
    assert_eq!(outsider.expect_event("error").await?["code"], "NOT_IN_ROOM");

    // Nonexistent rooms are a membership failure as well
    outsider
        .send_event("toggle-audio", json!({ "roomId": "nowhere", "enabled": true }))
        .await?;
    assert_eq!(outsider.expect_event("error").await?["code"], "NOT_IN_ROOM");

    member.expect_silence().await?;

    Ok(())
}

#[tokio::test]
async fn test_leave_unknown_room_is_silent() -> Result<(), anyhow::Error> {
    let server = TestSignalingServer::spawn().await?;
    let mut a = connect(&server, TestTokenBuilder::doctor("A", "A")).await?;

    a.send_event("leave-room", json!({ "roomId": "never-joined" }))
        .await?;
    a.expect_silence().await?;

    Ok(())
}

#[tokio::test]
async fn test_call_ended_notifies_others_and_leaves() -> Result<(), anyhow::Error> {
    let server = TestSignalingServer::spawn().await?;
    let mut a = connect(&server, TestTokenBuilder::doctor("A", "Dr. A")).await?;
    let mut b = connect(&server, TestTokenBuilder::patient("B", "B")).await?;

    join(&mut a, "R1").await?;
    join(&mut b, "R1").await?;
    a.expect_event("user-joined").await?;

    a.send_event("call-ended", json!({ "roomId": "R1", "reason": "completed" }))
        .await?;

    let ended = b.expect_event("call-ended").await?;
    assert_eq!(ended["endedBy"], "A");
    assert_eq!(ended["endedByName"], "Dr. A");
    assert_eq!(ended["reason"], "completed");

    let left = b.expect_event("user-left").await?;
    assert_eq!(left["userId"], "A");

    // A is no longer a member
    a.send_event("toggle-video", json!({ "roomId": "R1", "enabled": true }))
        .await?;
    assert_eq!(a.expect_event("error").await?["code"], "NOT_IN_ROOM");

    Ok(())
}

#[tokio::test]
async fn test_disconnect_leaves_every_room() -> Result<(), anyhow::Error> {
    let server = TestSignalingServer::spawn().await?;
    let mut a = connect(&server, TestTokenBuilder::doctor("A", "A")).await?;
    let mut b = connect(&server, TestTokenBuilder::patient("B", "B")).await?;

    join(&mut a, "R1").await?;
    join(&mut a, "R2").await?;
    join(&mut b, "R2").await?;
    a.expect_event("user-joined").await?;
    server.wait_for_active_rooms(2).await?;

    a.close().await;

    b.expect_event("user-left").await?;
    server.wait_for_active_rooms(1).await?;

    Ok(())
}

#[tokio::test]
async fn test_malformed_requests_get_error_events() -> Result<(), anyhow::Error> {
    let server = TestSignalingServer::spawn().await?;
    let mut a = connect(&server, TestTokenBuilder::doctor("A", "A")).await?;

    a.send_raw("this is not json").await?;
    assert_eq!(a.expect_event("error").await?["code"], "MALFORMED_REQUEST");

    a.send_event("join-room", json!({ "roomId": "R1" })).await?;
    assert_eq!(a.expect_event("error").await?["code"], "MALFORMED_REQUEST");

    a.send_event("join-room", json!({ "roomId": "", "appointmentId": "1" }))
        .await?;
    assert_eq!(a.expect_event("error").await?["code"], "MALFORMED_REQUEST");

    a.send_event("dance", json!({})).await?;
    assert_eq!(a.expect_event("error").await?["code"], "MALFORMED_REQUEST");

    a.send_binary(vec![1, 2, 3]).await?;
    assert_eq!(a.expect_event("error").await?["code"], "MALFORMED_REQUEST");

    // The connection is still usable
    join(&mut a, "R1").await?;

    Ok(())
}
