//! Chat integration tests: symmetry, sanitization, encryption and the
//! bounded transcript.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use common::types::RoomId;
use serde_json::{json, Value};
use signaling_server::chat::ChatCipher;
use std::collections::HashMap;
use signaling_test_utils::{TestSignalingServer, TestTokenBuilder, TestWsClient, TEST_JWT_SECRET};

async fn connect(
    server: &TestSignalingServer,
    builder: TestTokenBuilder,
) -> Result<TestWsClient, anyhow::Error> {
    TestWsClient::connect(&server.ws_url_with_token(&builder.sign(TEST_JWT_SECRET))).await
}

async fn join(client: &mut TestWsClient, room_id: &str) -> Result<Value, anyhow::Error> {
    client
        .send_event(
            "join-room",
            json!({ "roomId": room_id, "appointmentId": "appt" }),
        )
        .await?;
    client.expect_event("room-joined").await
}

async fn pair(
    server: &TestSignalingServer,
) -> Result<(TestWsClient, TestWsClient), anyhow::Error> {
    let mut a = connect(server, TestTokenBuilder::doctor("A", "Dr. A")).await?;
    let mut b = connect(server, TestTokenBuilder::patient("B", "Pat B")).await?;
    join(&mut a, "R1").await?;
    join(&mut b, "R1").await?;
    a.expect_event("user-joined").await?;
    Ok((a, b))
}

#[tokio::test]
async fn test_chat_is_broadcast_to_sender_and_peers() -> Result<(), anyhow::Error> {
    let server = TestSignalingServer::spawn().await?;
    let (mut a, mut b) = pair(&server).await?;

    a.send_event(
        "chat-message",
        json!({ "roomId": "R1", "message": "How are you feeling?" }),
    )
    .await?;

    let at_a = a.expect_event("chat-message").await?;
    let at_b = b.expect_event("chat-message").await?;

    assert_eq!(at_a, at_b);
    assert_eq!(at_a["message"], "How are you feeling?");
    assert_eq!(at_a["messageType"], "text");
    assert_eq!(at_a["userId"], "A");
    assert_eq!(at_a["displayName"], "Dr. A");
    assert_eq!(at_a["role"], "doctor");
    assert!(!at_a["id"].as_str().unwrap().is_empty());
    assert!(!at_a["encryptedPayload"].as_str().unwrap().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_chat_is_sanitized_and_payload_decrypts_to_original() -> Result<(), anyhow::Error> {
    let server = TestSignalingServer::spawn().await?;
    let (mut a, mut b) = pair(&server).await?;

    let raw = "<script>alert(1)</script>hello";
    b.send_event(
        "chat-message",
        json!({ "roomId": "R1", "message": raw, "messageType": "note" }),
    )
    .await?;

    let at_b = b.expect_event("chat-message").await?;
    let at_a = a.expect_event("chat-message").await?;
    assert_eq!(at_a["message"], "hello");
    assert_eq!(at_b["message"], "hello");
    assert_eq!(at_a["messageType"], "note");

    let cipher = ChatCipher::new(&server.config().chat_key_material()?)?;
    let decrypted = cipher.decrypt(at_a["encryptedPayload"].as_str().unwrap())?;
    assert_eq!(decrypted, raw);

    Ok(())
}

#[tokio::test]
async fn test_invalid_chat_messages_are_rejected() -> Result<(), anyhow::Error> {
    let server = TestSignalingServer::spawn().await?;
    let (mut a, mut b) = pair(&server).await?;

    for message in ["", "   ", "<script>x</script><>"] {
        a.send_event("chat-message", json!({ "roomId": "R1", "message": message }))
            .await?;
        assert_eq!(a.expect_event("error").await?["code"], "MALFORMED_REQUEST");
    }

    let too_long = "x".repeat(server.config().max_chat_message_length + 1);
    a.send_event("chat-message", json!({ "roomId": "R1", "message": too_long }))
        .await?;
    assert_eq!(a.expect_event("error").await?["code"], "MALFORMED_REQUEST");

    b.expect_silence().await?;

    Ok(())
}

#[tokio::test]
async fn test_transcript_keeps_last_hundred_and_join_sends_last_fifty(
) -> Result<(), anyhow::Error> {
    let server = TestSignalingServer::spawn().await?;
    let mut a = connect(&server, TestTokenBuilder::doctor("A", "A")).await?;
    join(&mut a, "R1").await?;

    for i in 0..101 {
        a.send_event(
            "chat-message",
            json!({ "roomId": "R1", "message": format!("message {i}") }),
        )
        .await?;
        let echoed = a.expect_event("chat-message").await?;
        assert_eq!(echoed["message"], format!("message {i}"));
    }

    let room = server
        .registry()
        .get_room(RoomId::parse("R1").unwrap())
        .await?
        .expect("room should exist");
    let state = room.get_state().await?;
    assert_eq!(state.transcript_len, 100);
    assert!(!state.is_recording);

    let mut b = connect(&server, TestTokenBuilder::patient("B", "B")).await?;
    let joined = join(&mut b, "R1").await?;
    let history = joined["chatHistory"].as_array().unwrap();
    assert_eq!(history.len(), 50);
    assert_eq!(history.first().unwrap()["message"], "message 51");
    assert_eq!(history.last().unwrap()["message"], "message 100");

    Ok(())
}

#[tokio::test]
async fn test_hundred_and_first_message_evicts_the_first() -> Result<(), anyhow::Error> {
    let server = TestSignalingServer::spawn_with_vars(HashMap::from([(
        "SIGNALING_CHAT_HISTORY_WINDOW".to_string(),
        "100".to_string(),
    )]))
    .await?;
    let mut a = connect(&server, TestTokenBuilder::doctor("A", "A")).await?;
    join(&mut a, "R1").await?;

    for i in 0..101 {
        a.send_event(
            "chat-message",
            json!({ "roomId": "R1", "message": format!("message {i}") }),
        )
        .await?;
        a.expect_event("chat-message").await?;
    }

    let mut b = connect(&server, TestTokenBuilder::patient("B", "B")).await?;
    let joined = join(&mut b, "R1").await?;
    let texts: Vec<&str> = joined["chatHistory"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["message"].as_str().unwrap())
        .collect();
    assert_eq!(texts.len(), 100);
    assert!(!texts.contains(&"message 0"));
    assert_eq!(texts.first(), Some(&"message 1"));
    assert_eq!(texts.last(), Some(&"message 100"));

    Ok(())
}

#[tokio::test]
async fn test_chat_is_audited_without_content() -> Result<(), anyhow::Error> {
    let server = TestSignalingServer::spawn().await?;
    let (mut a, mut b) = pair(&server).await?;

    a.send_event("chat-message", json!({ "roomId": "R1", "message": "secret" }))
        .await?;
    a.expect_event("chat-message").await?;
    b.expect_event("chat-message").await?;

    let room = server
        .registry()
        .get_room(RoomId::parse("R1").unwrap())
        .await?
        .expect("room should exist");
    let events = room.audit_events().await?;
    let chat = events
        .iter()
        .find(|e| e.event_type.as_str() == "chat_message")
        .expect("chat should be audited");

    assert_eq!(chat.user_id, "A");
    assert_eq!(chat.metadata["length"], 6);
    assert!(!chat.metadata.to_string().contains("secret"));

    Ok(())
}
