// Integration tests for the signaling dispatcher
//
// Messages go in as JSON text, replies come back as JSON text, exactly as on
// the socket.

mod common;

use anyhow::Result;
use common::{test_config, FakeRunner, Harness, RunnerMode};
use serde_json::{json, Value};
use sfu_recorder::combine::CombinePipeline;
use sfu_recorder::media::MediaRouter;
use sfu_recorder::{Dispatcher, ServerMessage};
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
    _temp_dir: TempDir,
    harness: Harness,
    dispatcher: Dispatcher,
}

fn fixture() -> Fixture {
    let temp_dir = TempDir::new().unwrap();
    let config = test_config(temp_dir.path());
    let harness = Harness::new(&config);
    let combiner = Arc::new(CombinePipeline::new(
        config.combine.clone(),
        Arc::new(FakeRunner::new(RunnerMode::Succeed)),
    ));

    let dispatcher = Dispatcher::new(
        Arc::clone(&harness.registry),
        Arc::clone(&harness.router) as Arc<dyn MediaRouter>,
        Arc::clone(&harness.supervisor),
        combiner,
        Some(1_500_000),
    );

    Fixture {
        _temp_dir: temp_dir,
        harness,
        dispatcher,
    }
}

/// Send on the connection that owns the message's session
async fn send(dispatcher: &Dispatcher, message: Value) -> Value {
    let connection = message["sessionId"].as_str().unwrap_or("none").to_string();
    send_on(dispatcher, &connection, message).await
}

async fn send_on(dispatcher: &Dispatcher, connection: &str, message: Value) -> Value {
    let reply = dispatcher
        .handle_text(connection, &message.to_string())
        .await
        .unwrap();
    serde_json::from_str(&reply).unwrap()
}

/// Open a session and negotiate a send transport with audio + video
async fn negotiated(f: &Fixture) -> (String, String) {
    let (session_id, _) = f.dispatcher.open_session().await.unwrap();

    let created = send(
        &f.dispatcher,
        json!({ "action": "create-transport", "sessionId": session_id }),
    )
    .await;
    let transport_id = created["id"].as_str().unwrap().to_string();

    for kind in ["audio", "video"] {
        let produced = send(
            &f.dispatcher,
            json!({
                "action": "produce",
                "sessionId": session_id,
                "transportId": transport_id,
                "kind": kind,
                "rtpParameters": { "codecs": [], "encodings": [] }
            }),
        )
        .await;
        assert_eq!(produced["action"], "produce");
        assert_eq!(produced["kind"], kind);
    }

    (session_id, transport_id)
}

#[tokio::test]
async fn test_open_session_greets_with_capabilities() -> Result<()> {
    let f = fixture();

    let (session_id, greeting) = f.dispatcher.open_session().await?;

    match greeting {
        ServerMessage::RouterRtpCapabilities {
            router_rtp_capabilities,
            session_id: greeted,
        } => {
            assert_eq!(greeted, session_id);
            assert_eq!(router_rtp_capabilities.codecs.len(), 2);
        }
        other => panic!("unexpected greeting {:?}", other),
    }
    assert!(f.harness.registry.get(&session_id).await.is_ok());

    Ok(())
}

#[tokio::test]
async fn test_create_transport_applies_bitrate_cap() -> Result<()> {
    let f = fixture();
    let (session_id, _) = f.dispatcher.open_session().await?;

    let reply = send(
        &f.dispatcher,
        json!({ "action": "create-transport", "sessionId": session_id }),
    )
    .await;

    assert_eq!(reply["action"], "create-transport");
    let transport_id = reply["id"].as_str().unwrap();
    assert!(reply["iceParameters"].is_object());
    assert!(reply["dtlsParameters"].is_object());
    assert_eq!(
        f.harness.router.calls_to("set_max_incoming_bitrate"),
        vec![transport_id.to_string()]
    );

    Ok(())
}

#[tokio::test]
async fn test_bitrate_failure_is_ignored() -> Result<()> {
    let f = fixture();
    f.harness.router.fail_on("set_max_incoming_bitrate");
    let (session_id, _) = f.dispatcher.open_session().await?;

    let reply = send(
        &f.dispatcher,
        json!({ "action": "create-transport", "sessionId": session_id }),
    )
    .await;

    assert_eq!(reply["action"], "create-transport");

    Ok(())
}

#[tokio::test]
async fn test_connect_transport_acknowledges() -> Result<()> {
    let f = fixture();
    let (session_id, transport_id) = negotiated(&f).await;

    let reply = send(
        &f.dispatcher,
        json!({
            "action": "connect-transport",
            "sessionId": session_id,
            "transportId": transport_id,
            "dtlsParameters": { "role": "client" }
        }),
    )
    .await;

    assert_eq!(reply, json!({ "action": "connect-transport" }));
    assert_eq!(
        f.harness.router.calls_to("connect_webrtc_transport"),
        vec![transport_id]
    );

    Ok(())
}

#[tokio::test]
async fn test_unknown_transport_is_reported() -> Result<()> {
    let f = fixture();
    let (session_id, _) = negotiated(&f).await;

    let reply = send(
        &f.dispatcher,
        json!({
            "action": "connect-transport",
            "sessionId": session_id,
            "transportId": "nope",
            "dtlsParameters": {}
        }),
    )
    .await;

    assert_eq!(reply["action"], "error");
    assert_eq!(reply["requestAction"], "connect-transport");
    assert_eq!(reply["code"], "TRANSPORT_NOT_FOUND");

    Ok(())
}

#[tokio::test]
async fn test_unknown_session_is_reported() -> Result<()> {
    let f = fixture();

    let reply = send(
        &f.dispatcher,
        json!({ "action": "start-record", "sessionId": "ghost" }),
    )
    .await;

    assert_eq!(reply["code"], "SESSION_NOT_FOUND");
    assert_eq!(reply["requestAction"], "start-record");

    Ok(())
}

#[tokio::test]
async fn test_record_round_trip() -> Result<()> {
    let f = fixture();
    let (session_id, _) = negotiated(&f).await;

    let started = send(
        &f.dispatcher,
        json!({ "action": "start-record", "sessionId": session_id }),
    )
    .await;
    assert_eq!(started, json!({ "action": "start-record" }));
    assert_eq!(f.harness.ports.in_use_count(), 2);

    let again = send(
        &f.dispatcher,
        json!({ "action": "start-record", "sessionId": session_id }),
    )
    .await;
    assert_eq!(again["code"], "ALREADY_RECORDING");

    let stopped = send(
        &f.dispatcher,
        json!({ "action": "stop-record", "sessionId": session_id }),
    )
    .await;
    assert_eq!(stopped, json!({ "action": "stop-record" }));
    assert_eq!(f.harness.ports.in_use_count(), 0);

    let not_recording = send(
        &f.dispatcher,
        json!({ "action": "stop-record", "sessionId": session_id }),
    )
    .await;
    assert_eq!(not_recording["code"], "NOT_RECORDING");

    Ok(())
}

#[tokio::test]
async fn test_close_session_releases_everything() -> Result<()> {
    let f = fixture();
    let (session_id, transport_id) = negotiated(&f).await;
    send(
        &f.dispatcher,
        json!({ "action": "start-record", "sessionId": session_id }),
    )
    .await;

    f.dispatcher.close_session(&session_id).await;

    assert!(f.harness.registry.is_empty().await);
    assert_eq!(f.harness.ports.in_use_count(), 0);
    assert_eq!(f.harness.spawner.terminated(), 1);
    assert!(f
        .harness
        .router
        .calls_to("close_transport")
        .contains(&transport_id));

    // A late message for the closed session is an error, not a crash
    let late = send(
        &f.dispatcher,
        json!({ "action": "stop-record", "sessionId": session_id }),
    )
    .await;
    assert_eq!(late["code"], "SESSION_NOT_FOUND");

    Ok(())
}

#[tokio::test]
async fn test_foreign_session_is_refused() -> Result<()> {
    let f = fixture();
    let (victim, _) = negotiated(&f).await;
    let (intruder, _) = f.dispatcher.open_session().await?;

    send(
        &f.dispatcher,
        json!({ "action": "start-record", "sessionId": victim }),
    )
    .await;

    let reply = send_on(
        &f.dispatcher,
        &intruder,
        json!({ "action": "stop-record", "sessionId": victim }),
    )
    .await;

    assert_eq!(reply["requestAction"], "stop-record");
    assert_eq!(reply["code"], "SESSION_MISMATCH");

    // The victim's recording is untouched
    let session = f.harness.registry.get(&victim).await?;
    assert!(session.lock().await.is_recording());
    assert_eq!(f.harness.spawner.terminated(), 0);

    Ok(())
}

#[tokio::test]
async fn test_start_combine_replies_with_outcome() -> Result<()> {
    let f = fixture();

    let reply = send(&f.dispatcher, json!({ "action": "start-combine" })).await;

    assert_eq!(reply["action"], "start-combine");
    assert_eq!(reply["status"], "no-files");

    Ok(())
}

#[tokio::test]
async fn test_malformed_messages_get_error_replies() -> Result<()> {
    let f = fixture();

    let reply: Value =
        serde_json::from_str(&f.dispatcher.handle_text("s", "not json").await.unwrap())?;
    assert_eq!(reply["action"], "error");
    assert_eq!(reply["requestAction"], "unknown");
    assert_eq!(reply["code"], "INVALID_MESSAGE");

    let reply = send(&f.dispatcher, json!({ "action": "produce", "sessionId": "s" })).await;
    assert_eq!(reply["requestAction"], "produce");
    assert_eq!(reply["code"], "INVALID_MESSAGE");

    Ok(())
}

#[tokio::test]
async fn test_shutdown_closes_all_sessions() -> Result<()> {
    let f = fixture();
    negotiated(&f).await;
    negotiated(&f).await;

    f.dispatcher.shutdown().await;

    assert!(f.harness.registry.is_empty().await);
    assert_eq!(f.harness.ports.in_use_count(), 0);

    Ok(())
}
