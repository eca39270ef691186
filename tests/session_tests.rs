// Integration tests for the session layer: lifecycle state machine, outbound
// gating, inbound demux, barge-in, and teardown — all against the in-process
// mock transport and manual audio devices.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tokio::time::sleep;
use voicelink::audio::codec;
use voicelink::{
    AudioChunk, DeviceFactory, Error, ManualDevices, MockTransport, Role, ServerEvent,
    SessionConfig, SessionConnection, SessionController, SessionState,
};

fn controller(
    transport: &MockTransport,
    devices: &Arc<ManualDevices>,
) -> SessionController {
    SessionController::new(
        SessionConfig::default(),
        Arc::new(transport.clone()),
        Arc::clone(devices) as Arc<dyn DeviceFactory>,
    )
}

/// Poll until `cond` holds or a timeout elapses.
async fn wait_until(cond: impl Fn() -> bool) -> bool {
    for _ in 0..200 {
        if cond() {
            return true;
        }
        sleep(Duration::from_millis(5)).await;
    }
    cond()
}

fn reply_audio(seconds: f64) -> ServerEvent {
    let samples = (seconds * 24000.0).round() as usize;
    let pcm = codec::pack_pcm16(&vec![0.0f32; samples]);
    ServerEvent::with_audio(&codec::encode(&pcm))
}

#[tokio::test]
async fn test_start_connects_and_activates_capture() -> Result<()> {
    let transport = MockTransport::new();
    let devices = ManualDevices::new(24000);
    let mut controller = controller(&transport, &devices);

    assert_eq!(controller.state(), SessionState::Disconnected);

    controller.start().await?;
    assert_eq!(controller.state(), SessionState::Connected);
    assert!(controller.is_capturing());
    assert_eq!(transport.connect_count(), 1);

    let setup = &transport.setups()[0];
    assert_eq!(setup.voice, "Kore");
    assert_eq!(setup.response_modalities, vec!["AUDIO".to_string()]);
    assert!(setup.input_audio_transcription);

    controller.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_captured_blocks_reach_the_transport() -> Result<()> {
    let transport = MockTransport::new();
    let devices = ManualDevices::new(24000);
    let mut controller = controller(&transport, &devices);

    controller.start().await?;

    let block = controller.config().block_samples;
    assert!(devices.push_samples(vec![0.25f32; block]));

    let transport_probe = transport.clone();
    assert!(wait_until(move || transport_probe.sent().len() == 1).await);

    let sent = transport.sent();
    assert_eq!(sent[0].mime_type, "audio/pcm;rate=16000");
    assert_eq!(codec::decode(&sent[0].data)?.len(), block * 2);

    controller.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_send_while_disconnected_has_no_transport_side_effect() -> Result<()> {
    let transport = MockTransport::new();
    let (state_tx, _state_rx) = watch::channel(SessionState::Disconnected);
    let mut connection = SessionConnection::new(state_tx);

    let chunk = AudioChunk::from_samples(&[0.1f32; 16], 16000);

    // Never connected: dropped before the transport is touched.
    connection.send(chunk.clone()).await;
    assert!(transport.sent().is_empty());

    // Connected then stopped: dropped again.
    let _events = connection
        .start(&transport, &SessionConfig::default())
        .await?;
    connection.stop().await;
    connection.send(chunk).await;
    assert!(transport.sent().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_capture_stops_with_the_session() -> Result<()> {
    let transport = MockTransport::new();
    let devices = ManualDevices::new(24000);
    let mut controller = controller(&transport, &devices);

    controller.start().await?;
    controller.stop().await;

    assert!(!controller.is_capturing());
    // The input stream is released; produced samples go nowhere.
    assert!(!devices.push_samples(vec![0.0f32; 4096]));
    assert!(transport.sent().is_empty());

    Ok(())
}

#[tokio::test]
async fn test_transcription_deltas_flush_at_turn_boundary() -> Result<()> {
    let transport = MockTransport::new();
    let devices = ManualDevices::new(24000);
    let mut controller = controller(&transport, &devices);

    controller.start().await?;

    assert!(transport.push_event(ServerEvent::with_output_transcription("Half past ")));
    assert!(transport.push_event(ServerEvent::with_input_transcription("What time is it?")));
    assert!(transport.push_event(ServerEvent::with_output_transcription("four, sir.")));
    assert!(transport.push_event(ServerEvent::with_turn_complete()));

    assert!(wait_until(|| controller.transcript().len() == 2).await);

    let lines = controller.transcript();
    assert_eq!(lines[0].role, Role::User);
    assert_eq!(lines[0].text, "What time is it?");
    assert_eq!(lines[1].role, Role::Assistant);
    assert_eq!(lines[1].text, "Half past four, sir.");

    controller.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_reply_audio_is_scheduled_gaplessly() -> Result<()> {
    let transport = MockTransport::new();
    let devices = ManualDevices::new(24000);
    let sink = devices.sink();
    let mut controller = controller(&transport, &devices);

    controller.start().await?;
    sink.set_time(1.0);

    assert!(transport.push_event(reply_audio(0.5)));
    assert!(transport.push_event(reply_audio(0.3)));

    let sink_probe = sink.clone();
    assert!(wait_until(move || sink_probe.scheduled().len() == 2).await);

    let scheduled = sink.scheduled();
    assert!((scheduled[0].start - 1.0).abs() < 1e-9);
    assert!((scheduled[1].start - 1.5).abs() < 1e-9);

    controller.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_interruption_cancels_playback_and_reanchors() -> Result<()> {
    let transport = MockTransport::new();
    let devices = ManualDevices::new(24000);
    let sink = devices.sink();
    let mut controller = controller(&transport, &devices);

    controller.start().await?;
    sink.set_time(1.0);

    assert!(transport.push_event(reply_audio(0.5)));
    assert!(transport.push_event(reply_audio(0.5)));
    assert!(transport.push_event(ServerEvent::with_interrupted()));

    let sink_probe = sink.clone();
    assert!(
        wait_until(move || {
            let s = sink_probe.scheduled();
            s.len() == 2 && s.iter().all(|b| b.handle.is_cancelled())
        })
        .await
    );

    // After barge-in the next chunk anchors to current real time.
    sink.set_time(3.0);
    assert!(transport.push_event(reply_audio(0.2)));
    let sink_probe = sink.clone();
    assert!(wait_until(move || sink_probe.scheduled().len() == 3).await);
    assert!((sink.scheduled()[2].start - 3.0).abs() < 1e-9);

    controller.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_malformed_audio_payload_is_dropped_not_fatal() -> Result<()> {
    let transport = MockTransport::new();
    let devices = ManualDevices::new(24000);
    let mut controller = controller(&transport, &devices);

    controller.start().await?;

    assert!(transport.push_event(ServerEvent::with_audio("!!! not base64 !!!")));
    assert!(transport.push_event(ServerEvent::with_input_transcription("still alive")));
    assert!(transport.push_event(ServerEvent::with_turn_complete()));

    assert!(wait_until(|| controller.transcript().len() == 1).await);
    assert_eq!(controller.state(), SessionState::Connected);
    assert!(devices.sink().scheduled().is_empty());

    controller.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_stop_twice_is_a_no_op() -> Result<()> {
    let transport = MockTransport::new();
    let devices = ManualDevices::new(24000);
    let mut controller = controller(&transport, &devices);

    controller.start().await?;
    controller.stop().await;
    controller.stop().await;

    assert_eq!(controller.state(), SessionState::Disconnected);
    assert!(!transport.is_live());
    Ok(())
}

#[tokio::test]
async fn test_connect_failure_lands_in_error_until_restart() -> Result<()> {
    let transport = MockTransport::new();
    let devices = ManualDevices::new(24000);
    let mut controller = controller(&transport, &devices);

    transport.fail_next_connect();
    let result = controller.start().await;
    assert!(matches!(result, Err(Error::Connect(_))));
    assert_eq!(controller.state(), SessionState::Error);
    // Devices acquired during the failed start were released again.
    assert!(!devices.push_samples(vec![0.0f32; 16]));

    // Reconnection is always an explicit restart.
    controller.start().await?;
    assert_eq!(controller.state(), SessionState::Connected);

    controller.stop().await;
    Ok(())
}

#[tokio::test]
async fn test_device_failure_prevents_session_start() -> Result<()> {
    let transport = MockTransport::new();
    let devices = ManualDevices::new(24000);
    let mut controller = controller(&transport, &devices);

    devices.fail_next_input();
    let result = controller.start().await;
    assert!(matches!(result, Err(Error::Device(_))));
    assert_eq!(controller.state(), SessionState::Disconnected);
    assert_eq!(transport.connect_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_mid_session_transport_drop_forces_error_and_teardown() -> Result<()> {
    let transport = MockTransport::new();
    let devices = ManualDevices::new(24000);
    let mut controller = controller(&transport, &devices);

    controller.start().await?;
    assert!(transport.push_event(ServerEvent::with_input_transcription("hel")));
    assert!(transport.push_event(ServerEvent::with_turn_complete()));

    assert!(wait_until(|| controller.transcript().len() == 1).await);

    transport.drop_remote();

    let mut state_rx = controller.subscribe_state();
    let errored = tokio::time::timeout(Duration::from_secs(1), async {
        loop {
            if *state_rx.borrow_and_update() == SessionState::Error {
                break;
            }
            if state_rx.changed().await.is_err() {
                break;
            }
        }
    })
    .await
    .is_ok();
    assert!(errored);

    // The teardown also releases the microphone; produced samples go nowhere
    // and nothing ever reaches the dead transport.
    assert!(wait_until(|| !devices.push_samples(vec![0.0f32; 16])).await);
    assert!(!controller.is_capturing());
    assert!(transport.sent().is_empty());

    // The earlier transcript survives the failure.
    assert_eq!(controller.transcript().len(), 1);

    // Explicit stop still reaches Disconnected.
    controller.stop().await;
    assert_eq!(controller.state(), SessionState::Disconnected);
    Ok(())
}

#[tokio::test]
async fn test_restart_tears_down_the_previous_session_first() -> Result<()> {
    let transport = MockTransport::new();
    let devices = ManualDevices::new(24000);
    let mut controller = controller(&transport, &devices);

    controller.start().await?;
    controller.start().await?; // implicit teardown of the first session

    assert_eq!(transport.connect_count(), 2);
    assert_eq!(controller.state(), SessionState::Connected);
    assert!(controller.is_capturing());

    controller.stop().await;
    Ok(())
}
