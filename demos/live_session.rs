// Offline Session Example: scripted end-to-end run without hardware or network
//
// This example wires the full session core together against the in-process
// mock transport and manual audio devices:
// 1. The controller connects and starts a session (mock handshake)
// 2. Synthetic microphone samples flow through the capture encoder
// 3. A scripted assistant reply arrives: transcription deltas, reply audio,
//    and a turn-complete boundary
// 4. The transcript log and the chunks "sent" to the remote are printed
//
// Usage: cargo run --example live_session

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::time::sleep;
use voicelink::audio::codec;
use voicelink::{
    ManualDevices, MockTransport, ServerEvent, SessionConfig, SessionController,
};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = SessionConfig {
        system_instruction: "You are a courteous, slightly dry voice assistant.".to_string(),
        ..SessionConfig::default()
    };

    let transport = MockTransport::new();
    let devices = ManualDevices::new(config.playback_sample_rate);

    let mut controller = SessionController::new(
        config.clone(),
        Arc::new(transport.clone()),
        Arc::clone(&devices) as Arc<dyn voicelink::DeviceFactory>,
    );

    controller.start().await?;
    println!("session state: {:?}", controller.state());

    // One full capture block of synthetic microphone audio.
    devices.push_samples(vec![0.25f32; config.block_samples]);
    sleep(Duration::from_millis(50)).await;

    // Scripted remote turn: user transcription, assistant reply with audio.
    transport.push_event(ServerEvent::with_input_transcription("What is the time?"));
    transport.push_event(ServerEvent::with_output_transcription(
        "It is precisely half past four, sir.",
    ));
    let reply_pcm = codec::pack_pcm16(&vec![0.1f32; 12000]); // 0.5 s at 24 kHz
    transport.push_event(ServerEvent::with_audio(&codec::encode(&reply_pcm)));
    transport.push_event(ServerEvent::with_turn_complete());
    sleep(Duration::from_millis(50)).await;

    controller.stop().await;

    println!("chunks sent to remote: {}", transport.sent().len());
    for line in controller.transcript() {
        println!("{:?}: {}", line.role, line.text);
    }
    for buffer in devices.sink().scheduled() {
        println!(
            "scheduled reply audio: {} samples at t={:.2}s",
            buffer.samples, buffer.start
        );
    }

    Ok(())
}
