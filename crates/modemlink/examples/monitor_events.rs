//! Monitor modem events and AT traffic in real time.
//!
//! Demonstrates subscribing to the event feed and the traffic log while a
//! session runs. Useful for watching registration progress, signal quality
//! samples, and downlink messages, or for debugging a misbehaving modem.
//!
//! # Usage
//!
//! ```sh
//! cargo run -p modemlink --features murata --example monitor_events
//! ```

use modemlink::{connect, DeviceFamily, ModemEvent, ProfileConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let serial_port = "/dev/ttyUSB0";

    println!("Connecting to modem on {}...", serial_port);

    let client = connect(
        serial_port,
        115_200,
        DeviceFamily::Murata,
        ProfileConfig::default(),
    )
    .await?;

    let info = client.device_info();
    println!("Connected: {} {}\n", info.manufacturer, info.model);

    // Mirror every AT line in a background task.
    let mut log = client.subscribe_log();
    tokio::spawn(async move {
        while let Ok(entry) = log.recv().await {
            println!("{} {}", entry.origin, entry.text);
        }
    });

    let mut events = client.subscribe_events();

    // Bring-up runs concurrently with the event printer below.
    let bringup = tokio::spawn(async move { client.run_bringup().await });

    loop {
        match events.recv().await {
            Ok(ModemEvent::PhaseChanged { phase }) => {
                println!("== phase: {}", phase);
            }
            Ok(ModemEvent::RegistrationChanged { status }) => {
                println!("== registration: {}", status);
            }
            Ok(ModemEvent::SignalQualityUpdated { quality }) => {
                println!("== signal: {} dBm", quality.rsrp);
            }
            Ok(ModemEvent::DownlinkReceived { message }) => {
                println!(
                    "== downlink from {}:{}: {}",
                    message.source_ip,
                    message.source_port,
                    message.text()
                );
            }
            Ok(ModemEvent::ConnectionStateChanged { state }) => {
                println!("== connection: {}", state);
            }
            Ok(event) => println!("== {:?}", event),
            Err(_) => break,
        }
    }

    bringup.await??;
    Ok(())
}
