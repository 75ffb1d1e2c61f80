//! Basic modem session example.
//!
//! Demonstrates connecting to a Nordic Thingy:91 X on a serial port,
//! running the full network bring-up, and sending one uplink message.
//!
//! # Requirements
//!
//! - A supported modem connected via USB
//! - The serial port path adjusted for your system (e.g., `/dev/ttyUSB0`
//!   on Linux, `COM3` on Windows)
//! - A SIM provisioned for the configured APN
//!
//! # Usage
//!
//! ```sh
//! cargo run -p modemlink --features nordic --example basic_session
//! ```

use std::time::Duration;

use modemlink::{connect, DeviceFamily, ProfileConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Adjust this to match your system's serial port.
    let serial_port = "/dev/ttyUSB0";

    println!("Connecting to modem on {}...", serial_port);

    let client = connect(
        serial_port,
        115_200,
        DeviceFamily::Nordic,
        ProfileConfig::default(),
    )
    .await?;

    let info = client.device_info();
    println!("Connected: {} {}", info.manufacturer, info.model);

    // Probe the command channel with a raw command.
    let reply = client.execute("AT+CGMR", Duration::from_secs(3)).await?;
    println!("Firmware: {}", reply);

    println!("Running network bring-up (this can take a while)...");
    client.run_bringup().await?;

    let status = client.status();
    println!("Registered: {}", status.registration);
    if let Some(signal) = status.signal {
        println!("Signal: {} dBm", signal.rsrp);
    }

    println!("Sending uplink message...");
    client.send_message("hello from modemlink").await?;
    println!("Sent.");

    client.disconnect().await?;
    Ok(())
}
