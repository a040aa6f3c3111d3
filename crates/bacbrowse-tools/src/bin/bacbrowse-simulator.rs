use std::net::SocketAddr;

use bacbrowse_client::SimulatedDevice;
use bacbrowse_core::types::{DataValue, ObjectId, ObjectType, PropertyId};
use bacbrowse_datalink::BacnetIpTransport;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "bacbrowse-simulator")]
struct Args {
    /// Device instance number.
    #[arg(long, default_value_t = 9999)]
    instance: u32,
    /// Device object name.
    #[arg(long)]
    name: Option<String>,
    #[arg(long, default_value = "0.0.0.0:47808")]
    bind: SocketAddr,
    /// Number of analog-input objects to create.
    #[arg(long, default_value_t = 3)]
    analog_inputs: u32,
    /// Number of binary-input objects to create.
    #[arg(long, default_value_t = 2)]
    binary_inputs: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let transport = BacnetIpTransport::bind(args.bind, None).await?;
    let sim = SimulatedDevice::new(args.instance, transport);

    if let Some(name) = &args.name {
        sim.set_property(
            sim.device_id,
            PropertyId::ObjectName,
            DataValue::CharacterString(name.clone()),
        )
        .await;
    }
    for i in 0..args.analog_inputs {
        sim.add_object(
            ObjectId::new(ObjectType::AnalogInput, i),
            vec![
                (PropertyId::ObjectName, DataValue::CharacterString(format!("AI-{i}"))),
                (PropertyId::PresentValue, DataValue::Real(0.0)),
            ],
        )
        .await;
    }
    for i in 0..args.binary_inputs {
        sim.add_object(
            ObjectId::new(ObjectType::BinaryInput, i),
            vec![
                (PropertyId::ObjectName, DataValue::CharacterString(format!("BI-{i}"))),
                (PropertyId::PresentValue, DataValue::Enumerated(0)),
            ],
        )
        .await;
    }

    println!(
        "Simulated device {} on {} ({} AI, {} BI). Ctrl+C to stop.",
        args.instance, args.bind, args.analog_inputs, args.binary_inputs
    );
    sim.run().await?;
    Ok(())
}
