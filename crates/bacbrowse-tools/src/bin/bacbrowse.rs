use std::path::PathBuf;
use std::time::Duration;

use bacbrowse_engine::{Browser, BrowseError, ConfigPatch, Device, JsonFileStore};
use clap::{Parser, Subcommand};
use tokio::time::{sleep, Instant};

type UdpBrowser = Browser<bacbrowse_engine::UdpConnector, JsonFileStore>;

#[derive(Parser, Debug)]
#[command(name = "bacbrowse", about = "Discover and browse BACnet/IP devices")]
struct Args {
    /// Settings file holding port, interface index and timeout.
    #[arg(long, default_value = "bacbrowse-settings.json")]
    settings: PathBuf,
    #[arg(long)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the interfaces a client can bind to (use the index as --nic).
    Interfaces,
    /// Broadcast Who-Is and list the devices that answer.
    Scan {
        #[arg(long, default_value_t = 3)]
        wait_secs: u64,
    },
    /// List the objects of a device, e.g. `objects 192.168.1.20:1234`.
    Objects {
        device: String,
        #[arg(long, default_value_t = 3)]
        wait_secs: u64,
    },
    /// Read every property of one object, e.g. `props 192.168.1.20:1234 0:1`.
    Props {
        device: String,
        object: String,
        #[arg(long, default_value_t = 3)]
        wait_secs: u64,
    },
    /// Show the settings, or change them when any option is given.
    Config {
        #[arg(long)]
        port: Option<u16>,
        #[arg(long)]
        nic: Option<usize>,
        /// Per-request timeout in milliseconds.
        #[arg(long)]
        timeout: Option<u64>,
    },
}

/// Scans until `key` has announced itself or `wait` runs out.
async fn find_device(browser: &UdpBrowser, key: &str, wait: Duration) -> Result<Device, BrowseError> {
    browser.trigger_scan().await?;
    let deadline = Instant::now() + wait;
    loop {
        if let Some(device) = browser.device(key).await {
            return Ok(device);
        }
        if Instant::now() >= deadline {
            return Err(BrowseError::DeviceNotFound(key.to_string()));
        }
        sleep(Duration::from_millis(100)).await;
    }
}

async fn run(browser: &UdpBrowser, command: Command, json: bool) -> Result<String, Box<dyn std::error::Error>> {
    let out = match command {
        Command::Interfaces => bacbrowse_tools::interfaces(&browser.interfaces(), json)?,
        Command::Config { port, nic, timeout } => {
            let patch = ConfigPatch {
                port,
                interface_index: nic,
                timeout_millis: timeout,
            };
            let config = if patch.is_empty() {
                browser.config().await
            } else {
                browser.set_config(patch).await?
            };
            bacbrowse_tools::config(&config, json)?
        }
        Command::Scan { wait_secs } => {
            browser.start().await?;
            browser.trigger_scan().await?;
            sleep(Duration::from_secs(wait_secs)).await;
            bacbrowse_tools::devices(&browser.devices().await, json)?
        }
        Command::Objects { device, wait_secs } => {
            browser.start().await?;
            find_device(browser, &device, Duration::from_secs(wait_secs)).await?;
            let objects = browser.list_objects(&device).await?;
            bacbrowse_tools::objects(&objects, json)?
        }
        Command::Props {
            device,
            object,
            wait_secs,
        } => {
            browser.start().await?;
            find_device(browser, &device, Duration::from_secs(wait_secs)).await?;
            let properties = browser.object_properties(&device, &object).await?;
            bacbrowse_tools::properties(&properties, json)?
        }
    };
    Ok(out)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();
    let browser = Browser::udp(JsonFileStore::new(&args.settings)).await?;

    let result = run(&browser, args.command, args.json).await;
    browser.dispose().await;
    match result {
        Ok(out) => {
            print!("{out}");
            Ok(())
        }
        Err(e) => {
            eprintln!("bacbrowse: {e}");
            std::process::exit(1);
        }
    }
}
