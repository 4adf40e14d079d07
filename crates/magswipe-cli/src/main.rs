//! magswipe - command-line monitor for Magtek USB swipe readers.
//!
//! Two commands: `list` enumerates attached readers, `monitor` connects to
//! one and streams swipe events until interrupted. `--demo` swaps the USB
//! bus for an in-memory reader that swipes a test card every few seconds,
//! which is handy on machines without hardware (and the only mode available
//! when the binary was built without the `hardware-hid` feature).

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;

use magswipe_core::ReaderConfig;
use magswipe_device::mock::{MockTransport, MockTransportHandle};
use magswipe_device::registry::DeviceRegistry;
use magswipe_device::{AnyTransport, ConnectionManager, ReaderEvent};

const DEMO_SWIPE: &str = "%B4111111111111111^DOE/JOHN^2512101000000000000?";

#[derive(Parser)]
#[command(name = "magswipe")]
#[command(version)]
#[command(about = "Monitor Magtek USB magnetic-stripe readers")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a TOML reader configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Use an in-memory demo reader instead of real hardware
    #[arg(long, global = true)]
    demo: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON lines for scripting
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List attached swipe readers
    List,

    /// Connect to a reader and stream swipe events until interrupted
    Monitor {
        /// Device id to monitor; defaults to the first attached reader
        device_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("magswipe={log_level},magswipe_device={log_level}").into()),
        )
        .with_target(false)
        .init();

    let config = load_config(cli.config.as_deref())?;
    let (transport, demo) = build_transport(cli.demo, &config)?;

    match cli.command {
        Commands::List => cmd_list(transport, cli.format).await,
        Commands::Monitor { device_id } => {
            cmd_monitor(transport, demo, config, device_id, cli.format).await
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ReaderConfig> {
    let Some(path) = path else {
        return Ok(ReaderConfig::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: ReaderConfig =
        toml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Pick the transport for this run. The demo transport comes with its
/// control handle so the monitor loop can keep scripting swipes.
fn build_transport(
    demo: bool,
    config: &ReaderConfig,
) -> Result<(AnyTransport, Option<MockTransportHandle>)> {
    if demo {
        let (transport, handle) = MockTransport::new();
        handle.add_device(0x0801, 0x0002, Some("DEMO01"), "demo/0");
        return Ok((transport.into(), Some(handle)));
    }

    #[cfg(feature = "hardware-hid")]
    {
        let transport = magswipe_device::HidTransport::with_buffer_size(config.read_buffer_size)?;
        Ok((transport.into(), None))
    }
    #[cfg(not(feature = "hardware-hid"))]
    {
        let _ = config;
        bail!(
            "this build has no hardware transport; rebuild with --features hardware-hid \
             or pass --demo"
        );
    }
}

async fn cmd_list(transport: AnyTransport, format: OutputFormat) -> Result<()> {
    let registry = DeviceRegistry::new(Arc::new(transport));
    let devices = registry.devices(None).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&devices)?),
        OutputFormat::Text => {
            if devices.is_empty() {
                println!("No supported readers attached.");
            }
            for device in &devices {
                println!("{}  {}", device.id, device.name);
            }
        }
    }
    Ok(())
}

async fn cmd_monitor(
    transport: AnyTransport,
    demo: Option<MockTransportHandle>,
    config: ReaderConfig,
    device_id: Option<String>,
    format: OutputFormat,
) -> Result<()> {
    let manager = ConnectionManager::new(transport, config)?;
    let mut events = manager.subscribe();

    let device_id = match device_id {
        Some(id) => id,
        None => {
            let devices = manager.connected_devices().await?;
            let Some(first) = devices.first() else {
                bail!("no supported readers attached");
            };
            first.id.clone()
        }
    };

    if !manager.connect(&device_id).await {
        bail!("failed to connect to {device_id}");
    }

    if let Some(handle) = demo {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(3)).await;
                handle.push_swipe(DEMO_SWIPE);
            }
        });
    }

    if matches!(format, OutputFormat::Text) {
        println!("Monitoring {device_id}; press Ctrl-C to stop.");
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(event) => print_event(&event, format)?,
                Err(RecvError::Lagged(dropped)) => {
                    warn!(dropped, "event stream lagged");
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    manager.disconnect().await;
    Ok(())
}

fn print_event(event: &ReaderEvent, format: OutputFormat) -> Result<()> {
    if matches!(format, OutputFormat::Json) {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }

    match event {
        ReaderEvent::DeviceConnected(device) => {
            println!("Connected: {} ({})", device.name, device.id);
        }
        ReaderEvent::CardSwipe(record) => {
            let pan = record
                .masked_account_number()
                .unwrap_or_else(|| "<no account>".to_string());
            let brand = record
                .card_brand()
                .map(|brand| brand.to_string())
                .unwrap_or_else(|| "Unknown".to_string());
            let name = record.cardholder_name().unwrap_or("<no name>");
            let valid = if record.is_valid_payment_card() {
                "valid"
            } else {
                "invalid"
            };
            println!("Swipe: {pan}  {brand}  {name}  [{valid}]");
        }
        ReaderEvent::Error { kind, message } => {
            println!("Error [{kind}]: {message}");
        }
    }
    Ok(())
}
