//! Audio Streamer
//!
//! Runs as a player listening for a recorder, or as a recorder sending to a
//! player, until `q` is entered.

use anyhow::{anyhow, Context, Result};
use std::io::{BufRead, Write};
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use audio_streamer::{
    audio::{list_devices, CpalBackend},
    cli::{self, Command, Listen, Mode, Options, Target, USAGE},
    config::AppConfig,
    network::{
        serial::{system_link, SerialLink},
        Inbound, Outbound, UdpReceiver, UdpSender, WirelessReceiver, WirelessSender,
    },
    pipeline::{Player, Recorder},
};

/// A running pipeline, torn down on drop
enum Session {
    Player(Player<Inbound>),
    Recorder(Recorder<Outbound>),
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let command = match cli::parse(std::env::args().skip(1)) {
        Ok(command) => command,
        Err(e) => {
            println!("{}\n\n{}", e, USAGE);
            return ExitCode::from(1);
        }
    };

    let result = match command {
        Command::Help => {
            println!("{}", USAGE);
            return ExitCode::from(1);
        }
        Command::ListDevices { config_path } => load_config(config_path.as_deref()).map(|_| print_devices()),
        Command::Run(options) => run(options),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            println!("{:#}", e);
            ExitCode::from(1)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = AppConfig::load(path).context("Failed to load configuration")?;
    Ok(config)
}

fn run(options: Options) -> Result<()> {
    let config = load_config(options.config_path.as_deref())?;
    let backend = CpalBackend::new();

    let session = match options.mode {
        Mode::Player(listen) => {
            let inbound: Inbound = match listen {
                Listen::Datagram { port } => UdpReceiver::with_config(u32::from(port.get()), &config.datagram)?.into(),
                Listen::Wireless { channel } => {
                    WirelessReceiver::new(radio()?, u32::from(channel.get()), &config.wireless)?.into()
                }
            };
            tracing::info!("Starting as player");
            Session::Player(Player::start(&backend, &config.audio, inbound).context("Failed to start player")?)
        }
        Mode::Recorder(target) => {
            let outbound: Outbound = match target {
                Target::Datagram { ip, port } => UdpSender::with_config(&ip.to_string(), u32::from(port.get()), &config.datagram)?.into(),
                Target::Wireless { address, channel } => {
                    let channel = channel.map_or(u32::from(config.wireless.default_channel), |c| u32::from(c.get()));
                    let sender = WirelessSender::connect(radio()?, &address.to_string(), channel, &config.wireless)?;
                    sender.wait_connected(config.wireless.connect_timeout())?;
                    sender.into()
                }
            };
            tracing::info!("Starting as recorder");
            Session::Recorder(Recorder::start(&backend, &config.audio, outbound).context("Failed to start recorder")?)
        }
    };

    wait_for_quit()?;

    match &session {
        Session::Player(player) => tracing::info!("Final player stats: {:?}", player.stats()),
        Session::Recorder(recorder) => tracing::info!("Final recorder stats: {:?}", recorder.stats()),
    }
    drop(session);
    Ok(())
}

fn radio() -> Result<Arc<dyn SerialLink>> {
    system_link().ok_or_else(|| anyhow!("This build has no wireless serial support (enable the `bluetooth` feature)"))
}

/// Block until the user enters `q`, or input ends
fn wait_for_quit() -> Result<()> {
    let stdin = std::io::stdin();
    let mut input = String::new();

    loop {
        print!("Enter q to quit\t");
        std::io::stdout().flush()?;

        input.clear();
        if stdin.lock().read_line(&mut input)? == 0 {
            return Ok(());
        }

        let line = input.trim();
        if line == "q" || line == "Q" {
            return Ok(());
        }
    }
}

fn print_devices() {
    println!("\n=== Available Audio Devices ===");
    for device in list_devices() {
        let device_type = match (device.is_input, device.is_output) {
            (true, true) => "Input/Output",
            (true, false) => "Input",
            (false, true) => "Output",
            _ => "Unknown",
        };
        let default_marker = if device.is_default { " [DEFAULT]" } else { "" };
        println!("  {} ({}){}:", device.name, device_type, default_marker);
        println!("    Sample rates: {:?}", device.sample_rates);
        println!("    Channels: {:?}", device.channels);
    }
    println!();
}
