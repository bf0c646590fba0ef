//! seat-link - serial console for the seat controller ECU
//!
//! Usage:
//!   seat-link ports                         List serial ports
//!   seat-link --port COM3                   Monitor traffic until Ctrl-C
//!   seat-link --port COM3 read-byte 0x10    Send one command, print replies
//!   seat-link --port COM3 --json monitor    Events as JSON lines

mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use seat_link::codec::hex_dump;
use seat_link::events::Event;
use seat_link::protocol::SeatPosition;
use seat_link::session::StatsSnapshot;
use seat_link::transport::serial::describe_port;
use seat_link::transport::SerialConnector;
use seat_link::{config, logging, Session};
use std::time::Duration;

/// How long a one-shot command waits for replies when `--wait` is not given
const DEFAULT_REPLY_WAIT_MS: u64 = 1000;

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    if cli.command == Some(Command::Ports) {
        list_ports();
        return Ok(());
    }

    let mut config = config::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    cli.apply(&mut config);
    config.validate()?;

    if config.link.port.is_empty() {
        bail!("No serial port given (use --port or set [link] port in the config)");
    }

    // Create tokio runtime
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(cli, config))
}

fn list_ports() {
    let ports = SerialConnector::available_ports();
    if ports.is_empty() {
        println!("No serial ports found");
    }
    for port in &ports {
        println!("{}", describe_port(port));
    }
}

async fn run(cli: Cli, config: seat_link::Config) -> Result<()> {
    let (session, mut events) = Session::new(config);
    session.connect()?;

    let command = cli.command.clone().unwrap_or(Command::Monitor);
    let limit = match (cli.wait, &command) {
        (Some(ms), _) => Some(Duration::from_millis(ms)),
        (None, Command::Monitor) => None,
        (None, _) => Some(Duration::from_millis(DEFAULT_REPLY_WAIT_MS)),
    };

    if let Err(e) = send(&session, &command) {
        tokio::task::block_in_place(|| session.disconnect());
        return Err(e);
    }

    let timeout = wait_limit(limit);
    tokio::pin!(timeout);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => print_event(&event, &cli)?,
                None => break,
            },
            _ = &mut ctrl_c => break,
            _ = &mut timeout => break,
        }
    }

    tokio::task::block_in_place(|| session.disconnect());
    while let Ok(event) = events.try_recv() {
        print_event(&event, &cli)?;
    }

    print_summary(&session.snapshot(), session.events_dropped(), cli.json)?;
    Ok(())
}

async fn wait_limit(limit: Option<Duration>) {
    match limit {
        Some(limit) => tokio::time::sleep(limit).await,
        None => std::future::pending().await,
    }
}

/// Send the one-shot command, if any
fn send(session: &Session, command: &Command) -> Result<()> {
    match command {
        Command::Ports | Command::Monitor => {}
        Command::Alive { timestamp, counter } => {
            let timestamp =
                timestamp.unwrap_or_else(|| chrono::Utc::now().timestamp_millis().max(0) as u64);
            session.send_alive(timestamp, *counter)?;
        }
        Command::Gearbox {
            gear,
            current_torque,
            max_torque,
        } => session.send_gearbox_status(*gear, *current_torque, *max_torque)?,
        Command::Seat {
            height,
            slide,
            incline,
        } => session.send_seat_control_request(*height, *slide, *incline)?,
        Command::Target { axis, value } => session.send_seat_target(*axis, *value)?,
        Command::Current {
            height,
            slide,
            incline,
        } => session.send_seat_current_position(*height, *slide, *incline)?,
        Command::Fault { number } => session.send_fault(*number)?,
        Command::ReadByte { address } => session.read_byte(*address)?,
        Command::WriteByte { address, value } => session.write_byte(*address, *value)?,
        Command::ReadAll { size } => session.read_all(*size)?,
        Command::WriteAll { hex } => {
            let data = hex::decode(hex.concat()).context("Invalid hex data")?;
            session.write_all(&data)?;
        }
        Command::SaveProfile {
            id,
            address,
            height,
            slide,
            incline,
        } => {
            let position = match (height, slide, incline) {
                (Some(h), Some(s), Some(i)) => Some(SeatPosition::new(*h, *s, *i)),
                (None, None, None) => None,
                _ => bail!("Give all of --height, --slide and --incline, or none"),
            };
            match (address, position) {
                (Some(address), Some(position)) => session.save_profile_at(*address, position)?,
                (Some(_), None) => bail!("Saving by address needs --height, --slide and --incline"),
                (None, position) => session.save_profile(*id, position)?,
            }
        }
        Command::LoadProfile { id, address } => match (address, id) {
            (Some(address), _) => session.load_profile_at(*address)?,
            (None, Some(id)) => session.load_profile(*id)?,
            (None, None) => bail!("Give a profile id or --address"),
        },
        Command::Raw { hex } => session.send_hex(&hex.join(" "))?,
        Command::Line { text } => session.send_line(text)?,
    }
    Ok(())
}

fn print_event(event: &Event, cli: &Cli) -> Result<()> {
    if cli.json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }

    match event {
        Event::Trace(trace) => println!("{}", trace),
        Event::Frame { raw } if cli.verbose => println!("  frame: {}", hex_dump(raw)),
        Event::ConnectionStatus { connected, port } => {
            let status = if *connected { "connected" } else { "disconnected" };
            println!("--- {} {} ---", port, status);
        }
        // Decoded messages are already printed as trace lines
        Event::Frame { .. } | Event::Message(_) => {}
    }
    Ok(())
}

fn print_summary(stats: &StatsSnapshot, dropped: u64, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(stats)?);
        return Ok(());
    }
    eprintln!(
        "TX {} msgs / {} bytes, RX {} msgs / {} bytes, {} errors",
        stats.messages_sent,
        stats.bytes_sent,
        stats.messages_received,
        stats.bytes_received,
        stats.errors
    );
    if dropped > 0 {
        eprintln!("{} events dropped (consumer too slow)", dropped);
    }
    Ok(())
}
