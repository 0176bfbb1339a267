//! checkout_station - Cashier console that checks the bill against the
//! object counter.
//!
//! Connects to the counter's serial device, keeps the latest detected items
//! up to date from a background reader, and accepts operator commands on
//! stdin. Type `help` for the command list.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};

use retail_verify::config::StationConfig;
use retail_verify::station::console::HELP;
use retail_verify::station::{OperatorCommand, SerialLink, SerialReader, Station, StationEvent};
use retail_verify::transport::Command;

#[derive(Parser, Debug)]
#[command(author, version, about = "Verify billed items against the object counter")]
struct Args {
    /// Serial device the counter is attached to.
    #[arg(long)]
    serial_device: Option<PathBuf>,

    /// Baud rate for the serial link.
    #[arg(long)]
    baud_rate: Option<u32>,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = StationConfig::load()?;
    if let Some(device) = args.serial_device {
        cfg.link.device = Some(device);
    }
    if let Some(baud) = args.baud_rate {
        cfg.link.baud_rate = baud;
    }

    let (mut link, read_half) = SerialLink::open(&cfg.link)?;
    let (tx, rx) = mpsc::channel();
    let mut reader = SerialReader::spawn(read_half, tx.clone(), cfg.reader_join_timeout)?;
    link.send_command(&Command::Status)?;

    spawn_operator_input(tx.clone())?;
    ctrlc::set_handler(move || {
        let _ = tx.send(StationEvent::Operator("quit".to_string()));
    })
    .context("error setting Ctrl-C handler")?;

    let mut station = Station::new(cfg.catalog.clone());
    println!("{}", HELP);

    while let Ok(event) = rx.recv() {
        let Some(line) = station.handle(event) else {
            continue;
        };
        match OperatorCommand::parse(&line) {
            Ok(Some(cmd)) => {
                if !dispatch(&mut station, &mut link, cmd)? {
                    break;
                }
            }
            Ok(None) => {}
            Err(err) => println!("{}", err),
        }
    }

    log::info!("shutting down station...");
    reader.stop();
    Ok(())
}

fn spawn_operator_input(tx: Sender<StationEvent>) -> Result<()> {
    std::thread::Builder::new()
        .name("operator-input".to_string())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(StationEvent::Operator(line)).is_err() {
                    return;
                }
            }
            let _ = tx.send(StationEvent::Operator("quit".to_string()));
        })
        .context("failed to spawn operator input thread")?;
    Ok(())
}

/// Run one operator command. Returns `false` when the station should exit.
fn dispatch(station: &mut Station, link: &mut SerialLink, cmd: OperatorCommand) -> Result<bool> {
    match cmd {
        OperatorCommand::Add { name, quantity } => match station.add_billed(&name, quantity) {
            Ok(item) => println!(
                "added {} x {} @ {:.2} = {:.2}",
                item.quantity,
                item.name,
                item.unit_price,
                item.line_total()
            ),
            Err(err) => println!("{}", err),
        },
        OperatorCommand::Clear => {
            station.clear_all();
            println!("cleared");
        }
        OperatorCommand::Items => print_items(station),
        OperatorCommand::Verify => {
            if !station.link_open() {
                println!("warning: counter link is closed, detected items may be stale");
            }
            let mismatches = station.verify();
            if mismatches.is_empty() {
                println!("VERIFICATION SUCCESSFUL: all items match");
            } else {
                println!("VERIFICATION FAILED: the following items do not match:");
                for mismatch in mismatches {
                    println!("  {}", mismatch);
                }
            }
        }
        OperatorCommand::Device(command) => send_or_report(link.send_command(&command)),
        OperatorCommand::Send(raw) => send_or_report(link.send_line(&raw)),
        OperatorCommand::Help => println!("{}", HELP),
        OperatorCommand::Quit => return Ok(false),
    }
    Ok(true)
}

fn send_or_report(result: Result<()>) {
    if let Err(err) = result {
        log::warn!("{:#}", err);
        println!("send failed: {}", err);
    }
}

fn print_items(station: &Station) {
    println!("billed:");
    for item in station.bill().items() {
        println!(
            "  {:<12} {:>8.2} x {:<3} {:>8.2}",
            item.name,
            item.unit_price,
            item.quantity,
            item.line_total()
        );
    }
    println!("  total {:.2}", station.bill().total_price());

    println!("detected:");
    for item in station.detected().items() {
        println!(
            "  {:<12} {:>3} {:>8.2} conf {:.2}",
            item.name, item.count, item.unit_price, item.confidence
        );
    }
    println!("  total {:.2}", station.detected().total_price());
    if let Some(ms) = station.last_latency_ms() {
        println!("last counter latency: {} ms", ms);
    }
}
