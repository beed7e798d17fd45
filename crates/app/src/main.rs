//! dlink-sim: interactive two-pair serial link simulator
//!
//! Every console line is framed, byte-stuffed and sent over two port pairs
//! (in-memory null modems or real serial devices) through a simulated
//! CSMA/CD medium. The receive side reassembles, destuffs and possibly
//! corrupts each frame, and one status block per pair is printed after
//! every send.

mod config;
mod script;

use clap::Parser;
use config::{Args, Backend, Config};
use dlink_sim_core::serial::SerialPorts;
use dlink_sim_core::session::{CycleReport, ReceivedFrame, Session};
use dlink_sim_core::transport::{available_pairs, select_pairs, NullModem, PortOpener};
use std::io::{self, BufRead};

fn main() {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> dlink_sim_core::Result<()> {
    let config = Config::from_args(args)?;

    let opener: Box<dyn PortOpener> = match config.backend {
        Backend::Virtual => Box::new(NullModem::new(config.port_pairs)),
        Backend::Serial => Box::new(SerialPorts::new()),
    };
    let discovered = available_pairs(&opener.port_names());
    let selected = select_pairs(&discovered, config.first, config.second)?;

    println!("dlink-sim");
    println!("=========");
    println!("Seed: {}", config.session.seed);
    if config.print_config {
        config.print();
    }
    for (i, pair) in selected.iter().enumerate() {
        println!("Pair {}: {}", i + 1, pair);
    }

    let session = Session::start(opener.as_ref(), selected, config.session)?;

    let lines: Box<dyn Iterator<Item = String>> = match config.demo_lines {
        Some(count) => {
            let suffix = config.session.format.flag_suffix();
            let lines = script::generate_demo_lines(config.session.seed, count, suffix);
            Box::new(lines.into_iter())
        }
        None => {
            println!("Type a line to send it, `exit` to quit.");
            Box::new(io::stdin().lock().lines().map_while(|line| line.ok()))
        }
    };

    let echo = config.demo_lines.is_some();
    let metrics = session.run(lines, |report| print_report(report, echo));

    if config.print_metrics {
        metrics.print_summary();
    }

    Ok(())
}

/// Print the status block for one pair and one input line.
fn print_report(report: &CycleReport, echo: bool) {
    if echo && report.pair == 1 {
        println!("\n> {}", report.sent.data_text());
    }

    println!(
        "\n[pair {}] {} | baud {} | bytes sent {}",
        report.pair, report.ports, report.baud, report.bytes_sent_total
    );

    if let Some(error) = &report.error {
        println!("  send abandoned: {}", error);
        return;
    }

    println!("  collision: {}", yes_no(report.collision()));
    println!("  stuffed:   {}", hex(&report.wire));

    if report.received.is_empty() {
        println!("  received:  nothing");
    }
    for received in &report.received {
        print_received(received);
    }
}

fn print_received(received: &ReceivedFrame) {
    let frame = &received.frame;

    println!("  on wire:   {}", hex(&received.stuffed));
    println!("  destuffed: {}", hex(&received.destuffed));
    println!(
        "  fields:    flag={} src={:02x} dst={:02x} data=[{}] fcs={:02x}",
        String::from_utf8_lossy(&frame.flag),
        frame.source,
        frame.destination,
        hex(&frame.data),
        received.received_fcs
    );

    match received.injection.flip {
        Some(flip) => {
            println!(
                "  corrupted: yes (byte {} bit {}), fcs {:02x} -> {:02x}, detected: {}",
                flip.byte_index,
                flip.bit,
                received.injection.original_fcs,
                received.injection.current_fcs,
                yes_no(received.injection.detected())
            );
        }
        None => println!("  corrupted: no"),
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
