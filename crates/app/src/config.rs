//! Configuration for the dlink-sim application.
//!
//! Handles parsing command-line arguments and turning them into a validated
//! session configuration. Every setting has a default, so the tool runs with
//! zero arguments; the seed is time-based unless given and is always printed
//! so a run can be repeated exactly.

use clap::{Parser, ValueEnum};
use dlink_sim_core::access::AccessConfig;
use dlink_sim_core::error::ConfigError;
use dlink_sim_core::framing::FrameFormat;
use dlink_sim_core::injector::InjectorConfig;
use dlink_sim_core::session::SessionConfig;
use dlink_sim_core::transport::{LineSettings, Parity, MAX_VIRTUAL_PAIRS};

/// Where port pairs come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// In-memory null-modem pairs (COM1 <-> COM2, ...)
    Virtual,
    /// The host's serial devices
    Serial,
}

/// Command-line arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dlink-sim",
    version,
    about = "Byte-stuffed serial link simulator with CSMA/CD contention and error injection"
)]
pub struct Args {
    /// Port backend
    #[arg(long, value_enum, default_value_t = Backend::Virtual)]
    pub backend: Backend,

    /// Number of virtual null-modem port pairs to create
    #[arg(long, default_value_t = 2)]
    pub pairs: usize,

    /// Port pair used by channel pair 1 (1-based)
    #[arg(long, default_value_t = 1)]
    pub first: usize,

    /// Port pair used by channel pair 2 (1-based, must differ from --first)
    #[arg(long, default_value_t = 2)]
    pub second: usize,

    /// Baud rate for every port
    #[arg(long, default_value_t = 9600)]
    pub baud: u32,

    /// Parity: None, Even or Odd
    #[arg(long, default_value = "None")]
    pub parity: String,

    /// Data field length N in bytes (1-16)
    #[arg(long, default_value_t = 1)]
    pub data_len: usize,

    /// Probability that carrier sense finds the channel busy
    #[arg(long, default_value_t = 0.3)]
    pub busy_prob: f64,

    /// Probability that a transmission collides
    #[arg(long, default_value_t = 0.3)]
    pub collision_prob: f64,

    /// Probability that a received frame gets one bit flipped
    #[arg(long, default_value_t = 0.3)]
    pub error_prob: f64,

    /// Maximum carrier-sense attempts before a send is abandoned
    #[arg(long, default_value_t = 1000)]
    pub max_sense: u32,

    /// Random seed for determinism (default: time-based)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Send N generated lines instead of reading the console
    #[arg(long, value_name = "N")]
    pub demo: Option<usize>,

    /// Print resolved configuration
    #[arg(long)]
    pub print_config: bool,

    /// Don't print metrics summary
    #[arg(long)]
    pub no_metrics: bool,

    /// Log protocol events at debug level
    #[arg(short, long)]
    pub verbose: bool,
}

/// Complete configuration for a run.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port backend
    pub backend: Backend,

    /// Virtual port pairs to create
    pub port_pairs: usize,

    /// 1-based pair choices for channel pairs 1 and 2
    pub first: usize,
    pub second: usize,

    /// Session settings
    pub session: SessionConfig,

    /// Generated line count, if running a demo
    pub demo_lines: Option<usize>,

    // === Behavior ===
    pub print_config: bool,
    pub print_metrics: bool,
}

impl Config {
    /// Resolve and validate parsed arguments.
    ///
    /// # Errors
    /// Any `ConfigError` from invalid line, frame or probability settings.
    pub fn from_args(args: Args) -> Result<Self, ConfigError> {
        if args.pairs == 0 || args.pairs > MAX_VIRTUAL_PAIRS {
            return Err(ConfigError::InvalidPairCount(args.pairs));
        }

        let parity: Parity = args.parity.parse()?;
        let line = LineSettings::new(args.baud, parity)?;
        let format = FrameFormat::new(args.data_len)?;

        let seed = args.seed.unwrap_or_else(|| {
            use std::time::{SystemTime, UNIX_EPOCH};
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0)
        });

        let session = SessionConfig {
            format,
            line,
            access: AccessConfig {
                busy_probability: args.busy_prob,
                collision_probability: args.collision_prob,
                max_sense_attempts: args.max_sense,
                ..AccessConfig::default()
            },
            injector: InjectorConfig {
                corruption_probability: args.error_prob,
            },
            ..SessionConfig::ideal(seed)
        };
        session.validate()?;

        Ok(Self {
            backend: args.backend,
            port_pairs: args.pairs,
            first: args.first,
            second: args.second,
            session,
            demo_lines: args.demo,
            print_config: args.print_config,
            print_metrics: !args.no_metrics,
        })
    }

    /// Print the configuration in human-readable form.
    pub fn print(&self) {
        let s = &self.session;

        println!("=== Configuration ===");
        println!("Backend: {:?}", self.backend);
        if self.backend == Backend::Virtual {
            println!("Virtual port pairs: {}", self.port_pairs);
        }
        println!("Selected pairs: {} and {}", self.first, self.second);
        println!("Baud rate: {}", s.line.baud);
        println!("Parity: {}", s.line.parity);
        println!();
        println!("=== Framing ===");
        println!("Data length: {} bytes", s.format.data_len);
        println!("Flag: {}", String::from_utf8_lossy(&s.format.flag));
        println!();
        println!("=== Channel Access ===");
        println!("Seed: {}", s.seed);
        println!("Busy probability: {:.2}", s.access.busy_probability);
        println!("Collision probability: {:.2}", s.access.collision_probability);
        println!("Jam hold: {} ms", s.access.jam_ms);
        println!("Back-off: up to {} ms", s.access.backoff_max_ms);
        println!("Max sense attempts: {}", s.access.max_sense_attempts);
        println!();
        println!("=== Error Injection ===");
        println!("Corruption probability: {:.2}", s.injector.corruption_probability);
        println!();
    }
}
