//! Command-line interface definition using clap
//!
//! Provides structured argument parsing with automatic help/version generation.

use clap::Parser;
use std::path::PathBuf;

/// Serial-to-OSC bridge for Monome grid controllers (serialosc protocol)
#[derive(Parser, Debug)]
#[command(name = "oc-bridge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the serial device (e.g. /dev/ttyUSB0, COM3)
    pub tty_path: PathBuf,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub debug: bool,

    /// Load configuration overrides from this TOML file instead of the built-in defaults
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,
}
