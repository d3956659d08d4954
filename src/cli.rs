//! Command line interface for the `stillframe` binary.
//!
//! Kept free of library types so `build.rs` can include it to render the
//! man page.

use std::{net::SocketAddr, path::PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};

/// Command line arguments for the `stillframe` binary.
#[derive(Debug, Parser)]
#[command(
    name = "stillframe",
    version,
    about = "Send still images as frames and reassemble them on the far end"
)]
pub struct Cli {
    /// Serve Prometheus metrics on this address.
    #[arg(long, global = true, value_name = "ADDR")]
    pub metrics: Option<SocketAddr>,

    #[command(subcommand)]
    pub command: Command,
}

/// What the binary should do.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Accept transmitters and write reassembled images to disk.
    Receive(ReceiveArgs),
    /// Transmit images to a receiver.
    Send(SendArgs),
}

/// Options for `stillframe receive`.
#[derive(Debug, Args)]
pub struct ReceiveArgs {
    /// Address to listen on.
    #[arg(short, long, default_value = "0.0.0.0:49697")]
    pub listen: SocketAddr,
    /// Directory receiving `<transmitter>/images/<name>` files.
    #[arg(short, long, default_value = "received")]
    pub out: PathBuf,
    /// Seconds allowed for a connection to send its handshake.
    #[arg(long, default_value_t = 5)]
    pub handshake_timeout_secs: u64,
    /// Seconds without a frame before a session is finalized.
    #[arg(long, default_value_t = 60)]
    pub inactivity_timeout_secs: u64,
    /// Byte written into frames that never arrived.
    #[arg(long, default_value_t = 0)]
    pub placeholder: u8,
}

/// When the sender transmits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// One image per line read from standard input.
    Manual,
    /// One image every `--interval-ms`.
    Timed,
    /// Back to back until interrupted.
    Continuous,
}

/// Options for `stillframe send`.
#[derive(Debug, Args)]
#[command(group = clap::ArgGroup::new("source").required(true).args(["file", "dir"]))]
pub struct SendArgs {
    /// Receiver address.
    #[arg(short, long, default_value = "127.0.0.1:49697")]
    pub to: SocketAddr,
    /// Transmitter identifier announced in every handshake.
    #[arg(long)]
    pub id: String,
    /// File re-read on every send.
    #[arg(long)]
    pub file: Option<PathBuf>,
    /// Directory whose files are each sent once, in name order.
    #[arg(long)]
    pub dir: Option<PathBuf>,
    /// Trigger mode.
    #[arg(short, long, value_enum, default_value_t = Mode::Manual)]
    pub mode: Mode,
    /// Milliseconds between sends in timed mode.
    #[arg(long, default_value_t = 5000)]
    pub interval_ms: u64,
    /// Payload bytes per frame.
    #[arg(long, default_value_t = 90)]
    pub chunk_size: u16,
    /// Maximum frames written per second.
    #[arg(long)]
    pub fps: Option<u32>,
    /// Seconds of timed sending before each sleep.
    #[arg(long, requires = "sleep_secs")]
    pub active_secs: Option<u64>,
    /// Seconds to sleep between timed phases.
    #[arg(long, requires = "active_secs")]
    pub sleep_secs: Option<u64>,
    /// Give up after this many failed sends in a row.
    #[arg(long)]
    pub max_failures: Option<u32>,
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Cli, Command, Mode};

    #[test]
    fn receive_defaults_to_well_known_port() {
        let cli = Cli::parse_from(["stillframe", "receive"]);
        let Command::Receive(args) = cli.command else {
            panic!("expected receive");
        };
        assert_eq!(args.listen.port(), 49697);
        assert_eq!(args.inactivity_timeout_secs, 60);
    }

    #[test]
    fn send_requires_a_source() {
        assert!(Cli::try_parse_from(["stillframe", "send", "--id", "TX1"]).is_err());
    }

    #[test]
    fn send_parses_timed_mode() {
        let cli = Cli::parse_from([
            "stillframe",
            "send",
            "--id",
            "TX1",
            "--dir",
            "shots",
            "--mode",
            "timed",
            "--active-secs",
            "60",
            "--sleep-secs",
            "900",
        ]);
        let Command::Send(args) = cli.command else {
            panic!("expected send");
        };
        assert_eq!(args.mode, Mode::Timed);
        assert_eq!(args.sleep_secs, Some(900));
        assert_eq!(args.chunk_size, 90);
    }
}
