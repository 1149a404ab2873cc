use std::{
    fs,
    io::{Write, stdout},
    path::PathBuf,
    time::Duration,
};

use clap::{ArgAction, Parser};
use clap_num::maybe_hex;
use colored::Colorize;
use serdow_parser::{Elf, parse_elf};
use serdow_port::Port;
use serdow_protocol::{Config, Loader, MAX_PACKET_LEN, MAX_SEND_TRIES, Relay, Segment, Transmitter};
use tracing::debug;

use crate::{console::Console, err::Error};

mod console;
mod err;
mod logging;

type Result<T> = core::result::Result<T, Error>;

#[derive(Parser)]
#[command(version, about = "Load an ELF executable into a target over a serial line")]
struct Cli {
    /// ELF executable to load
    elf: PathBuf,

    /// Serial device the target is attached to
    tty: String,

    /// Baud rate
    #[arg(short, long, default_value_t = 115200)]
    baud: u32,

    /// Read timeout in milliseconds
    #[arg(short, long, default_value_t = 100)]
    timeout_ms: u64,

    /// Largest payload of a single packet
    #[arg(long, default_value_t = MAX_PACKET_LEN, value_parser=maybe_hex::<usize>)]
    max_packet_len: usize,

    /// Attempts per packet before giving up
    #[arg(long, default_value_t = MAX_SEND_TRIES)]
    max_send_tries: usize,

    /// Frame start marker
    #[arg(long, default_value = "0x55AA55AA", value_parser=maybe_hex::<u32>)]
    magic: u32,

    /// Exit once the entry point is acknowledged instead of relaying target output
    #[arg(long)]
    no_relay: bool,

    /// More diagnostics on stderr, repeat for more
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn open_port(cli: &Cli) -> Result<Port> {
    log!("Opening {} at {} baud...", cli.tty, cli.baud);
    let port = status!(
        serialport::new(&cli.tty, cli.baud)
            .timeout(Duration::from_millis(cli.timeout_ms))
            .open()
    )?;
    Ok(port)
}

fn segments<'a>(elf: &'a Elf<'_>) -> Vec<Segment<'a>> {
    elf.segments()
        .iter()
        .map(|s| {
            debug!("{s}");
            Segment::new(
                s.kind_name(),
                s.physical_address(),
                s.file_size(),
                s.memory_size(),
                s.data(),
            )
        })
        .collect()
}

/// Push the image to the target and hand the port back once the entry point is acknowledged.
fn download(cli: &Cli, config: Config) -> Result<Port> {
    let image = fs::read(&cli.elf)?;
    let elf = parse_elf(&image)?;
    println!("{elf}");

    let port = open_port(cli)?;
    let mut loader = Loader::new(Transmitter::new(port, config), Console::new(stdout()));
    loader.load(&segments(&elf), elf.entry())?;

    let (transmitter, _) = loader.into_parts();
    Ok(transmitter.into_inner())
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::new(cli.magic, cli.max_packet_len, cli.max_send_tries);
    config.validate()?;

    let port = download(&cli, config)?;
    if cli.no_relay {
        return Ok(());
    }

    Relay::new(port, stdout()).spawn()?.join()?;
    Ok(())
}

fn main() -> core::result::Result<(), String> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    run(cli).map_err(|e| e.to_string())
}
