//! chwire-inspect - encode and decode native protocol query packets
//!
//! ```text
//! chwire-inspect --config client.conf encode --id q1 --body "SELECT 1" --framed -o q1.bin
//! chwire-inspect decode q1.bin --framed
//! ```

use anyhow::{bail, Context};
use chwire_config::ClientConfig;
use chwire_core::Revision;
use chwire_protocol::{framing, ClientCode, Feature, Query, Reader, Writer};
use clap::{Parser, Subcommand};
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Client config file (key = value)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the protocol revision from the config
    #[arg(short, long)]
    revision: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Encode a query packet
    Encode {
        #[arg(long, default_value = "")]
        id: String,
        #[arg(long)]
        body: String,
        /// Wrap the packet in checksummed compressed blocks
        #[arg(long)]
        framed: bool,
        /// Output file; hex dump to stdout when absent
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Decode a query packet
    Decode {
        input: PathBuf,
        /// Input is wrapped in compressed blocks
        #[arg(long)]
        framed: bool,
    },
    /// List protocol features and whether the revision enables them
    Features,
}

fn hex_dump(out: &mut impl Write, data: &[u8]) -> io::Result<()> {
    for (i, line) in data.chunks(16).enumerate() {
        write!(out, "{:08x} ", i * 16)?;
        for b in line {
            write!(out, " {b:02x}")?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ClientConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ClientConfig::default(),
    };
    if let Some(revision) = cli.revision {
        config.revision = Revision(revision);
    }
    config.display();

    match cli.command {
        Command::Encode { id, body, framed, output } => {
            let packet = config.query(id, body).to_bytes(config.revision);
            let bytes = if framed {
                Writer::new(config.compression).compress(&packet)?
            } else {
                packet
            };
            info!(bytes = bytes.len(), framed, "encoded query");

            match output {
                Some(path) => {
                    fs::write(&path, &bytes).with_context(|| format!("writing {}", path.display()))?
                }
                None => hex_dump(&mut io::stdout().lock(), &bytes)?,
            }
        }
        Command::Decode { input, framed } => {
            let raw = fs::read(&input).with_context(|| format!("reading {}", input.display()))?;
            let packet = if framed { framing::decompress(&raw)? } else { raw };
            debug!(bytes = packet.len(), "decoding packet");

            let mut r = Reader::new(&packet[..]);
            let code = ClientCode::decode(&mut r)?;
            if code != ClientCode::Query {
                bail!("expected a query packet, got {code:?}");
            }
            let query: Query = r.get_aware(config.revision)?;
            if r.remaining() != 0 {
                info!(trailing = r.remaining(), "bytes left after query");
            }
            println!("{query:#?}");
        }
        Command::Features => {
            for feature in Feature::ALL {
                let state = if feature.active(config.revision) { "on" } else { "off" };
                println!("{:<28} {:>6}  {}", feature.name(), feature.min_revision().get(), state);
            }
        }
    }

    Ok(())
}
