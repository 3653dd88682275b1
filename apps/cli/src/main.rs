use std::net::UdpSocket;

use clap::Parser;
use downlink_core::{DecoderConfig, FileDecoder};
use tracing::{debug, info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "File downlink decoder (UDP ingest)", long_about = None)]
struct Args {
    /// UDP port to listen on for downlink packets
    #[arg(long, default_value_t = 50000)]
    port: u16,

    /// Address to bind the listening socket to
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Seconds without a packet before the active transfer is reset
    #[arg(long)]
    timeout: Option<f64>,

    /// Path to a TOML config file
    #[arg(long)]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(if args.verbose {
                    tracing::Level::DEBUG.into()
                } else {
                    tracing::Level::INFO.into()
                })
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let mut config = match &args.config {
        Some(path) => DecoderConfig::load_from_file(path)?,
        None => DecoderConfig::default(),
    };
    if let Some(timeout) = args.timeout {
        config.timeout_secs = timeout;
    }

    info!(
        downlink_dir = %config.downlink_dir.display(),
        timeout_secs = config.timeout_secs,
        "Starting file downlink decoder"
    );

    let decoder = FileDecoder::new(config);
    let socket = UdpSocket::bind((args.bind.as_str(), args.port))?;
    info!(addr = %socket.local_addr()?, "Listening for downlink packets");

    let mut buf = vec![0u8; 65536];
    loop {
        let (len, peer) = socket.recv_from(&mut buf)?;
        match decoder.process(&buf[..len]) {
            Ok(Some(_)) => {} // the observer already logged it
            Ok(None) => debug!(%peer, len, "Packet dropped (out of state)"),
            Err(err) => warn!(%peer, len, error = %err, "Undecodable packet"),
        }
    }
}
