//! Attempt one TRTP handshake with a Hotline server and report the verdict.
//!
//! With no arguments this checks a local server on 127.0.0.1:5500. Exits 0 when the server
//! accepts the handshake and 1 otherwise.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::bail;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use trtp_handshake::protocol::{
    describe_error_code, display_protocol_id, HandshakeRequest, DEFAULT_PORT, VERSION,
};
use trtp_handshake::{Client, ClientConfig, TransportError, Verdict, DEFAULT_TARGET};

#[derive(Parser, Debug)]
#[command(name = "check_connection", version)]
#[command(about = "Check that a Hotline server accepts the TRTP handshake", long_about = None)]
struct Cli {
    /// Server address <HOST>:<PORT>
    #[arg(default_value = DEFAULT_TARGET)]
    target: String,

    /// Seconds to wait for the connection and for each read or write
    #[arg(short, long, default_value_t = 5)]
    timeout: u64,

    /// Sub-protocol id sent in the handshake
    #[arg(long, default_value_t = 0)]
    sub_protocol: u32,

    /// Protocol version sent in the handshake
    #[arg(long, default_value_t = VERSION)]
    protocol_version: u16,

    /// Sub-version sent in the handshake
    #[arg(long, default_value_t = 0)]
    sub_version: u16,

    /// Enable debug output, including raw wire bytes
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    if cli.timeout == 0 {
        bail!("timeout must be at least one second");
    }

    let client = Client::new(ClientConfig {
        target: cli.target,
        timeout: Duration::from_secs(cli.timeout),
        request: HandshakeRequest::new(cli.sub_protocol, cli.protocol_version, cli.sub_version),
    });
    let verdict = client.attempt().await;
    report(client.config(), &verdict);
    Ok(ExitCode::from(verdict.exit_code()))
}

fn report(config: &ClientConfig, verdict: &Verdict) {
    match verdict {
        Verdict::Success { protocol_id } => {
            print_reply(protocol_id, 0);
            println!("\n✓ SUCCESS! Server is working correctly!");
            let (host, port) = match config.target.rsplit_once(':') {
                Some((host, port)) => (host.to_string(), port.to_string()),
                None => (config.target.clone(), DEFAULT_PORT.to_string()),
            };
            println!("\nYou can now connect with your Hotline client:");
            println!("  Server: {host}");
            println!("  Port: {port}");
            println!("  Login: Guest (no credentials needed)");
        }
        Verdict::ProtocolError { code, protocol_id } => {
            print_reply(protocol_id, *code);
            match describe_error_code(*code) {
                Some(meaning) => {
                    println!("\n✗ Handshake failed with error code: {code} ({meaning})")
                }
                None => println!("\n✗ Handshake failed with error code: {code}"),
            }
        }
        Verdict::TransportError(err) => match err {
            TransportError::Refused => not_running("Connection refused", &config.target),
            TransportError::Timeout => not_running("Connection timeout", &config.target),
            TransportError::ShortReply { got } => println!("\n✗ Expected 8 bytes, got {got}"),
            TransportError::Io(e) => println!("\n✗ Error: {e}"),
        },
    }
}

fn not_running(what: &str, target: &str) {
    println!("\n✗ {what} - is the server running on {target}?");
    println!("  Start the server and try again.");
}

fn print_reply(protocol_id: &[u8; 4], error_code: u32) {
    println!("✓ Received handshake reply!");
    println!("  Protocol: {}", display_protocol_id(protocol_id));
    println!("  Error code: {error_code}");
}
