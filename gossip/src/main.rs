//! `talk`: line-based chat over UDP.
//!
//! Listens on `--port`, sends every stdin line to `addr` and prints whatever
//! arrives, prefixed with `>`.  Set `RUST_LOG` to see pipeline traffic.

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use gossip::config::DEFAULT_ERROR_CAPACITY;
use gossip::{resolve, Conn, ConnConfig, ConnError, Packet};

/// Simple chat over UDP.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Listening port.
    #[arg(short, long, default_value_t = 9999)]
    port: u16,

    /// Runtime errors buffered before the pipeline stalls.
    #[arg(long, default_value_t = DEFAULT_ERROR_CAPACITY)]
    error_capacity: usize,

    /// Conversation partner (host:port).
    addr: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    env_logger::init();

    let cli = Cli::parse();

    let conn = Conn::with_config(ConnConfig::default().with_error_capacity(cli.error_capacity));
    if let Some(mut errors) = conn.errors() {
        tokio::spawn(async move {
            while let Some(e) = errors.recv().await {
                eprintln!("{e}");
            }
        });
    }

    conn.add_handler(|_conn: Conn, packet: Arc<Packet>| async move {
        let mut out = std::io::stdout().lock();
        let _ = write!(out, ">{}", String::from_utf8_lossy(&packet.msg));
        let _ = out.flush();
    });

    if let Err(e) = conn.listen(cli.port).await {
        eprintln!("Cannot listen on port {} because {e}", cli.port);
        return Ok(ExitCode::from(3));
    }

    let dest = match resolve(&cli.addr).await {
        Ok(dest) => dest,
        Err(e) => {
            eprintln!("Cannot resolve {:?} because {e}", cli.addr);
            conn.disconnect().await;
            return Ok(ExitCode::from(3));
        }
    };
    log::info!("talking to {dest}");

    // Loop until EOF.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let mut msg = line.into_bytes();
        msg.push(b'\n');
        match conn.send_to(msg, dest).await {
            Ok(()) => {}
            Err(ConnError::Closed) => {
                eprintln!("connection closed");
                break;
            }
            Err(e) => eprintln!("{e}"),
        }
    }

    conn.disconnect().await;
    Ok(ExitCode::SUCCESS)
}
