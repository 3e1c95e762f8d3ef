use clap::Parser;
use rdtp::{bind_udp, receive_bytes, send_bytes, RdtpConfiguration, Received};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;
use tokio::io::{Error, ErrorKind, Result};
use tokio::net::lookup_host;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Download a file from an rdtp_server.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    host: String,
    port: u16,
    /// Name of the file to request; saved locally as DL_<file>
    file: String,
    /// Probability of treating a received datagram as corrupted
    #[arg(long, default_value_t = 0.0)]
    corruption: f64,
    /// Probability of treating a received datagram as lost
    #[arg(long, default_value_t = 0.0)]
    loss: f64,
    /// Window size in bytes; must match the server
    #[arg(long, default_value_t = 8192)]
    window: u32,
    #[arg(long, default_value_t = 50)]
    timeout_ms: u64,
}

impl Args {
    fn configuration(&self) -> RdtpConfiguration {
        RdtpConfiguration {
            corruption_probability: self.corruption,
            loss_probability: self.loss,
            window_size: self.window,
            timeout: Duration::from_millis(self.timeout_ms),
            ..Default::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    download(&args).await.map_err(|err| {
        error!("{}", err);
        err
    })
}

async fn download(args: &Args) -> Result<()> {
    let config = args.configuration();
    let server = lookup_host((args.host.as_str(), args.port))
        .await?
        .next()
        .ok_or_else(|| Error::new(ErrorKind::NotFound, format!("cannot resolve {}", args.host)))?;
    let bind_addr = if server.is_ipv4() {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0))
    } else {
        SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0))
    };
    let socket = bind_udp(bind_addr, &config).await?;

    info!(%server, file = %args.file, "requesting file");
    let report = send_bytes(args.file.as_bytes(), &socket, server, &config).await?;
    if !report.delivered {
        return Err(Error::new(ErrorKind::TimedOut, "destination unreachable"));
    }

    let received = receive_bytes(&socket, &config).await?;
    ensure_complete(&received)?;

    let name = Path::new(&args.file)
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or(&args.file);
    let output = format!("DL_{}", name);
    tokio::fs::write(&output, &received.data).await?;
    info!(bytes = received.data.len(), "saved {}", output);
    Ok(())
}

/// Only a transfer the server closed with a FIN is written to disk.
fn ensure_complete(received: &Received) -> Result<()> {
    if received.is_empty() {
        return Err(Error::new(ErrorKind::UnexpectedEof, "no data received"));
    }
    if !received.completed {
        return Err(Error::new(
            ErrorKind::UnexpectedEof,
            format!(
                "connection lost after {} bytes, discarding partial file",
                received.data.len()
            ),
        ));
    }
    Ok(())
}
