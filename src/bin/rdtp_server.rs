use clap::Parser;
use rdtp::{bind_udp, receive_bytes, send_bytes, RdtpConfiguration};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::io::Result;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Serve files to rdtp_client over RDTP.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    port: u16,
    /// Directory requested file names are resolved against
    #[arg(long, default_value = ".")]
    root: PathBuf,
    /// Probability of treating a received datagram as corrupted
    #[arg(long, default_value_t = 0.0)]
    corruption: f64,
    /// Probability of treating a received datagram as lost
    #[arg(long, default_value_t = 0.0)]
    loss: f64,
    /// Window size in bytes; must match the client
    #[arg(long, default_value_t = 8192)]
    window: u32,
    #[arg(long, default_value_t = 50)]
    timeout_ms: u64,
    /// Exit after serving one request
    #[arg(long)]
    once: bool,
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
    let config = args.configuration();
    config.validate()?;

    let socket = bind_udp(SocketAddr::from((Ipv4Addr::UNSPECIFIED, args.port)), &config).await?;
    info!("Listening on {}", socket.local_addr()?);

    loop {
        serve_one(&socket, &args.root, &config).await?;
        if args.once {
            return Ok(());
        }
    }
}

async fn serve_one(socket: &UdpSocket, root: &Path, config: &RdtpConfiguration) -> Result<()> {
    let (request, peer) = loop {
        let received = receive_bytes(socket, config).await?;
        match received.peer {
            Some(peer) if !received.is_empty() => break (received.data, peer),
            _ => debug!("empty request, waiting for another one"),
        }
    };

    let name = String::from_utf8_lossy(&request);
    info!(%peer, file = %name, "request received");

    let contents = match resolve(root, &name) {
        Some(path) => tokio::fs::read(&path).await.unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "cannot read requested file");
            Vec::new()
        }),
        None => {
            warn!(file = %name, "rejecting request outside of the served directory");
            Vec::new()
        }
    };

    let report = send_bytes(&contents, socket, peer, config).await?;
    if report.delivered {
        info!(
            %peer,
            bytes = contents.len(),
            transmissions = report.transmissions,
            "file sent"
        );
    } else {
        warn!(%peer, "client unreachable, transfer abandoned");
    }
    Ok(())
}

/// Maps a requested name to a path under `root`, refusing absolute paths and
/// parent directory components.
fn resolve(root: &Path, name: &str) -> Option<PathBuf> {
    let relative = Path::new(name);
    let confined = !name.is_empty()
        && relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
    confined.then(|| root.join(relative))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_stays_under_root() {
        let root = Path::new("/srv/files");
        assert_eq!(
            resolve(root, "notes.txt"),
            Some(PathBuf::from("/srv/files/notes.txt"))
        );
        assert_eq!(
            resolve(root, "sub/notes.txt"),
            Some(PathBuf::from("/srv/files/sub/notes.txt"))
        );
        assert_eq!(resolve(root, "/etc/passwd"), None);
        assert_eq!(resolve(root, "../secret"), None);
        assert_eq!(resolve(root, "sub/../../secret"), None);
        assert_eq!(resolve(root, ""), None);
    }
}
