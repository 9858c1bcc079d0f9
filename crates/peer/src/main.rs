mod autopilot;
mod config;
mod events;
mod runner;

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::Parser;

use chase::{GameConnection, LoopbackConnection, UdpConnection};
use config::{PeerConfig, PeerMode};
use events::RunSummary;
use runner::PeerRunner;

#[derive(Parser)]
#[command(name = "chase-peer")]
#[command(about = "Headless cat-and-mouse peer")]
struct Args {
    #[arg(short, long, default_value = "0.0.0.0")]
    bind: String,

    #[arg(short, long, default_value_t = chase::DEFAULT_PORT)]
    port: u16,

    #[arg(short, long, help = "Join the host at this address instead of hosting")]
    join: Option<String>,

    #[arg(long, help = "Play both sides in this process over a loopback link")]
    local: bool,

    #[arg(short, long, default_value_t = 0, help = "Stop after this many frames (0 = until the session ends)")]
    frames: u64,

    #[arg(short, long, help = "Match length in seconds")]
    duration: Option<i32>,

    #[arg(long, help = "Leave the ship idle instead of steering it")]
    no_autopilot: bool,

    #[arg(long, default_value_t = 10, help = "Seconds of silence before the other player counts as gone")]
    idle_timeout: u64,
}

fn resolve(addr: &str) -> Result<SocketAddr> {
    addr.to_socket_addrs()
        .with_context(|| format!("cannot resolve {addr}"))?
        .next()
        .ok_or_else(|| anyhow!("no address for {addr}"))
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mode = if args.local {
        PeerMode::Local
    } else if let Some(server) = &args.join {
        let server = if server.contains(':') {
            resolve(server)?
        } else {
            resolve(&format!("{}:{}", server, args.port))?
        };
        PeerMode::Join {
            bind: resolve(&format!("{}:0", args.bind))?,
            server,
        }
    } else {
        PeerMode::Host {
            bind: resolve(&format!("{}:{}", args.bind, args.port))?,
        }
    };

    let mut config = PeerConfig {
        mode,
        max_frames: args.frames,
        autopilot: !args.no_autopilot,
        ..Default::default()
    };
    config.transport.idle_timeout = Duration::from_secs(args.idle_timeout);
    if let Some(duration) = args.duration {
        config.game.match_duration_secs = duration;
    }

    match config.mode {
        PeerMode::Local => run_local(&config),
        PeerMode::Host { .. } | PeerMode::Join { .. } => run_udp(&config),
    }
}

fn run_udp(config: &PeerConfig) -> Result<()> {
    let udp = match config.mode {
        PeerMode::Host { bind } => UdpConnection::host(bind, config.transport)?,
        PeerMode::Join { bind, server } => UdpConnection::join(bind, server, config.transport)?,
        PeerMode::Local => return Err(anyhow!("loopback mode has no UDP socket")),
    };
    if udp.is_server() {
        log::info!("hosting on {}", udp.local_addr());
    } else {
        log::info!("joining from {}", udp.local_addr());
    }

    let connection: Arc<dyn GameConnection> = Arc::new(udp);
    let runner = PeerRunner::new("peer", Arc::clone(&connection), config.clone());
    let summary = runner
        .spawn()?
        .join()
        .map_err(|_| anyhow!("simulation thread panicked"))?;

    connection.disconnect();
    report("peer", &summary);
    Ok(())
}

fn run_local(config: &PeerConfig) -> Result<()> {
    let (host, guest) = LoopbackConnection::pair();
    let host: Arc<dyn GameConnection> = Arc::new(host);
    let guest: Arc<dyn GameConnection> = Arc::new(guest);

    // the host listens before the guest announces itself
    let host_runner = PeerRunner::new("host", Arc::clone(&host), config.clone());
    let guest_runner = PeerRunner::new("guest", Arc::clone(&guest), config.clone());

    let host_thread = host_runner.spawn()?;
    let guest_thread = guest_runner.spawn()?;
    let host_summary = host_thread
        .join()
        .map_err(|_| anyhow!("host thread panicked"))?;
    let guest_summary = guest_thread
        .join()
        .map_err(|_| anyhow!("guest thread panicked"))?;

    host.disconnect();
    guest.disconnect();
    report("host", &host_summary);
    report("guest", &guest_summary);
    Ok(())
}

fn report(label: &str, summary: &RunSummary) {
    log::info!(
        "[{label}] {} frames, {} matches, wins {} - {}",
        summary.frames,
        summary.matches,
        summary.local_wins,
        summary.remote_wins
    );
}
