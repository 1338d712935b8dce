use clap::Parser;
use log::{info, warn};
use server::config::{ServerConfig, DEFAULT_COUNTDOWN_FROM, DEFAULT_WINS_TO_WIN};
use server::network::{local_ipv4, Server};
use shared::{room_code, FPS, PORT};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about = "Authoritative server for the platform race")]
struct Args {
    /// IP address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = PORT)]
    port: u16,

    /// Simulation ticks per second
    #[arg(short, long, default_value_t = FPS)]
    tick_rate: u32,

    /// Round wins needed to end a match
    #[arg(short, long, default_value_t = DEFAULT_WINS_TO_WIN)]
    wins_to_win: u32,

    /// Milliseconds between countdown steps
    #[arg(long, default_value_t = 1000)]
    countdown_ms: u64,

    /// Seed for map selection, random when omitted
    #[arg(long)]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ServerConfig {
        host: args.host,
        port: args.port,
        tick_rate: args.tick_rate,
        wins_to_win: args.wins_to_win,
        countdown_from: DEFAULT_COUNTDOWN_FROM,
        countdown_interval: Duration::from_millis(args.countdown_ms),
        seed: args.seed,
        ..ServerConfig::default()
    };

    let server = Server::bind(config).await?;

    match local_ipv4() {
        Some(ip) => info!("Room code: {} ({})", room_code::encode(ip), ip),
        None => warn!("Could not determine a LAN address, no room code available"),
    }

    let handle = server.handle()?;
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down gracefully...");
            handle.shutdown().await;
        }
    });

    server.run().await?;
    Ok(())
}
