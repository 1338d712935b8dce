//! Headless client for poking at a running server.
//!
//! Joins, readies up, wiggles left and right with the occasional jump and
//! logs what the server sends back, then disconnects cleanly.

use clap::Parser;
use log::{info, warn};
use shared::{room_code, write_frame, ClientMessage, FrameReader, ServerMessage, PORT};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{interval, timeout, Instant};

#[derive(Parser, Debug)]
#[command(author, version, about = "Headless test client")]
struct Args {
    /// Server address, e.g. 127.0.0.1:5555
    #[arg(short, long, conflicts_with = "code")]
    server: Option<SocketAddr>,

    /// Room code printed by the server
    #[arg(short, long)]
    code: Option<String>,

    /// Seconds to stay connected
    #[arg(short, long, default_value_t = 10)]
    duration: u64,
}

fn summarize(message: &ServerMessage) -> String {
    match message {
        ServerMessage::Initial {
            players,
            tile_map,
            your_player,
        } => format!(
            "INITIAL: we are {}, {} players, {} tiles",
            your_player,
            players.len(),
            tile_map.len()
        ),
        ServerMessage::State { players, tiles } => format!(
            "STATE: {} players, {} tile changes",
            players.len(),
            tiles.as_ref().map_or(0, Vec::len)
        ),
        ServerMessage::NewGame { players, tile_map } => format!(
            "NEW GAME: {} players, {} tiles",
            players.len(),
            tile_map.len()
        ),
        ServerMessage::Countdown { value } => format!("COUNTDOWN {}", value),
        ServerMessage::Winner { color } => format!("WINNER {}", color),
        ServerMessage::GameOver => "GAME OVER".to_string(),
        ServerMessage::ShuttingDown => "SHUTTING DOWN".to_string(),
        ServerMessage::Disconnected => "DISCONNECTED".to_string(),
        ServerMessage::Error { reason } => format!("ERROR: {}", reason),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let addr = match (args.server, args.code) {
        (Some(addr), _) => addr,
        (None, Some(code)) => SocketAddr::new(room_code::decode(&code)?.into(), PORT),
        (None, None) => SocketAddr::from(([127, 0, 0, 1], PORT)),
    };

    info!("Connecting to {}", addr);
    let stream = TcpStream::connect(addr).await?;
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = FrameReader::new(read_half);

    match reader.read_frame::<ServerMessage>().await? {
        ServerMessage::Error { reason } => {
            warn!("Server refused us: {}", reason);
            return Ok(());
        }
        first => info!("{}", summarize(&first)),
    }

    write_frame(&mut write_half, &ClientMessage::Ready).await?;

    let deadline = Instant::now() + Duration::from_secs(args.duration);
    let mut input_timer = interval(Duration::from_millis(500));
    let mut step: u32 = 0;
    let mut states: u64 = 0;

    while Instant::now() < deadline {
        tokio::select! {
            _ = input_timer.tick() => {
                step += 1;
                let direction = if step % 4 < 2 { "left" } else { "right" };
                write_frame(&mut write_half, &ClientMessage::Move { direction: direction.to_string() }).await?;
                if step % 3 == 0 {
                    write_frame(&mut write_half, &ClientMessage::Jump { drag_x: 20.0, drag_y: -60.0 }).await?;
                }
            }
            frame = reader.read_frame::<ServerMessage>() => {
                let message = frame?;
                if matches!(message, ServerMessage::State { .. }) {
                    states += 1;
                    if states % 45 == 0 {
                        info!("{} (#{})", summarize(&message), states);
                    }
                } else {
                    info!("{}", summarize(&message));
                }
                if message == ServerMessage::ShuttingDown {
                    return Ok(());
                }
            }
        }
    }

    write_frame(&mut write_half, &ClientMessage::Disconnect).await?;
    let acknowledged = timeout(Duration::from_secs(2), async {
        loop {
            match reader.read_frame::<ServerMessage>().await {
                Ok(ServerMessage::Disconnected) => return true,
                Ok(_) => continue,
                Err(_) => return false,
            }
        }
    })
    .await
    .unwrap_or(false);

    info!(
        "Received {} state updates, disconnect {}",
        states,
        if acknowledged { "acknowledged" } else { "not acknowledged" }
    );
    Ok(())
}
